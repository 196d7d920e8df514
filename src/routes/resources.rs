/**
 * Resource Routes
 * One set of CRUD handlers shared by every portfolio collection. The
 * collection a route serves arrives as an `Extension<ResourceKind>`.
 */
use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::db::models::{NewRecord, Record};
use crate::error::{ApiError, FieldError};
use crate::extract::{JsonBody, MaybeUser, PathId};
use crate::policy::{self, Action, Requester, Target};
use crate::resources::{self, record_json, ResourceKind, Validated};
use crate::state::AppState;
use crate::store::StoreError;

const SLUG_TAKEN_MESSAGE: &str = "You already have a portfolio with this slug.";

pub(crate) fn record_target(record: &Record) -> Target {
    Target::Record {
        kind: record.kind,
        owner: record.created_by,
        is_public: record.is_public,
    }
}

fn missing_reference(field: &str, id: Uuid) -> FieldError {
    FieldError::invalid(field, format!("Invalid pk \"{}\" - object does not exist.", id))
}

/// Template the stored payload already points at.
fn stored_template(record: &Record) -> Option<Uuid> {
    record
        .data
        .get("template")
        .and_then(Value::as_str)
        .and_then(|id| Uuid::parse_str(id).ok())
}

/// Checks that need the store: referenced ids exist, a template selection
/// belongs to its caller, and an owner's portfolio slugs stay distinct.
/// An update that keeps the stored template is not re-checked, so records
/// survive the deletion of the template they were built from.
async fn check_references(
    state: &AppState,
    validated: &Validated,
    requester: &Requester,
    owner: Uuid,
    existing: Option<&Record>,
) -> Result<(), ApiError> {
    let mut errors = Vec::new();
    let exclude = existing.map(|r| r.id);
    let kept_template = existing.and_then(stored_template);

    if let Some(template) = validated.template.filter(|t| Some(*t) != kept_template) {
        if state
            .store
            .find_record(ResourceKind::Template, template)
            .await?
            .is_none()
        {
            errors.push(missing_reference("template", template));
        }
    }

    if let Some(user) = validated.user {
        if state.store.find_user(user).await?.is_none() {
            errors.push(missing_reference("user", user));
        } else if !requester.is_staff && user != requester.id {
            errors.push(FieldError::invalid(
                "user",
                "You can only select templates for yourself.",
            ));
        }
    }

    if let Some(slug) = &validated.unique_slug {
        if state.store.slug_taken(owner, slug, exclude).await? {
            errors.push(FieldError::unique("unique_slug", SLUG_TAKEN_MESSAGE));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors))
    }
}

/// A slug race lost at the unique index reads the same as the pre-check.
fn write_error(error: StoreError) -> ApiError {
    match error {
        StoreError::Conflict(field) if field == "unique_slug" => {
            ApiError::Validation(vec![FieldError::unique("unique_slug", SLUG_TAKEN_MESSAGE)])
        }
        other => other.into(),
    }
}

async fn load(state: &AppState, kind: ResourceKind, id: Uuid) -> Result<Record, ApiError> {
    state.store.find_record(kind, id).await?.ok_or(ApiError::NotFound)
}

/// Validate `body` as the record's complete new payload and save it.
pub(crate) async fn apply_update(
    state: &AppState,
    mut record: Record,
    body: &Map<String, Value>,
    requester: &Requester,
) -> Result<Json<Value>, ApiError> {
    let validated = resources::validate(record.kind, body)?;
    let owner = validated.user.unwrap_or(record.created_by);
    check_references(state, &validated, requester, owner, Some(&record)).await?;

    record.created_by = owner;
    record.is_public = validated.is_public;
    record.unique_slug = validated.unique_slug;
    record.data = validated.data;

    let saved = state.store.save_record(&record).await.map_err(write_error)?;
    tracing::info!(kind = %saved.kind, record_id = %saved.id, updated_by = %requester.id, "Record updated");
    Ok(Json(record_json(&saved)))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/{collection}
pub async fn list(
    State(state): State<AppState>,
    Extension(kind): Extension<ResourceKind>,
    caller: MaybeUser,
) -> Result<Json<Vec<Value>>, ApiError> {
    let requester = caller.requester();
    policy::authorize(requester.as_ref(), &Target::Collection(kind), Action::List)?;

    let scope = policy::list_scope(requester.as_ref(), kind);
    let records = state.store.list_records(kind, scope).await?;
    Ok(Json(records.iter().map(record_json).collect()))
}

/// POST /api/{collection}
pub async fn create(
    State(state): State<AppState>,
    Extension(kind): Extension<ResourceKind>,
    caller: MaybeUser,
    JsonBody(body): JsonBody<Map<String, Value>>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let requester = caller.requester();
    policy::authorize(requester.as_ref(), &Target::Collection(kind), Action::Create)?;
    let requester = requester.ok_or_else(ApiError::unauthenticated)?;

    let validated = resources::validate(kind, &body)?;
    // A template selection belongs to the user it names.
    let owner = validated.user.unwrap_or(requester.id);
    check_references(&state, &validated, &requester, owner, None).await?;

    let record = state
        .store
        .insert_record(NewRecord {
            kind,
            created_by: owner,
            is_public: validated.is_public,
            unique_slug: validated.unique_slug,
            data: validated.data,
        })
        .await
        .map_err(write_error)?;

    tracing::info!(kind = %kind, record_id = %record.id, owner = %owner, "Record created");
    Ok((StatusCode::CREATED, Json(record_json(&record))))
}

/// GET /api/{collection}/{id}
pub async fn retrieve(
    State(state): State<AppState>,
    Extension(kind): Extension<ResourceKind>,
    caller: MaybeUser,
    PathId(id): PathId,
) -> Result<Json<Value>, ApiError> {
    let record = load(&state, kind, id).await?;
    policy::authorize(caller.requester().as_ref(), &record_target(&record), Action::Retrieve)?;
    Ok(Json(record_json(&record)))
}

/// PUT /api/{collection}/{id}
/// Full replacement: every required field must be present
pub async fn replace(
    State(state): State<AppState>,
    Extension(kind): Extension<ResourceKind>,
    caller: MaybeUser,
    PathId(id): PathId,
    JsonBody(body): JsonBody<Map<String, Value>>,
) -> Result<Json<Value>, ApiError> {
    let record = load(&state, kind, id).await?;
    let requester = caller.requester();
    policy::authorize(requester.as_ref(), &record_target(&record), Action::Update)?;
    let requester = requester.ok_or_else(ApiError::unauthenticated)?;

    apply_update(&state, record, &body, &requester).await
}

/// PATCH /api/{collection}/{id}
/// Submitted fields are laid over the stored payload, then the whole is validated
pub async fn patch(
    State(state): State<AppState>,
    Extension(kind): Extension<ResourceKind>,
    caller: MaybeUser,
    PathId(id): PathId,
    JsonBody(body): JsonBody<Map<String, Value>>,
) -> Result<Json<Value>, ApiError> {
    let record = load(&state, kind, id).await?;
    let requester = caller.requester();
    policy::authorize(requester.as_ref(), &record_target(&record), Action::Update)?;
    let requester = requester.ok_or_else(ApiError::unauthenticated)?;

    let merged = resources::merge(&record.data, &body);
    apply_update(&state, record, &merged, &requester).await
}

/// DELETE /api/{collection}/{id}
pub async fn destroy(
    State(state): State<AppState>,
    Extension(kind): Extension<ResourceKind>,
    caller: MaybeUser,
    PathId(id): PathId,
) -> Result<StatusCode, ApiError> {
    let record = load(&state, kind, id).await?;
    policy::authorize(caller.requester().as_ref(), &record_target(&record), Action::Delete)?;

    state.store.delete_record(kind, record.id).await?;
    tracing::info!(kind = %kind, record_id = %record.id, "Record deleted");
    Ok(StatusCode::NO_CONTENT)
}
