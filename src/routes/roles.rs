/**
 * Role Routes
 * Readable by any signed-in user, managed by staff
 */
use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::db::models::{NewRole, Role};
use crate::error::{ApiError, FieldError};
use crate::extract::{AuthUser, JsonBody, PathId};
use crate::policy::{self, Action, Target};
use crate::resources::fields::Fields;
use crate::state::AppState;
use crate::store::StoreError;

const ROLE_EXISTS_MESSAGE: &str = "A role with this name already exists.";

fn role_conflict() -> ApiError {
    ApiError::conflict(
        "Conflicting record already exists.",
        vec![FieldError::unique("name", ROLE_EXISTS_MESSAGE)],
    )
}

fn write_error(error: StoreError) -> ApiError {
    match error {
        StoreError::Conflict(_) => role_conflict(),
        other => other.into(),
    }
}

async fn load_role(state: &AppState, id: Uuid) -> Result<Role, ApiError> {
    state.store.find_role(id).await?.ok_or(ApiError::NotFound)
}

/// GET /api/roles
pub async fn list_roles(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<Vec<Role>>, ApiError> {
    policy::authorize(Some(&caller.requester()), &Target::Roles, Action::List)?;
    Ok(Json(state.store.list_roles().await?))
}

/// POST /api/roles
pub async fn create_role(
    State(state): State<AppState>,
    caller: AuthUser,
    JsonBody(body): JsonBody<Map<String, Value>>,
) -> Result<(StatusCode, Json<Role>), ApiError> {
    policy::authorize(Some(&caller.requester()), &Target::Roles, Action::Create)?;

    let mut f = Fields::new(&body);
    let name = f.required_text("name", 50).unwrap_or_default();
    let description = f.optional_text("description", 500);
    f.finish(())?;

    if state.store.find_role_by_name(&name).await?.is_some() {
        return Err(role_conflict());
    }

    let role = state
        .store
        .insert_role(NewRole { name, description })
        .await
        .map_err(write_error)?;
    tracing::info!(role_id = %role.id, name = %role.name, "Role created");
    Ok((StatusCode::CREATED, Json(role)))
}

/// GET /api/roles/{id}
pub async fn get_role(
    State(state): State<AppState>,
    caller: AuthUser,
    PathId(id): PathId,
) -> Result<Json<Role>, ApiError> {
    let role = load_role(&state, id).await?;
    policy::authorize(Some(&caller.requester()), &Target::Roles, Action::Retrieve)?;
    Ok(Json(role))
}

/// PUT|PATCH /api/roles/{id}
pub async fn update_role(
    State(state): State<AppState>,
    caller: AuthUser,
    PathId(id): PathId,
    JsonBody(body): JsonBody<Map<String, Value>>,
) -> Result<Json<Role>, ApiError> {
    let mut role = load_role(&state, id).await?;
    policy::authorize(Some(&caller.requester()), &Target::Roles, Action::Update)?;

    let mut f = Fields::new(&body);
    if body.contains_key("name") {
        if let Some(name) = f.required_text("name", 50) {
            role.name = name;
        }
    }
    if body.contains_key("description") {
        role.description = f.optional_text("description", 500);
    }
    f.finish(())?;

    if let Some(other) = state.store.find_role_by_name(&role.name).await? {
        if other.id != role.id {
            return Err(role_conflict());
        }
    }

    let saved = state.store.save_role(&role).await.map_err(write_error)?;
    Ok(Json(saved))
}

/// DELETE /api/roles/{id}
/// Users holding the role keep their account with no role
pub async fn delete_role(
    State(state): State<AppState>,
    caller: AuthUser,
    PathId(id): PathId,
) -> Result<StatusCode, ApiError> {
    let role = load_role(&state, id).await?;
    policy::authorize(Some(&caller.requester()), &Target::Roles, Action::Delete)?;

    state.store.delete_role(role.id).await?;
    tracing::info!(role_id = %role.id, name = %role.name, "Role deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::TestApp;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_roles_are_readable_by_any_user() {
        let app = TestApp::new();
        let (_, token) = app.user("ada", false).await;

        let (status, body) = app.get("/api/roles", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["user", "staff"]);

        let (status, _) = app.get("/api/roles", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_only_staff_manage_roles() {
        let app = TestApp::new();
        let (_, user_token) = app.user("ada", false).await;
        let (_, staff_token) = app.user("root", true).await;

        let (status, _) = app
            .post("/api/roles", Some(&user_token), json!({ "name": "editor" }))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, role) = app
            .post("/api/roles", Some(&staff_token), json!({ "name": "editor" }))
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = app
            .post("/api/roles", Some(&staff_token), json!({ "name": "editor" }))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let uri = format!("/api/roles/{}", role["id"].as_str().unwrap());
        let (status, body) = app
            .call(
                Method::PATCH,
                &uri,
                Some(&staff_token),
                Some(json!({ "description": "Can edit" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "editor");
        assert_eq!(body["description"], "Can edit");

        let (status, _) = app.call(Method::DELETE, &uri, Some(&staff_token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(app.get(&uri, Some(&staff_token)).await.0, StatusCode::NOT_FOUND);
    }
}
