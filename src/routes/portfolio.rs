/**
 * Portfolio Routes
 * Anonymous lookup of a published portfolio by owner and slug, and the
 * owner's restricted visibility/slug update
 */
use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::extract::{AuthUser, JsonBody, MaybeUser, PathId};
use crate::policy::{self, Action};
use crate::resources::{self, record_json, ResourceKind};
use crate::routes::resources::{apply_update, record_target};
use crate::state::AppState;

/// GET /api/portfolio/{username}/{unique_slug}
/// Anonymous, but a bearer token that is sent must still be valid
pub async fn public_portfolio(
    State(state): State<AppState>,
    _caller: MaybeUser,
    Path((username, unique_slug)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let portfolio = state
        .store
        .find_portfolio_by_slug(&username, &unique_slug)
        .await?
        .ok_or(ApiError::NotFound)?;

    if !portfolio.is_public {
        tracing::debug!(record_id = %portfolio.id, "Private portfolio requested by slug");
        return Err(ApiError::Forbidden("This portfolio is not public.".to_string()));
    }

    Ok(Json(record_json(&portfolio)))
}

/// PATCH /api/template-portfolios/{id}/public-update
/// Only `is_public` and `unique_slug` may change here
pub async fn public_update(
    State(state): State<AppState>,
    caller: AuthUser,
    PathId(id): PathId,
    JsonBody(body): JsonBody<Map<String, Value>>,
) -> Result<Json<Value>, ApiError> {
    let record = state
        .store
        .find_record(ResourceKind::TemplatePortfolio, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    let requester = caller.requester();
    policy::authorize(Some(&requester), &record_target(&record), Action::PublicUpdate)?;

    let allowed = resources::public_update_fields(&body)?;
    let merged = resources::merge(&record.data, &allowed);
    apply_update(&state, record, &merged, &requester).await
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::TestApp;
    use axum::http::{Method, StatusCode};
    use serde_json::{json, Value};

    /// A template plus a private portfolio owned by "ada"; returns the
    /// portfolio id and ada's token.
    async fn seed(app: &TestApp) -> (String, String) {
        let (_, staff) = app.user("curator", true).await;
        let (_, template) = app
            .post("/api/templates", Some(&staff), json!({ "name": "Minimal" }))
            .await;
        let (_, token) = app.user("ada", false).await;
        let (status, portfolio) = app
            .post(
                "/api/template-portfolios",
                Some(&token),
                json!({
                    "template": template["id"],
                    "title": "My work",
                    "unique_slug": "my-work",
                    "content": { "headline": "Hello" },
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        (portfolio["id"].as_str().unwrap().to_string(), token)
    }

    #[tokio::test]
    async fn test_public_lookup_status_codes() {
        let app = TestApp::new();
        let (id, token) = seed(&app).await;

        let (status, _) = app.get("/api/portfolio/ada/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = app.get("/api/portfolio/nobody/my-work", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = app.get("/api/portfolio/ada/my-work", None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "This portfolio is not public.");

        let (status, _) = app
            .call(
                Method::PATCH,
                &format!("/api/template-portfolios/{}/public-update", id),
                Some(&token),
                Some(json!({ "is_public": true })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = app.get("/api/portfolio/ada/my-work", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["content"]["headline"], "Hello");
    }

    #[tokio::test]
    async fn test_public_update_is_owner_only_and_restricted() {
        let app = TestApp::new();
        let (id, token) = seed(&app).await;
        let uri = format!("/api/template-portfolios/{}/public-update", id);
        let (_, staff) = app.user("root", true).await;

        let (status, _) = app
            .call(Method::PATCH, &uri, Some(&staff), Some(json!({ "is_public": true })))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app
            .call(
                Method::PATCH,
                &uri,
                Some(&token),
                Some(json!({ "unique_slug": "renamed", "title": "ignored" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["unique_slug"], "renamed");
        assert_eq!(body["title"], "My work");

        let (status, body) = app
            .call(Method::PATCH, &uri, Some(&token), Some(json!({ "title": "x" })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["field"], Value::from("non_field_errors"));
    }
}
