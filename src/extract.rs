/*!
 * Request Extractors
 * Bearer-token identity and JSON bodies with API-shaped rejections
 */
use axum::{
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Path, Request},
    http::{request::Parts, HeaderMap},
    Json,
};
use uuid::Uuid;

use crate::auth::tokens::{self, TokenType};
use crate::db::models::User;
use crate::error::ApiError;
use crate::policy::Requester;
use crate::state::AppState;

/// Extract bearer token from Authorization header
fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// The caller, when a bearer token was sent. A token that is present but
/// invalid is still rejected.
pub struct MaybeUser(pub Option<User>);

impl MaybeUser {
    pub fn requester(&self) -> Option<Requester> {
        self.0.as_ref().map(requester_of)
    }
}

/// The caller of an endpoint that requires authentication.
pub struct AuthUser(pub User);

impl AuthUser {
    pub fn requester(&self) -> Requester {
        requester_of(&self.0)
    }
}

pub fn requester_of(user: &User) -> Requester {
    Requester {
        id: user.id,
        is_staff: user.is_staff,
    }
}

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = extract_bearer_token(&parts.headers) else {
            return Ok(MaybeUser(None));
        };

        let user_id = match tokens::verify(token, TokenType::Access, &state.config)
            .and_then(|claims| claims.user_id())
        {
            Ok(id) => id,
            Err(e) => {
                tracing::debug!("Token verification failed: {}", e);
                return Err(ApiError::Unauthorized("Invalid or expired token".to_string()));
            }
        };

        match state.store.find_user(user_id).await? {
            Some(user) => Ok(MaybeUser(Some(user))),
            None => Err(ApiError::Unauthorized("User not found".to_string())),
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match MaybeUser::from_request_parts(parts, state).await?.0 {
            Some(user) => Ok(AuthUser(user)),
            None => Err(ApiError::unauthenticated()),
        }
    }
}

/// `Json<T>` whose rejection renders as an `ApiError` body.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
        }
    }
}

/// The `{id}` segment of a detail route. A malformed id is a JSON 400
/// instead of axum's plain-text rejection.
pub struct PathId(pub Uuid);

impl<S> FromRequestParts<S> for PathId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<Uuid>::from_request_parts(parts, state).await {
            Ok(Path(id)) => Ok(PathId(id)),
            Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert("authorization", HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(extract_bearer_token(&headers), Some("abc.def"));

        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert("authorization", HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer_token(&headers), None);
    }
}
