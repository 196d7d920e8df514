/*!
 * API Errors
 * One error type for every handler, rendered as a JSON body at the boundary
 */
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::store::StoreError;

/// Why a single field failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Required,
    Unique,
    Invalid,
}

/// One `{field, error}` entry in a structured error list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub error: String,
    #[serde(skip)]
    pub code: ErrorCode,
}

impl FieldError {
    pub fn required(field: &str) -> Self {
        Self {
            field: field.to_string(),
            error: "This field is required.".to_string(),
            code: ErrorCode::Required,
        }
    }

    pub fn unique(field: &str, error: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            error: error.into(),
            code: ErrorCode::Unique,
        }
    }

    pub fn invalid(field: &str, error: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            error: error.into(),
            code: ErrorCode::Invalid,
        }
    }
}

/// Body shared by every error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("validation failed on {} field(s)", .0.len())]
    Validation(Vec<FieldError>),

    #[error("{message}")]
    Conflict {
        message: String,
        errors: Vec<FieldError>,
    },

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn conflict(message: &str, errors: Vec<FieldError>) -> Self {
        ApiError::Conflict {
            message: message.to_string(),
            errors,
        }
    }

    pub fn unauthenticated() -> Self {
        ApiError::Unauthorized("Authentication credentials were not provided.".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
            ApiError::Store(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Vec<FieldError>> for ApiError {
    fn from(errors: Vec<FieldError>) -> Self {
        ApiError::Validation(errors)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (message, errors) = match self {
            ApiError::Validation(errors) => ("Validation errors occurred.".to_string(), Some(errors)),
            ApiError::Conflict { message, errors } => (message, Some(errors)),
            ApiError::BadRequest(msg) | ApiError::Unauthorized(msg) | ApiError::Forbidden(msg) => {
                (msg, None)
            }
            ApiError::NotFound => ("Not found.".to_string(), None),
            ApiError::Store(StoreError::Conflict(field)) => (
                "Conflicting record already exists.".to_string(),
                Some(vec![FieldError::unique(&field, "This value is already in use.")]),
            ),
            ApiError::Store(e) => {
                tracing::error!(error = %e, "store error while handling request");
                ("Database error".to_string(), None)
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error while handling request");
                ("Internal server error".to_string(), None)
            }
        };

        (
            status,
            Json(ErrorResponse {
                message,
                status: status.as_u16(),
                errors,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_validation_error_lists_fields() {
        let response = ApiError::Validation(vec![
            FieldError::required("title"),
            FieldError::invalid("email", "Enter a valid email address."),
        ])
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["status"], 400);
        assert_eq!(body["errors"][0]["field"], "title");
        assert_eq!(body["errors"][1]["field"], "email");
        assert!(body["errors"][0].get("code").is_none());
    }

    #[tokio::test]
    async fn test_store_conflict_maps_to_409() {
        let response = ApiError::Store(StoreError::Conflict("email".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = body_json(response).await;
        assert_eq!(body["errors"][0]["field"], "email");
    }

    #[tokio::test]
    async fn test_conflict_keeps_caller_message() {
        let response = ApiError::conflict(
            "Your account already exists.",
            vec![FieldError::unique("username", "taken")],
        )
        .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Your account already exists.");
        assert_eq!(body["errors"][0]["field"], "username");
    }

    #[tokio::test]
    async fn test_plain_errors_have_no_error_list() {
        let response = ApiError::Forbidden("nope".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = body_json(response).await;
        assert_eq!(body["message"], "nope");
        assert!(body.get("errors").is_none());
    }
}
