//! API error type with IntoResponse
//!
//! Errors are converted to JSON responses `{"error": code, "message": text}`.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use mushbbs_core::BbsError;

/// API error type with automatic HTTP status mapping
#[derive(Debug)]
pub enum ApiError {
    /// Board/post/faction operation failure, mapped by variant
    Bbs(BbsError),

    /// Missing or unverifiable acting identity (401)
    Unauthorized { reason: &'static str },

    /// Request body that is not valid JSON for the endpoint (400)
    InvalidBody(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Bbs(e) => match e {
                BbsError::NotFound { .. } => StatusCode::NOT_FOUND,
                BbsError::InvalidFormat { .. } | BbsError::Validation(_) => {
                    StatusCode::BAD_REQUEST
                }
                BbsError::Forbidden { .. } => StatusCode::FORBIDDEN,
                BbsError::Conflict(_) => StatusCode::CONFLICT,
                BbsError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::InvalidBody(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Bbs(BbsError::Storage(e)) => {
                // Log the actual error, return generic message
                tracing::error!(error = %e, "storage error");
                json!({
                    "error": "internal_error",
                    "message": "an internal error occurred"
                })
            }
            Self::Bbs(e) => json!({
                "error": e.code(),
                "message": e.to_string()
            }),
            Self::Unauthorized { reason } => json!({
                "error": "unauthorized",
                "message": reason
            }),
            Self::InvalidBody(message) => json!({
                "error": "validation_error",
                "message": message
            }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<BbsError> for ApiError {
    fn from(e: BbsError) -> Self {
        Self::Bbs(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidBody(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use mushbbs_core::models::ValidationError;

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn validation_error_is_400() {
        let err = ApiError::from(BbsError::from(ValidationError::Empty { field: "title" }));
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");
    }

    #[tokio::test]
    async fn bad_key_is_400() {
        let err = ApiError::from(BbsError::invalid_format("board key", "F", "no order"));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn not_found_is_404() {
        let (status, body) = body_json(BbsError::not_found("board", "F3").into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "board 'F3' not found");
    }

    #[tokio::test]
    async fn forbidden_names_the_action() {
        let err = ApiError::from(BbsError::Forbidden {
            action: "create a board",
        });
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(
            body["message"],
            "you do not have permission to create a board"
        );
    }

    #[tokio::test]
    async fn conflict_is_409() {
        let err = ApiError::from(BbsError::Conflict("board F3 already exists".into()));
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn storage_error_is_generic_500() {
        let io = std::io::Error::other("connection reset by peer");
        let (status, body) = body_json(BbsError::storage(io).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "an internal error occurred");
    }

    #[tokio::test]
    async fn missing_identity_is_401() {
        let err = ApiError::Unauthorized {
            reason: "missing x-user-id header",
        };
        assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
    }
}
