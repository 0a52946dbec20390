//! JSON error responses shared by every API handler.

use axum::{
    Json,
    extract::{FromRequest, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use frogpool_core::processors::GameError;
use frogpool_sdk::objects::{ErrorCategory, ErrorResponse};
use frogpool_sdk::session::SessionError;

/// Error returned by API handlers and extractors.
///
/// Rendered as `{"category": ..., "message": ...}` with a status code
/// derived from the category.
#[derive(Debug)]
pub struct ApiError {
    category: ErrorCategory,
    message: String,
}

impl ApiError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Unauthenticated, message)
    }
}

fn status_for(category: ErrorCategory) -> StatusCode {
    match category {
        ErrorCategory::Validation => StatusCode::BAD_REQUEST,
        ErrorCategory::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorCategory::NotFound => StatusCode::NOT_FOUND,
        ErrorCategory::Conflict => StatusCode::CONFLICT,
        ErrorCategory::Chain => StatusCode::BAD_GATEWAY,
        ErrorCategory::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<GameError> for ApiError {
    fn from(err: GameError) -> Self {
        let category = err.category();
        let message = match category {
            ErrorCategory::Storage => {
                tracing::error!(error = %err, "Storage failure while handling request");
                "internal server error".to_owned()
            }
            ErrorCategory::Chain => {
                tracing::warn!(error = %err, "Chain failure while handling request");
                err.to_string()
            }
            _ => err.to_string(),
        };
        Self { category, message }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        Self::unauthenticated(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(ErrorCategory::Validation, rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(self.category);
        (status, Json(ErrorResponse::new(self.category, self.message))).into_response()
    }
}

/// `Json` extractor whose rejection is an [`ApiError`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[cfg(test)]
mod tests {
    use super::*;
    use frogpool_core::store::StoreError;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(GameError::PoolFull(1)).into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(GameError::NoActiveFrog).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(SessionError::Expired).into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(GameError::InvalidInput("x".into()))
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_storage_message_is_hidden() {
        let err = ApiError::from(GameError::Store(StoreError::Database(
            sqlx::Error::PoolTimedOut,
        )));
        assert_eq!(err.category, ErrorCategory::Storage);
        assert_eq!(err.message, "internal server error");
    }
}
