use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use cachet_shared::CryptoError;
use cachet_store::StoreError;

#[derive(Debug, Error)]
pub enum ServerError {
    /// Unknown tenant, entrypoint, session or conversation. Always the
    /// same body so callers cannot probe which part was unknown.
    #[error("Not found")]
    NotFound,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Captcha mismatch")]
    CaptchaMismatch,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            ServerError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::Conflict(_) => (StatusCode::CONFLICT, self.to_string()),
            ServerError::CaptchaMismatch => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::Store(store) => match store {
                StoreError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
                StoreError::Conflict(_) => (StatusCode::CONFLICT, store.to_string()),
                StoreError::TenantNotPending => {
                    (StatusCode::NOT_FOUND, "Not found".to_string())
                }
                StoreError::InvalidId(_) => (StatusCode::BAD_REQUEST, store.to_string()),
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Storage error".to_string(),
                ),
            },
            // Crypto failures here only ever come from caller-supplied key
            // material; the primitives themselves are not exposed.
            ServerError::Crypto(_) => {
                (StatusCode::BAD_REQUEST, "Invalid key material".to_string())
            }
            ServerError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
