use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use cloudcord_store::StoreError;

/// Failure outcomes of the social graph and conversation services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Expected outcome; never retried.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A store could not serve the request. The caller may retry.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),

    /// The primary write committed but the mirror write did not.
    #[error("Partial write: {0}")]
    PartialWriteFailure(String),

    #[error("Invalid request: {0}")]
    InvalidInput(String),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => ServiceError::NotFound(what),
            other => ServiceError::StoreUnavailable(other),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServiceError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ServiceError::StoreUnavailable(e) => {
                tracing::error!(error = %e, "store unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, "Store unavailable".to_string())
            }
            ServiceError::PartialWriteFailure(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            ServiceError::InvalidInput(_) => (StatusCode::BAD_REQUEST, self.to_string()),
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
