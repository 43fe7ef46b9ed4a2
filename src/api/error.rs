use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use snafu::Snafu;

use crate::store::StoreError;

pub type Result<T, E = ApiError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ApiError {
    /// Malformed client input.
    #[snafu(display("{message}"))]
    InvalidArgument { message: String },

    /// Caller exceeded its request budget for the current window.
    #[snafu(display("too many requests, retry later"))]
    RateLimited,

    /// The backing store failed; details stay in the server logs.
    #[snafu(transparent)]
    Store { source: StoreError },
}

pub(crate) fn invalid_argument(message: impl Into<String>) -> ApiError {
    ApiError::InvalidArgument {
        message: message.into(),
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidArgument { .. } => StatusCode::BAD_REQUEST,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Store { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::Store { source } => {
                tracing::error!(error = %source, "store operation failed");
                "internal server error".to_owned()
            }
            other => other.to_string(),
        };

        (self.status(), Json(json!({ "error": message }))).into_response()
    }
}
