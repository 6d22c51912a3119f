//! API Error Types
//!
//! Defines error types for the API layer and implements conversion
//! to HTTP responses with appropriate status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::broker::BrokerError;

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// No report has been built yet
    #[error("No report available yet")]
    NotReady,

    /// Subscribing to the broker failed
    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    /// Report could not be encoded
    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
    pub request_id: String,
}

/// Error details
#[derive(Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::NotReady => (StatusCode::SERVICE_UNAVAILABLE, "NOT_READY"),
            ApiError::Broker(BrokerError::TooManySubscribers(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "TOO_MANY_SUBSCRIBERS")
            }
            ApiError::Broker(BrokerError::Stopped | BrokerError::AlreadyStopped) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SHUTTING_DOWN")
            }
            ApiError::Broker(_) => (StatusCode::INTERNAL_SERVER_ERROR, "BROKER_ERROR"),
            ApiError::Encoding(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ENCODING_ERROR"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let request_id = uuid::Uuid::new_v4().to_string();

        if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            tracing::error!(
                request_id = %request_id,
                error_code = %code,
                error_message = %self,
                "API error occurred"
            );
        } else {
            tracing::debug!(request_id = %request_id, error_code = %code, "Request refused");
        }

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: self.to_string(),
            },
            request_id,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::NotReady.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::Broker(BrokerError::TooManySubscribers(10))
                .into_response()
                .status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::Internal("boom".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
