//! API error types
//!
//! Every admin error renders as the JSON body `{"error": …}` with a
//! 4xx/5xx status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use lumber_pipeline::PipelineError;

/// Admin API errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// No pipeline registered under this name
    #[error("unknown pipeline {0:?}")]
    UnknownPipeline(String),

    /// Index does not name an action (0 is the input, the last index the
    /// output; only actions serve info and sample)
    #[error("index {0} is not an action")]
    NotAnAction(usize),

    /// No plugin endpoint with this name under this index
    #[error("unknown endpoint {0:?}")]
    UnknownEndpoint(String),

    /// Error surfaced by the pipeline itself
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl ApiError {
    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::UnknownPipeline(_) | Self::UnknownEndpoint(_) => StatusCode::NOT_FOUND,
            Self::NotAnAction(_) => StatusCode::BAD_REQUEST,
            Self::Pipeline(err) => match err {
                PipelineError::UnknownAction(_) => StatusCode::NOT_FOUND,
                PipelineError::MetricNotConfigured(_) => StatusCode::BAD_REQUEST,
                PipelineError::NoActiveProcessors => StatusCode::BAD_REQUEST,
                PipelineError::SampleBusy => StatusCode::CONFLICT,
                PipelineError::SampleTimeout => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::UnknownPipeline("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::NotAnAction(0).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Pipeline(PipelineError::SampleTimeout).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::Pipeline(PipelineError::MetricNotConfigured(1)).status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
