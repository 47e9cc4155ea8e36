//! Mapping from domain failures to HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use tracing::{error, warn};
use trialscout_core::error::{AgentError, ExtractionError, RegistryError};

/// JSON error body. Registry failures also carry what the registry said.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_body: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                error: message.into(),
                upstream_status: None,
                upstream_body: None,
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<ExtractionError> for ApiError {
    fn from(err: ExtractionError) -> Self {
        let status = match &err {
            ExtractionError::EmptyInput => StatusCode::BAD_REQUEST,
            ExtractionError::Reasoning(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        };
        Self::new(status, err.to_string())
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        let message = err.to_string();
        match err {
            RegistryError::Http { status, body } => Self {
                status: StatusCode::BAD_GATEWAY,
                body: ErrorResponse {
                    error: message,
                    upstream_status: Some(status),
                    upstream_body: Some(body),
                },
            },
            RegistryError::Timeout(_) => Self::new(StatusCode::GATEWAY_TIMEOUT, message),
            _ => Self::new(StatusCode::BAD_GATEWAY, message),
        }
    }
}

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        let status = match &err {
            AgentError::StepBudgetExceeded { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AgentError::Reasoning(_) => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = self.status.as_u16(), error = %self.body.error, "Request failed");
        } else {
            warn!(status = self.status.as_u16(), error = %self.body.error, "Request rejected");
        }
        (self.status, Json(self.body)).into_response()
    }
}
