//! Failure response bodies and the status code for each failure kind.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;

use crate::report::SubmitError;

/// Body of every failed request: `{ "success": false, "error": ... }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl SubmitError {
    pub fn status(&self) -> StatusCode {
        match self {
            SubmitError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            SubmitError::InvalidJson(_)
            | SubmitError::NoData
            | SubmitError::InvalidPayload(_)
            | SubmitError::Missing(_) => StatusCode::BAD_REQUEST,
            SubmitError::Downstream { .. }
            | SubmitError::Unreachable(_)
            | SubmitError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for SubmitError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            SubmitError::Downstream { body, .. } if !body.is_empty() => {
                let details = serde_json::from_str::<Value>(body)
                    .unwrap_or_else(|_| Value::String(body.clone()));
                ErrorBody::new(self.to_string()).with_details(details)
            }
            SubmitError::Internal(detail) => {
                error!(%detail, "internal error while handling report");
                ErrorBody::new(self.to_string())
            }
            _ => ErrorBody::new(self.to_string()),
        };
        (status, Json(body)).into_response()
    }
}

/// Plain 405 for anything but POST/OPTIONS on the report route.
pub fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(ErrorBody::new("Method not allowed")),
    )
        .into_response()
}
