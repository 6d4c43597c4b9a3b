//! HTTP handlers for the report API.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap},
    response::Response,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::error;
use super::state::AppState;
use crate::report::SubmitError;

pub const SERVICE_NAME: &str = "Image Report API";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub timestamp: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub success: bool,
    pub message: String,
    pub report_id: String,
    pub external_record_id: String,
}

fn now_seconds() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

/// GET /
pub async fn root() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".into(),
        service: SERVICE_NAME.into(),
        timestamp: now_seconds(),
        version: None,
    })
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
        service: SERVICE_NAME.into(),
        timestamp: now_seconds(),
        version: Some(env!("CARGO_PKG_VERSION").into()),
    })
}

/// POST /api/report
///
/// The body is read raw so malformed JSON gets our error shape instead of the
/// extractor's plain-text rejection.
pub async fn submit_report(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SubmitResponse>, SubmitError> {
    ensure_json_content_type(&headers)?;
    let receipt = state.reports.submit(&body).await?;
    Ok(Json(SubmitResponse {
        success: true,
        message: "Report created successfully".into(),
        report_id: receipt.report_id.to_string(),
        external_record_id: receipt.page_id,
    }))
}

/// Any other method on /api/report.
pub async fn method_not_allowed() -> Response {
    error::method_not_allowed()
}

/// A missing content type is tolerated; a non-JSON one is not.
fn ensure_json_content_type(headers: &HeaderMap) -> Result<(), SubmitError> {
    let Some(value) = headers.get(header::CONTENT_TYPE) else {
        return Ok(());
    };
    let raw = value.to_str().unwrap_or_default();
    let essence = raw.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    if essence == "application/json" || essence.ends_with("+json") {
        Ok(())
    } else {
        Err(SubmitError::UnsupportedMediaType(raw.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn with_type(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn content_type_check() {
        assert!(ensure_json_content_type(&HeaderMap::new()).is_ok());
        assert!(ensure_json_content_type(&with_type("application/json")).is_ok());
        assert!(ensure_json_content_type(&with_type("Application/JSON; charset=utf-8")).is_ok());
        assert!(ensure_json_content_type(&with_type("application/merge-patch+json")).is_ok());
        assert!(matches!(
            ensure_json_content_type(&with_type("text/plain")),
            Err(SubmitError::UnsupportedMediaType(_))
        ));
    }

    #[tokio::test]
    async fn health_reports_version() {
        let Json(res) = health().await;
        assert_eq!(res.status, "healthy");
        assert_eq!(res.service, SERVICE_NAME);
        assert!(res.version.is_some());
        assert!(res.timestamp > 0.0);
    }
}
