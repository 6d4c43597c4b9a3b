//! Report submission pipeline: parse, normalize, map, create one Notion page.
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::model::{MissingFields, ReportId, ReportSubmission};
use crate::notion::model::ApiErrorBody;
use crate::notion::{build_report_page_request, NotionError, NotionService, ReportSchema};

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Unsupported content type: {0}")]
    UnsupportedMediaType(String),
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("No JSON data provided")]
    NoData,
    #[error("Invalid report payload: {0}")]
    InvalidPayload(#[source] serde_json::Error),
    #[error(transparent)]
    Missing(#[from] MissingFields),
    #[error("Notion API error: {status}")]
    Downstream { status: u16, body: String },
    #[error("Failed to reach Notion")]
    Unreachable(#[source] NotionError),
    /// Detail is for logs only; the caller sees the generic message.
    #[error("Internal server error")]
    Internal(String),
}

impl From<NotionError> for SubmitError {
    fn from(err: NotionError) -> Self {
        match err {
            NotionError::Api { status, body } => SubmitError::Downstream { status, body },
            err @ NotionError::Transport(_) => SubmitError::Unreachable(err),
            other => SubmitError::Internal(other.to_string()),
        }
    }
}

/// Identifiers handed back to the caller after a page is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub report_id: ReportId,
    pub page_id: String,
}

#[derive(Clone)]
pub struct ReportService {
    notion: Arc<dyn NotionService>,
    schema: Arc<ReportSchema>,
}

impl ReportService {
    pub fn new(notion: Arc<dyn NotionService>, schema: ReportSchema) -> Self {
        Self {
            notion,
            schema: Arc::new(schema),
        }
    }

    pub fn schema(&self) -> &ReportSchema {
        &self.schema
    }

    /// Run the whole pipeline on a raw request body.
    #[instrument(skip_all)]
    pub async fn submit(&self, body: &[u8]) -> Result<SubmitReceipt, SubmitError> {
        let submission = parse_submission(body)?;
        self.submit_report(submission).await
    }

    pub async fn submit_report(
        &self,
        submission: ReportSubmission,
    ) -> Result<SubmitReceipt, SubmitError> {
        let report = submission.normalize()?;
        let report_id = ReportId::generate();
        debug!(%report_id, categories = ?report.categories, "received report");

        let body = build_report_page_request(&self.schema, &report_id, &report);
        match self.notion.create_page(body).await {
            Ok(page_id) => {
                info!(%report_id, %page_id, "report created");
                Ok(SubmitReceipt { report_id, page_id })
            }
            Err(err) => {
                if let NotionError::Api { status, body } = &err {
                    match serde_json::from_str::<ApiErrorBody>(body) {
                        Ok(api) => warn!(
                            %report_id,
                            status,
                            code = api.code.as_deref().unwrap_or("-"),
                            message = %api.message,
                            "failed to create report"
                        ),
                        Err(_) => warn!(%report_id, status, "failed to create report"),
                    }
                } else {
                    warn!(%report_id, ?err, "failed to create report");
                }
                Err(err.into())
            }
        }
    }
}

/// Decode a request body into a submission without touching any collaborator.
pub fn parse_submission(body: &[u8]) -> Result<ReportSubmission, SubmitError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(SubmitError::NoData);
    }
    let value: Value = serde_json::from_slice(body).map_err(SubmitError::InvalidJson)?;
    if !value.is_object() {
        return Err(SubmitError::NoData);
    }
    serde_json::from_value(value).map_err(SubmitError::InvalidPayload)
}
