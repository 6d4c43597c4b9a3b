use crate::report::ReportService;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub reports: ReportService,
}

impl AppState {
    pub fn new(reports: ReportService) -> Self {
        Self { reports }
    }
}
