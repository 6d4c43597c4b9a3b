use serde::Deserialize;

#[derive(Deserialize, Debug)]
pub struct CreatePageResponse {
    pub id: String,
}

/// Error object Notion returns with non-2xx responses.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}
