use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::{json, Map, Value};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{self, PropertyKind, ReportProperties};
use crate::model::{NormalizedReport, ReportId};
use crate::notion::model::CreatePageResponse;

pub mod model;

pub const NOTES_MAX_CHARS: usize = 2000;
pub const IMAGE_TITLE_MAX_CHARS: usize = 200;
pub const DEFAULT_NOTES: &str = "No additional notes provided";
pub const INITIAL_STATUS: &str = "New";

#[derive(Debug, Error)]
pub enum NotionError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("failed to reach Notion: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("invalid Notion base URL: {0}")]
    BaseUrl(String),
    #[error("notion error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("invalid Notion response: {0}")]
    InvalidResponse(String),
}

#[derive(Clone)]
pub struct NotionClient {
    http: Client,
    base_url: Url,
    token: String,
    version: String,
}

impl fmt::Debug for NotionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotionClient")
            .field("base_url", &self.base_url)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// Target database and column names for report pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSchema {
    pub database_id: String,
    pub properties: ReportProperties,
}

impl ReportSchema {
    pub fn from_config(cfg: &config::Notion) -> Self {
        Self {
            database_id: cfg.database_id.clone(),
            properties: cfg.properties.clone(),
        }
    }
}

#[async_trait]
pub trait NotionService: Send + Sync {
    /// Create one page from a full `{parent, properties}` body and return its id.
    async fn create_page(&self, body: Value) -> Result<String, NotionError>;
}

impl NotionClient {
    pub fn new(token: String, version: String, base_url: Url) -> Result<Self, NotionError> {
        let http = Client::builder()
            .user_agent(concat!("image-report-relay/", env!("CARGO_PKG_VERSION")))
            .no_proxy()
            .build()
            .map_err(NotionError::Client)?;
        Ok(Self {
            http,
            base_url,
            token,
            version,
        })
    }

    pub fn from_config(cfg: &config::Notion) -> Result<Self, NotionError> {
        let base_url = Url::parse(&cfg.base_url)
            .map_err(|e| NotionError::BaseUrl(e.to_string()))?;
        Self::new(cfg.token.clone(), cfg.version.clone(), base_url)
    }

    pub fn build_request(&self, body: &Value) -> Result<reqwest::Request, NotionError> {
        let endpoint = self
            .base_url
            .join("v1/pages")
            .map_err(|e| NotionError::BaseUrl(e.to_string()))?;
        self.http
            .post(endpoint)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Notion-Version", &self.version)
            .header("Content-Type", "application/json")
            .json(body)
            .build()
            .map_err(NotionError::Client)
    }

    async fn execute_create(&self, body: Value) -> Result<String, NotionError> {
        let request = self.build_request(&body)?;
        debug!(url = %request.url(), "sending notion request");
        for (name, value) in request.headers() {
            if name.as_str().eq_ignore_ascii_case("authorization") {
                debug!("  {}: Bearer [REDACTED]", name);
            } else {
                debug!("  {}: {}", name, value.to_str().unwrap_or("[invalid]"));
            }
        }
        debug!(payload = %body, "notion request payload");

        let res = self
            .http
            .execute(request)
            .await
            .map_err(NotionError::Transport)?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), %body, "notion rejected page");
            return Err(NotionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let response_body = res.text().await.map_err(NotionError::Transport)?;
        let payload: CreatePageResponse = serde_json::from_str(&response_body)
            .map_err(|e| NotionError::InvalidResponse(e.to_string()))?;
        info!(page_id = %payload.id, "created notion page");
        Ok(payload.id)
    }
}

#[async_trait]
impl NotionService for NotionClient {
    async fn create_page(&self, body: Value) -> Result<String, NotionError> {
        self.execute_create(body).await
    }
}

/// Map a normalized report onto the reports database schema.
///
/// Optional values that are missing are left out entirely rather than sent as
/// empty properties.
pub fn build_report_page_request(
    schema: &ReportSchema,
    report_id: &ReportId,
    report: &NormalizedReport,
) -> Value {
    let props = &schema.properties;
    let mut properties = Map::new();

    properties.insert(
        props.report_id.clone(),
        json!({ "title": [ { "text": { "content": report_id.as_str() } } ] }),
    );
    properties.insert(props.status.clone(), select(INITIAL_STATUS));
    properties.insert(
        props.categories.clone(),
        json!({
            "multi_select": report
                .categories
                .iter()
                .map(|name| json!({ "name": name }))
                .collect::<Vec<_>>()
        }),
    );

    let notes = report
        .notes
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or(DEFAULT_NOTES);
    properties.insert(
        props.notes.clone(),
        rich_text(&truncate_chars(notes, NOTES_MAX_CHARS)),
    );

    if let Some(title) = &report.image_title {
        properties.insert(
            props.image_title.clone(),
            rich_text(&truncate_chars(title, IMAGE_TITLE_MAX_CHARS)),
        );
    }
    if let Some(id) = &report.image_id {
        properties.insert(props.image_id.clone(), rich_text(id));
    }
    if let Some(style) = &report.image_style {
        properties.insert(props.art_style.clone(), typed_text(props.style_kind, style));
    }
    if let Some(row) = &report.row_number {
        properties.insert(props.row_number.clone(), json!({ "number": row }));
    }

    if let Some(tod) = report.time_of_day {
        properties.insert(props.time_of_day.clone(), select(tod.as_str()));
    }
    if let Some(shown) = &report.weather_shown {
        properties.insert(
            props.weather_shown.clone(),
            typed_text(props.weather_kind, shown),
        );
    }
    if let Some(actual) = &report.actual_weather {
        properties.insert(
            props.actual_weather.clone(),
            typed_text(props.weather_kind, actual),
        );
    }
    if let Some(mismatch) = report.weather_mismatch {
        properties.insert(
            props.weather_mismatch.clone(),
            json!({ "checkbox": mismatch }),
        );
    }

    for (field, value) in &report.calendar {
        properties.insert(field_label(field), rich_text(value));
    }

    json!({
        "parent": { "database_id": schema.database_id },
        "properties": Value::Object(properties),
    })
}

fn rich_text(content: &str) -> Value {
    json!({ "rich_text": [ { "text": { "content": content } } ] })
}

fn select(name: &str) -> Value {
    json!({ "select": { "name": name } })
}

fn typed_text(kind: PropertyKind, value: &str) -> Value {
    match kind {
        PropertyKind::Select => select(value),
        PropertyKind::RichText => rich_text(value),
    }
}

/// Truncate to at most `max` characters (not bytes).
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// `hebrew_date` -> `Hebrew Date`.
pub fn field_label(field: &str) -> String {
    field
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TimeOfDay;
    use serde_json::Number;

    fn sample_schema() -> ReportSchema {
        ReportSchema {
            database_id: "reports-db".into(),
            properties: ReportProperties::default(),
        }
    }

    fn sample_id() -> ReportId {
        use rand::SeedableRng;
        ReportId::generate_with(1_700_000_000, &mut rand::rngs::StdRng::seed_from_u64(1))
    }

    fn minimal() -> NormalizedReport {
        NormalizedReport {
            categories: vec!["Wrong weather".into(), "Other".into()],
            ..Default::default()
        }
    }

    #[test]
    fn minimal_report_has_only_required_properties() {
        let id = sample_id();
        let body = build_report_page_request(&sample_schema(), &id, &minimal());
        assert_eq!(body["parent"]["database_id"], "reports-db");

        let props = body["properties"].as_object().unwrap();
        let mut keys: Vec<_> = props.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["Categories", "Notes", "Report ID", "Status"]);

        assert_eq!(
            props["Report ID"]["title"][0]["text"]["content"],
            id.as_str()
        );
        assert_eq!(props["Status"]["select"]["name"], "New");
        assert_eq!(props["Categories"]["multi_select"][1]["name"], "Other");
        assert_eq!(
            props["Notes"]["rich_text"][0]["text"]["content"],
            DEFAULT_NOTES
        );
    }

    #[test]
    fn long_text_is_truncated() {
        let report = NormalizedReport {
            notes: Some("n".repeat(2500)),
            image_title: Some("é".repeat(300)),
            ..minimal()
        };
        let body = build_report_page_request(&sample_schema(), &sample_id(), &report);
        let notes = body["properties"]["Notes"]["rich_text"][0]["text"]["content"]
            .as_str()
            .unwrap();
        assert_eq!(notes.chars().count(), 2000);
        let title = body["properties"]["Image Title"]["rich_text"][0]["text"]["content"]
            .as_str()
            .unwrap();
        assert_eq!(title.chars().count(), 200);
    }

    #[test]
    fn full_report_maps_every_property() {
        let report = NormalizedReport {
            notes: Some("looks off".into()),
            image_title: Some("Harbor at dusk".into()),
            image_id: Some("img-42".into()),
            image_style: Some("Watercolor".into()),
            row_number: Some(Number::from(7)),
            time_of_day: Some(TimeOfDay::Evening),
            weather_shown: Some("Sunny".into()),
            actual_weather: Some("Rain".into()),
            weather_mismatch: Some(true),
            calendar: vec![
                ("hebrew_date", "5 Tevet".into()),
                ("sunset", "16:40".into()),
            ],
            ..minimal()
        };
        let body = build_report_page_request(&sample_schema(), &sample_id(), &report);
        let props = &body["properties"];
        assert_eq!(props["Image Notion ID"]["rich_text"][0]["text"]["content"], "img-42");
        assert_eq!(props["Art Style"]["select"]["name"], "Watercolor");
        assert_eq!(props["Image Row #"]["number"], 7);
        assert_eq!(props["Time of Day"]["select"]["name"], "Evening");
        assert_eq!(props["Weather Shown"]["rich_text"][0]["text"]["content"], "Sunny");
        assert_eq!(props["Actual Weather"]["rich_text"][0]["text"]["content"], "Rain");
        assert_eq!(props["Weather Mismatch"]["checkbox"], true);
        assert_eq!(props["Hebrew Date"]["rich_text"][0]["text"]["content"], "5 Tevet");
        assert_eq!(props["Sunset"]["rich_text"][0]["text"]["content"], "16:40");
    }

    #[test]
    fn property_kinds_follow_schema() {
        let mut schema = sample_schema();
        schema.properties.style_kind = PropertyKind::RichText;
        schema.properties.weather_kind = PropertyKind::Select;
        schema.properties.notes = "Comments".into();
        let report = NormalizedReport {
            image_style: Some("Oil".into()),
            weather_shown: Some("Fog".into()),
            weather_mismatch: Some(false),
            ..minimal()
        };
        let body = build_report_page_request(&schema, &sample_id(), &report);
        let props = &body["properties"];
        assert_eq!(props["Art Style"]["rich_text"][0]["text"]["content"], "Oil");
        assert_eq!(props["Weather Shown"]["select"]["name"], "Fog");
        assert_eq!(props["Weather Mismatch"]["checkbox"], false);
        assert!(props.get("Comments").is_some());
        assert!(props.get("Notes").is_none());
    }

    #[test]
    fn labels_are_title_cased() {
        assert_eq!(field_label("hebrew_date"), "Hebrew Date");
        assert_eq!(field_label("holiday"), "Holiday");
        assert_eq!(field_label("weather_shown"), "Weather Shown");
    }

    #[test]
    fn build_request_sets_headers() {
        let client = NotionClient::new(
            "token".into(),
            "2022-06-28".into(),
            Url::parse("https://api.notion.com/").unwrap(),
        )
        .unwrap();
        let body = json!({ "sample": true });
        let request = client.build_request(&body).unwrap();
        assert_eq!(request.method(), reqwest::Method::POST);
        assert_eq!(request.url().path(), "/v1/pages");
        let headers = request.headers();
        assert_eq!(
            headers
                .get("Authorization")
                .and_then(|h| h.to_str().ok())
                .unwrap(),
            "Bearer token"
        );
        assert_eq!(
            headers
                .get("Notion-Version")
                .and_then(|h| h.to_str().ok())
                .unwrap(),
            "2022-06-28"
        );
        assert_eq!(
            headers
                .get("Content-Type")
                .and_then(|h| h.to_str().ok())
                .unwrap(),
            "application/json"
        );
    }

    #[test]
    fn debug_output_hides_token() {
        let client = NotionClient::new(
            "secret-token".into(),
            "2022-06-28".into(),
            Url::parse("https://api.notion.com/").unwrap(),
        )
        .unwrap();
        assert!(!format!("{:?}", client).contains("secret-token"));
    }
}
