//! Configuration loader and validator for the report relay.
//!
//! Values come from an optional YAML file and are then overridden by
//! environment variables, so a bare deployment can run from env alone.
use axum::http::HeaderValue;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid value for {key}: {value:?}")]
    Env { key: &'static str, value: String },
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub server: Server,
    #[serde(default)]
    pub notion: Notion,
}

/// Inbound HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Server {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            allowed_origins: vec![
                "https://aliceagent.github.io".into(),
                "http://localhost:3000".into(),
                "http://localhost:8000".into(),
                "http://127.0.0.1:3000".into(),
                "http://127.0.0.1:8000".into(),
            ],
        }
    }
}

/// Notion API settings and the reports database mapping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Notion {
    pub token: String,
    pub version: String,
    pub base_url: String,
    pub database_id: String,
    pub properties: ReportProperties,
}

impl Default for Notion {
    fn default() -> Self {
        Self {
            token: String::new(),
            version: "2022-06-28".into(),
            base_url: "https://api.notion.com/".into(),
            database_id: String::new(),
            properties: ReportProperties::default(),
        }
    }
}

/// How a free-form value is stored in the database schema.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    Select,
    RichText,
}

/// Display names of the reports database columns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReportProperties {
    pub report_id: String,
    pub status: String,
    pub categories: String,
    pub notes: String,
    pub image_title: String,
    pub image_id: String,
    pub art_style: String,
    pub style_kind: PropertyKind,
    pub row_number: String,
    pub time_of_day: String,
    pub weather_shown: String,
    pub actual_weather: String,
    pub weather_kind: PropertyKind,
    pub weather_mismatch: String,
}

impl Default for ReportProperties {
    fn default() -> Self {
        Self {
            report_id: "Report ID".into(),
            status: "Status".into(),
            categories: "Categories".into(),
            notes: "Notes".into(),
            image_title: "Image Title".into(),
            image_id: "Image Notion ID".into(),
            art_style: "Art Style".into(),
            style_kind: PropertyKind::Select,
            row_number: "Image Row #".into(),
            time_of_day: "Time of Day".into(),
            weather_shown: "Weather Shown".into(),
            actual_weather: "Actual Weather".into(),
            weather_kind: PropertyKind::RichText,
            weather_mismatch: "Weather Mismatch".into(),
        }
    }
}

impl ReportProperties {
    fn names(&self) -> [&str; 12] {
        [
            &self.report_id,
            &self.status,
            &self.categories,
            &self.notes,
            &self.image_title,
            &self.image_id,
            &self.art_style,
            &self.row_number,
            &self.time_of_day,
            &self.weather_shown,
            &self.actual_weather,
            &self.weather_mismatch,
        ]
    }
}

impl Config {
    /// Overlay environment variables on top of the file values.
    ///
    /// `lookup` is injected so tests can run without touching the process env.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("PORT") {
            self.server.port = v
                .trim()
                .parse()
                .map_err(|_| ConfigError::Env { key: "PORT", value: v })?;
        }
        if let Some(v) = lookup("ALLOWED_ORIGINS") {
            self.server.allowed_origins = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = lookup("NOTION_API_KEY") {
            self.notion.token = v;
        }
        if let Some(v) = lookup("NOTION_API_VERSION") {
            self.notion.version = v;
        }
        if let Some(v) = lookup("NOTION_BASE_URL") {
            self.notion.base_url = v;
        }
        if let Some(v) = lookup("REPORTS_DATABASE_ID") {
            self.notion.database_id = v;
        }
        Ok(())
    }

    /// Socket address string the listener binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Load configuration from an optional YAML file, overlay the process
/// environment, and validate the result.
/// - If `path` is None, only defaults and environment are used.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut cfg = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            serde_yaml::from_str(&content)?
        }
        None => Config::default(),
    };
    cfg.apply_env(|key| std::env::var(key).ok())?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.server.host.trim().is_empty() {
        return Err(ConfigError::Invalid("server.host must be non-empty"));
    }
    if cfg.server.port == 0 {
        return Err(ConfigError::Invalid("server.port must be > 0"));
    }
    if cfg
        .server
        .allowed_origins
        .iter()
        .any(|o| HeaderValue::from_str(o).is_err())
    {
        return Err(ConfigError::Invalid(
            "server.allowed_origins must be valid header values",
        ));
    }

    if cfg.notion.token.trim().is_empty() {
        return Err(ConfigError::Invalid("notion.token must be non-empty"));
    }
    if cfg.notion.version.trim().is_empty() {
        return Err(ConfigError::Invalid("notion.version must be non-empty"));
    }
    if Url::parse(&cfg.notion.base_url).is_err() {
        return Err(ConfigError::Invalid("notion.base_url must be a valid URL"));
    }
    if cfg.notion.database_id.trim().is_empty() {
        return Err(ConfigError::Invalid("notion.database_id must be non-empty"));
    }
    if cfg
        .notion
        .properties
        .names()
        .iter()
        .any(|name| name.trim().is_empty())
    {
        return Err(ConfigError::Invalid(
            "notion.properties names must be non-empty",
        ));
    }

    Ok(())
}

/// Returns a complete example YAML config.
pub fn example() -> &'static str {
    r#"server:
  host: "0.0.0.0"
  port: 3000
  allowed_origins:
    - "https://aliceagent.github.io"
    - "http://localhost:3000"

notion:
  token: "YOUR_NOTION_INTEGRATION_TOKEN"
  version: "2022-06-28"
  base_url: "https://api.notion.com/"
  database_id: "NOTION_REPORTS_DATABASE_ID"

  properties:
    report_id: "Report ID"
    status: "Status"
    categories: "Categories"
    notes: "Notes"
    image_title: "Image Title"
    image_id: "Image Notion ID"
    art_style: "Art Style"
    style_kind: select
    row_number: "Image Row #"
    time_of_day: "Time of Day"
    weather_shown: "Weather Shown"
    actual_weather: "Actual Weather"
    weather_kind: rich_text
    weather_mismatch: "Weather Mismatch"
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn parse_example_ok() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.notion.properties, ReportProperties::default());
    }

    #[test]
    fn partial_yaml_falls_back_to_defaults() {
        let cfg: Config = serde_yaml::from_str(
            "notion:\n  token: t\n  database_id: db\n  properties:\n    notes: Comments\n",
        )
        .unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.server.port, 3000);
        assert_eq!(cfg.notion.version, "2022-06-28");
        assert_eq!(cfg.notion.properties.notes, "Comments");
        assert_eq!(cfg.notion.properties.status, "Status");
    }

    #[test]
    fn env_overrides_file_values() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.apply_env(env(&[
            ("NOTION_API_KEY", "secret"),
            ("REPORTS_DATABASE_ID", "db-123"),
            ("PORT", "8080"),
            ("ALLOWED_ORIGINS", "https://a.example, https://b.example,"),
        ]))
        .unwrap();
        assert_eq!(cfg.notion.token, "secret");
        assert_eq!(cfg.notion.database_id, "db-123");
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(
            cfg.server.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(cfg.bind_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn bad_port_in_env_is_rejected() {
        let mut cfg = Config::default();
        let err = cfg.apply_env(env(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env { key: "PORT", .. }));
    }

    #[test]
    fn defaults_alone_are_invalid() {
        let err = validate(&Config::default()).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("notion.token")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn invalid_database_id_and_url() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.notion.database_id = " ".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("database_id")),
            _ => panic!("wrong error"),
        }

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.notion.base_url = "not a url".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn invalid_property_names() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.notion.properties.categories = "".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("properties")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn invalid_origin_header() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.server.allowed_origins = vec!["https://bad\norigin".into()];
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn example_file_parses() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        fs::write(&p, example()).unwrap();
        let cfg: Config = serde_yaml::from_str(&fs::read_to_string(&p).unwrap()).unwrap();
        assert_eq!(cfg.notion.properties.weather_kind, PropertyKind::RichText);
        assert_eq!(cfg.server.allowed_origins.len(), 2);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let td = tempdir().unwrap();
        let err = load(Some(&td.path().join("absent.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
