use chrono::Utc;
use rand::Rng;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const REPORT_ID_SUFFIX_LEN: usize = 6;
const REPORT_ID_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Inbound report body. Keys are accepted in camelCase and snake_case.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportSubmission {
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, alias = "image_data")]
    pub image_data: Option<ImageData>,
    #[serde(default, alias = "context_data")]
    pub context_data: Option<ContextData>,

    // Flat fields sent by older clients.
    #[serde(default, alias = "image_title")]
    pub image_title: Option<String>,
    #[serde(default, alias = "image_id")]
    pub image_id: Option<String>,
    #[serde(default, alias = "weather_shown", deserialize_with = "lenient_text")]
    pub weather_shown: Option<String>,
    #[serde(default, alias = "time_of_day")]
    pub time_of_day: Option<String>,
}

/// The image the report is about.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageData {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default, alias = "notion_id")]
    pub notion_id: Option<String>,
    #[serde(default, alias = "row_number")]
    pub row_number: Option<Number>,
}

/// What the display showed when the report was made.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContextData {
    #[serde(default, alias = "time_of_day")]
    pub time_of_day: Option<String>,
    #[serde(default, alias = "weather_shown", deserialize_with = "lenient_text")]
    pub weather_shown: Option<String>,
    #[serde(default, alias = "actual_weather", deserialize_with = "lenient_text")]
    pub actual_weather: Option<String>,
    /// `None` only when the key is absent; an explicit `null` is `Some(Value::Null)`.
    #[serde(default, alias = "weather_mismatch", deserialize_with = "supplied")]
    pub weather_mismatch: Option<Value>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub holiday: Option<String>,
    #[serde(default, alias = "hebrew_date", deserialize_with = "lenient_text")]
    pub hebrew_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub sunrise: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub sunset: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TimeOfDay {
    Morning,
    Midday,
    Evening,
    Night,
}

impl TimeOfDay {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeOfDay::Morning => "Morning",
            TimeOfDay::Midday => "Midday",
            TimeOfDay::Evening => "Evening",
            TimeOfDay::Night => "Night",
        }
    }
}

impl FromStr for TimeOfDay {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Morning" => Ok(TimeOfDay::Morning),
            "Midday" => Ok(TimeOfDay::Midday),
            "Evening" => Ok(TimeOfDay::Evening),
            "Night" => Ok(TimeOfDay::Night),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Missing required field(s): {}", .0.join(", "))]
pub struct MissingFields(pub Vec<&'static str>);

/// Single typed view of a submission after precedence rules are applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedReport {
    pub categories: Vec<String>,
    pub notes: Option<String>,
    pub image_title: Option<String>,
    pub image_id: Option<String>,
    pub image_style: Option<String>,
    pub row_number: Option<Number>,
    pub time_of_day: Option<TimeOfDay>,
    pub weather_shown: Option<String>,
    pub actual_weather: Option<String>,
    pub weather_mismatch: Option<bool>,
    /// Free-text calendar details keyed by their snake_case field name.
    pub calendar: Vec<(&'static str, String)>,
}

impl ReportSubmission {
    /// Validate required fields and collapse nested and flat shapes into one
    /// record. Nested values win over flat ones whenever both are non-empty.
    pub fn normalize(self) -> Result<NormalizedReport, MissingFields> {
        let categories: Vec<String> = self
            .categories
            .unwrap_or_default()
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        if categories.is_empty() {
            return Err(MissingFields(vec!["categories"]));
        }

        let image = self.image_data.unwrap_or_default();
        let context = self.context_data.unwrap_or_default();

        let time_of_day = non_empty(context.time_of_day)
            .or_else(|| non_empty(self.time_of_day))
            .and_then(|raw| raw.trim().parse::<TimeOfDay>().ok());

        let calendar = [
            ("holiday", context.holiday),
            ("hebrew_date", context.hebrew_date),
            ("sunrise", context.sunrise),
            ("sunset", context.sunset),
        ]
        .into_iter()
        .filter_map(|(field, value)| non_empty(value).map(|v| (field, v)))
        .collect();

        Ok(NormalizedReport {
            categories,
            notes: self.notes,
            image_title: non_empty(image.title).or_else(|| non_empty(self.image_title)),
            image_id: non_empty(image.notion_id).or_else(|| non_empty(self.image_id)),
            image_style: non_empty(image.style),
            row_number: image.row_number,
            time_of_day,
            weather_shown: non_empty(context.weather_shown)
                .or_else(|| non_empty(self.weather_shown)),
            actual_weather: non_empty(context.actual_weather),
            weather_mismatch: context.weather_mismatch.as_ref().map(truthy),
            calendar,
        })
    }
}

/// Identifier of the form `RPT-<unix-timestamp>-<suffix>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ReportId(String);

impl ReportId {
    pub fn generate() -> Self {
        Self::generate_with(Utc::now().timestamp(), &mut rand::thread_rng())
    }

    pub fn generate_with<R: Rng + ?Sized>(timestamp: i64, rng: &mut R) -> Self {
        let suffix: String = (0..REPORT_ID_SUFFIX_LEN)
            .map(|_| REPORT_ID_CHARSET[rng.gen_range(0..REPORT_ID_CHARSET.len())] as char)
            .collect();
        Self(format!("RPT-{}-{}", timestamp, suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Loose truthiness used for the mismatch flag; clients send bools, 0/1 or strings.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(de::Error::custom(format!(
            "expected text, found {}",
            other
        ))),
    }
}

fn supplied<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}
