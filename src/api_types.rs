use crate::train::Event;
use chrono::{DateTime, NaiveDateTime, TimeZone};
use chrono_tz::Europe::London;
use chrono_tz::Tz;
use compact_str::{CompactString, ToCompactString};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;

/// `GET stations`: station code -> station name.
pub type StationList = BTreeMap<CompactString, CompactString>;

/// `GET stations/platforms`: station code -> platforms at that station.
pub type PlatformList = BTreeMap<CompactString, Vec<PlatformRecord>>;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlatformRecord {
    #[serde(rename = "platformNumber", default, deserialize_with = "opt_flexible_string")]
    pub platform_number: Option<CompactString>,
    pub direction: Option<String>,
    #[serde(rename = "helperText")]
    pub helper_text: Option<String>,
    pub coordinates: Option<Coordinates>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Coordinates {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub d: Option<String>,
}

/// One entry of `GET times/{code}/{platform}`.
#[derive(Debug, Clone, Deserialize)]
pub struct TrainArrival {
    #[serde(deserialize_with = "flexible_string")]
    pub trn: CompactString,
    #[serde(default = "unknown_text")]
    pub destination: CompactString,
    #[serde(default = "unknown_text")]
    pub line: CompactString,
    #[serde(rename = "lastEvent")]
    pub last_event: Event,
    #[serde(rename = "lastEventLocation")]
    pub last_event_location: String,
    #[serde(rename = "lastEventTime", deserialize_with = "local_timestamp")]
    pub last_event_time: DateTime<Tz>,
    #[serde(rename = "dueIn")]
    pub due_in: i64,
    #[serde(rename = "actualPredictedTime", deserialize_with = "local_timestamp")]
    pub actual_predicted_time: DateTime<Tz>,
}

pub fn unknown_text() -> CompactString {
    CompactString::const_new("???")
}

// The feed is not consistent about quoting platform numbers and train ids.
#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Str(CompactString),
    Int(i64),
    Float(f64),
}

impl StringOrNumber {
    fn into_compact(self) -> CompactString {
        match self {
            StringOrNumber::Str(s) => s,
            StringOrNumber::Int(i) => i.to_compact_string(),
            StringOrNumber::Float(f) => f.to_compact_string(),
        }
    }
}

fn flexible_string<'de, D>(deserializer: D) -> Result<CompactString, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(StringOrNumber::deserialize(deserializer)?.into_compact())
}

fn opt_flexible_string<'de, D>(deserializer: D) -> Result<Option<CompactString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<StringOrNumber>::deserialize(deserializer)?.map(StringOrNumber::into_compact))
}

fn local_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Tz>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp {:?}", raw)))
}

/// Accepts RFC 3339, or a naive ISO-8601 timestamp which is taken as London local time.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Tz>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&London));
    }
    let naive: NaiveDateTime = raw.parse().ok()?;
    // latest() picks BST over GMT during the autumn overlap
    London.from_local_datetime(&naive).latest()
}
