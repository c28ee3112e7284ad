//! Case records and their merge rule
//!
//! A case is one submitted narrative plus whatever detection results the
//! backend has reported for it so far. Records arrive in three shapes:
//! - the initial record returned by a submission
//! - a partial record built from a live stream event
//! - the full record returned by hydration
//!
//! All three are the same [`CaseRecord`] type with optional fields. Merging is
//! a shallow overlay: populated incoming fields win, absent ones keep the
//! existing value, so a record only ever gains information.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Submission timestamp as sent by the backend
///
/// The backend is not consistent: some payloads carry an ISO-8601 string,
/// others an epoch number in milliseconds. Both are kept verbatim so the
/// record serializes back the way it arrived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubmittedAt {
    /// Milliseconds since UNIX epoch
    Epoch(f64),
    /// ISO-8601 timestamp, with or without offset
    Text(String),
}

impl SubmittedAt {
    /// Milliseconds since UNIX epoch used for ordering
    ///
    /// Unparseable values sort as epoch 0, the same as a missing timestamp.
    /// Timestamps without an offset are read as UTC.
    pub fn sort_key(&self) -> i64 {
        match self {
            SubmittedAt::Epoch(ms) if ms.is_finite() => *ms as i64,
            SubmittedAt::Epoch(_) => 0,
            SubmittedAt::Text(text) => parse_iso_millis(text).unwrap_or(0),
        }
    }
}

impl From<&str> for SubmittedAt {
    fn from(value: &str) -> Self {
        SubmittedAt::Text(value.to_string())
    }
}

fn parse_iso_millis(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc().timestamp_millis());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc().timestamp_millis());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp_millis())
}

/// Current known state of one case
///
/// `case_id` is the registry key (`intake_id` on the wire). An empty id means
/// the record cannot be placed and is ignored by the registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    /// Backend-assigned intake identifier
    #[serde(rename = "intake_id", default)]
    pub case_id: String,

    /// Submission time, absent on some partial events
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub submitted_at: Option<SubmittedAt>,

    /// Risk label, absent while the pipeline is still running
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub classification: Option<String>,

    /// Composite risk score in [0, 1], absent while still processing
    #[serde(
        default,
        deserialize_with = "lenient_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub composite_score: Option<f64>,

    /// Everything else (summary, breakdown, narrative text, metadata)
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl CaseRecord {
    /// Create an otherwise empty record for a case id
    pub fn new(case_id: impl Into<String>) -> Self {
        Self {
            case_id: case_id.into(),
            ..Default::default()
        }
    }

    /// Whether the record can be keyed
    pub fn has_id(&self) -> bool {
        !self.case_id.trim().is_empty()
    }

    /// Ordering key in epoch milliseconds; missing timestamps sort as 0
    pub fn sort_key(&self) -> i64 {
        self.submitted_at.as_ref().map(SubmittedAt::sort_key).unwrap_or(0)
    }

    /// True until the backend has reported a label or a score
    pub fn is_processing(&self) -> bool {
        let unlabeled = self
            .classification
            .as_deref()
            .map(|label| label.trim().is_empty())
            .unwrap_or(true);
        unlabeled && self.composite_score.is_none()
    }

    /// Look up a free-form detail field
    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details.get(key)
    }

    /// Overlay `incoming` onto this record in place
    ///
    /// Populated incoming fields replace existing ones; absent or null
    /// incoming fields leave existing values untouched. The id never changes.
    pub fn merge_from(&mut self, incoming: CaseRecord) {
        if incoming.submitted_at.is_some() {
            self.submitted_at = incoming.submitted_at;
        }
        if incoming.classification.is_some() {
            self.classification = incoming.classification;
        }
        if incoming.composite_score.is_some() {
            self.composite_score = incoming.composite_score;
        }
        for (key, value) in incoming.details {
            if !value.is_null() {
                self.details.insert(key, value);
            }
        }
    }

    /// Non-mutating form of [`CaseRecord::merge_from`]
    pub fn merged(&self, incoming: CaseRecord) -> CaseRecord {
        let mut merged = self.clone();
        merged.merge_from(incoming);
        merged
    }
}

// Optional fields tolerate wrong types by reading them as absent, so one odd
// field never costs the whole record.

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<SubmittedAt>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64().map(SubmittedAt::Epoch),
        Value::String(s) if !s.trim().is_empty() => Some(SubmittedAt::Text(s)),
        _ => None,
    })
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        _ => None,
    })
}
