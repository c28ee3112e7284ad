//! Live stream event types
//!
//! The backend pushes one small JSON object per detection run over its event
//! stream. Events only carry the fields needed to place and label a case; the
//! full record is fetched separately.

use serde::{Deserialize, Serialize};

use crate::case::{CaseRecord, SubmittedAt};

/// One partial case update from the live stream
///
/// ```json
/// {"intake_id": "abc123", "submitted_at": "2024-01-01T00:00:00Z",
///  "classification": "high", "score": 0.82}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    /// Case identifier; events without one are malformed
    pub intake_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<SubmittedAt>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,

    /// Composite score; becomes `composite_score` on the case record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl StreamEvent {
    /// Parse one message payload
    pub fn parse(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }

    /// Partial case record carrying only the streamed fields
    pub fn to_partial(&self) -> CaseRecord {
        CaseRecord {
            case_id: self.intake_id.clone(),
            submitted_at: self.submitted_at.clone(),
            classification: self.classification.clone(),
            composite_score: self.score,
            ..Default::default()
        }
    }
}
