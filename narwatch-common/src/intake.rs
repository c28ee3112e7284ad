//! Intake and sharing request/response types
//!
//! Request bodies for `POST /api/v1/intake` and `POST /api/v1/share`, and the
//! sharing package the backend signs and returns.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

/// Narrative submission body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntakePayload {
    pub text: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: IntakeMetadata,
}

/// Context attached to a submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntakeMetadata {
    #[serde(default = "default_platform")]
    pub platform: String,
    #[serde(default)]
    pub region: String,
    /// Serialized as `null` when unknown
    #[serde(default)]
    pub actor_id: Option<String>,
    /// Any other keys a front end wants to attach
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_language() -> String {
    "en".to_string()
}

fn default_source() -> String {
    "unknown".to_string()
}

fn default_platform() -> String {
    "unspecified".to_string()
}

impl Default for IntakeMetadata {
    fn default() -> Self {
        Self {
            platform: default_platform(),
            region: String::new(),
            actor_id: None,
            extra: Map::new(),
        }
    }
}

impl IntakePayload {
    /// Minimum narrative length accepted by the intake form
    pub const MIN_TEXT_CHARS: usize = 20;

    /// Build a payload with form defaults for every optional field
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into().trim().to_string(),
            language: default_language(),
            source: default_source(),
            tags: Vec::new(),
            metadata: IntakeMetadata::default(),
        }
    }

    pub fn with_language(mut self, language: &str) -> Self {
        let language = language.trim();
        if !language.is_empty() {
            self.language = language.to_string();
        }
        self
    }

    pub fn with_source(mut self, source: &str) -> Self {
        let source = source.trim();
        if !source.is_empty() {
            self.source = source.to_string();
        }
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags = tags
            .into_iter()
            .map(|tag| tag.as_ref().trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect();
        self
    }

    pub fn with_metadata(mut self, metadata: IntakeMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Split a comma-separated tag field, dropping blanks
    pub fn parse_tags(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Form-level checks: narrative length and a non-blank region
    ///
    /// The submission gateway never calls this; front ends do before submitting.
    pub fn validate(&self) -> Result<()> {
        if self.text.trim().chars().count() < Self::MIN_TEXT_CHARS {
            return Err(Error::InvalidInput(format!(
                "Narrative must contain at least {} characters.",
                Self::MIN_TEXT_CHARS
            )));
        }
        if self.metadata.region.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Region (city/district) is required.".to_string(),
            ));
        }
        Ok(())
    }
}

impl IntakeMetadata {
    pub fn for_region(region: &str) -> Self {
        Self {
            region: region.trim().to_string(),
            ..Default::default()
        }
    }

    pub fn with_platform(mut self, platform: &str) -> Self {
        let platform = platform.trim();
        if !platform.is_empty() {
            self.platform = platform.to_string();
        }
        self
    }

    pub fn with_actor_id(mut self, actor_id: &str) -> Self {
        let actor_id = actor_id.trim();
        self.actor_id = (!actor_id.is_empty()).then(|| actor_id.to_string());
        self
    }
}

/// Request for a signed sharing package about one case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharingRequest {
    pub intake_id: String,
    pub destination: String,
    #[serde(default)]
    pub payload: Map<String, Value>,
    #[serde(default)]
    pub policy_tags: Vec<String>,
}

/// Signed package returned by the sharing endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharingPackage {
    pub package_id: String,
    pub created_at: String,
    pub destination: String,
    #[serde(default)]
    pub policy_tags: Vec<String>,
    #[serde(default)]
    pub payload: Map<String, Value>,
    pub signature: String,
}
