//! Test Helper Utilities
//!
//! Shared utilities for testing narwatch-live

#![allow(dead_code)]

pub mod backend;
pub mod connector;
pub mod server;

// Re-export commonly used items
pub use backend::FakeBackend;
pub use connector::{ConnectorProbe, ManualConnector};
pub use server::{spawn_mock_backend, MockBackend};

use narwatch_common::{StreamEvent, SubmittedAt};

/// Stream event with only an id and a score
pub fn event(intake_id: &str, score: f64) -> StreamEvent {
    StreamEvent {
        intake_id: intake_id.to_string(),
        submitted_at: None,
        classification: None,
        score: Some(score),
    }
}

/// Stream event carrying a submission time
pub fn dated_event(intake_id: &str, submitted_at: &str, classification: &str) -> StreamEvent {
    StreamEvent {
        intake_id: intake_id.to_string(),
        submitted_at: Some(SubmittedAt::from(submitted_at)),
        classification: Some(classification.to_string()),
        score: None,
    }
}
