//! # narwatch Common Library
//!
//! Shared code for the narwatch crates including:
//! - Case records and their merge rule
//! - Live stream event types
//! - Intake and sharing request/response types
//! - Configuration loading
//! - Risk levels and dashboard metrics

pub mod case;
pub mod config;
pub mod error;
pub mod events;
pub mod intake;
pub mod risk;

pub use case::{CaseRecord, SubmittedAt};
pub use error::{Error, Result};
pub use events::StreamEvent;
pub use intake::{IntakeMetadata, IntakePayload};
pub use risk::{DashboardMetrics, RiskLevel};
