//! Backend HTTP API
//!
//! Client for the detection backend's intake, case-detail and sharing
//! endpoints, plus the [`CaseBackend`] seam the engine depends on.

mod client;
mod error;

pub use client::{ApiClient, CaseBackend};
pub use error::ApiError;
