//! # narwatch live engine
//!
//! Keeps a local, ordered view of detection cases in sync with the backend:
//! - [`stream`]: Server-Sent Events client for the live case feed
//! - [`supervisor`]: single-connection guard with fixed-delay reconnection
//! - [`registry`]: keyed case collection with one merge rule
//! - [`hydration`]: fetches full records to complete partial events
//! - [`gateway`]: narrative submission
//! - [`dashboard`]: owner tying the above together for a front end

pub mod api;
pub mod dashboard;
pub mod engine;
pub mod gateway;
pub mod hydration;
pub mod notice;
pub mod registry;
pub mod stream;
pub mod supervisor;

pub use api::{ApiClient, ApiError, CaseBackend};
pub use dashboard::Dashboard;
pub use registry::{CaseRegistry, SharedRegistry, UpsertOutcome};
pub use supervisor::{ConnectionState, ReconnectPolicy, ReconnectSupervisor};
