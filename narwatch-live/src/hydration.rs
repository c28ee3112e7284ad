//! Hydration Fetcher
//!
//! Completes a partial case by fetching the full record and upserting it. A
//! failed fetch returns the error and leaves the registry exactly as it was.
//! Duplicate or concurrent hydrations of one case are harmless: they all
//! fetch the same resource and go through the same merge.

use std::sync::Arc;
use tracing::debug;

use crate::api::{ApiError, CaseBackend};
use crate::registry::SharedRegistry;
use narwatch_common::CaseRecord;

#[derive(Clone)]
pub struct Hydrator {
    backend: Arc<dyn CaseBackend>,
    registry: SharedRegistry,
}

impl Hydrator {
    pub fn new(backend: Arc<dyn CaseBackend>, registry: SharedRegistry) -> Self {
        Self { backend, registry }
    }

    /// Fetch the full record for `case_id` and merge it into the registry
    ///
    /// Returns the record as the backend sent it.
    pub async fn hydrate(&self, case_id: &str) -> Result<CaseRecord, ApiError> {
        let record = self.backend.fetch_case(case_id).await?;
        let outcome = self.registry.upsert(record.clone()).await;
        debug!(intake_id = %case_id, ?outcome, "Case hydrated");
        Ok(record)
    }
}
