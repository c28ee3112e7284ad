//! Submission Gateway
//!
//! Posts a narrative and hands back the backend's initial record. The gateway
//! neither validates the payload nor touches the registry; its caller upserts
//! the result right away so the case shows up before the live stream echoes
//! it. The stream and hydration paths may deliver the same case again later,
//! which the registry's merge folds into the same entry.

use narwatch_common::{CaseRecord, IntakePayload};
use std::sync::Arc;

use crate::api::{ApiError, CaseBackend};

#[derive(Clone)]
pub struct SubmissionGateway {
    backend: Arc<dyn CaseBackend>,
}

impl SubmissionGateway {
    pub fn new(backend: Arc<dyn CaseBackend>) -> Self {
        Self { backend }
    }

    /// Submit one narrative; the returned record always has an id
    pub async fn submit(&self, payload: &IntakePayload) -> Result<CaseRecord, ApiError> {
        let record = self.backend.submit_intake(payload).await?;
        if !record.has_id() {
            return Err(ApiError::MissingCaseId);
        }
        Ok(record)
    }
}
