//! In-memory case backend with failure injection

use async_trait::async_trait;
use narwatch_common::{CaseRecord, IntakePayload};
use narwatch_live::{ApiError, CaseBackend};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct FakeBackend {
    cases: Mutex<HashMap<String, CaseRecord>>,
    failing: Mutex<HashSet<String>>,
    submit_response: Mutex<Option<Result<CaseRecord, ApiError>>>,
    submitted: Mutex<Vec<IntakePayload>>,
    fetches: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record returned by `fetch_case`
    pub fn put_case(&self, record: CaseRecord) {
        self.cases
            .lock()
            .unwrap()
            .insert(record.case_id.clone(), record);
    }

    /// Make `fetch_case` fail for this id
    pub fn fail_fetch(&self, case_id: &str) {
        self.failing.lock().unwrap().insert(case_id.to_string());
    }

    pub fn respond_to_submit(&self, response: Result<CaseRecord, ApiError>) {
        *self.submit_response.lock().unwrap() = Some(response);
    }

    pub fn submitted(&self) -> Vec<IntakePayload> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaseBackend for FakeBackend {
    async fn submit_intake(&self, payload: &IntakePayload) -> Result<CaseRecord, ApiError> {
        self.submitted.lock().unwrap().push(payload.clone());
        self.submit_response
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Err(ApiError::Network("no submit response configured".to_string())))
    }

    async fn fetch_case(&self, case_id: &str) -> Result<CaseRecord, ApiError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(case_id) {
            return Err(ApiError::Status {
                status: 503,
                body: String::new(),
            });
        }
        self.cases
            .lock()
            .unwrap()
            .get(case_id)
            .cloned()
            .ok_or_else(|| ApiError::Status {
                status: 404,
                body: "Case not found".to_string(),
            })
    }
}
