//! Case Registry
//!
//! The single source of truth for known cases. Every writer (submission,
//! live stream, hydration) goes through [`CaseRegistry::upsert`], so there is
//! exactly one merge rule:
//! - unknown id: insert
//! - known id: shallow overlay, populated incoming fields win
//! - blank id: ignored
//!
//! After each upsert the view is re-sorted by `submitted_at` descending with a
//! stable sort. New entries are placed at the front before sorting, so among
//! equal timestamps (including missing ones) the newest sighting comes first.
//! Entries are never removed.

use narwatch_common::CaseRecord;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::{debug, trace};

/// What an upsert did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Merged,
    /// Blank id, or the registry has been sealed
    Ignored,
}

/// Ordered, uniquely keyed case collection
#[derive(Debug, Default, Clone)]
pub struct CaseRegistry {
    cases: Vec<CaseRecord>,
    index: HashMap<String, usize>,
}

impl CaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or merge one record
    pub fn upsert(&mut self, record: CaseRecord) -> UpsertOutcome {
        if !record.has_id() {
            debug!("Ignoring case upsert without intake_id");
            return UpsertOutcome::Ignored;
        }

        let existing = self.index.get(&record.case_id).copied();
        let outcome = match existing {
            Some(position) => {
                self.cases[position].merge_from(record);
                UpsertOutcome::Merged
            }
            None => {
                self.cases.insert(0, record);
                UpsertOutcome::Inserted
            }
        };

        self.reorder();
        outcome
    }

    /// Cases, most recently submitted first
    pub fn cases(&self) -> &[CaseRecord] {
        &self.cases
    }

    pub fn get(&self, case_id: &str) -> Option<&CaseRecord> {
        self.index.get(case_id).map(|&position| &self.cases[position])
    }

    pub fn contains(&self, case_id: &str) -> bool {
        self.index.contains_key(case_id)
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    fn reorder(&mut self) {
        // Stable: equal keys keep their current relative order
        self.cases.sort_by_cached_key(|case| Reverse(case.sort_key()));
        self.index = self
            .cases
            .iter()
            .enumerate()
            .map(|(position, case)| (case.case_id.clone(), position))
            .collect();
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    registry: CaseRegistry,
    sealed: bool,
}

/// Shared handle to the registry used by every async writer
///
/// Readers get snapshots; writers only get [`SharedRegistry::upsert`]. Every
/// effective upsert bumps a revision counter that front ends can watch to
/// re-render. Once sealed, all further upserts are ignored, which is how
/// shutdown guarantees nothing mutates the registry afterwards.
#[derive(Clone)]
pub struct SharedRegistry {
    state: Arc<RwLock<RegistryState>>,
    revision: Arc<watch::Sender<u64>>,
}

impl Default for SharedRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedRegistry {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            state: Arc::new(RwLock::new(RegistryState::default())),
            revision: Arc::new(revision),
        }
    }

    pub async fn upsert(&self, record: CaseRecord) -> UpsertOutcome {
        let case_id = record.case_id.clone();
        let outcome = {
            let mut state = self.state.write().await;
            if state.sealed {
                debug!(intake_id = %case_id, "Registry sealed, dropping upsert");
                return UpsertOutcome::Ignored;
            }
            state.registry.upsert(record)
        };

        if outcome != UpsertOutcome::Ignored {
            trace!(intake_id = %case_id, ?outcome, "Case upserted");
            self.revision.send_modify(|revision| *revision += 1);
        }
        outcome
    }

    /// Snapshot of the ordered view
    pub async fn cases(&self) -> Vec<CaseRecord> {
        self.state.read().await.registry.cases().to_vec()
    }

    /// Snapshot of the first `limit` cases
    pub async fn recent(&self, limit: usize) -> Vec<CaseRecord> {
        let state = self.state.read().await;
        state.registry.cases().iter().take(limit).cloned().collect()
    }

    pub async fn get(&self, case_id: &str) -> Option<CaseRecord> {
        self.state.read().await.registry.get(case_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.registry.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Revision counter, bumped after every effective upsert
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Refuse all further writes
    pub async fn seal(&self) {
        self.state.write().await.sealed = true;
    }

    pub async fn is_sealed(&self) -> bool {
        self.state.read().await.sealed
    }
}
