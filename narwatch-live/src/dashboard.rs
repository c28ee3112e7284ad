//! Dashboard owner
//!
//! Ties the engine pieces together behind the operations a front end needs:
//! start the live feed, submit narratives, select a case, read the ordered
//! case list and metrics, and shut everything down.

use narwatch_common::config::DashboardConfig;
use narwatch_common::{CaseRecord, DashboardMetrics, IntakePayload};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError, CaseBackend};
use crate::engine::LiveEngine;
use crate::gateway::SubmissionGateway;
use crate::hydration::Hydrator;
use crate::notice::{self, NoticeCenter};
use crate::registry::SharedRegistry;
use crate::stream::{Connector, EventStreamClient};
use crate::supervisor::{ConnectionState, ReconnectPolicy, ReconnectSupervisor};

enum EngineSlot {
    Ready {
        connector: Box<dyn Connector>,
        policy: ReconnectPolicy,
    },
    Running {
        cancel: CancellationToken,
        task: JoinHandle<()>,
    },
    Stopped,
}

pub struct Dashboard {
    registry: SharedRegistry,
    notices: NoticeCenter,
    gateway: SubmissionGateway,
    hydrator: Hydrator,
    submissions: Mutex<HashMap<String, IntakePayload>>,
    selected: Mutex<Option<String>>,
    engine: Mutex<EngineSlot>,
    connection_state: Mutex<Option<watch::Receiver<ConnectionState>>>,
}

impl Dashboard {
    pub fn new(
        backend: Arc<dyn CaseBackend>,
        connector: Box<dyn Connector>,
        policy: ReconnectPolicy,
        notice_ttl: Duration,
    ) -> Self {
        let registry = SharedRegistry::new();
        Self {
            notices: NoticeCenter::new(notice_ttl),
            gateway: SubmissionGateway::new(Arc::clone(&backend)),
            hydrator: Hydrator::new(backend, registry.clone()),
            registry,
            submissions: Mutex::new(HashMap::new()),
            selected: Mutex::new(None),
            engine: Mutex::new(EngineSlot::Ready { connector, policy }),
            connection_state: Mutex::new(None),
        }
    }

    /// Dashboard wired to the real backend described by `config`
    pub fn connect(config: &DashboardConfig) -> Result<Self, ApiError> {
        let api = ApiClient::from_config(config)?;
        let connector = EventStreamClient::new(&api);
        info!(api = %api.base_url(), stream = %connector.url(), "Dashboard configured");

        Ok(Self::new(
            Arc::new(api),
            Box::new(connector),
            ReconnectPolicy::from_config(config),
            config.notice_ttl,
        ))
    }

    /// Start the live feed; later calls do nothing
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut slot = lock(&self.engine);
        let (connector, policy) = match std::mem::replace(&mut *slot, EngineSlot::Stopped) {
            EngineSlot::Ready { connector, policy } => (connector, policy),
            other => {
                debug!("Live engine already started");
                *slot = other;
                return;
            }
        };

        let supervisor = ReconnectSupervisor::new(connector, policy, self.notices.clone());
        *lock(&self.connection_state) = Some(supervisor.subscribe_state());

        let engine = LiveEngine::new(supervisor, self.registry.clone(), self.hydrator.clone());
        let cancel = CancellationToken::new();
        let task = tokio::spawn(engine.run(cancel.clone()));
        *slot = EngineSlot::Running { cancel, task };
    }

    /// Stop the live feed and freeze the registry
    ///
    /// Closes the stream, cancels any pending reconnect and in-flight
    /// hydrations. Once this returns nothing mutates the registry again.
    pub async fn shutdown(&self) {
        self.registry.seal().await;

        let slot = std::mem::replace(&mut *lock(&self.engine), EngineSlot::Stopped);
        if let EngineSlot::Running { cancel, task } = slot {
            cancel.cancel();
            if let Err(e) = task.await {
                warn!(error = %e, "Live engine task ended abnormally");
            }
        }
        info!("Dashboard shut down");
    }

    /// Submit a narrative and show the new case immediately
    pub async fn submit(&self, payload: IntakePayload) -> Result<CaseRecord, ApiError> {
        match self.gateway.submit(&payload).await {
            Ok(record) => {
                let case_id = record.case_id.clone();
                lock(&self.submissions).insert(case_id.clone(), payload);
                self.registry.upsert(record.clone()).await;
                *lock(&self.selected) = Some(case_id);
                self.notices.success(notice::SUBMIT_OK);
                Ok(record)
            }
            Err(e) => {
                self.notices
                    .error(format!("Unable to check narrative: {}", e));
                Err(e)
            }
        }
    }

    /// Select a case and refresh it from the backend
    ///
    /// Blank ids are ignored. The selection sticks even when the refresh
    /// fails; the registry then keeps whatever it already had.
    pub async fn select_case(&self, case_id: &str) -> Result<Option<CaseRecord>, ApiError> {
        let case_id = case_id.trim();
        if case_id.is_empty() {
            return Ok(None);
        }
        *lock(&self.selected) = Some(case_id.to_string());

        match self.hydrator.hydrate(case_id).await {
            Ok(_) => Ok(self.registry.get(case_id).await),
            Err(e) => {
                self.notices
                    .error(format!("Unable to load the selected case: {}", e));
                Err(e)
            }
        }
    }

    pub fn selected_id(&self) -> Option<String> {
        lock(&self.selected).clone()
    }

    pub async fn selected(&self) -> Option<CaseRecord> {
        let case_id = self.selected_id()?;
        self.registry.get(&case_id).await
    }

    /// Payload this session submitted for a case
    pub fn submission_for(&self, case_id: &str) -> Option<IntakePayload> {
        lock(&self.submissions).get(case_id).cloned()
    }

    pub async fn cases(&self) -> Vec<CaseRecord> {
        self.registry.cases().await
    }

    pub async fn recent(&self, limit: usize) -> Vec<CaseRecord> {
        self.registry.recent(limit).await
    }

    pub async fn metrics(&self) -> DashboardMetrics {
        DashboardMetrics::compute(&self.registry.cases().await)
    }

    /// Registry revision, bumped on every change
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.registry.subscribe()
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub fn notices(&self) -> &NoticeCenter {
        &self.notices
    }

    pub fn connection_state(&self) -> ConnectionState {
        lock(&self.connection_state)
            .as_ref()
            .map(|rx| *rx.borrow())
            .unwrap_or(ConnectionState::Idle)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
