//! Live engine loop
//!
//! Drives the supervisor and applies what it delivers:
//! partial event → registry upsert → background hydration → registry upsert.
//!
//! Everything the engine starts (the stream connection, the retry timer,
//! in-flight hydrations) is torn down before [`LiveEngine::run`] returns.

use narwatch_common::StreamEvent;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::hydration::Hydrator;
use crate::registry::{SharedRegistry, UpsertOutcome};
use crate::supervisor::ReconnectSupervisor;

enum Step {
    Cancelled,
    Event(StreamEvent),
    HydrationJoined(Result<(), tokio::task::JoinError>),
    SignalsClosed,
}

pub struct LiveEngine {
    supervisor: ReconnectSupervisor,
    registry: SharedRegistry,
    hydrator: Hydrator,
    hydrations: JoinSet<()>,
}

impl LiveEngine {
    pub fn new(supervisor: ReconnectSupervisor, registry: SharedRegistry, hydrator: Hydrator) -> Self {
        Self {
            supervisor,
            registry,
            hydrator,
            hydrations: JoinSet::new(),
        }
    }

    /// Run until `cancel` fires
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("Live engine started");
        self.supervisor.start();

        loop {
            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => Step::Cancelled,
                Some(joined) = self.hydrations.join_next(), if !self.hydrations.is_empty() => {
                    Step::HydrationJoined(joined)
                }
                event = self.supervisor.next_event() => match event {
                    Some(event) => Step::Event(event),
                    None => Step::SignalsClosed,
                },
            };

            match step {
                Step::Cancelled => break,
                Step::Event(event) => self.apply(event).await,
                Step::HydrationJoined(Err(e)) if e.is_panic() => {
                    error!(error = %e, "Hydration task panicked");
                }
                Step::HydrationJoined(_) => {}
                Step::SignalsClosed => {
                    warn!("Event stream signal channel closed");
                    break;
                }
            }
        }

        self.supervisor.shutdown();
        self.hydrations.shutdown().await;
        info!("Live engine stopped");
    }

    async fn apply(&mut self, event: StreamEvent) {
        let case_id = event.intake_id.clone();
        let outcome = self.registry.upsert(event.to_partial()).await;
        debug!(intake_id = %case_id, ?outcome, "Applied stream event");

        if outcome == UpsertOutcome::Ignored {
            return;
        }

        let hydrator = self.hydrator.clone();
        self.hydrations.spawn(async move {
            if let Err(e) = hydrator.hydrate(&case_id).await {
                warn!(intake_id = %case_id, error = %e, "Failed to hydrate case from live stream");
            }
        });
    }
}
