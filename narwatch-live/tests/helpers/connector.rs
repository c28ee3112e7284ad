//! Connector that hands each connection's sink to the test
//!
//! The test plays the server: it calls `opened`, `event` and `fail` on the
//! sink directly. Each connection is an idle task that counts as live until
//! the supervisor closes it.

use narwatch_live::stream::{Connector, StreamHandle, StreamSink};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Default)]
struct Counters {
    opened: AtomicUsize,
    live: AtomicUsize,
    max_live: AtomicUsize,
}

/// Decrements the live count when the connection task is dropped
struct LiveGuard(Arc<Counters>);

impl LiveGuard {
    fn new(counters: Arc<Counters>) -> Self {
        let live = counters.live.fetch_add(1, Ordering::SeqCst) + 1;
        counters.max_live.fetch_max(live, Ordering::SeqCst);
        Self(counters)
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.live.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct ManualConnector {
    counters: Arc<Counters>,
    sinks: mpsc::UnboundedSender<StreamSink>,
}

/// Test side of a [`ManualConnector`]
pub struct ConnectorProbe {
    counters: Arc<Counters>,
    sinks: mpsc::UnboundedReceiver<StreamSink>,
}

impl ManualConnector {
    pub fn new() -> (Self, ConnectorProbe) {
        let counters = Arc::new(Counters::default());
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                counters: Arc::clone(&counters),
                sinks: tx,
            },
            ConnectorProbe { counters, sinks: rx },
        )
    }
}

impl Connector for ManualConnector {
    fn open(&self, sink: StreamSink) -> StreamHandle {
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        let guard = LiveGuard::new(Arc::clone(&self.counters));
        let _ = self.sinks.send(sink);

        StreamHandle::new(tokio::spawn(async move {
            let _guard = guard;
            std::future::pending::<()>().await;
        }))
    }
}

impl ConnectorProbe {
    /// Sink of the most recently opened connection, if one is waiting
    pub fn try_sink(&mut self) -> Option<StreamSink> {
        self.sinks.try_recv().ok()
    }

    /// Wait for the next connection to be opened
    pub async fn next_sink(&mut self) -> StreamSink {
        tokio::time::timeout(Duration::from_secs(60), self.sinks.recv())
            .await
            .expect("timed out waiting for a connection")
            .expect("connector dropped")
    }

    pub fn opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.counters.live.load(Ordering::SeqCst)
    }

    pub fn max_live(&self) -> usize {
        self.counters.max_live.load(Ordering::SeqCst)
    }
}
