//! Event Source Client
//!
//! Opens one long-lived connection to the backend's event stream and reports
//! what happens on it through a [`StreamSink`]:
//! - every valid message, in arrival order
//! - at most one failure, after which the connection is finished
//!
//! The client never retries on its own; that is the supervisor's job.

use futures::StreamExt;
use narwatch_common::StreamEvent;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::Url;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::decoder::{SseDecoder, SseMessage};
use crate::api::ApiClient;

/// What a connection reports back to its owner
#[derive(Debug, Clone, PartialEq)]
pub enum StreamSignal {
    /// Response headers arrived with a success status
    Opened { connection: u64 },
    /// One valid message
    Event { connection: u64, event: StreamEvent },
    /// Transport failure or remote close; terminal for the connection
    Failed { connection: u64, reason: String },
    /// The supervisor's reconnection timer fired
    RetryDue,
}

/// Callback side of one connection
///
/// `fail` consumes the sink, so a connection can report at most one failure.
#[derive(Debug)]
pub struct StreamSink {
    connection: u64,
    tx: mpsc::UnboundedSender<StreamSignal>,
}

impl StreamSink {
    pub fn new(connection: u64, tx: mpsc::UnboundedSender<StreamSignal>) -> Self {
        Self { connection, tx }
    }

    pub fn connection_id(&self) -> u64 {
        self.connection
    }

    pub fn opened(&self) {
        let _ = self.tx.send(StreamSignal::Opened {
            connection: self.connection,
        });
    }

    /// Deliver one event; returns false once nobody is listening
    pub fn event(&self, event: StreamEvent) -> bool {
        self.tx
            .send(StreamSignal::Event {
                connection: self.connection,
                event,
            })
            .is_ok()
    }

    pub fn fail(self, reason: impl Into<String>) {
        let _ = self.tx.send(StreamSignal::Failed {
            connection: self.connection,
            reason: reason.into(),
        });
    }
}

/// Ownership of one open connection
///
/// Closing aborts the connection task. It is idempotent and also happens on
/// drop, so a discarded handle never leaves a connection behind.
#[derive(Debug)]
pub struct StreamHandle {
    task: Option<JoinHandle<()>>,
}

impl StreamHandle {
    pub fn new(task: JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }

    pub fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.task.is_none()
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// Something that can open event stream connections
pub trait Connector: Send + 'static {
    /// Start connecting and return immediately
    ///
    /// Must be called from within a tokio runtime.
    fn open(&self, sink: StreamSink) -> StreamHandle;
}

/// Connector for the backend's `/api/v1/events/stream` endpoint
#[derive(Clone)]
pub struct EventStreamClient {
    http: reqwest::Client,
    url: Url,
}

impl EventStreamClient {
    pub fn new(api: &ApiClient) -> Self {
        Self {
            http: api.stream_http().clone(),
            url: api.stream_url(),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl Connector for EventStreamClient {
    fn open(&self, sink: StreamSink) -> StreamHandle {
        let http = self.http.clone();
        let url = self.url.clone();

        let task = tokio::spawn(async move {
            let connection = sink.connection_id();
            let reason = match read_stream(&http, url, &sink).await {
                Ok(()) => "Event stream closed by server".to_string(),
                Err(reason) => reason,
            };
            debug!(connection, reason = %reason, "Event stream connection finished");
            sink.fail(reason);
        });

        StreamHandle::new(task)
    }
}

/// Read the stream until it ends or fails
async fn read_stream(http: &reqwest::Client, url: Url, sink: &StreamSink) -> Result<(), String> {
    let response = http
        .get(url)
        .header(ACCEPT, "text/event-stream")
        .header(CACHE_CONTROL, "no-cache")
        .send()
        .await
        .map_err(|e| format!("Connect failed: {}", e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(format!("HTTP {}", status.as_u16()));
    }

    info!(connection = sink.connection_id(), "Event stream connected");
    sink.opened();

    let mut decoder = SseDecoder::new();
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| format!("Stream read failed: {}", e))?;
        for message in decoder.push(&chunk) {
            if !deliver(sink, message) {
                // Owner is gone; nothing left to report to
                return Ok(());
            }
        }
    }

    Ok(())
}

/// Hand one decoded message to the sink; false when the sink is closed
fn deliver(sink: &StreamSink, message: SseMessage) -> bool {
    if !message.is_default_type() {
        debug!(event = %message.event, "Ignoring named stream event");
        return true;
    }

    match StreamEvent::parse(&message.data) {
        Ok(event) => sink.event(event),
        Err(e) => {
            warn!(error = %e, data = %message.data, "Failed to parse stream event");
            true
        }
    }
}
