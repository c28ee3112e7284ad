//! Live event stream: SSE decoding and the connection client

mod client;
pub mod decoder;

pub use client::{Connector, EventStreamClient, StreamHandle, StreamSignal, StreamSink};
pub use decoder::{SseDecoder, SseMessage};
