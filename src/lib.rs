//! tracepipe: client SDK for reporting LLM-call trace events to a collector.
//!
//! The SDK buffers events in an in-process queue and delivers them in batches
//! from a background worker, so `record()` never adds network latency to the
//! caller's request path. Delivery is rate limited by a token bucket and
//! retried with exponential backoff; a batch that exhausts its retries on a
//! transient failure is re-enqueued at the head of the queue for the next
//! cycle (at-least-once delivery).
//!
//! ```no_run
//! use std::time::Duration;
//! use tracepipe::{ClientConfig, EventFields, TelemetryClient};
//!
//! # async fn demo() -> tracepipe::Result<()> {
//! let client = TelemetryClient::new(
//!     ClientConfig::builder()
//!         .api_key("sk-...")
//!         .project_id("my-project")
//!         .build(),
//! )?;
//!
//! client.record(EventFields {
//!     operation: Some("chat.completion".into()),
//!     model: Some("gpt-4o".into()),
//!     ..Default::default()
//! });
//!
//! client.flush(Duration::from_secs(5)).await;
//! client.close().await;
//! # Ok(()) }
//! ```

mod client;
mod config;
mod delivery;
mod error;
#[cfg(test)]
pub(crate) mod test_utils;
mod types;
mod wrap;

pub use client::TelemetryClient;
pub use config::{ClientConfig, DEFAULT_BASE_URL};
pub use error::{DeliveryError, Result, TracepipeError};
pub use types::{EventFields, EventStatus, TokenUsage, TraceEvent};
pub use wrap::traced;
