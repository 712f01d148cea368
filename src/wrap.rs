use std::future::Future;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::client::TelemetryClient;
use crate::types::{EventFields, EventStatus};

/// Run `call` and record a trace event for it.
///
/// The explicit wrapping adapter for instrumentation call sites: times the
/// call, classifies the outcome, serializes the output best-effort, and hands
/// the result back untouched. Recording is fire-and-forget - a full queue or
/// a closed client never affects the wrapped call.
///
/// ```no_run
/// # async fn demo(client: tracepipe::TelemetryClient) -> Result<String, std::io::Error> {
/// use tracepipe::traced;
///
/// let completion = traced(&client, "chat.completion", None, || async {
///     Ok::<_, std::io::Error>("hello".to_string())
/// })
/// .await?;
/// # Ok(completion) }
/// ```
pub async fn traced<F, Fut, T, E>(
    client: &TelemetryClient,
    operation: &str,
    input: Option<Value>,
    call: F,
) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    T: Serialize,
    E: std::fmt::Display,
{
    let start = Utc::now();
    let result = call().await;
    let end = Utc::now();

    let (status, output) = match &result {
        Ok(value) => (EventStatus::Success, serde_json::to_value(value).ok()),
        Err(e) => (
            EventStatus::Error,
            Some(serde_json::json!({ "error": e.to_string() })),
        ),
    };

    client.record(EventFields {
        operation: Some(operation.to_string()),
        start: Some(start),
        end: Some(end),
        status: Some(status),
        input,
        output,
        ..Default::default()
    });

    result
}
