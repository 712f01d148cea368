use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Terminal status of a traced operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Success,
    Error,
    Timeout,
}

impl EventStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EventStatus::Success => "success",
            EventStatus::Error => "error",
            EventStatus::Timeout => "timeout",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token counts reported by the provider for one call.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Fill `total_tokens` from prompt + completion when the provider omits it.
    pub fn normalized(mut self) -> Self {
        if self.total_tokens == 0 {
            self.total_tokens = self.prompt_tokens + self.completion_tokens;
        }
        self
    }
}

/// One recorded trace of an LLM operation.
///
/// Immutable once constructed; owned by the pending queue until delivered
/// or dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    pub id: String,
    pub project_id: String,
    pub trace_id: String,
    pub span_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,
    pub operation: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Derived from `end - start`, clamped to >= 0.
    pub duration_ms: f64,
    pub status: EventStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Caller-supplied fields for [`TelemetryClient::record`](crate::TelemetryClient::record).
///
/// Everything is optional; unset timestamps default to the call time:
///
/// ```
/// use tracepipe::{EventFields, EventStatus};
///
/// let fields = EventFields {
///     operation: Some("chat.completion".into()),
///     model: Some("gpt-4o".into()),
///     status: Some(EventStatus::Success),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Default)]
pub struct EventFields {
    pub trace_id: Option<String>,
    pub span_id: Option<String>,
    pub parent_span_id: Option<String>,
    pub operation: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub status: Option<EventStatus>,
    pub input: Option<Value>,
    pub output: Option<Value>,
    pub metadata: Option<Map<String, Value>>,
    pub usage: Option<TokenUsage>,
    pub cost: Option<f64>,
    pub provider: Option<String>,
    pub model: Option<String>,
}

impl TraceEvent {
    /// Build an event from caller fields, filling defaults and derived values.
    pub(crate) fn from_fields(project_id: &str, fields: EventFields) -> Self {
        let now = Utc::now();
        let start = fields.start.unwrap_or(now);
        let end = fields.end.unwrap_or(now);
        let duration_ms = (end - start)
            .num_microseconds()
            .map(|us| us as f64 / 1000.0)
            .unwrap_or(f64::MAX)
            .max(0.0);

        Self {
            id: Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            trace_id: fields
                .trace_id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            span_id: fields.span_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            parent_span_id: fields.parent_span_id,
            operation: fields.operation.unwrap_or_default(),
            start,
            end,
            duration_ms,
            status: fields.status.unwrap_or(EventStatus::Success),
            input: fields.input,
            output: fields.output,
            metadata: fields.metadata,
            usage: fields.usage.map(TokenUsage::normalized),
            cost: fields.cost.map(|c| c.max(0.0)),
            provider: fields.provider,
            model: fields.model,
        }
    }
}
