use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::client::TelemetryClient;
use crate::config::ClientConfig;
use crate::delivery::Transport;
use crate::error::DeliveryError;

/// In-memory transport that records delivered operations in order.
///
/// `fail_next` scripts HTTP statuses for upcoming sends; once the script is
/// drained, sends succeed.
pub(crate) struct MemoryTransport {
    script: Mutex<Vec<u16>>,
    delivered: Mutex<Vec<String>>,
}

impl MemoryTransport {
    pub(crate) fn new() -> Self {
        Self {
            script: Mutex::new(Vec::new()),
            delivered: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn fail_next(&self, statuses: Vec<u16>) {
        self.script.lock().unwrap().extend(statuses);
    }

    /// Operations of all delivered events, flattened in delivery order.
    pub(crate) fn delivered_operations(&self) -> Vec<String> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, payload: &[u8]) -> Result<(), DeliveryError> {
        let mut script = self.script.lock().unwrap();
        if !script.is_empty() {
            let status = script.remove(0);
            return Err(DeliveryError::from_status(status, "scripted failure"));
        }
        drop(script);

        let parsed: serde_json::Value = serde_json::from_slice(payload).unwrap();
        let ops = parsed["events"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["operation"].as_str().unwrap_or_default().to_string());
        self.delivered.lock().unwrap().extend(ops);
        Ok(())
    }
}

/// Client wired to a `MemoryTransport`; no real HTTP involved.
pub(crate) fn test_client(config: ClientConfig) -> (TelemetryClient, Arc<MemoryTransport>) {
    let transport = Arc::new(MemoryTransport::new());
    let client = TelemetryClient::with_transport(config, transport.clone());
    (client, transport)
}
