use tracing::warn;

use crate::types::TraceEvent;

/// Split `items` into batches respecting `max_items` and `max_bytes` limits.
/// `byte_size` is called once per item to determine its size.
///
/// A new batch is started when the current batch is non-empty AND
/// (`batch.len() >= max_items` OR `batch_bytes + item_size >= max_bytes`),
/// so a single item that exceeds `max_bytes` on its own still gets a batch
/// of its own.
pub(crate) fn batch_items<T>(
    items: Vec<T>,
    max_items: usize,
    max_bytes: usize,
    byte_size: impl Fn(&T) -> usize,
) -> Vec<Vec<T>> {
    let max_items = max_items.max(1);
    let max_bytes = max_bytes.max(1);
    let mut output = Vec::new();
    let mut batch: Vec<T> = Vec::new();
    let mut batch_bytes = 0usize;

    for item in items {
        let item_size = byte_size(&item);
        if !batch.is_empty() && (batch.len() >= max_items || batch_bytes + item_size >= max_bytes) {
            output.push(batch);
            batch = Vec::new();
            batch_bytes = 0;
        }
        batch_bytes += item_size;
        batch.push(item);
    }
    if !batch.is_empty() {
        output.push(batch);
    }
    output
}

/// A wire-ready batch paired with the events it carries.
///
/// The events are kept alongside the serialized payload so a batch that
/// exhausts its retries can be reinserted at the queue head intact.
pub(crate) struct SerializedBatch {
    /// The full `{"events":[...]}` request body.
    pub data: Vec<u8>,
    pub events: Vec<TraceEvent>,
}

/// Serialize drained events into one or more wire batches.
///
/// Each event is serialized once; the pre-serialized bytes are used for size
/// estimation AND assembled directly into the final payload. An event whose
/// fields fail to encode is dropped with a warning rather than failing the
/// whole batch.
pub(crate) fn serialize_batches(
    events: Vec<TraceEvent>,
    max_items: usize,
    max_bytes: usize,
) -> Vec<SerializedBatch> {
    let prepared: Vec<(Vec<u8>, TraceEvent)> = events
        .into_iter()
        .filter_map(|event| match serde_json::to_vec(&event) {
            Ok(bytes) => Some((bytes, event)),
            Err(e) => {
                warn!(event_id = %event.id, error = %e, "failed to serialize event, dropping it");
                None
            }
        })
        .collect();

    let batches = batch_items(prepared, max_items, max_bytes, |(bytes, _)| bytes.len());

    batches
        .into_iter()
        .map(|batch| {
            let (event_bytes, events): (Vec<_>, Vec<_>) = batch.into_iter().unzip();
            SerializedBatch {
                data: assemble_events_request(&event_bytes),
                events,
            }
        })
        .collect()
}

/// Produce `{"events":[<e1>,<e2>,...]}` by concatenating pre-serialized
/// event bytes, without re-serializing.
fn assemble_events_request(event_bytes: &[Vec<u8>]) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(b"{\"events\":[");
    for (i, event) in event_bytes.iter().enumerate() {
        if i > 0 {
            data.push(b',');
        }
        data.extend_from_slice(event);
    }
    data.extend_from_slice(b"]}");
    data
}
