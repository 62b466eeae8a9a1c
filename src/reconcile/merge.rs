//! Pure merge of live and historical event batches
//!
//! MQTT pushes and backend page fetches complete in arbitrary order, and the
//! same live batch can be applied more than once. The merge is therefore a
//! pure function of its inputs: same inputs, same output, no hidden state.

use std::collections::HashMap;

use super::types::{AccessEvent, Provenance};

/// Merge `incoming` into `existing`, deduplicating by event id, keeping the
/// `Live` copy when both provenances carry the same identity, sorting
/// newest-first, and truncating to `cap`.
pub fn merge(existing: &[AccessEvent], incoming: &[AccessEvent], cap: usize) -> Vec<AccessEvent> {
    let mut by_id: HashMap<&str, &AccessEvent> =
        HashMap::with_capacity(existing.len() + incoming.len());

    for event in existing.iter().chain(incoming.iter()) {
        match by_id.get(event.id.as_str()) {
            Some(held) if held.source == Provenance::Live && event.source == Provenance::Historical => {
                // Live copy already held, the historical duplicate loses
            }
            _ => {
                by_id.insert(event.id.as_str(), event);
            }
        }
    }

    let mut merged: Vec<AccessEvent> = by_id.into_values().cloned().collect();
    // Newest first; id as tiebreaker keeps the order deterministic for
    // events sharing an instant
    merged.sort_by(|a, b| b.at.cmp(&a.at).then_with(|| a.id.cmp(&b.id)));
    merged.truncate(cap);
    merged
}
