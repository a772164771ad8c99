//! Ordered, persisted event log
//!
//! Every event is numbered with a per-request dense sequence, persisted
//! to the store, and only then published on the bus — subscribers can
//! detect gaps, and a crash never leaves a published-but-unpersisted
//! event behind.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::warn;
use uuid::Uuid;

use crate::bus::EventBus;
use crate::store::{tables, QueryOrder, VectorStore};
use crate::types::{AgentEvent, EventKind};

use super::records;

/// Sequencing + persistence + broadcast for `AgentEvent`s.
pub struct EventLog {
    store: Arc<dyn VectorStore>,
    bus: Arc<EventBus>,
    seqs: Mutex<HashMap<Uuid, u64>>,
}

impl EventLog {
    pub fn new(store: Arc<dyn VectorStore>, bus: Arc<EventBus>) -> Self {
        Self { store, bus, seqs: Mutex::new(HashMap::new()) }
    }

    /// Emit an event for a request. Returns the assigned sequence
    /// number, or 0 if persistence failed (the event is then not
    /// broadcast, preserving persist-before-emit).
    pub fn emit(&self, request_id: Uuid, kind: EventKind) -> u64 {
        let seq = {
            let mut seqs = match self.seqs.lock() {
                Ok(seqs) => seqs,
                Err(poisoned) => poisoned.into_inner(),
            };
            let entry = seqs.entry(request_id).or_insert(0);
            *entry += 1;
            *entry
        };

        let event = AgentEvent {
            request_id,
            seq,
            ts: chrono::Utc::now().timestamp_millis(),
            kind,
        };

        match records::event_row(&event).and_then(|row| self.store.put(tables::AGENT_EVENTS, row)) {
            Ok(()) => {
                self.bus.publish(event);
                seq
            }
            Err(err) => {
                warn!(request_id = %request_id, seq, error = %err, "Failed to persist event, not broadcasting");
                0
            }
        }
    }

    /// Events for a request from a cursor (exclusive), in seq order.
    pub fn events_after(&self, request_id: Uuid, cursor: u64, limit: usize) -> Vec<AgentEvent> {
        let predicate = records::belongs_to(request_id);
        let rows = self
            .store
            .query(
                tables::AGENT_EVENTS,
                &|row| predicate(row) && row.f64_field("seq").is_some_and(|s| s as u64 > cursor),
                limit,
                QueryOrder::IdAsc,
            )
            .unwrap_or_default();
        rows.iter().filter_map(|row| records::parse_event(row).ok()).collect()
    }

    /// Current sequence high-water mark for a request.
    pub fn cursor(&self, request_id: Uuid) -> u64 {
        self.seqs.lock().ok().and_then(|s| s.get(&request_id).copied()).unwrap_or(0)
    }
}
