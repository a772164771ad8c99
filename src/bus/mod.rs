//! Broadcast bus
//!
//! Typed publish/subscribe hub for pipeline events. Subscribers register
//! a kind filter and optionally a request-id filter. Delivery is
//! best-effort but ordered per request: a slow subscriber's events are
//! dropped (counted) rather than blocking publishers. A bounded replay
//! window per request lets late subscribers catch up.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::config::defaults::{BUS_REPLAY_WINDOW, BUS_SUBSCRIBER_DEPTH};
use crate::types::AgentEvent;

/// A live subscription handle. Dropping the receiver unsubscribes on
/// the next publish.
pub struct Subscription {
    pub id: u64,
    pub rx: mpsc::Receiver<AgentEvent>,
}

struct SubscriberEntry {
    id: u64,
    /// Event kind names to deliver; `None` means all kinds.
    kinds: Option<HashSet<String>>,
    /// Only deliver events for this request when set.
    request_filter: Option<Uuid>,
    tx: mpsc::Sender<AgentEvent>,
}

impl SubscriberEntry {
    fn matches(&self, event: &AgentEvent) -> bool {
        if let Some(request_id) = self.request_filter {
            if event.request_id != request_id {
                return false;
            }
        }
        match &self.kinds {
            Some(kinds) => kinds.contains(event.kind.name()),
            None => true,
        }
    }
}

struct BusInner {
    subscribers: Vec<SubscriberEntry>,
    /// Per-request ring of recent events for late-subscriber catch-up.
    replay: HashMap<Uuid, VecDeque<AgentEvent>>,
    next_id: u64,
}

/// Fan-out hub for `AgentEvent`s.
pub struct EventBus {
    inner: Mutex<BusInner>,
    dropped: AtomicU64,
    published: AtomicU64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BusInner {
                subscribers: Vec::new(),
                replay: HashMap::new(),
                next_id: 0,
            }),
            dropped: AtomicU64::new(0),
            published: AtomicU64::new(0),
        }
    }

    /// Publish an event: append to the replay window, fan out to every
    /// matching subscriber. Full subscriber channels drop the event;
    /// closed ones are pruned.
    pub fn publish(&self, event: AgentEvent) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        self.published.fetch_add(1, Ordering::Relaxed);

        let ring = inner.replay.entry(event.request_id).or_default();
        if ring.len() >= BUS_REPLAY_WINDOW {
            ring.pop_front();
        }
        ring.push_back(event.clone());

        let mut closed = Vec::new();
        for entry in &inner.subscribers {
            if !entry.matches(&event) {
                continue;
            }
            match entry.tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    debug!(subscriber = entry.id, seq = event.seq, "Slow subscriber, event dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    closed.push(entry.id);
                }
            }
        }
        if !closed.is_empty() {
            inner.subscribers.retain(|s| !closed.contains(&s.id));
        }
    }

    /// Register a subscriber. `kinds` of `None` delivers every kind;
    /// `request` of `None` delivers every request.
    pub fn subscribe(&self, kinds: Option<Vec<String>>, request: Option<Uuid>) -> Subscription {
        self.subscribe_inner(kinds, request, false)
    }

    /// Register a subscriber and pre-fill its channel with the matching
    /// replay window, so a late subscriber sees recent history in order
    /// before live events.
    pub fn subscribe_with_replay(
        &self,
        kinds: Option<Vec<String>>,
        request: Option<Uuid>,
    ) -> Subscription {
        self.subscribe_inner(kinds, request, true)
    }

    fn subscribe_inner(
        &self,
        kinds: Option<Vec<String>>,
        request: Option<Uuid>,
        replay: bool,
    ) -> Subscription {
        let (tx, rx) = mpsc::channel(BUS_SUBSCRIBER_DEPTH);
        let entry = SubscriberEntry {
            id: 0,
            kinds: kinds.map(|k| k.into_iter().collect()),
            request_filter: request,
            tx,
        };

        let Ok(mut inner) = self.inner.lock() else {
            return Subscription { id: 0, rx };
        };
        let id = inner.next_id;
        inner.next_id += 1;
        let mut entry = entry;
        entry.id = id;

        if replay {
            // Replay happens under the lock so no live event can
            // interleave ahead of history
            let mut backlog: Vec<AgentEvent> = match request {
                Some(request_id) => inner
                    .replay
                    .get(&request_id)
                    .map(|ring| ring.iter().cloned().collect())
                    .unwrap_or_default(),
                None => {
                    let mut all: Vec<AgentEvent> = inner
                        .replay
                        .values()
                        .flat_map(|ring| ring.iter().cloned())
                        .collect();
                    all.sort_by_key(|e| (e.request_id, e.seq));
                    all
                }
            };
            backlog.retain(|e| entry.matches(e));
            for event in backlog {
                if entry.tx.try_send(event).is_err() {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        inner.subscribers.push(entry);
        Subscription { id, rx }
    }

    /// Events dropped due to slow subscribers.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Total events published.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().map(|i| i.subscribers.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventKind, StageName};

    fn event(request_id: Uuid, seq: u64, kind: EventKind) -> AgentEvent {
        AgentEvent { request_id, seq, ts: seq as i64, kind }
    }

    fn started(request_id: Uuid, seq: u64) -> AgentEvent {
        event(request_id, seq, EventKind::StageStarted { stage: StageName::Validate })
    }

    #[tokio::test]
    async fn subscriber_receives_events_in_order() {
        let bus = EventBus::new();
        let request = Uuid::from_u128(1);
        let mut sub = bus.subscribe(None, Some(request));

        for seq in 1..=3 {
            bus.publish(started(request, seq));
        }
        for expected in 1..=3 {
            let got = sub.rx.recv().await.expect("event");
            assert_eq!(got.seq, expected);
        }
    }

    #[tokio::test]
    async fn kind_filter_excludes_other_kinds() {
        let bus = EventBus::new();
        let request = Uuid::from_u128(1);
        let mut sub = bus.subscribe(Some(vec!["metric".to_string()]), None);

        bus.publish(started(request, 1));
        bus.publish(event(request, 2, EventKind::Metric { name: "x".into(), value: 1.0 }));

        let got = sub.rx.recv().await.expect("event");
        assert_eq!(got.seq, 2);
        assert_eq!(got.kind.name(), "metric");
    }

    #[tokio::test]
    async fn request_filter_excludes_other_requests() {
        let bus = EventBus::new();
        let wanted = Uuid::from_u128(1);
        let other = Uuid::from_u128(2);
        let mut sub = bus.subscribe(None, Some(wanted));

        bus.publish(started(other, 1));
        bus.publish(started(wanted, 1));

        let got = sub.rx.recv().await.expect("event");
        assert_eq!(got.request_id, wanted);
    }

    #[tokio::test]
    async fn late_subscriber_replays_window() {
        let bus = EventBus::new();
        let request = Uuid::from_u128(1);
        for seq in 1..=5 {
            bus.publish(started(request, seq));
        }

        let mut sub = bus.subscribe_with_replay(None, Some(request));
        for expected in 1..=5 {
            let got = sub.rx.recv().await.expect("replayed event");
            assert_eq!(got.seq, expected);
        }
    }

    #[tokio::test]
    async fn replay_window_is_bounded() {
        let bus = EventBus::new();
        let request = Uuid::from_u128(1);
        let total = (BUS_REPLAY_WINDOW + 50) as u64;
        for seq in 1..=total {
            bus.publish(started(request, seq));
        }

        let mut sub = bus.subscribe_with_replay(None, Some(request));
        let first = sub.rx.recv().await.expect("event");
        assert_eq!(first.seq, total - BUS_REPLAY_WINDOW as u64 + 1);
    }

    #[tokio::test]
    async fn slow_subscriber_drops_rather_than_blocking() {
        let bus = EventBus::new();
        let request = Uuid::from_u128(1);
        let _sub = bus.subscribe(None, None);

        for seq in 1..=(BUS_SUBSCRIBER_DEPTH as u64 + 10) {
            bus.publish(started(request, seq));
        }
        assert!(bus.dropped() >= 10, "dropped = {}", bus.dropped());
    }

    #[tokio::test]
    async fn closed_subscribers_are_pruned() {
        let bus = EventBus::new();
        let request = Uuid::from_u128(1);
        let sub = bus.subscribe(None, None);
        assert_eq!(bus.subscriber_count(), 1);
        drop(sub);
        bus.publish(started(request, 1));
        assert_eq!(bus.subscriber_count(), 0);
    }
}
