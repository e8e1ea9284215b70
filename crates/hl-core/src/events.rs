//! Conversion lifecycle events.
//!
//! Every run publishes `RunStarted`, then per-quality job events, then
//! exactly one of `RunCompleted` / `RunFailed`. Job events of different
//! qualities interleave arbitrarily.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::ids::RunId;

const DEFAULT_CHANNEL_CAPACITY: usize = 256;
const DEFAULT_HISTORY: usize = 512;

// ---------------------------------------------------------------------------
// EventPayload
// ---------------------------------------------------------------------------

/// What happened, and to which run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    // -- Run lifecycle -------------------------------------------------------
    RunStarted {
        run_id: RunId,
        output_dir: PathBuf,
        qualities: Vec<String>,
    },
    RunCompleted {
        run_id: RunId,
        master_manifest: PathBuf,
    },
    RunFailed {
        run_id: RunId,
        error: String,
    },

    // -- Job lifecycle -------------------------------------------------------
    JobStarted {
        run_id: RunId,
        quality: String,
        command_line: String,
    },
    JobProgress {
        run_id: RunId,
        quality: String,
        percent: u8,
    },
    JobCompleted {
        run_id: RunId,
        quality: String,
    },
    JobFailed {
        run_id: RunId,
        quality: String,
        error: String,
    },
}

impl EventPayload {
    /// The run this event belongs to.
    pub fn run_id(&self) -> &RunId {
        match self {
            EventPayload::RunStarted { run_id, .. }
            | EventPayload::RunCompleted { run_id, .. }
            | EventPayload::RunFailed { run_id, .. }
            | EventPayload::JobStarted { run_id, .. }
            | EventPayload::JobProgress { run_id, .. }
            | EventPayload::JobCompleted { run_id, .. }
            | EventPayload::JobFailed { run_id, .. } => run_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// One published lifecycle event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    /// Publication order on the bus that emitted it, starting at 0.
    pub seq: u64,
    pub emitted_at: DateTime<Utc>,
    pub payload: EventPayload,
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Fan-out of conversion events to any number of subscribers.
///
/// Besides the live channel the bus keeps the last `history` events, oldest
/// first, so a caller that subscribes after a run finished can still look
/// up what happened to it with [`EventBus::history`].
pub struct EventBus {
    tx: broadcast::Sender<Event>,
    next_seq: AtomicU64,
    history: Mutex<VecDeque<Event>>,
    history_limit: usize,
}

impl EventBus {
    /// `channel` bounds how far a slow subscriber may lag before it starts
    /// seeing `RecvError::Lagged`; `history` bounds the retained backlog.
    pub fn with_capacity(channel: usize, history: usize) -> Self {
        let (tx, _) = broadcast::channel(channel.max(1));
        Self {
            tx,
            next_seq: AtomicU64::new(0),
            history: Mutex::new(VecDeque::with_capacity(history)),
            history_limit: history,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Stamp `payload` and hand it to every live subscriber.
    pub fn broadcast(&self, payload: EventPayload) -> u64 {
        let event = {
            let mut history = self.history.lock();
            // Sequence numbers are taken under the lock so history stays sorted.
            let event = Event {
                id: Uuid::new_v4(),
                seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
                emitted_at: Utc::now(),
                payload,
            };
            if self.history_limit > 0 {
                if history.len() == self.history_limit {
                    history.pop_front();
                }
                history.push_back(event.clone());
            }
            event
        };

        let seq = event.seq;
        if self.tx.send(event).is_err() {
            tracing::trace!(seq, "Event published with no subscribers");
        }
        seq
    }

    /// Retained events of one run, in publication order.
    pub fn history(&self, run_id: &RunId) -> Vec<Event> {
        self.history
            .lock()
            .iter()
            .filter(|e| e.payload.run_id() == run_id)
            .cloned()
            .collect()
    }

    /// The most recently published event still retained, if any.
    pub fn latest(&self) -> Option<Event> {
        self.history.lock().back().cloned()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY, DEFAULT_HISTORY)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.tx.receiver_count())
            .field("history_limit", &self.history_limit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(run_id: &RunId, quality: &str, percent: u8) -> EventPayload {
        EventPayload::JobProgress {
            run_id: run_id.clone(),
            quality: quality.into(),
            percent,
        }
    }

    #[test]
    fn subscriber_sees_published_event() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let run_id = RunId::new();

        bus.broadcast(EventPayload::JobCompleted {
            run_id: run_id.clone(),
            quality: "360".into(),
        });

        let event = rx.try_recv().unwrap();
        assert_eq!(event.seq, 0);
        assert_eq!(event.payload.run_id(), &run_id);
        assert!(matches!(
            event.payload,
            EventPayload::JobCompleted { ref quality, .. } if quality == "360"
        ));
    }

    #[test]
    fn sequence_numbers_increase() {
        let bus = EventBus::default();
        let run_id = RunId::new();
        let seqs: Vec<u64> = (0..3).map(|p| bus.broadcast(progress(&run_id, "480", p))).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        assert_eq!(bus.latest().unwrap().seq, 2);
    }

    #[test]
    fn history_drops_oldest_beyond_limit() {
        let bus = EventBus::with_capacity(8, 3);
        let run_id = RunId::new();
        for p in 0..5 {
            bus.broadcast(progress(&run_id, "720", p));
        }

        let history = bus.history(&run_id);
        let seqs: Vec<u64> = history.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![2, 3, 4]);
    }

    #[test]
    fn history_is_per_run() {
        let bus = EventBus::default();
        let a = RunId::from_caller("a").unwrap();
        let b = RunId::from_caller("b").unwrap();
        bus.broadcast(progress(&a, "360", 10));
        bus.broadcast(progress(&b, "360", 20));
        bus.broadcast(progress(&a, "360", 30));

        let history = bus.history(&a);
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].payload, progress(&a, "360", 30));
        assert_eq!(bus.history(&b).len(), 1);
    }

    #[test]
    fn zero_history_keeps_nothing() {
        let bus = EventBus::with_capacity(4, 0);
        bus.broadcast(EventPayload::RunFailed {
            run_id: RunId::new(),
            error: "boom".into(),
        });
        assert!(bus.latest().is_none());
    }

    #[test]
    fn payload_serializes_with_type_tag() {
        let run_id = RunId::from_caller("r1").unwrap();
        let json = serde_json::to_string(&progress(&run_id, "360", 42)).unwrap();
        assert!(json.contains(r#""type":"job_progress""#), "{json}");
        assert!(json.contains(r#""percent":42"#), "{json}");
    }
}
