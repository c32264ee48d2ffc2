use crate::{db::fingerprint::QueryFingerprint, error::ErrorClass};
use std::sync::{Mutex, PoisonError};

///
/// QueryTraceSink
///

pub trait QueryTraceSink: Send + Sync {
    fn on_event(&self, event: QueryTraceEvent);
}

///
/// QueryTraceEvent
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum QueryTraceEvent {
    /// A relation was composed; counts describe its shape.
    Assembled {
        fingerprint: QueryFingerprint,
        entity: String,
        ctes: u32,
        joins: u32,
        aggregates: u32,
    },
    /// Assembly stopped before reaching the store.
    Rejected {
        entity: String,
        class: ErrorClass,
        key: Option<String>,
    },
    Executed {
        fingerprint: QueryFingerprint,
        rows: u64,
        preload_fetches: u32,
    },
    StoreFailed {
        fingerprint: QueryFingerprint,
    },
}

///
/// RecordingSink
///
/// Buffers every event in memory, in arrival order.
///

#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<QueryTraceEvent>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain and return every buffered event.
    pub fn take(&self) -> Vec<QueryTraceEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl QueryTraceSink for RecordingSink {
    fn on_event(&self, event: QueryTraceEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
