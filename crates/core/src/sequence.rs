use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// The latest `event_id` observed in a session.
///
/// Owned by the message handler, which is the only writer. Starts at 0 and
/// never decreases; a fresh session needs a fresh tracker.
#[derive(Debug, Default)]
pub struct SessionSequence {
    current: Arc<AtomicU64>,
}

impl SessionSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `event_id`. Returns `false` when it is older than the current value.
    pub(crate) fn observe(&self, event_id: u64) -> bool {
        let previous = self.current.fetch_max(event_id, Ordering::AcqRel);
        event_id >= previous
    }

    pub fn current(&self) -> u64 {
        self.current.load(Ordering::Acquire)
    }

    /// A read-only handle for collaborators that correlate feedback with events.
    pub fn reader(&self) -> SequenceReader {
        SequenceReader {
            current: Arc::clone(&self.current),
        }
    }
}

/// Read-only view of a [`SessionSequence`].
#[derive(Debug, Clone)]
pub struct SequenceReader {
    current: Arc<AtomicU64>,
}

impl SequenceReader {
    pub fn current(&self) -> u64 {
        self.current.load(Ordering::Acquire)
    }
}
