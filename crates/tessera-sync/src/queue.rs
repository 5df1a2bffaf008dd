use std::collections::VecDeque;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::MutationLogEntry;

/// Local mutations waiting for the next tick.
///
/// Every operation is a single lock acquisition, so an entry pushed while a tick is swapping the
/// queue ends up either in that tick's batch or in the fresh queue, never both and never lost.
#[derive(Debug, Clone, Default)]
pub struct OutboundQueue(Arc<Mutex<VecDeque<MutationLogEntry>>>);

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<MutationLogEntry>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, entry: MutationLogEntry) {
        self.lock().push_back(entry);
    }

    /// Swap the queue for an empty one and hand back what it held.
    pub fn take_all(&self) -> Vec<MutationLogEntry> {
        Vec::from(mem::take(&mut *self.lock()))
    }

    /// Put a batch that failed to send back in front of anything queued since.
    pub fn restore_front(&self, batch: Vec<MutationLogEntry>) {
        let mut queue = self.lock();
        for entry in batch.into_iter().rev() {
            queue.push_front(entry);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn snapshot(&self) -> Vec<MutationLogEntry> {
        self.lock().iter().cloned().collect()
    }
}
