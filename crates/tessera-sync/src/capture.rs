use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tessera_core::MutationEvent;

use crate::{EventKind, MutationLogEntry, OutboundQueue};

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub fn entry_from_event(event: &MutationEvent, user_id: &str, timestamp: i64) -> MutationLogEntry {
    MutationLogEntry {
        event: EventKind::from(event.kind),
        element_id: event.target_id.clone(),
        data: event.payload.clone(),
        timestamp,
        user_id: user_id.to_string(),
    }
}

/// Model subscriber that logs local mutations into the outbound queue.
///
/// Runs under the model lock and only takes the queue lock, never the other way round.
#[derive(Debug, Clone)]
pub struct CaptureHook {
    queue: OutboundQueue,
    user_id: String,
    active: Arc<AtomicBool>,
}

impl CaptureHook {
    pub fn new(queue: OutboundQueue, user_id: impl Into<String>, active: Arc<AtomicBool>) -> Self {
        Self { queue, user_id: user_id.into(), active }
    }

    pub fn observe(&self, event: &MutationEvent) {
        if !self.active.load(Ordering::Acquire) {
            return;
        }
        self.queue.push(entry_from_event(event, &self.user_id, now_millis()));
    }
}
