//! Per-document run slot.
//!
//! Generation and regeneration must hold the document's slot while they
//! execute; this is what keeps two runs from interleaving id
//! assignments and corrupting lineage. A second request either queues
//! (FIFO, bounded depth) or is rejected immediately, per configuration.

use crate::error::PipelineError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// What to do with a run request while the slot is held
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunSlotPolicy {
    /// Reject immediately with `RunLockConflictError`
    Reject,
    /// Wait in FIFO order, up to `depth` waiters; beyond that, reject
    Queue { depth: usize },
}

impl Default for RunSlotPolicy {
    fn default() -> Self {
        RunSlotPolicy::Reject
    }
}

#[derive(Clone)]
struct Slot {
    semaphore: Arc<Semaphore>,
    waiting: Arc<AtomicUsize>,
}

impl Slot {
    fn new() -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(1)),
            waiting: Arc::new(AtomicUsize::new(0)),
        }
    }
}

/// Holding this guard is holding the document's run slot; dropping it
/// releases the slot to the next waiter.
pub struct RunGuard {
    _permit: OwnedSemaphorePermit,
}

/// One mutable run slot per document
pub struct RunSlots {
    policy: RunSlotPolicy,
    slots: Mutex<HashMap<String, Slot>>,
}

impl RunSlots {
    pub fn new(policy: RunSlotPolicy) -> Self {
        Self {
            policy,
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, document_id: &str) -> Slot {
        self.slots
            .lock()
            .unwrap()
            .entry(document_id.to_string())
            .or_insert_with(Slot::new)
            .clone()
    }

    /// Acquire the slot for `document_id`, applying the configured
    /// policy when it is already held.
    pub async fn acquire(&self, document_id: &str) -> Result<RunGuard, PipelineError> {
        let slot = self.slot(document_id);

        // Fast path regardless of policy
        if let Ok(permit) = slot.semaphore.clone().try_acquire_owned() {
            return Ok(RunGuard { _permit: permit });
        }

        match self.policy {
            RunSlotPolicy::Reject => Err(PipelineError::run_lock_conflict(format!(
                "a generation run is already in flight for document {}",
                document_id
            ))),
            RunSlotPolicy::Queue { depth } => {
                if slot.waiting.fetch_add(1, Ordering::SeqCst) >= depth {
                    slot.waiting.fetch_sub(1, Ordering::SeqCst);
                    return Err(PipelineError::run_lock_conflict(format!(
                        "run queue for document {} is full (depth {})",
                        document_id, depth
                    )));
                }

                tracing::debug!(document_id, "Run slot held; waiting in queue");
                let permit = slot
                    .semaphore
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|_| {
                        PipelineError::run_lock_conflict(format!(
                            "run slot for document {} is closed",
                            document_id
                        ))
                    });
                slot.waiting.fetch_sub(1, Ordering::SeqCst);
                Ok(RunGuard { _permit: permit? })
            }
        }
    }
}
