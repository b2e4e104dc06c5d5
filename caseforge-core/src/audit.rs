//! Append-only audit trail.
//!
//! Every state-changing action writes exactly one entry, synchronously,
//! before the triggering operation reports success. A failed audit
//! write after the primary effect succeeded does not roll the effect
//! back; it is logged and surfaced to the caller as a warning.

use async_trait::async_trait;
use chrono::Utc;
use shared_types::{AuditAction, AuditEntry, AuditFilter, AuditOutcome};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Durably record one entry. Entries are never mutated or deleted.
    async fn append(&self, entry: AuditEntry) -> Result<(), AuditStoreError>;

    /// Entries matching `filter`, ascending by (timestamp, sequence),
    /// with the filter's offset/limit applied after ordering.
    async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, AuditStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AuditStoreError {
    #[error("Audit store operation failed: {0}")]
    OperationFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// In-memory audit store used by tests and the default wiring
#[derive(Default)]
pub struct InMemoryAuditStore {
    entries: Mutex<Vec<AuditEntry>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(&self, entry: AuditEntry) -> Result<(), AuditStoreError> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }

    async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, AuditStoreError> {
        let mut matched: Vec<AuditEntry> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect();

        matched.sort_by_key(|entry| (entry.timestamp_ms, entry.sequence));

        let matched = matched.into_iter().skip(filter.offset);
        Ok(match filter.limit {
            Some(limit) => matched.take(limit).collect(),
            None => matched.collect(),
        })
    }
}

/// Front door for audit writes: stamps entries with a monotonic
/// sequence and applies the at-least-once write policy.
pub struct AuditLogger {
    store: Arc<dyn AuditStore>,
    sequence: AtomicU64,
}

impl AuditLogger {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self {
            store,
            sequence: AtomicU64::new(0),
        }
    }

    /// Record one entry. Returns a warning message instead of an error
    /// when the write fails: the caller's primary effect stands, but
    /// the failure must not be silently dropped.
    pub async fn record(
        &self,
        actor: &str,
        action: AuditAction,
        target_id: &str,
        outcome: AuditOutcome,
        detail: serde_json::Value,
    ) -> Option<String> {
        let entry = AuditEntry {
            id: uuid::Uuid::new_v4().to_string(),
            actor: actor.to_string(),
            action,
            target_id: target_id.to_string(),
            outcome,
            detail,
            timestamp_ms: Utc::now().timestamp_millis(),
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
        };

        match self.store.append(entry).await {
            Ok(()) => None,
            Err(e) => {
                let warning = format!(
                    "audit write failed for {} on {}: {}",
                    action.as_str(),
                    target_id,
                    e
                );
                tracing::warn!(
                    actor,
                    action = action.as_str(),
                    target_id,
                    error = %e,
                    "Audit write failed; primary effect stands"
                );
                Some(warning)
            }
        }
    }

    pub async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, AuditStoreError> {
        self.store.query(filter).await
    }
}
