use crate::DbConnection;
use async_trait::async_trait;
use caseforge_core::{AuditStore, AuditStoreError};
use rusqlite::params;
use shared_types::{AuditAction, AuditEntry, AuditFilter, AuditOutcome};

/// Durable audit trail on rusqlite.
///
/// Appends are insert-only; nothing ever updates or deletes a row.
pub struct SqliteAuditStore {
    connection: DbConnection,
}

impl SqliteAuditStore {
    pub fn new(connection: DbConnection) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl AuditStore for SqliteAuditStore {
    async fn append(&self, entry: AuditEntry) -> Result<(), AuditStoreError> {
        let conn = self
            .connection
            .lock()
            .map_err(|e| AuditStoreError::OperationFailed(format!("Lock error: {}", e)))?;

        let detail_json = serde_json::to_string(&entry.detail)?;

        conn.execute(
            r#"
            INSERT INTO audit_entries
                (id, actor, action, target_id, outcome, detail, timestamp_ms, sequence)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                entry.id,
                entry.actor,
                entry.action.as_str(),
                entry.target_id,
                entry.outcome.as_str(),
                detail_json,
                entry.timestamp_ms,
                entry.sequence as i64,
            ],
        )
        .map_err(|e| AuditStoreError::OperationFailed(e.to_string()))?;

        Ok(())
    }

    async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, AuditStoreError> {
        let conn = self
            .connection
            .lock()
            .map_err(|e| AuditStoreError::OperationFailed(format!("Lock error: {}", e)))?;

        let mut sql = String::from(
            r#"
            SELECT id, actor, action, target_id, outcome, detail, timestamp_ms, sequence
            FROM audit_entries
            WHERE 1=1
            "#,
        );
        let mut bindings: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(actor) = &filter.actor {
            sql.push_str(" AND actor = ?");
            bindings.push(Box::new(actor.clone()));
        }
        if let Some(action) = &filter.action {
            sql.push_str(" AND action = ?");
            bindings.push(Box::new(action.as_str().to_string()));
        }
        if let Some(target) = &filter.target_id {
            sql.push_str(" AND target_id = ?");
            bindings.push(Box::new(target.clone()));
        }
        if let Some(from) = filter.from_ms {
            sql.push_str(" AND timestamp_ms >= ?");
            bindings.push(Box::new(from));
        }
        if let Some(to) = filter.to_ms {
            sql.push_str(" AND timestamp_ms <= ?");
            bindings.push(Box::new(to));
        }

        sql.push_str(" ORDER BY timestamp_ms ASC, sequence ASC");
        sql.push_str(" LIMIT ? OFFSET ?");
        let limit = filter.limit.map(|l| l as i64).unwrap_or(-1);
        bindings.push(Box::new(limit));
        bindings.push(Box::new(filter.offset as i64));

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| AuditStoreError::OperationFailed(e.to_string()))?;

        let params = rusqlite::params_from_iter(bindings.iter().map(|b| b.as_ref()));
        let rows = stmt
            .query_map(params, |row| {
                let action_str: String = row.get(2)?;
                let outcome_str: String = row.get(4)?;
                let detail_json: String = row.get(5)?;
                let sequence: i64 = row.get(7)?;

                Ok(AuditEntry {
                    id: row.get(0)?,
                    actor: row.get(1)?,
                    action: AuditAction::parse(&action_str).unwrap_or(AuditAction::Upload),
                    target_id: row.get(3)?,
                    outcome: AuditOutcome::parse(&outcome_str).unwrap_or(AuditOutcome::Failure),
                    detail: serde_json::from_str(&detail_json)
                        .unwrap_or(serde_json::Value::Null),
                    timestamp_ms: row.get(6)?,
                    sequence: sequence as u64,
                })
            })
            .map_err(|e| AuditStoreError::OperationFailed(e.to_string()))?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.map_err(|e| AuditStoreError::OperationFailed(e.to_string()))?);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::migrations;
    use std::sync::{Arc, Mutex};

    fn store() -> SqliteAuditStore {
        let mut conn = rusqlite::Connection::open_in_memory().unwrap();
        migrations::run_migrations(&mut conn).unwrap();
        SqliteAuditStore::new(Arc::new(Mutex::new(conn)))
    }

    fn entry(sequence: u64, actor: &str, action: AuditAction) -> AuditEntry {
        AuditEntry {
            id: format!("entry-{}", sequence),
            actor: actor.to_string(),
            action,
            target_id: "doc-1".to_string(),
            outcome: AuditOutcome::Success,
            detail: serde_json::json!({ "sequence": sequence }),
            timestamp_ms: 1_000 + sequence as i64,
            sequence,
        }
    }

    #[tokio::test]
    async fn test_append_and_query_roundtrip() {
        let store = store();
        store.append(entry(0, "alice", AuditAction::Upload)).await.unwrap();
        store
            .append(entry(1, "alice", AuditAction::Generate))
            .await
            .unwrap();

        let entries = store.query(&AuditFilter::default()).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, AuditAction::Upload);
        assert_eq!(entries[1].action, AuditAction::Generate);
        assert_eq!(entries[0].detail["sequence"], 0);
    }

    #[tokio::test]
    async fn test_query_filters_and_pagination() {
        let store = store();
        for i in 0..5 {
            let actor = if i % 2 == 0 { "alice" } else { "bob" };
            store
                .append(entry(i, actor, AuditAction::StatusChange))
                .await
                .unwrap();
        }

        let alice = store
            .query(&AuditFilter {
                actor: Some("alice".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(alice.len(), 3);

        let page = store
            .query(&AuditFilter {
                offset: 1,
                limit: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].sequence, 1);
    }

    #[tokio::test]
    async fn test_time_range_filter() {
        let store = store();
        for i in 0..4 {
            store.append(entry(i, "alice", AuditAction::Export)).await.unwrap();
        }

        let entries = store
            .query(&AuditFilter {
                from_ms: Some(1_001),
                to_ms: Some(1_002),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
    }
}
