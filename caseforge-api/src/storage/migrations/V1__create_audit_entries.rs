/// Create the audit_entries table: append-only, never updated or
/// deleted, ordered by (timestamp_ms, sequence)
pub fn migration() -> String {
    r#"
CREATE TABLE audit_entries (
    id TEXT PRIMARY KEY,
    actor TEXT NOT NULL,
    action TEXT NOT NULL CHECK (action IN ('upload', 'extract', 'generate', 'regenerate', 'status_change', 'export')),
    target_id TEXT NOT NULL,
    outcome TEXT NOT NULL CHECK (outcome IN ('success', 'failure')),
    detail TEXT NOT NULL,
    timestamp_ms INTEGER NOT NULL,
    sequence INTEGER NOT NULL
);

CREATE INDEX idx_audit_entries_order
    ON audit_entries(timestamp_ms, sequence);

CREATE INDEX idx_audit_entries_actor
    ON audit_entries(actor);

CREATE INDEX idx_audit_entries_action
    ON audit_entries(action);

CREATE INDEX idx_audit_entries_target
    ON audit_entries(target_id);
"#
    .to_string()
}
