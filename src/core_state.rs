//! Shared application state for the HTTP layer.
//!
//! Holds the database location and the buffered audit log. Every request
//! opens its own connection through [`CoreState::open_db`].

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::auth::Actor;
use crate::db;
use crate::db::repository::{format_timestamp, now_timestamp};

/// Maximum audit buffer size before flush.
const AUDIT_BUFFER_CAPACITY: usize = 100;

/// Audit rows older than this are pruned on flush.
const AUDIT_RETENTION_DAYS: i64 = 90;

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    db_path: PathBuf,
    audit: AuditLogger,
}

impl CoreState {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            audit: AuditLogger::new(),
        }
    }

    /// Creates the parent directory and applies migrations once, so the
    /// first request does not pay for it.
    pub fn initialize(&self) -> Result<(), CoreError> {
        if let Some(parent) = self.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::Io(e.to_string()))?;
        }
        self.open_db()?;
        tracing::info!(db_path = %self.db_path.display(), "Database ready");
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Open a database connection. Migrations are idempotent.
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        db::open_database(&self.db_path).map_err(CoreError::Database)
    }

    // ── Audit logging ───────────────────────────────────────

    /// Log an access event. Auto-flushes to DB when buffer is full.
    pub fn log_access(&self, actor: &Actor, action: &str, entity: &str) {
        let needs_flush = self.audit.log(actor, action, entity);
        if needs_flush {
            if let Err(e) = self.flush_and_prune_audit() {
                tracing::warn!("Auto-flush audit failed: {e}");
            }
        }
    }

    /// Get the current audit buffer contents.
    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.entries()
    }

    /// The actor's latest audited requests, newest first. Pending buffer
    /// entries are flushed before reading.
    pub fn recent_activity(
        &self,
        actor: &Actor,
        limit: u32,
    ) -> Result<Vec<ActivityEntry>, CoreError> {
        let conn = self.open_db()?;
        self.audit.flush_to_db(&conn)?;
        let rows = db::repository::query_audit_by_actor(&conn, &actor.audit_label(), limit)?;
        Ok(rows
            .into_iter()
            .map(|(timestamp, action, entity)| ActivityEntry {
                timestamp,
                action,
                entity,
            })
            .collect())
    }

    /// Flush audit buffer to DB and prune entries past retention.
    pub fn flush_and_prune_audit(&self) -> Result<(), CoreError> {
        let conn = self.open_db()?;
        self.audit.flush_to_db(&conn)?;
        if let Err(e) = db::repository::prune_audit_log(&conn, AUDIT_RETENTION_DAYS) {
            tracing::warn!("Failed to prune audit log: {e}");
        }
        Ok(())
    }
}

/// Errors from CoreState operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Internal lock error")]
    LockPoisoned,
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
    #[error("Storage error: {0}")]
    Io(String),
}

// ═══════════════════════════════════════════════════════════
// Audit logger
// ═══════════════════════════════════════════════════════════

/// In-memory audit log buffer. Entries are flushed to SQLite
/// when the buffer reaches capacity or on explicit flush.
pub struct AuditLogger {
    buffer: Mutex<Vec<AuditEntry>>,
}

/// A single audit log entry.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub timestamp: chrono::NaiveDateTime,
    pub actor: String,
    pub action: String,
    pub entity: String,
}

impl AuditLogger {
    pub fn new() -> Self {
        Self {
            buffer: Mutex::new(Vec::with_capacity(AUDIT_BUFFER_CAPACITY)),
        }
    }

    /// Log an access event to the in-memory buffer.
    /// Returns `true` if the buffer has reached flush threshold.
    pub fn log(&self, actor: &Actor, action: &str, entity: &str) -> bool {
        if let Ok(mut buf) = self.buffer.lock() {
            buf.push(AuditEntry {
                timestamp: now_timestamp(),
                actor: actor.audit_label(),
                action: action.to_string(),
                entity: entity.to_string(),
            });
            buf.len() >= AUDIT_BUFFER_CAPACITY
        } else {
            false
        }
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.buffer
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default()
    }

    pub fn drain(&self) -> Result<Vec<AuditEntry>, CoreError> {
        self.buffer
            .lock()
            .map(|mut buf| buf.drain(..).collect())
            .map_err(|_| CoreError::LockPoisoned)
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.lock().map(|buf| buf.len()).unwrap_or(0)
    }

    /// Write buffered entries to SQLite.
    pub fn flush_to_db(&self, conn: &rusqlite::Connection) -> Result<usize, CoreError> {
        let entries = self.drain()?;
        if entries.is_empty() {
            return Ok(0);
        }

        let tuples: Vec<(String, String, String, String)> = entries
            .iter()
            .map(|e| {
                (
                    format_timestamp(&e.timestamp),
                    e.actor.clone(),
                    e.action.clone(),
                    e.entity.clone(),
                )
            })
            .collect();

        let count = tuples.len();
        db::repository::insert_audit_entries(conn, &tuples)?;

        tracing::debug!(count, "Flushed audit entries to database");
        Ok(count)
    }
}

/// A persisted audit row as shown to its actor.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ActivityEntry {
    pub timestamp: String,
    pub action: String,
    pub entity: String,
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_state() -> (tempfile::TempDir, CoreState) {
        let dir = tempfile::tempdir().unwrap();
        let state = CoreState::new(dir.path().join("nested").join("care.db"));
        (dir, state)
    }

    #[test]
    fn initialize_creates_database() {
        let (_dir, state) = temp_state();
        state.initialize().unwrap();
        assert!(state.db_path().exists());
        let conn = state.open_db().unwrap();
        assert_eq!(db::sqlite::count_tables(&conn).unwrap(), 13);
    }

    #[test]
    fn audit_buffers_until_flush() {
        let (_dir, state) = temp_state();
        state.initialize().unwrap();
        let actor = Actor::doctor(Uuid::new_v4());

        state.log_access(&actor, "referral_accept", "referral");
        state.log_access(&actor, "referral_view", "referral");
        assert_eq!(state.audit_entries().len(), 2);

        state.flush_and_prune_audit().unwrap();
        assert!(state.audit_entries().is_empty());

        let conn = state.open_db().unwrap();
        let rows =
            db::repository::query_audit_by_actor(&conn, &actor.audit_label(), 10).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].1, "referral_view");
    }

    #[test]
    fn recent_activity_includes_buffered_entries() {
        let (_dir, state) = temp_state();
        state.initialize().unwrap();
        let actor = Actor::patient(Uuid::new_v4());
        let other = Actor::doctor(Uuid::new_v4());

        state.log_access(&actor, "GET /api/me", "status:200");
        state.log_access(&other, "GET /api/me", "status:200");
        state.log_access(&actor, "GET /api/appointments", "status:200");

        let activity = state.recent_activity(&actor, 10).unwrap();
        assert_eq!(activity.len(), 2);
        assert_eq!(activity[0].action, "GET /api/appointments");
        assert!(state.audit_entries().is_empty());
    }

    #[test]
    fn log_reports_capacity() {
        let logger = AuditLogger::new();
        let actor = Actor::patient(Uuid::new_v4());
        for i in 1..AUDIT_BUFFER_CAPACITY {
            assert!(!logger.log(&actor, "read", "note"), "flushed early at {i}");
        }
        assert!(logger.log(&actor, "read", "note"));
        assert_eq!(logger.buffer_len(), AUDIT_BUFFER_CAPACITY);
    }

    #[test]
    fn flush_empty_is_noop() {
        let conn = db::sqlite::open_memory_database().unwrap();
        assert_eq!(AuditLogger::new().flush_to_db(&conn).unwrap(), 0);
    }
}
