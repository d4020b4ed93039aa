//! Append-only audit log.
//!
//! Every request, grant, denial, and use the wallet processes is appended
//! here. Rows are never updated or deleted; the assigned `id` supplies a
//! total order. [`AuditLog::monthly_spending`] reconstructs a credential's
//! current-month spend from past `credential_used` rows rather than
//! maintaining a counter — a single source of truth at the cost of a scan,
//! which the `(event, credential_name, timestamp)` index keeps cheap.

pub mod error;
pub mod types;

pub use error::{AuditError, Result};
pub use types::{AuditEntry, AuditFilters, Event};

use chrono::Utc;
use rusqlite::{Connection, ToSql, params};

/// Append-only, queryable audit log backed by SQLite.
pub struct AuditLog {
    conn: Connection,
}

impl AuditLog {
    /// Open (or create) an audit database at `path`.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!(path = %path.display(), "opening audit log");

        let conn = Connection::open(path)?;
        Self::configure_connection(&conn)?;
        let log = Self { conn };
        log.run_migrations()?;
        Ok(log)
    }

    /// Open an in-memory audit log (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure_connection(&conn)?;
        let log = Self { conn };
        log.run_migrations()?;
        Ok(log)
    }

    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS audit_log (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp       TEXT NOT NULL,
                event           TEXT NOT NULL,
                policy          TEXT,
                agent_id        TEXT,
                skill_id        TEXT,
                purpose         TEXT,
                token_id        TEXT,
                credential_name TEXT,
                scope           TEXT,
                context         TEXT,
                outcome         TEXT,
                approval        TEXT,
                details         TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_audit_log_event ON audit_log(event);
            CREATE INDEX IF NOT EXISTS idx_audit_log_timestamp ON audit_log(timestamp);
            CREATE INDEX IF NOT EXISTS idx_audit_log_agent_id ON audit_log(agent_id);
            CREATE INDEX IF NOT EXISTS idx_audit_log_policy ON audit_log(policy);
            CREATE INDEX IF NOT EXISTS idx_audit_log_credential_month
                ON audit_log(event, credential_name, timestamp);",
        )?;
        Ok(())
    }

    /// Append `entry`, assigning an `id` and, if omitted, a `timestamp`.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::ValidationError`] if `entry.event` is unset.
    pub fn log(&self, entry: AuditEntry) -> Result<i64> {
        let event = entry
            .event
            .ok_or_else(|| AuditError::ValidationError("event is required".to_string()))?;
        let timestamp = entry.timestamp.unwrap_or_else(now_iso);

        let scope_json = entry.scope.as_ref().map(serde_json::to_string).transpose()?;
        let context_json = entry.context.as_ref().map(serde_json::to_string).transpose()?;

        self.conn.execute(
            "INSERT INTO audit_log
                (timestamp, event, policy, agent_id, skill_id, purpose, token_id, credential_name, scope, context, outcome, approval, details)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                timestamp,
                event.as_str(),
                entry.policy,
                entry.agent_id,
                entry.skill_id,
                entry.purpose,
                entry.token_id,
                entry.credential_name,
                scope_json,
                context_json,
                entry.outcome,
                entry.approval,
                entry.details,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        tracing::trace!(id = id, event = %event, "audit entry recorded");
        Ok(id)
    }

    /// Query the audit log, newest-first by identifier.
    pub fn query(&self, filters: &AuditFilters) -> Result<Vec<AuditEntry>> {
        let mut sql = String::from(
            "SELECT id, timestamp, event, policy, agent_id, skill_id, purpose, token_id, credential_name, scope, context, outcome, approval, details
             FROM audit_log WHERE 1=1",
        );
        let mut bound: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(event) = &filters.event {
            sql.push_str(" AND event = ?");
            bound.push(Box::new(event.as_str().to_string()));
        }
        if let Some(policy) = &filters.policy {
            sql.push_str(" AND policy = ?");
            bound.push(Box::new(policy.clone()));
        }
        if let Some(agent_id) = &filters.agent_id {
            sql.push_str(" AND agent_id = ?");
            bound.push(Box::new(agent_id.clone()));
        }
        if let Some(since) = &filters.since {
            sql.push_str(" AND timestamp >= ?");
            bound.push(Box::new(since.clone()));
        }
        sql.push_str(" ORDER BY id DESC");
        if let Some(limit) = filters.limit {
            sql.push_str(" LIMIT ?");
            bound.push(Box::new(limit as i64));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let param_refs: Vec<&dyn ToSql> = bound.iter().map(|b| b.as_ref()).collect();

        let rows = stmt.query_map(param_refs.as_slice(), map_row)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// Sum the `amount` field of `details` across `credential_used` rows for
    /// `credential_name` whose timestamp starts with `month` (an ISO
    /// `YYYY-MM` prefix; defaults to the current UTC month).
    ///
    /// Entries with missing, unparseable, or non-numeric `amount` are
    /// silently skipped — this is a textual prefix match, not a parsed date
    /// window, and relies on every timestamp being written in the same
    /// canonical form.
    pub fn monthly_spending(&self, credential_name: &str, month: Option<&str>) -> Result<f64> {
        let prefix = month.map(str::to_string).unwrap_or_else(current_utc_month);
        let like_pattern = format!("{prefix}%");

        let mut stmt = self.conn.prepare(
            "SELECT details FROM audit_log
             WHERE event = ?1 AND credential_name = ?2 AND timestamp LIKE ?3",
        )?;

        let detail_rows: Vec<Option<String>> = stmt
            .query_map(
                params![Event::CredentialUsed.as_str(), credential_name, like_pattern],
                |row| row.get(0),
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut total = 0.0;
        for details in detail_rows.into_iter().flatten() {
            if let Ok(serde_json::Value::Object(map)) = serde_json::from_str(&details) {
                if let Some(amount) = map.get("amount").and_then(serde_json::Value::as_f64) {
                    total += amount;
                }
            }
        }

        Ok(total)
    }

    /// Explicit lifecycle teardown. SQLite has no key material to zero, but
    /// every component in the pipeline exposes a `close()` for symmetry and
    /// so the caller never has to special-case this one.
    pub fn close(self) {
        tracing::info!("audit log closed");
    }
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditEntry> {
    let scope_text: Option<String> = row.get(9)?;
    let context_text: Option<String> = row.get(10)?;

    Ok(AuditEntry {
        id: Some(row.get(0)?),
        timestamp: Some(row.get(1)?),
        event: Event::parse(&row.get::<_, String>(2)?),
        policy: row.get(3)?,
        agent_id: row.get(4)?,
        skill_id: row.get(5)?,
        purpose: row.get(6)?,
        token_id: row.get(7)?,
        credential_name: row.get(8)?,
        scope: scope_text.and_then(|t| serde_json::from_str(&t).ok()),
        context: context_text.and_then(|t| serde_json::from_str(&t).ok()),
        outcome: row.get(11)?,
        approval: row.get(12)?,
        details: row.get(13)?,
    })
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn current_utc_month() -> String {
    Utc::now().format("%Y-%m").to_string()
}


#[cfg(test)]
impl AuditEntry {
    /// Force a specific timestamp, for deterministic monthly-spend tests.
    fn with_timestamp_for_test(mut self, month_prefix: &str) -> Self {
        self.timestamp = Some(format!("{month_prefix}-15T00:00:00.000Z"));
        self
    }
}
