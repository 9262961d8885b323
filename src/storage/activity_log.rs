//! Append-only activity log
//!
//! Every interesting user/admin event lands here with a JSON details blob.
//! No updates or deletes in normal operation; retention pruning is the
//! only writer besides `append`.

use std::str::FromStr;

use rusqlite::{params, Connection};
use serde_json::Value;

use crate::core::types::ActionType;
use crate::core::AppResult;

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub id: i64,
    pub user_id: i64,
    pub action_type: ActionType,
    pub details: Value,
    pub merchant_id: Option<i64>,
    pub created_at: String,
}

/// Appends one event. Failures are the caller's to log-and-ignore; the
/// log must never break a user flow.
pub fn append(
    conn: &Connection,
    user_id: i64,
    action: ActionType,
    details: Value,
    merchant_id: Option<i64>,
) -> AppResult<()> {
    conn.execute(
        "INSERT INTO activity_logs (user_id, action_type, details, merchant_id)
         VALUES (?1, ?2, ?3, ?4)",
        params![user_id, action.to_string(), details.to_string(), merchant_id],
    )?;
    Ok(())
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<LogEntry> {
    let action_text: String = row.get(2)?;
    let action_type = ActionType::from_str(&action_text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let details_text: String = row.get(3)?;

    Ok(LogEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        action_type,
        details: serde_json::from_str(&details_text).unwrap_or(Value::Null),
        merchant_id: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Events from the last `days` days, newest first.
pub fn recent(conn: &Connection, days: i64, limit: usize) -> AppResult<Vec<LogEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, action_type, details, merchant_id, created_at
         FROM activity_logs
         WHERE created_at >= datetime('now', '-' || ?1 || ' days')
         ORDER BY created_at DESC, id DESC
         LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![days, limit as i64], row_to_entry)?;
    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

/// One user's trail, newest first.
pub fn for_user(conn: &Connection, user_id: i64, limit: usize) -> AppResult<Vec<LogEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, action_type, details, merchant_id, created_at
         FROM activity_logs WHERE user_id = ?1
         ORDER BY created_at DESC, id DESC LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![user_id, limit as i64], row_to_entry)?;
    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

/// Retention sweep. Returns the pruned row count.
pub fn prune_older_than(conn: &Connection, days: i64) -> AppResult<usize> {
    let removed = conn.execute(
        "DELETE FROM activity_logs WHERE created_at < datetime('now', '-' || ?1 || ' days')",
        params![days],
    )?;
    if removed > 0 {
        log::info!("Pruned {} activity log row(s) older than {} days", removed, days);
    }
    Ok(removed)
}
