//! Persisted onboarding drafts
//!
//! The accumulated answer map is written to the `fsm_states` table after
//! every step so an in-progress registration survives process restarts.
//! One row per user; stale rows are swept by the cleanup command.

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use crate::core::AppResult;

#[derive(Debug, Clone)]
pub struct StoredDraft {
    pub user_id: i64,
    pub step: u8,
    pub answers: Value,
    pub updated_at: String,
}

/// Inserts or replaces the user's draft.
pub fn upsert(conn: &Connection, user_id: i64, step: u8, answers: &Value) -> AppResult<()> {
    conn.execute(
        "INSERT INTO fsm_states (user_id, step, answers, updated_at)
         VALUES (?1, ?2, ?3, datetime('now'))
         ON CONFLICT(user_id) DO UPDATE SET
             step = excluded.step,
             answers = excluded.answers,
             updated_at = excluded.updated_at",
        params![user_id, step as i64, answers.to_string()],
    )?;
    Ok(())
}

/// Loads the user's draft, if any. Unparseable stored JSON is treated as
/// no draft (and cleared) rather than wedging the dialog forever.
pub fn load(conn: &Connection, user_id: i64) -> AppResult<Option<StoredDraft>> {
    let row: Option<(i64, String, String)> = conn
        .query_row(
            "SELECT step, answers, updated_at FROM fsm_states WHERE user_id = ?",
            params![user_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;

    let Some((step, answers_text, updated_at)) = row else {
        return Ok(None);
    };

    match serde_json::from_str(&answers_text) {
        Ok(answers) => Ok(Some(StoredDraft {
            user_id,
            step: step as u8,
            answers,
            updated_at,
        })),
        Err(e) => {
            log::error!("Corrupt draft for user {}: {}; clearing", user_id, e);
            clear(conn, user_id)?;
            Ok(None)
        }
    }
}

/// Drops the user's draft (flow completed or cancelled).
pub fn clear(conn: &Connection, user_id: i64) -> AppResult<()> {
    conn.execute("DELETE FROM fsm_states WHERE user_id = ?", params![user_id])?;
    Ok(())
}

/// Sweeps drafts untouched for longer than `ttl_hours`.
pub fn sweep_stale(conn: &Connection, ttl_hours: i64) -> AppResult<usize> {
    let removed = conn.execute(
        "DELETE FROM fsm_states WHERE updated_at < datetime('now', '-' || ?1 || ' hours')",
        params![ttl_hours],
    )?;
    if removed > 0 {
        log::info!("Swept {} stale draft(s)", removed);
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db::open_in_memory;
    use serde_json::json;

    #[test]
    fn test_upsert_and_load_round_trip() {
        let conn = open_in_memory().unwrap();
        let answers = json!({"merchant_type": "teacher", "city_id": 3});

        upsert(&conn, 42, 4, &answers).unwrap();
        let draft = load(&conn, 42).unwrap().unwrap();
        assert_eq!(draft.step, 4);
        assert_eq!(draft.answers["merchant_type"], "teacher");

        // A second upsert replaces, never duplicates.
        upsert(&conn, 42, 5, &json!({"merchant_type": "business"})).unwrap();
        let draft = load(&conn, 42).unwrap().unwrap();
        assert_eq!(draft.step, 5);
        assert_eq!(draft.answers["merchant_type"], "business");

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM fsm_states", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_clear_and_missing_user() {
        let conn = open_in_memory().unwrap();
        assert!(load(&conn, 1).unwrap().is_none());

        upsert(&conn, 1, 2, &json!({})).unwrap();
        clear(&conn, 1).unwrap();
        assert!(load(&conn, 1).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_answers_cleared_on_load() {
        let conn = open_in_memory().unwrap();
        conn.execute(
            "INSERT INTO fsm_states (user_id, step, answers) VALUES (9, 3, 'not json')",
            [],
        )
        .unwrap();

        assert!(load(&conn, 9).unwrap().is_none());
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM fsm_states", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 0);
    }

    #[test]
    fn test_sweep_stale() {
        let conn = open_in_memory().unwrap();
        upsert(&conn, 1, 1, &json!({})).unwrap();
        conn.execute(
            "INSERT INTO fsm_states (user_id, step, answers, updated_at)
             VALUES (2, 1, '{}', datetime('now', '-2 days'))",
            [],
        )
        .unwrap();

        assert_eq!(sweep_stale(&conn, 24).unwrap(), 1);
        assert!(load(&conn, 1).unwrap().is_some());
        assert!(load(&conn, 2).unwrap().is_none());
    }
}
