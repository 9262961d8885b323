//! Admin-configured posting time slots
//!
//! A slot is a daily time label ("20:00"); merchants combine it with a
//! calendar date to form the contended (date, time) occupancy key.

use rusqlite::{params, Connection};

use crate::core::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct TimeSlot {
    pub id: i64,
    pub time_str: String,
    pub is_active: bool,
    pub display_order: i64,
}

fn row_to_slot(row: &rusqlite::Row<'_>) -> rusqlite::Result<TimeSlot> {
    Ok(TimeSlot {
        id: row.get(0)?,
        time_str: row.get(1)?,
        is_active: row.get::<_, i64>(2)? != 0,
        display_order: row.get(3)?,
    })
}

pub fn add(conn: &Connection, time_str: &str, display_order: i64) -> AppResult<i64> {
    conn.execute(
        "INSERT INTO posting_time_slots (time_str, display_order) VALUES (?1, ?2)",
        params![time_str.trim(), display_order],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn all(conn: &Connection) -> AppResult<Vec<TimeSlot>> {
    let mut stmt = conn.prepare(
        "SELECT id, time_str, is_active, display_order FROM posting_time_slots
         ORDER BY is_active DESC, display_order ASC, time_str ASC",
    )?;
    let rows = stmt.query_map([], row_to_slot)?;
    let mut slots = Vec::new();
    for row in rows {
        slots.push(row?);
    }
    Ok(slots)
}

/// Slots offered to merchants at step 9.
pub fn active(conn: &Connection) -> AppResult<Vec<TimeSlot>> {
    let mut stmt = conn.prepare(
        "SELECT id, time_str, is_active, display_order FROM posting_time_slots
         WHERE is_active = 1 ORDER BY display_order ASC, time_str ASC",
    )?;
    let rows = stmt.query_map([], row_to_slot)?;
    let mut slots = Vec::new();
    for row in rows {
        slots.push(row?);
    }
    Ok(slots)
}

pub fn toggle(conn: &Connection, slot_id: i64) -> AppResult<bool> {
    let touched = conn.execute(
        "UPDATE posting_time_slots
         SET is_active = 1 - is_active, updated_at = datetime('now')
         WHERE id = ?",
        params![slot_id],
    )?;
    if touched == 0 {
        return Err(AppError::NotFound(format!("time slot {}", slot_id)));
    }
    let active: i64 = conn.query_row(
        "SELECT is_active FROM posting_time_slots WHERE id = ?",
        params![slot_id],
        |row| row.get(0),
    )?;
    Ok(active != 0)
}

pub fn update_time(conn: &Connection, slot_id: i64, time_str: &str) -> AppResult<()> {
    let touched = conn.execute(
        "UPDATE posting_time_slots SET time_str = ?1, updated_at = datetime('now') WHERE id = ?2",
        params![time_str.trim(), slot_id],
    )?;
    if touched == 0 {
        return Err(AppError::NotFound(format!("time slot {}", slot_id)));
    }
    Ok(())
}

pub fn delete(conn: &Connection, slot_id: i64) -> AppResult<()> {
    let removed = conn.execute("DELETE FROM posting_time_slots WHERE id = ?", params![slot_id])?;
    if removed == 0 {
        return Err(AppError::NotFound(format!("time slot {}", slot_id)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db::open_in_memory;

    #[test]
    fn test_active_ordering_and_toggle() {
        let conn = open_in_memory().unwrap();
        add(&conn, "21:00", 2).unwrap();
        let first = add(&conn, "20:00", 1).unwrap();

        let slots = active(&conn).unwrap();
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].time_str, "20:00");

        assert!(!toggle(&conn, first).unwrap());
        let slots = active(&conn).unwrap();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].time_str, "21:00");
        assert_eq!(all(&conn).unwrap().len(), 2);
    }

    #[test]
    fn test_update_and_delete() {
        let conn = open_in_memory().unwrap();
        let id = add(&conn, "19:30", 1).unwrap();

        update_time(&conn, id, "19:45").unwrap();
        assert_eq!(active(&conn).unwrap()[0].time_str, "19:45");

        delete(&conn, id).unwrap();
        assert!(active(&conn).unwrap().is_empty());
        assert!(matches!(delete(&conn, id), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_duplicate_time_rejected() {
        let conn = open_in_memory().unwrap();
        add(&conn, "20:00", 1).unwrap();
        assert!(add(&conn, "20:00", 2).is_err());
    }
}
