//! Service keywords and the merchant-keyword many-to-many set
//!
//! The selection set per merchant is capped; replacing the set is a
//! delete-and-insert inside one call.

use rusqlite::{params, Connection};

use crate::core::config::onboarding::MAX_KEYWORDS;
use crate::core::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct Keyword {
    pub id: i64,
    pub name: String,
    pub is_active: bool,
    pub display_order: i64,
}

fn row_to_keyword(row: &rusqlite::Row<'_>) -> rusqlite::Result<Keyword> {
    Ok(Keyword {
        id: row.get(0)?,
        name: row.get(1)?,
        is_active: row.get::<_, i64>(2)? != 0,
        display_order: row.get(3)?,
    })
}

pub fn add(conn: &Connection, name: &str, display_order: i64) -> AppResult<i64> {
    conn.execute(
        "INSERT INTO keywords (name, display_order) VALUES (?1, ?2)",
        params![name.trim(), display_order],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Every keyword regardless of active flag (admin view).
pub fn all(conn: &Connection) -> AppResult<Vec<Keyword>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, is_active, display_order FROM keywords
         ORDER BY is_active DESC, display_order ASC, id ASC",
    )?;
    let rows = stmt.query_map([], row_to_keyword)?;
    let mut keywords = Vec::new();
    for row in rows {
        keywords.push(row?);
    }
    Ok(keywords)
}

/// Keywords offered at onboarding step 8.
pub fn get_active(conn: &Connection) -> AppResult<Vec<Keyword>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, is_active, display_order FROM keywords
         WHERE is_active = 1 ORDER BY display_order ASC, id ASC",
    )?;
    let rows = stmt.query_map([], row_to_keyword)?;
    let mut keywords = Vec::new();
    for row in rows {
        keywords.push(row?);
    }
    Ok(keywords)
}

pub fn toggle(conn: &Connection, keyword_id: i64) -> AppResult<bool> {
    let touched = conn.execute(
        "UPDATE keywords SET is_active = 1 - is_active WHERE id = ?",
        params![keyword_id],
    )?;
    if touched == 0 {
        return Err(AppError::NotFound(format!("keyword {}", keyword_id)));
    }
    let active: i64 = conn.query_row(
        "SELECT is_active FROM keywords WHERE id = ?",
        params![keyword_id],
        |row| row.get(0),
    )?;
    Ok(active != 0)
}

pub fn delete(conn: &Connection, keyword_id: i64) -> AppResult<()> {
    conn.execute("DELETE FROM merchant_keywords WHERE keyword_id = ?", params![keyword_id])?;
    let removed = conn.execute("DELETE FROM keywords WHERE id = ?", params![keyword_id])?;
    if removed == 0 {
        return Err(AppError::NotFound(format!("keyword {}", keyword_id)));
    }
    Ok(())
}

/// The merchant's current selection, in display order.
pub fn get_for_merchant(conn: &Connection, merchant_id: i64) -> AppResult<Vec<Keyword>> {
    let mut stmt = conn.prepare(
        "SELECT k.id, k.name, k.is_active, k.display_order
         FROM merchant_keywords mk
         JOIN keywords k ON k.id = mk.keyword_id
         WHERE mk.merchant_id = ?
         ORDER BY k.display_order ASC, k.id ASC",
    )?;
    let rows = stmt.query_map(params![merchant_id], row_to_keyword)?;
    let mut keywords = Vec::new();
    for row in rows {
        keywords.push(row?);
    }
    Ok(keywords)
}

/// Replaces the merchant's keyword set. Rejects oversized selections.
pub fn set_for_merchant(conn: &Connection, merchant_id: i64, keyword_ids: &[i64]) -> AppResult<()> {
    if keyword_ids.len() > MAX_KEYWORDS {
        return Err(AppError::Validation(format!(
            "at most {} keywords may be selected",
            MAX_KEYWORDS
        )));
    }

    conn.execute("DELETE FROM merchant_keywords WHERE merchant_id = ?", params![merchant_id])?;
    for keyword_id in keyword_ids {
        conn.execute(
            "INSERT OR IGNORE INTO merchant_keywords (merchant_id, keyword_id) VALUES (?1, ?2)",
            params![merchant_id, keyword_id],
        )?;
    }
    Ok(())
}
