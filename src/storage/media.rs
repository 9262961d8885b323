//! Merchant media gallery
//!
//! Each merchant carries an ordered list of at most six photos/videos.
//! Uploads past the cap overwrite the oldest entry (lowest sort order)
//! instead of being rejected; submission requires exactly six.

use std::str::FromStr;

use rusqlite::{params, Connection};

use crate::core::config::onboarding::MEDIA_REQUIRED;
use crate::core::types::MediaKind;
use crate::core::AppResult;

#[derive(Debug, Clone)]
pub struct MediaItem {
    pub id: i64,
    pub merchant_id: i64,
    pub telegram_file_id: String,
    pub media_kind: MediaKind,
    pub sort_order: i64,
}

/// All media for a merchant, oldest first.
pub fn list_for_merchant(conn: &Connection, merchant_id: i64) -> AppResult<Vec<MediaItem>> {
    let mut stmt = conn.prepare(
        "SELECT id, merchant_id, telegram_file_id, media_kind, sort_order
         FROM media WHERE merchant_id = ? ORDER BY sort_order ASC",
    )?;
    let rows = stmt.query_map(params![merchant_id], |row| {
        let kind_text: String = row.get(3)?;
        let media_kind = MediaKind::from_str(&kind_text).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;
        Ok(MediaItem {
            id: row.get(0)?,
            merchant_id: row.get(1)?,
            telegram_file_id: row.get(2)?,
            media_kind,
            sort_order: row.get(4)?,
        })
    })?;

    let mut items = Vec::new();
    for row in rows {
        items.push(row?);
    }
    Ok(items)
}

pub fn count_for_merchant(conn: &Connection, merchant_id: i64) -> AppResult<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM media WHERE merchant_id = ?",
        params![merchant_id],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

/// Stores one uploaded file, ring-buffer style.
///
/// Below the cap the file is appended with the next sort order; at the cap
/// the oldest row is rewritten in place and moved to the end of the order.
/// Returns the resulting media count (never exceeds the cap).
pub fn add(conn: &Connection, merchant_id: i64, telegram_file_id: &str, kind: MediaKind) -> AppResult<usize> {
    let next_order: i64 = conn.query_row(
        "SELECT COALESCE(MAX(sort_order), 0) + 1 FROM media WHERE merchant_id = ?",
        params![merchant_id],
        |row| row.get(0),
    )?;

    let count = count_for_merchant(conn, merchant_id)?;
    if count < MEDIA_REQUIRED {
        conn.execute(
            "INSERT INTO media (merchant_id, telegram_file_id, media_kind, sort_order)
             VALUES (?1, ?2, ?3, ?4)",
            params![merchant_id, telegram_file_id, kind.to_string(), next_order],
        )?;
        return Ok(count + 1);
    }

    // At capacity: replace the oldest entry and make it the newest.
    conn.execute(
        "UPDATE media
         SET telegram_file_id = ?1, media_kind = ?2, sort_order = ?3
         WHERE id = (
             SELECT id FROM media WHERE merchant_id = ?4
             ORDER BY sort_order ASC LIMIT 1
         )",
        params![telegram_file_id, kind.to_string(), next_order, merchant_id],
    )?;
    log::debug!("Media ring buffer replaced oldest item for merchant {}", merchant_id);
    Ok(count)
}

/// Removes the whole gallery. Part of the admin reject reset: the
/// merchant re-uploads from scratch before resubmitting.
pub fn clear_for_merchant(conn: &Connection, merchant_id: i64) -> AppResult<usize> {
    let removed = conn.execute("DELETE FROM media WHERE merchant_id = ?", params![merchant_id])?;
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db::open_in_memory;
    use crate::storage::merchants;

    #[test]
    fn test_add_up_to_cap() {
        let conn = open_in_memory().unwrap();
        let merchant = merchants::create_placeholder(&conn, 1).unwrap();

        for i in 1..=6 {
            let count = add(&conn, merchant, &format!("file-{}", i), MediaKind::Photo).unwrap();
            assert_eq!(count, i);
        }

        let items = list_for_merchant(&conn, merchant).unwrap();
        assert_eq!(items.len(), 6);
        assert_eq!(items[0].telegram_file_id, "file-1");
        assert_eq!(items[5].telegram_file_id, "file-6");
    }

    #[test]
    fn test_seventh_upload_overwrites_oldest() {
        let conn = open_in_memory().unwrap();
        let merchant = merchants::create_placeholder(&conn, 1).unwrap();

        for i in 1..=6 {
            add(&conn, merchant, &format!("file-{}", i), MediaKind::Photo).unwrap();
        }
        let count = add(&conn, merchant, "file-7", MediaKind::Video).unwrap();
        assert_eq!(count, 6, "ring buffer must hold the cap");

        let items = list_for_merchant(&conn, merchant).unwrap();
        assert_eq!(items.len(), 6);
        // file-1 was the oldest and is gone; file-7 is now the newest.
        assert!(items.iter().all(|m| m.telegram_file_id != "file-1"));
        assert_eq!(items.first().unwrap().telegram_file_id, "file-2");
        let newest = items.last().unwrap();
        assert_eq!(newest.telegram_file_id, "file-7");
        assert_eq!(newest.media_kind, MediaKind::Video);
    }

    #[test]
    fn test_ring_buffer_keeps_rotating() {
        let conn = open_in_memory().unwrap();
        let merchant = merchants::create_placeholder(&conn, 1).unwrap();

        for i in 1..=9 {
            add(&conn, merchant, &format!("file-{}", i), MediaKind::Photo).unwrap();
        }

        let ids: Vec<String> = list_for_merchant(&conn, merchant)
            .unwrap()
            .into_iter()
            .map(|m| m.telegram_file_id)
            .collect();
        assert_eq!(ids, vec!["file-4", "file-5", "file-6", "file-7", "file-8", "file-9"]);
    }

    #[test]
    fn test_clear_empties_only_that_gallery() {
        let conn = open_in_memory().unwrap();
        let a = merchants::create_placeholder(&conn, 1).unwrap();
        let b = merchants::create_placeholder(&conn, 2).unwrap();
        for i in 0..6 {
            add(&conn, a, &format!("a-{}", i), MediaKind::Photo).unwrap();
        }
        add(&conn, b, "b-1", MediaKind::Photo).unwrap();

        assert_eq!(clear_for_merchant(&conn, a).unwrap(), 6);
        assert_eq!(count_for_merchant(&conn, a).unwrap(), 0);
        assert_eq!(count_for_merchant(&conn, b).unwrap(), 1);

        // The ring buffer starts over after a reset.
        let count = add(&conn, a, "a-new", MediaKind::Photo).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_galleries_are_per_merchant() {
        let conn = open_in_memory().unwrap();
        let a = merchants::create_placeholder(&conn, 1).unwrap();
        let b = merchants::create_placeholder(&conn, 2).unwrap();

        add(&conn, a, "a-1", MediaKind::Photo).unwrap();
        add(&conn, b, "b-1", MediaKind::Photo).unwrap();

        assert_eq!(count_for_merchant(&conn, a).unwrap(), 1);
        assert_eq!(count_for_merchant(&conn, b).unwrap(), 1);
    }
}
