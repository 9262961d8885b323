//! Merchant records
//!
//! Merchants are created as near-empty placeholders at binding-code
//! redemption and filled in field-by-field by the onboarding dialog or
//! later profile edits. The (publish_date, publish_slot) pair is the
//! contended resource: claiming it happens in a single conditional UPDATE
//! so that two racing submissions serialize on statement atomicity.

use std::str::FromStr;

use indoc::indoc;
use once_cell::sync::Lazy;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use crate::core::types::{MerchantStatus, MerchantType};
use crate::core::{AppError, AppResult};

/// SQL `IN (...)` body for the statuses that occupy a publish slot,
/// derived from [`MerchantStatus::occupies_slot`] so the occupancy rule
/// has a single definition.
static OCCUPYING_STATUS_LIST: Lazy<String> = Lazy::new(|| {
    MerchantStatus::ALL
        .iter()
        .filter(|status| status.occupies_slot())
        .map(|status| format!("'{}'", status))
        .collect::<Vec<_>>()
        .join(", ")
});

#[derive(Debug, Clone)]
pub struct Merchant {
    pub id: i64,
    pub telegram_chat_id: i64,
    pub name: Option<String>,
    pub merchant_type: Option<MerchantType>,
    pub city_id: Option<i64>,
    pub district_id: Option<i64>,
    pub p_price: Option<String>,
    pub pp_price: Option<String>,
    pub adv_sentence: Option<String>,
    pub custom_description: Option<String>,
    pub channel_username: Option<String>,
    pub contact_info: Option<String>,
    pub publish_date: Option<String>,
    pub publish_slot: Option<String>,
    pub status: MerchantStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// Field-by-field update payload; `None` fields are left untouched.
#[derive(Debug, Default, Clone)]
pub struct MerchantUpdate {
    pub name: Option<String>,
    pub merchant_type: Option<MerchantType>,
    pub city_id: Option<i64>,
    pub district_id: Option<i64>,
    pub p_price: Option<String>,
    pub pp_price: Option<String>,
    pub adv_sentence: Option<String>,
    pub custom_description: Option<String>,
    pub channel_username: Option<String>,
    pub contact_info: Option<String>,
    pub publish_date: Option<String>,
    pub publish_slot: Option<String>,
}

const MERCHANT_COLUMNS: &str = "id, telegram_chat_id, name, merchant_type, city_id, district_id, \
     p_price, pp_price, adv_sentence, custom_description, channel_username, contact_info, \
     publish_date, publish_slot, status, created_at, updated_at";

fn row_to_merchant(row: &rusqlite::Row<'_>) -> rusqlite::Result<Merchant> {
    let status_text: String = row.get(14)?;
    let status = MerchantStatus::from_str(&status_text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(14, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let type_text: Option<String> = row.get(3)?;

    Ok(Merchant {
        id: row.get(0)?,
        telegram_chat_id: row.get(1)?,
        name: row.get(2)?,
        merchant_type: type_text.and_then(|t| MerchantType::from_str(&t).ok()),
        city_id: row.get(4)?,
        district_id: row.get(5)?,
        p_price: row.get(6)?,
        pp_price: row.get(7)?,
        adv_sentence: row.get(8)?,
        custom_description: row.get(9)?,
        channel_username: row.get(10)?,
        contact_info: row.get(11)?,
        publish_date: row.get(12)?,
        publish_slot: row.get(13)?,
        status,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

/// Creates the near-empty placeholder row at redemption time.
pub fn create_placeholder(conn: &Connection, telegram_chat_id: i64) -> AppResult<i64> {
    conn.execute(
        "INSERT INTO merchants (telegram_chat_id, status) VALUES (?1, ?2)",
        params![telegram_chat_id, MerchantStatus::PendingSubmission.to_string()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_by_id(conn: &Connection, id: i64) -> AppResult<Option<Merchant>> {
    let found = conn
        .query_row(
            &format!("SELECT {} FROM merchants WHERE id = ?", MERCHANT_COLUMNS),
            params![id],
            row_to_merchant,
        )
        .optional()?;
    Ok(found)
}

pub fn get_by_chat_id(conn: &Connection, telegram_chat_id: i64) -> AppResult<Option<Merchant>> {
    let found = conn
        .query_row(
            &format!("SELECT {} FROM merchants WHERE telegram_chat_id = ?", MERCHANT_COLUMNS),
            params![telegram_chat_id],
            row_to_merchant,
        )
        .optional()?;
    Ok(found)
}

/// Applies a partial update. Returns whether the row was touched.
pub fn update(conn: &Connection, id: i64, changes: &MerchantUpdate) -> AppResult<bool> {
    let mut sets: Vec<&str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    macro_rules! push_field {
        ($field:expr, $column:literal, $to_value:expr) => {
            if let Some(v) = &$field {
                sets.push(concat!($column, " = ?"));
                values.push($to_value(v));
            }
        };
    }

    push_field!(changes.name, "name", |v: &String| Value::Text(v.clone()));
    push_field!(changes.merchant_type, "merchant_type", |v: &MerchantType| Value::Text(v.to_string()));
    push_field!(changes.city_id, "city_id", |v: &i64| Value::Integer(*v));
    push_field!(changes.district_id, "district_id", |v: &i64| Value::Integer(*v));
    push_field!(changes.p_price, "p_price", |v: &String| Value::Text(v.clone()));
    push_field!(changes.pp_price, "pp_price", |v: &String| Value::Text(v.clone()));
    push_field!(changes.adv_sentence, "adv_sentence", |v: &String| Value::Text(v.clone()));
    push_field!(changes.custom_description, "custom_description", |v: &String| Value::Text(v.clone()));
    push_field!(changes.channel_username, "channel_username", |v: &String| Value::Text(v.clone()));
    push_field!(changes.contact_info, "contact_info", |v: &String| Value::Text(v.clone()));
    push_field!(changes.publish_date, "publish_date", |v: &String| Value::Text(v.clone()));
    push_field!(changes.publish_slot, "publish_slot", |v: &String| Value::Text(v.clone()));

    if sets.is_empty() {
        return Ok(false);
    }

    let sql = format!(
        "UPDATE merchants SET {}, updated_at = datetime('now') WHERE id = ?",
        sets.join(", ")
    );
    values.push(Value::Integer(id));

    let touched = conn.execute(&sql, params_from_iter(values))?;
    Ok(touched > 0)
}

/// Moves a merchant to a new status, enforcing the forward-only rule
/// unless `admin_override` is set.
pub fn update_status(
    conn: &Connection,
    id: i64,
    next: MerchantStatus,
    admin_override: bool,
) -> AppResult<()> {
    let current = get_by_id(conn, id)?
        .ok_or_else(|| AppError::NotFound(format!("merchant {}", id)))?
        .status;

    if !admin_override && !current.can_advance_to(next) {
        return Err(AppError::Conflict(format!(
            "status may not move {} -> {}",
            current, next
        )));
    }

    conn.execute(
        "UPDATE merchants SET status = ?1, updated_at = datetime('now') WHERE id = ?2",
        params![next.to_string(), id],
    )?;
    Ok(())
}

/// Deletes a merchant row. Used as compensation when binding-code
/// consumption loses its race.
pub fn delete(conn: &Connection, id: i64) -> AppResult<bool> {
    let removed = conn.execute("DELETE FROM merchants WHERE id = ?", params![id])?;
    Ok(removed > 0)
}

/// Time slots (HH:MM) already taken for a date by merchants whose status
/// counts as occupying.
///
/// # Arguments
///
/// * `exclude_merchant_id` - skip this merchant, so profile edits do not
///   see their own reservation as a conflict
pub fn occupied_slots_for_date(
    conn: &Connection,
    date: &str,
    exclude_merchant_id: Option<i64>,
) -> AppResult<Vec<String>> {
    let mut stmt = conn.prepare(&format!(
        indoc! {"
            SELECT DISTINCT publish_slot FROM merchants
            WHERE publish_date = ?1
              AND publish_slot IS NOT NULL
              AND status IN ({statuses})
              AND id <> ?2
        "},
        statuses = *OCCUPYING_STATUS_LIST,
    ))?;
    let rows = stmt.query_map(params![date, exclude_merchant_id.unwrap_or(-1)], |row| {
        row.get::<_, String>(0)
    })?;

    let mut slots = Vec::new();
    for row in rows {
        slots.push(row?);
    }
    Ok(slots)
}

/// Advisory availability check used when rendering the slot keyboard.
pub fn is_slot_available(
    conn: &Connection,
    date: &str,
    slot: &str,
    exclude_merchant_id: Option<i64>,
) -> AppResult<bool> {
    let occupied = occupied_slots_for_date(conn, date, exclude_merchant_id)?;
    Ok(!occupied.iter().any(|taken| taken == slot))
}

/// Final submission: claims the (date, slot) pair and advances the status
/// to pending_approval in one conditional statement.
///
/// Returns `false` when the slot is already occupied by another merchant —
/// the caller re-prompts step 9. Statement atomicity is what closes the
/// check-then-act window between two racing submissions.
pub fn finalize_submission(conn: &Connection, id: i64, date: &str, slot: &str) -> AppResult<bool> {
    let claimed = conn.execute(
        &format!(
            indoc! {"
                UPDATE merchants
                SET publish_date = ?1,
                    publish_slot = ?2,
                    status = ?3,
                    updated_at = datetime('now')
                WHERE id = ?4
                  AND NOT EXISTS (
                      SELECT 1 FROM merchants other
                      WHERE other.publish_date = ?1
                        AND other.publish_slot = ?2
                        AND other.id <> ?4
                        AND other.status IN ({statuses})
                  )
            "},
            statuses = *OCCUPYING_STATUS_LIST,
        ),
        params![date, slot, MerchantStatus::PendingApproval.to_string(), id],
    )?;
    Ok(claimed > 0)
}

/// Drops the merchant's slot reservation (admin reject path).
pub fn clear_publish_slot(conn: &Connection, id: i64) -> AppResult<()> {
    conn.execute(
        "UPDATE merchants
         SET publish_date = NULL, publish_slot = NULL, updated_at = datetime('now')
         WHERE id = ?",
        params![id],
    )?;
    Ok(())
}

/// Status histogram for the admin statistics panel.
pub fn count_by_status(conn: &Connection) -> AppResult<Vec<(String, i64)>> {
    let mut stmt =
        conn.prepare("SELECT status, COUNT(*) FROM merchants GROUP BY status ORDER BY COUNT(*) DESC")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
    let mut counts = Vec::new();
    for row in rows {
        counts.push(row?);
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db::open_in_memory;

    #[test]
    fn test_placeholder_then_update_round_trip() {
        let conn = open_in_memory().unwrap();
        let id = create_placeholder(&conn, 900).unwrap();

        let merchant = get_by_chat_id(&conn, 900).unwrap().unwrap();
        assert_eq!(merchant.id, id);
        assert_eq!(merchant.status, MerchantStatus::PendingSubmission);
        assert!(merchant.name.is_none());

        let touched = update(
            &conn,
            id,
            &MerchantUpdate {
                name: Some("小雨".to_string()),
                merchant_type: Some(MerchantType::Teacher),
                p_price: Some("300".to_string()),
                channel_username: Some("@rain_channel".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(touched);

        let merchant = get_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(merchant.name.as_deref(), Some("小雨"));
        assert_eq!(merchant.merchant_type, Some(MerchantType::Teacher));
        assert_eq!(merchant.p_price.as_deref(), Some("300"));
        assert_eq!(merchant.channel_username.as_deref(), Some("@rain_channel"));
    }

    #[test]
    fn test_update_with_no_fields_is_noop() {
        let conn = open_in_memory().unwrap();
        let id = create_placeholder(&conn, 1).unwrap();
        assert!(!update(&conn, id, &MerchantUpdate::default()).unwrap());
    }

    #[test]
    fn test_unique_chat_id_enforced() {
        let conn = open_in_memory().unwrap();
        create_placeholder(&conn, 77).unwrap();
        assert!(create_placeholder(&conn, 77).is_err());
    }

    #[test]
    fn test_status_forward_only_unless_admin() {
        let conn = open_in_memory().unwrap();
        let id = create_placeholder(&conn, 5).unwrap();

        update_status(&conn, id, MerchantStatus::PendingApproval, false).unwrap();
        update_status(&conn, id, MerchantStatus::Approved, false).unwrap();

        let backwards = update_status(&conn, id, MerchantStatus::PendingSubmission, false);
        assert!(matches!(backwards, Err(AppError::Conflict(_))));

        // Admin reset bypasses the rule.
        update_status(&conn, id, MerchantStatus::PendingSubmission, true).unwrap();
        assert_eq!(
            get_by_id(&conn, id).unwrap().unwrap().status,
            MerchantStatus::PendingSubmission
        );
    }

    #[test]
    fn test_finalize_submission_claims_slot_once() {
        let conn = open_in_memory().unwrap();
        let first = create_placeholder(&conn, 10).unwrap();
        let second = create_placeholder(&conn, 20).unwrap();

        assert!(finalize_submission(&conn, first, "2026-08-07", "20:00").unwrap());
        // Same (date, slot): the conditional update must refuse.
        assert!(!finalize_submission(&conn, second, "2026-08-07", "20:00").unwrap());

        let loser = get_by_id(&conn, second).unwrap().unwrap();
        assert_eq!(loser.status, MerchantStatus::PendingSubmission);
        assert!(loser.publish_slot.is_none());

        // A different slot on the same date is fine.
        assert!(finalize_submission(&conn, second, "2026-08-07", "21:00").unwrap());
    }

    #[test]
    fn test_occupying_status_list_follows_enum_rule() {
        // The query fragment must track occupies_slot() exactly.
        for status in MerchantStatus::ALL {
            assert_eq!(
                OCCUPYING_STATUS_LIST.contains(&format!("'{}'", status)),
                status.occupies_slot(),
                "list drifted for {}",
                status
            );
        }
        assert_eq!(*OCCUPYING_STATUS_LIST, "'pending_approval', 'approved', 'published'");
    }

    #[test]
    fn test_occupied_slots_excludes_self_and_placeholders() {
        let conn = open_in_memory().unwrap();
        let holder = create_placeholder(&conn, 1).unwrap();
        let drafting = create_placeholder(&conn, 2).unwrap();

        finalize_submission(&conn, holder, "2026-08-08", "20:00").unwrap();
        // A pending_submission merchant with a pencilled-in slot does not occupy.
        update(
            &conn,
            drafting,
            &MerchantUpdate {
                publish_date: Some("2026-08-08".to_string()),
                publish_slot: Some("21:00".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        let occupied = occupied_slots_for_date(&conn, "2026-08-08", None).unwrap();
        assert_eq!(occupied, vec!["20:00".to_string()]);

        // The holder editing their own profile sees the slot as free.
        assert!(is_slot_available(&conn, "2026-08-08", "20:00", Some(holder)).unwrap());
        assert!(!is_slot_available(&conn, "2026-08-08", "20:00", None).unwrap());
    }
}
