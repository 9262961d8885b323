//! Binding code issuance and redemption
//!
//! A binding code is a one-time token redeemed by a prospective merchant to
//! create an account. Generation retries on collision in a bounded loop;
//! redemption is optimistic: the consuming UPDATE is conditional on
//! `is_used = 0` and a zero row count triggers a compensating delete of the
//! just-created placeholder merchant.

use chrono::{Duration, Utc};
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};

use crate::core::config::binding_code;
use crate::core::{AppError, AppResult};
use crate::storage::merchants;

#[derive(Debug, Clone)]
pub struct BindingCode {
    pub id: i64,
    pub code: String,
    pub is_used: bool,
    pub created_at: String,
    pub expires_at: Option<String>,
    pub used_at: Option<String>,
    pub merchant_id: Option<i64>,
}

/// Outcome of a redemption attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum RedeemOutcome {
    /// Code consumed, placeholder merchant created
    Success { merchant_id: i64 },
    /// Code unknown, already used or expired
    InvalidOrUsed,
    /// The chat already owns a merchant account
    AlreadyBound { merchant_id: i64 },
    /// Lost the race against a concurrent redeemer; safe to retry
    Retry,
}

impl RedeemOutcome {
    /// User-visible result line.
    pub fn message(&self) -> String {
        match self {
            RedeemOutcome::Success { merchant_id } => {
                format!("绑定成功！您的永久商户ID是 {}。现在开始填写资料...", merchant_id)
            }
            RedeemOutcome::InvalidOrUsed => "绑定码无效、已被使用或已过期".to_string(),
            RedeemOutcome::AlreadyBound { merchant_id } => {
                format!("您的账号已绑定到商户ID: {}", merchant_id)
            }
            RedeemOutcome::Retry => "绑定码刚刚被占用，请稍后重试".to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RedeemOutcome::Success { .. })
    }
}

fn random_code<R: Rng>(rng: &mut R) -> String {
    (0..binding_code::LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..binding_code::ALPHABET.len());
            binding_code::ALPHABET[idx] as char
        })
        .collect()
}

fn code_exists(conn: &Connection, code: &str) -> AppResult<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM binding_codes WHERE code = ? LIMIT 1", params![code], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(found.is_some())
}

/// Generates and stores a new binding code.
///
/// Uniform random 8-character uppercase-alnum string, checked for
/// collision against existing codes with a bounded retry loop.
///
/// # Arguments
///
/// * `expiry_hours` - lifetime in hours; `0` means the code never expires
pub fn generate(conn: &Connection, expiry_hours: i64) -> AppResult<BindingCode> {
    let expires_at = if expiry_hours > 0 {
        Some((Utc::now() + Duration::hours(expiry_hours)).format("%Y-%m-%d %H:%M:%S").to_string())
    } else {
        None
    };

    let mut rng = rand::thread_rng();
    for _ in 0..binding_code::MAX_GENERATION_ATTEMPTS {
        let code = random_code(&mut rng);
        if code_exists(conn, &code)? {
            continue;
        }

        conn.execute(
            "INSERT INTO binding_codes (code, is_used, expires_at) VALUES (?1, 0, ?2)",
            params![code, expires_at],
        )?;
        let id = conn.last_insert_rowid();
        let created_at: String =
            conn.query_row("SELECT created_at FROM binding_codes WHERE id = ?", params![id], |row| {
                row.get(0)
            })?;

        log::info!("Generated binding code {}", code);
        return Ok(BindingCode {
            id,
            code,
            is_used: false,
            created_at,
            expires_at,
            used_at: None,
            merchant_id: None,
        });
    }

    Err(AppError::Conflict(format!(
        "could not generate a unique binding code in {} attempts",
        binding_code::MAX_GENERATION_ATTEMPTS
    )))
}

/// Validates and consumes a binding code, creating the placeholder
/// merchant for `user_id` on success.
///
/// The consuming UPDATE is conditional on `is_used = 0`; when a concurrent
/// redeemer wins the race the freshly created merchant row is deleted
/// again and `RedeemOutcome::Retry` is returned.
pub fn redeem(conn: &Connection, code: &str, user_id: i64) -> AppResult<RedeemOutcome> {
    let code = code.trim().to_uppercase();
    if code.is_empty() {
        return Ok(RedeemOutcome::InvalidOrUsed);
    }

    let live: Option<i64> = conn
        .query_row(
            "SELECT id FROM binding_codes
             WHERE code = ?1 AND is_used = 0
               AND (expires_at IS NULL OR expires_at > datetime('now'))",
            params![code],
            |row| row.get(0),
        )
        .optional()?;
    if live.is_none() {
        log::warn!("Binding code rejected (unknown, used or expired): {}", code);
        return Ok(RedeemOutcome::InvalidOrUsed);
    }

    if let Some(existing) = merchants::get_by_chat_id(conn, user_id)? {
        log::warn!("Chat {} already bound to merchant {}", user_id, existing.id);
        return Ok(RedeemOutcome::AlreadyBound { merchant_id: existing.id });
    }

    let merchant_id = merchants::create_placeholder(conn, user_id)?;

    let consumed = conn.execute(
        "UPDATE binding_codes
         SET is_used = 1, merchant_id = ?1, used_at = datetime('now')
         WHERE code = ?2 AND is_used = 0",
        params![merchant_id, code],
    )?;

    if consumed == 0 {
        // Another redeemer got there between the SELECT and the UPDATE.
        merchants::delete(conn, merchant_id)?;
        log::error!("Binding code {} raced; rolled back merchant {}", code, merchant_id);
        return Ok(RedeemOutcome::Retry);
    }

    log::info!("Binding code {} consumed by chat {} (merchant {})", code, user_id, merchant_id);
    Ok(RedeemOutcome::Success { merchant_id })
}

fn row_to_code(row: &rusqlite::Row<'_>) -> rusqlite::Result<BindingCode> {
    Ok(BindingCode {
        id: row.get(0)?,
        code: row.get(1)?,
        is_used: row.get::<_, i64>(2)? != 0,
        created_at: row.get(3)?,
        expires_at: row.get(4)?,
        used_at: row.get(5)?,
        merchant_id: row.get(6)?,
    })
}

/// Fetches a single code with its current state.
pub fn get(conn: &Connection, code: &str) -> AppResult<Option<BindingCode>> {
    let code = code.trim().to_uppercase();
    let found = conn
        .query_row(
            "SELECT id, code, is_used, created_at, expires_at, used_at, merchant_id
             FROM binding_codes WHERE code = ?",
            params![code],
            row_to_code,
        )
        .optional()?;
    Ok(found)
}

/// Lists codes, newest first.
pub fn list(conn: &Connection, include_used: bool, limit: usize) -> AppResult<Vec<BindingCode>> {
    let mut sql = String::from(
        "SELECT id, code, is_used, created_at, expires_at, used_at, merchant_id
         FROM binding_codes WHERE 1=1",
    );
    if !include_used {
        sql.push_str(" AND is_used = 0 AND (expires_at IS NULL OR expires_at > datetime('now'))");
    }
    sql.push_str(" ORDER BY created_at DESC, id DESC LIMIT ?");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![limit as i64], row_to_code)?;
    let mut codes = Vec::new();
    for row in rows {
        codes.push(row?);
    }
    Ok(codes)
}

/// Aggregate counters for the admin panel.
#[derive(Debug)]
pub struct CodeStats {
    pub total: i64,
    pub used: i64,
    pub valid: i64,
    pub recent_24h: i64,
}

pub fn statistics(conn: &Connection) -> AppResult<CodeStats> {
    let total: i64 = conn.query_row("SELECT COUNT(*) FROM binding_codes", [], |row| row.get(0))?;
    let used: i64 =
        conn.query_row("SELECT COUNT(*) FROM binding_codes WHERE is_used = 1", [], |row| row.get(0))?;
    let valid: i64 = conn.query_row(
        "SELECT COUNT(*) FROM binding_codes
         WHERE is_used = 0 AND (expires_at IS NULL OR expires_at > datetime('now'))",
        [],
        |row| row.get(0),
    )?;
    let recent_24h: i64 = conn.query_row(
        "SELECT COUNT(*) FROM binding_codes WHERE created_at > datetime('now', '-1 day')",
        [],
        |row| row.get(0),
    )?;
    Ok(CodeStats {
        total,
        used,
        valid,
        recent_24h,
    })
}

/// Deletes a code outright. Returns whether a row was removed.
pub fn delete(conn: &Connection, code: &str) -> AppResult<bool> {
    let code = code.trim().to_uppercase();
    let removed = conn.execute("DELETE FROM binding_codes WHERE code = ?", params![code])?;
    Ok(removed > 0)
}

/// Garbage-collects expired, never-used codes. Returns the removed count.
pub fn purge_expired(conn: &Connection) -> AppResult<usize> {
    let removed = conn.execute(
        "DELETE FROM binding_codes
         WHERE is_used = 0 AND expires_at IS NOT NULL AND expires_at <= datetime('now')",
        [],
    )?;
    if removed > 0 {
        log::info!("Purged {} expired binding code(s)", removed);
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db::open_in_memory;

    #[test]
    fn test_generate_shape_and_uniqueness() {
        let conn = open_in_memory().unwrap();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..50 {
            let code = generate(&conn, 24).unwrap();
            assert_eq!(code.code.len(), 8);
            assert!(code
                .code
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
            assert!(!code.is_used);
            assert!(code.expires_at.is_some());
            assert!(seen.insert(code.code), "collision leaked into the table");
        }
    }

    #[test]
    fn test_generate_without_expiry() {
        let conn = open_in_memory().unwrap();
        let code = generate(&conn, 0).unwrap();
        assert!(code.expires_at.is_none());
    }

    #[test]
    fn test_redeem_happy_path_creates_placeholder() {
        let conn = open_in_memory().unwrap();
        let code = generate(&conn, 24).unwrap();

        let outcome = redeem(&conn, &code.code, 1001).unwrap();
        let merchant_id = match outcome {
            RedeemOutcome::Success { merchant_id } => merchant_id,
            other => panic!("expected success, got {:?}", other),
        };

        let merchant = merchants::get_by_id(&conn, merchant_id).unwrap().unwrap();
        assert_eq!(merchant.telegram_chat_id, 1001);
        assert_eq!(merchant.status, crate::core::types::MerchantStatus::PendingSubmission);

        let stored = get(&conn, &code.code).unwrap().unwrap();
        assert!(stored.is_used);
        assert_eq!(stored.merchant_id, Some(merchant_id));
        assert!(stored.used_at.is_some());
    }

    #[test]
    fn test_redeem_same_code_twice() {
        let conn = open_in_memory().unwrap();
        let code = generate(&conn, 24).unwrap();

        assert!(redeem(&conn, &code.code, 1001).unwrap().is_success());
        let second = redeem(&conn, &code.code, 2002).unwrap();
        assert_eq!(second, RedeemOutcome::InvalidOrUsed);

        // Exactly one merchant row exists.
        let merchants_total: i64 = conn
            .query_row("SELECT COUNT(*) FROM merchants", [], |row| row.get(0))
            .unwrap();
        assert_eq!(merchants_total, 1);
    }

    #[test]
    fn test_redeem_expired_code_always_fails() {
        let conn = open_in_memory().unwrap();
        conn.execute(
            "INSERT INTO binding_codes (code, is_used, expires_at)
             VALUES ('AAAA1111', 0, datetime('now', '-1 hour'))",
            [],
        )
        .unwrap();

        assert_eq!(redeem(&conn, "AAAA1111", 42).unwrap(), RedeemOutcome::InvalidOrUsed);
        // Still unused: expiry, not consumption.
        let stored = get(&conn, "AAAA1111").unwrap().unwrap();
        assert!(!stored.is_used);
    }

    #[test]
    fn test_redeem_normalizes_case_and_whitespace() {
        let conn = open_in_memory().unwrap();
        conn.execute("INSERT INTO binding_codes (code, is_used) VALUES ('ZZZZ9999', 0)", [])
            .unwrap();
        assert!(redeem(&conn, "  zzzz9999 ", 7).unwrap().is_success());
    }

    #[test]
    fn test_redeem_rejects_already_bound_chat() {
        let conn = open_in_memory().unwrap();
        let first = generate(&conn, 24).unwrap();
        let second = generate(&conn, 24).unwrap();

        let outcome = redeem(&conn, &first.code, 555).unwrap();
        let merchant_id = match outcome {
            RedeemOutcome::Success { merchant_id } => merchant_id,
            other => panic!("expected success, got {:?}", other),
        };

        assert_eq!(
            redeem(&conn, &second.code, 555).unwrap(),
            RedeemOutcome::AlreadyBound { merchant_id }
        );
        // Unused second code survives for someone else.
        assert!(!get(&conn, &second.code).unwrap().unwrap().is_used);
    }

    #[test]
    fn test_purge_expired_keeps_used_and_live() {
        let conn = open_in_memory().unwrap();
        conn.execute_batch(
            "INSERT INTO binding_codes (code, is_used, expires_at) VALUES
             ('DEAD0001', 0, datetime('now', '-1 hour')),
             ('LIVE0001', 0, datetime('now', '+1 hour')),
             ('USED0001', 1, datetime('now', '-1 hour'));",
        )
        .unwrap();

        assert_eq!(purge_expired(&conn).unwrap(), 1);
        assert!(get(&conn, "DEAD0001").unwrap().is_none());
        assert!(get(&conn, "LIVE0001").unwrap().is_some());
        assert!(get(&conn, "USED0001").unwrap().is_some());
    }

    #[test]
    fn test_statistics_counts() {
        let conn = open_in_memory().unwrap();
        let a = generate(&conn, 24).unwrap();
        let _b = generate(&conn, 24).unwrap();
        redeem(&conn, &a.code, 1).unwrap();

        let stats = statistics(&conn).unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.used, 1);
        assert_eq!(stats.valid, 1);
        assert_eq!(stats.recent_24h, 2);
    }
}
