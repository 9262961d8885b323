//! Binding-code lifecycle across the public storage API

mod common;

use shangbang::storage::binding_codes::{self, RedeemOutcome};

#[test]
fn generated_codes_are_eight_char_uppercase_alnum_and_unique() {
    let conn = common::test_db();

    let mut seen = std::collections::HashSet::new();
    for _ in 0..100 {
        let code = binding_codes::generate(&conn, 24).unwrap();
        assert_eq!(code.code.len(), 8);
        assert!(code.code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        assert!(seen.insert(code.code.clone()), "duplicate live code {}", code.code);
    }
}

#[test]
fn second_redemption_fails_and_creates_no_extra_merchant() {
    let conn = common::test_db();
    let code = binding_codes::generate(&conn, 24).unwrap();

    let first = binding_codes::redeem(&conn, &code.code, 1001).unwrap();
    assert!(first.is_success());

    let second = binding_codes::redeem(&conn, &code.code, 2002).unwrap();
    assert_eq!(second, RedeemOutcome::InvalidOrUsed);
    assert!(second.message().contains("已被使用") || second.message().contains("无效"));

    let merchant_rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM merchants", [], |row| row.get(0))
        .unwrap();
    assert_eq!(merchant_rows, 1);
}

#[test]
fn expired_codes_never_redeem() {
    let conn = common::test_db();
    conn.execute(
        "INSERT INTO binding_codes (code, is_used, expires_at)
         VALUES ('EXP00001', 0, datetime('now', '-1 minute'))",
        [],
    )
    .unwrap();

    // Regardless of use-state: never consumed before, still rejected.
    for chat in [1, 2] {
        assert_eq!(
            binding_codes::redeem(&conn, "EXP00001", chat).unwrap(),
            RedeemOutcome::InvalidOrUsed
        );
    }
    let merchant_rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM merchants", [], |row| row.get(0))
        .unwrap();
    assert_eq!(merchant_rows, 0);
}

#[test]
fn cleanup_purges_only_dead_codes() {
    let conn = common::test_db();
    let live = binding_codes::generate(&conn, 24).unwrap();
    let used = binding_codes::generate(&conn, 24).unwrap();
    binding_codes::redeem(&conn, &used.code, 7).unwrap();
    conn.execute(
        "INSERT INTO binding_codes (code, is_used, expires_at)
         VALUES ('DEAD0001', 0, datetime('now', '-1 hour'))",
        [],
    )
    .unwrap();

    assert_eq!(binding_codes::purge_expired(&conn).unwrap(), 1);
    assert!(binding_codes::get(&conn, &live.code).unwrap().is_some());
    assert!(binding_codes::get(&conn, &used.code).unwrap().is_some());
    assert!(binding_codes::get(&conn, "DEAD0001").unwrap().is_none());
}
