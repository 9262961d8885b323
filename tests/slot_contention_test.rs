//! Publish-slot contention: two merchants racing for the same (date, slot)

mod common;

use chrono::NaiveDate;

use shangbang::core::types::{MediaKind, MerchantStatus};
use shangbang::onboarding::{flow, Draft, FlowAction, Outcome};
use shangbang::storage::{media, merchants};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 8, 5).unwrap()
}

fn draft_for(fixture: &common::Fixture, channel: &str) -> Draft {
    Draft {
        merchant_type: Some("business".to_string()),
        city_id: Some(fixture.city_id),
        district_id: Some(fixture.district_id),
        p_price: Some("200".to_string()),
        pp_price: Some("400".to_string()),
        adv_sentence: Some("快".to_string()),
        channel_username: Some(channel.to_string()),
        keywords: fixture.keyword_ids[..1].to_vec(),
        publish_date: Some("2026-08-07".to_string()),
        publish_slot: Some("20:00".to_string()),
        edit_mode: false,
    }
}

#[test]
fn at_most_one_merchant_wins_the_slot() {
    let conn = common::test_db();
    let fixture = common::seed_reference_data(&conn);

    let first = merchants::create_placeholder(&conn, 111).unwrap();
    let second = merchants::create_placeholder(&conn, 222).unwrap();
    for merchant in [first, second] {
        for i in 0..6 {
            media::add(&conn, merchant, &format!("m{}-{}", merchant, i), MediaKind::Photo).unwrap();
        }
    }

    // Both drafts captured the slot while it was still free (the advisory
    // step-9 check passed for each). Only one final confirmation may win.
    let outcome_a = flow::finalize(&conn, 111, &draft_for(&fixture, "@chan_one1"), first).unwrap();
    let outcome_b = flow::finalize(&conn, 222, &draft_for(&fixture, "@chan_two2"), second).unwrap();

    assert!(matches!(outcome_a, Outcome::Submitted { .. }));
    assert_eq!(outcome_b, Outcome::SlotTaken);

    let holders: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM merchants
             WHERE publish_date = '2026-08-07' AND publish_slot = '20:00'
               AND status IN ('pending_approval', 'approved', 'published')",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(holders, 1, "exactly one merchant may hold the slot");

    let loser = merchants::get_by_id(&conn, second).unwrap().unwrap();
    assert_eq!(loser.status, MerchantStatus::PendingSubmission);
    assert!(loser.publish_slot.is_none());
}

#[test]
fn occupied_slot_is_disabled_at_render_and_rejected_at_pick() {
    let conn = common::test_db();
    let fixture = common::seed_reference_data(&conn);

    let holder = merchants::create_placeholder(&conn, 111).unwrap();
    for i in 0..6 {
        media::add(&conn, holder, &format!("m{}", i), MediaKind::Photo).unwrap();
    }
    flow::finalize(&conn, 111, &draft_for(&fixture, "@chan_one1"), holder).unwrap();

    // A later merchant sees the slot disabled...
    let mut draft = Draft::default();
    draft.publish_date = Some("2026-08-07".to_string());
    let view = flow::render_step(&conn, 9, &draft, None, today()).unwrap();
    let shangbang::onboarding::Widget::Buttons(rows) = view.widget else {
        panic!("expected buttons");
    };
    assert!(rows.iter().flatten().any(|b| b.label.contains("已被选")));

    // ...and a direct pick (stale keyboard) is refused too.
    let outcome =
        flow::apply_choice(&conn, &mut draft, 9, &FlowAction::PickSlot("20:00".to_string()), None, today()).unwrap();
    assert!(matches!(outcome, Outcome::Stay { notice: Some(_) }));
    assert!(draft.publish_slot.is_none());
}

#[test]
fn rejected_merchant_frees_the_slot_and_gallery() {
    let conn = common::test_db();
    let fixture = common::seed_reference_data(&conn);

    let holder = merchants::create_placeholder(&conn, 111).unwrap();
    for i in 0..6 {
        media::add(&conn, holder, &format!("m{}", i), MediaKind::Photo).unwrap();
    }
    flow::finalize(&conn, 111, &draft_for(&fixture, "@chan_one1"), holder).unwrap();

    // Admin reject resets the merchant: reservation and gallery cleared,
    // status back to pending_submission.
    merchants::clear_publish_slot(&conn, holder).unwrap();
    media::clear_for_merchant(&conn, holder).unwrap();
    merchants::update_status(&conn, holder, MerchantStatus::PendingSubmission, true).unwrap();

    assert!(merchants::is_slot_available(&conn, "2026-08-07", "20:00", None).unwrap());
    assert_eq!(media::count_for_merchant(&conn, holder).unwrap(), 0);
}
