//! Full registration scenario: binding code to pending_approval
//!
//! Drives the dialog interpreter against a real (in-memory) database the
//! way the Telegram handlers do, one step at a time.

mod common;

use chrono::NaiveDate;
use pretty_assertions::assert_eq;

use shangbang::core::types::{MediaKind, MerchantStatus};
use shangbang::onboarding::{flow, Draft, FlowAction, Outcome, STEP_CONFIRM, STEP_MEDIA};
use shangbang::storage::{binding_codes, drafts, media, merchants};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 8, 5).unwrap()
}

#[test]
fn full_registration_reaches_pending_approval() {
    let conn = common::test_db();
    let fixture = common::seed_reference_data(&conn);
    let user_id = 424242;

    // Redeem a valid 8-char code: merchant row appears as a placeholder.
    let code = binding_codes::generate(&conn, 24).unwrap();
    assert_eq!(code.code.len(), 8);
    let outcome = binding_codes::redeem(&conn, &code.code, user_id).unwrap();
    let merchant_id = match outcome {
        binding_codes::RedeemOutcome::Success { merchant_id } => merchant_id,
        other => panic!("redeem failed: {:?}", other),
    };
    assert_eq!(
        merchants::get_by_id(&conn, merchant_id).unwrap().unwrap().status,
        MerchantStatus::PendingSubmission
    );

    let mut draft = Draft::default();
    let mid = Some(merchant_id);

    // Steps 1-3: type, city, district.
    let outcome = flow::apply_choice(
        &conn,
        &mut draft,
        1,
        &FlowAction::ChooseType("teacher".to_string()),
        mid,
        today(),
    )
    .unwrap();
    assert_eq!(outcome, Outcome::Advance { next: 2, notice: None });
    flow::apply_choice(&conn, &mut draft, 2, &FlowAction::ChooseCity(fixture.city_id), mid, today()).unwrap();
    flow::apply_choice(
        &conn,
        &mut draft,
        3,
        &FlowAction::ChooseDistrict(fixture.district_id),
        mid,
        today(),
    )
    .unwrap();

    // Steps 4-7: prices, advantage sentence, channel username.
    flow::apply_text(&conn, &mut draft, 4, "300", mid).unwrap();
    flow::apply_text(&conn, &mut draft, 5, "500.5", mid).unwrap();
    flow::apply_text(&conn, &mut draft, 6, "经验丰富，服务周到", mid).unwrap();
    let outcome = flow::apply_text(&conn, &mut draft, 7, "https://t.me/My_Channel9", mid).unwrap();
    assert_eq!(outcome, Outcome::Advance { next: 8, notice: None });
    assert_eq!(draft.channel_username.as_deref(), Some("@My_Channel9"));

    // Step 8: two keywords, then move on.
    flow::apply_choice(&conn, &mut draft, 8, &FlowAction::ToggleKeyword(fixture.keyword_ids[0]), mid, today())
        .unwrap();
    flow::apply_choice(&conn, &mut draft, 8, &FlowAction::ToggleKeyword(fixture.keyword_ids[1]), mid, today())
        .unwrap();
    let outcome = flow::apply_choice(&conn, &mut draft, 8, &FlowAction::KeywordsDone, mid, today()).unwrap();
    assert_eq!(outcome, Outcome::Advance { next: 9, notice: None });

    // Step 9: date then slot.
    flow::apply_choice(&conn, &mut draft, 9, &FlowAction::PickDate("2026-08-06".to_string()), mid, today())
        .unwrap();
    let outcome =
        flow::apply_choice(&conn, &mut draft, 9, &FlowAction::PickSlot("20:00".to_string()), mid, today()).unwrap();
    assert_eq!(
        outcome,
        Outcome::Advance {
            next: STEP_MEDIA,
            notice: None
        }
    );

    // Step 10: six media items; the done button only passes at exactly six.
    for i in 0..5 {
        media::add(&conn, merchant_id, &format!("photo-{}", i), MediaKind::Photo).unwrap();
    }
    let outcome = flow::apply_choice(&conn, &mut draft, STEP_MEDIA, &FlowAction::MediaDone, mid, today()).unwrap();
    assert!(matches!(outcome, Outcome::Stay { notice: Some(_) }));

    media::add(&conn, merchant_id, "video-5", MediaKind::Video).unwrap();
    let outcome = flow::apply_choice(&conn, &mut draft, STEP_MEDIA, &FlowAction::MediaDone, mid, today()).unwrap();
    assert_eq!(
        outcome,
        Outcome::Advance {
            next: STEP_CONFIRM,
            notice: None
        }
    );

    // Draft persisted mid-flow survives a reload, as after a restart.
    drafts::upsert(&conn, user_id, STEP_CONFIRM, &draft.to_value().unwrap()).unwrap();
    let reloaded = drafts::load(&conn, user_id).unwrap().unwrap();
    let draft = Draft::from_value(&reloaded.answers).unwrap();
    assert_eq!(draft.p_price.as_deref(), Some("300"));

    // Final confirmation.
    let outcome = flow::finalize(&conn, user_id, &draft, merchant_id).unwrap();
    assert_eq!(
        outcome,
        Outcome::Submitted {
            publish_date: "2026-08-06".to_string(),
            publish_slot: "20:00".to_string()
        }
    );

    let merchant = merchants::get_by_id(&conn, merchant_id).unwrap().unwrap();
    assert_eq!(merchant.status, MerchantStatus::PendingApproval);
    assert_eq!(merchant.publish_date.as_deref(), Some("2026-08-06"));
    assert_eq!(merchant.publish_slot.as_deref(), Some("20:00"));
    assert_eq!(merchant.p_price.as_deref(), Some("300"));
    assert_eq!(merchant.channel_username.as_deref(), Some("@My_Channel9"));

    // The draft is gone once submitted.
    assert!(drafts::load(&conn, user_id).unwrap().is_none());
}

#[test]
fn empty_district_list_is_a_dead_end_back_to_city() {
    let conn = common::test_db();
    common::seed_reference_data(&conn);
    let empty_city = shangbang::storage::regions::add_city(&conn, "空城", 9).unwrap();

    let mut draft = Draft::default();
    draft.city_id = Some(empty_city);

    let view = flow::render_step(&conn, 3, &draft, None, today()).unwrap();
    let shangbang::onboarding::Widget::Buttons(rows) = view.widget else {
        panic!("expected buttons");
    };
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0].action, FlowAction::GoToStep(2));
}

#[test]
fn confirmation_blocks_until_required_steps_done() {
    let conn = common::test_db();
    common::seed_reference_data(&conn);
    let merchant_id = merchants::create_placeholder(&conn, 1).unwrap();

    let draft = Draft::default();
    let outcome = flow::finalize(&conn, 1, &draft, merchant_id).unwrap();
    match outcome {
        Outcome::Invalid { message } => assert!(message.contains("步骤")),
        other => panic!("expected invalid, got {:?}", other),
    }
    // Placeholder untouched.
    assert_eq!(
        merchants::get_by_id(&conn, merchant_id).unwrap().unwrap().status,
        MerchantStatus::PendingSubmission
    );
}
