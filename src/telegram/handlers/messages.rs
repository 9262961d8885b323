//! Message routing: trigger keyword, binding-code input, free-text step
//! answers and media uploads

use chrono::NaiveDate;
use lazy_regex::regex_is_match;
use rusqlite::Connection;
use teloxide::prelude::*;

use crate::core::config;
use crate::core::types::{ActionType, MediaKind, MerchantStatus};
use crate::onboarding::{flow, steps, Draft, Outcome, STEP_CONFIRM, STEP_MEDIA};
use crate::storage::{activity_log, binding_codes, drafts, media, merchants, templates};
use crate::telegram::admin;
use crate::telegram::handlers::types::{send_view, show_profile_panel, HandlerDeps, HandlerError};
use crate::telegram::notifications;
use crate::telegram::Bot;

pub(crate) fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Top-level message endpoint. Every failure is caught here: logged and
/// replaced with the generic apology so nothing propagates to the
/// dispatcher.
pub async fn handle_message(bot: Bot, msg: Message, deps: HandlerDeps) -> Result<(), HandlerError> {
    if !msg.chat.is_private() {
        return Ok(());
    }

    if let Err(e) = route_message(&bot, &msg, &deps).await {
        log::error!("Message handler error for chat {}: {}", msg.chat.id.0, e);
        if let Ok(conn) = deps.conn() {
            let apology = templates::get(&conn, "error_general");
            let _ = bot.send_message(msg.chat.id, apology).await;
        }
    }
    Ok(())
}

async fn route_message(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let conn = deps.conn()?;
    let chat_id = msg.chat.id;
    let user_id = chat_id.0;

    // Admin free-text input (new city/district/slot names)
    if config::is_admin(user_id) {
        if let Some(text) = msg.text() {
            if let Some(pending) = admin::take_pending_input(user_id) {
                return admin::handle_pending_input(bot, &conn, chat_id, text, pending).await;
            }
        }
    }

    if msg.photo().is_some() || msg.video().is_some() {
        return handle_media_message(bot, &conn, msg).await;
    }

    let Some(text) = msg.text() else {
        return Ok(());
    };
    let text = text.trim();

    if text == config::REGISTRATION_TRIGGER {
        return handle_registration_trigger(bot, &conn, msg).await;
    }

    let Some(stored) = drafts::load(&conn, user_id)? else {
        return Ok(());
    };

    match stored.step {
        0 => handle_binding_code_input(bot, &conn, msg, text).await,
        4..=7 => handle_step_text(bot, &conn, chat_id, stored.step, &stored.answers, text).await,
        // Button- or media-driven steps; stray text is ignored.
        _ => Ok(()),
    }
}

/// Entry point of the whole registration: the trigger keyword.
async fn handle_registration_trigger(bot: &Bot, conn: &Connection, msg: &Message) -> Result<(), HandlerError> {
    let chat_id = msg.chat.id;
    let user_id = chat_id.0;

    if let Some(merchant) = merchants::get_by_chat_id(conn, user_id)? {
        match merchant.status {
            MerchantStatus::PendingSubmission => {
                // Resume where they left off: the profile panel exposes
                // every step.
                show_profile_panel(bot, conn, chat_id).await?;
            }
            MerchantStatus::Expired => {
                let text = templates::get(conn, "merchant_account_suspended");
                bot.send_message(chat_id, text).await?;
            }
            status => {
                let text = templates::render(
                    conn,
                    "merchant_already_registered",
                    &[("status_display", status.display_name())],
                );
                bot.send_message(chat_id, text).await?;
            }
        }
        return Ok(());
    }

    let username = msg.from.as_ref().and_then(|u| u.username.clone());
    if let Err(e) = activity_log::append(
        conn,
        user_id,
        ActionType::UserInteraction,
        serde_json::json!({"action": "registration_trigger", "username": username}),
        None,
    ) {
        log::warn!("Failed to log registration trigger for {}: {}", user_id, e);
    }

    let admin_name = notifications::admin_display_name();
    let request = templates::render(conn, "binding_code_request", &[("admin_username", &admin_name)]);
    bot.send_message(chat_id, request).await?;
    let prompt = templates::get(conn, "binding_code_prompt");
    bot.send_message(chat_id, prompt).await?;

    // Step 0: waiting for the code.
    drafts::upsert(conn, user_id, 0, &Draft::default().to_value()?)?;
    Ok(())
}

async fn handle_binding_code_input(
    bot: &Bot,
    conn: &Connection,
    msg: &Message,
    text: &str,
) -> Result<(), HandlerError> {
    let chat_id = msg.chat.id;
    let user_id = chat_id.0;
    let code = text.trim().to_uppercase();

    if !regex_is_match!(r"^[A-Z0-9]{8}$", &code) {
        let invalid = templates::get(conn, "invalid_binding_code");
        bot.send_message(chat_id, invalid).await?;
        // Leave code-entry mode so other messages work again.
        drafts::clear(conn, user_id)?;
        return Ok(());
    }

    // Scrub the code from the chat history.
    let _ = bot.delete_message(chat_id, msg.id).await;

    let outcome = binding_codes::redeem(conn, &code, user_id)?;
    bot.send_message(chat_id, outcome.message()).await?;

    match outcome {
        binding_codes::RedeemOutcome::Success { merchant_id } => {
            // Seed name/contact from the Telegram account; both remain
            // editable later.
            if let Some(user) = msg.from.as_ref() {
                let seeded = merchants::update(
                    conn,
                    merchant_id,
                    &merchants::MerchantUpdate {
                        name: Some(user.full_name()),
                        contact_info: user.username.as_ref().map(|u| format!("@{}", u)),
                        ..Default::default()
                    },
                );
                if let Err(e) = seeded {
                    log::warn!("Failed to seed merchant {} from Telegram profile: {}", merchant_id, e);
                }
            }

            if let Err(e) = activity_log::append(
                conn,
                user_id,
                ActionType::BindingCodeUsed,
                serde_json::json!({"code": code, "merchant_id": merchant_id}),
                Some(merchant_id),
            ) {
                log::warn!("Failed to log code redemption for {}: {}", user_id, e);
            }

            let draft = Draft::default();
            drafts::upsert(conn, user_id, 1, &draft.to_value()?)?;
            let view = flow::render_step(conn, 1, &draft, Some(merchant_id), today())?;
            send_view(bot, chat_id, &view).await?;
        }
        other => {
            if let Err(e) = activity_log::append(
                conn,
                user_id,
                ActionType::ErrorEvent,
                serde_json::json!({"action": "binding_code_failed", "code": code, "error": other.message()}),
                None,
            ) {
                log::warn!("Failed to log code failure for {}: {}", user_id, e);
            }
            drafts::clear(conn, user_id)?;
        }
    }
    Ok(())
}

async fn handle_step_text(
    bot: &Bot,
    conn: &Connection,
    chat_id: ChatId,
    step: u8,
    answers: &serde_json::Value,
    text: &str,
) -> Result<(), HandlerError> {
    let user_id = chat_id.0;
    let mut draft = Draft::from_value(answers)?;
    let merchant = merchants::get_by_chat_id(conn, user_id)?;
    let merchant_id = merchant.as_ref().map(|m| m.id);

    let outcome = flow::apply_text(conn, &mut draft, step, text, merchant_id)?;
    present_outcome(bot, conn, chat_id, step, draft, outcome, merchant_id).await
}

/// Delivers an interpreter outcome in message mode (new messages; the
/// prompt the user answered stays above).
async fn present_outcome(
    bot: &Bot,
    conn: &Connection,
    chat_id: ChatId,
    current_step: u8,
    draft: Draft,
    outcome: Outcome,
    merchant_id: Option<i64>,
) -> Result<(), HandlerError> {
    let user_id = chat_id.0;
    match outcome {
        Outcome::Advance { next, notice } => {
            drafts::upsert(conn, user_id, next, &draft.to_value()?)?;
            let mut view = if next == STEP_CONFIRM {
                flow::render_overview(conn, &draft, merchant_id)?
            } else {
                flow::render_step(conn, next, &draft, merchant_id, today())?
            };
            if let Some(notice) = notice {
                view.text = format!("{}\n\n{}", notice, view.text);
            }
            send_view(bot, chat_id, &view).await?;
        }
        Outcome::Stay { notice } => {
            drafts::upsert(conn, user_id, current_step, &draft.to_value()?)?;
            let mut view = flow::render_step(conn, current_step, &draft, merchant_id, today())?;
            if let Some(notice) = notice {
                view.text = format!("{}\n\n{}", notice, view.text);
            }
            send_view(bot, chat_id, &view).await?;
        }
        Outcome::Invalid { message } => {
            // Re-prompt: the step's prompt is still the previous message.
            bot.send_message(chat_id, message).await?;
        }
        Outcome::DeadEnd { message, back_to } => {
            drafts::upsert(conn, user_id, back_to, &draft.to_value()?)?;
            bot.send_message(chat_id, message).await?;
            let view = flow::render_step(conn, back_to, &draft, merchant_id, today())?;
            send_view(bot, chat_id, &view).await?;
        }
        Outcome::BackToSummary { notice } => {
            drafts::clear(conn, user_id)?;
            if let Some(notice) = notice {
                bot.send_message(chat_id, notice).await?;
            }
            let changed = steps::step(current_step).map(|d| d.title).unwrap_or("资料");
            if let Some(id) = merchant_id {
                notifications::notify_admins_profile_edit(bot, id, &[changed]).await;
            }
            show_profile_panel(bot, conn, chat_id).await?;
        }
        Outcome::Submitted { .. } | Outcome::SlotTaken => {
            // Final confirmation is callback-driven; text input never
            // lands here.
            show_profile_panel(bot, conn, chat_id).await?;
        }
    }
    Ok(())
}

async fn handle_media_message(bot: &Bot, conn: &Connection, msg: &Message) -> Result<(), HandlerError> {
    let chat_id = msg.chat.id;
    let user_id = chat_id.0;

    let Some(stored) = drafts::load(conn, user_id)? else {
        return Ok(());
    };
    if stored.step != STEP_MEDIA {
        return Ok(());
    }
    let Some(merchant) = merchants::get_by_chat_id(conn, user_id)? else {
        return Ok(());
    };

    let (file_id, kind) = if let Some(photos) = msg.photo() {
        match photos.iter().max_by_key(|p| p.width * p.height) {
            Some(photo) => (photo.file.id.0.clone(), MediaKind::Photo),
            None => return Ok(()),
        }
    } else if let Some(video) = msg.video() {
        (video.file.id.0.clone(), MediaKind::Video)
    } else {
        return Ok(());
    };

    let count = media::add(conn, merchant.id, &file_id, kind)?;
    let mut reply = format!("已上传 {}/{}", count, config::onboarding::MEDIA_REQUIRED);
    if count >= config::onboarding::MEDIA_REQUIRED {
        reply.push_str("，可点击“完成上传”。");
    }
    bot.send_message(chat_id, reply).await?;
    Ok(())
}
