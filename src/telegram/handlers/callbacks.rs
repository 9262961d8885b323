//! Callback-query routing
//!
//! One decode, one match. Flow actions run through the onboarding
//! interpreter; admin actions are gated and handed to the admin panels.

use rusqlite::Connection;
use teloxide::prelude::*;
use teloxide::types::MessageId;

use crate::core::config;
use crate::core::types::ActionType;
use crate::onboarding::{flow, steps, Draft, FlowAction, Outcome, STEP_CONFIRM};
use crate::storage::{activity_log, drafts, merchants, templates};
use crate::telegram::admin;
use crate::telegram::callback::CallbackCommand;
use crate::telegram::handlers::messages::today;
use crate::telegram::handlers::types::{edit_view, show_profile_panel, HandlerDeps, HandlerError};
use crate::telegram::notifications;
use crate::telegram::Bot;

/// Top-level callback endpoint with the same catch-log-apologize boundary
/// as the message handler.
pub async fn handle_callback(bot: Bot, q: CallbackQuery, deps: HandlerDeps) -> Result<(), HandlerError> {
    let callback_id = q.id.clone();

    let (chat_id, message_id) = match q.message.as_ref() {
        Some(message) => (message.chat().id, message.id()),
        None => {
            let _ = bot.answer_callback_query(callback_id).await;
            return Ok(());
        }
    };
    let Some(data) = q.data.clone() else {
        let _ = bot.answer_callback_query(callback_id).await;
        return Ok(());
    };

    let Some(command) = CallbackCommand::parse(&data) else {
        log::warn!("Unparseable callback data from chat {}: {}", chat_id.0, data);
        let _ = bot.answer_callback_query(callback_id).text("该按钮已失效").await;
        return Ok(());
    };

    let _ = bot.answer_callback_query(callback_id).await;

    if let Err(e) = route_callback(&bot, &deps, chat_id, message_id, &data, command).await {
        log::error!("Callback handler error for chat {}: {}", chat_id.0, e);
        if let Ok(conn) = deps.conn() {
            let apology = templates::get(&conn, "error_general");
            let _ = bot.send_message(chat_id, apology).await;
        }
    }
    Ok(())
}

async fn route_callback(
    bot: &Bot,
    deps: &HandlerDeps,
    chat_id: ChatId,
    message_id: MessageId,
    raw_data: &str,
    command: CallbackCommand,
) -> Result<(), HandlerError> {
    let conn = deps.conn()?;

    if let Err(e) = activity_log::append(
        &conn,
        chat_id.0,
        ActionType::ButtonClick,
        serde_json::json!({"button": raw_data}),
        None,
    ) {
        log::warn!("Failed to log button click for {}: {}", chat_id.0, e);
    }

    match command {
        CallbackCommand::Noop => Ok(()),
        CallbackCommand::Admin(action) => {
            if !config::is_admin(chat_id.0) {
                log::warn!("Non-admin chat {} sent admin callback {}", chat_id.0, raw_data);
                return Ok(());
            }
            admin::handle_action(bot, &conn, chat_id, message_id, action).await
        }
        CallbackCommand::Flow(action) => handle_flow_action(bot, &conn, chat_id, message_id, action).await,
    }
}

async fn handle_flow_action(
    bot: &Bot,
    conn: &Connection,
    chat_id: ChatId,
    message_id: MessageId,
    action: FlowAction,
) -> Result<(), HandlerError> {
    let user_id = chat_id.0;
    let merchant = merchants::get_by_chat_id(conn, user_id)?;
    let merchant_id = merchant.as_ref().map(|m| m.id);

    let stored = drafts::load(conn, user_id)?;
    let (mut draft, current_step) = match &stored {
        Some(s) => (Draft::from_value(&s.answers)?, s.step),
        None => (Draft::default(), STEP_CONFIRM),
    };

    match action {
        FlowAction::Overview => {
            draft.edit_mode = false;
            drafts::upsert(conn, user_id, STEP_CONFIRM, &draft.to_value()?)?;
            let view = flow::render_overview(conn, &draft, merchant_id)?;
            edit_view(bot, chat_id, message_id, &view).await;
            Ok(())
        }
        FlowAction::GoToStep(step) => {
            draft.edit_mode = false;
            drafts::upsert(conn, user_id, step, &draft.to_value()?)?;
            let view = flow::render_step(conn, step, &draft, merchant_id, today())?;
            edit_view(bot, chat_id, message_id, &view).await;
            Ok(())
        }
        FlowAction::EditField(step) => {
            let Some(merchant) = &merchant else {
                bot.send_message(chat_id, templates::get(conn, "not_a_merchant")).await?;
                return Ok(());
            };
            let draft = flow::draft_from_merchant(conn, merchant)?;
            drafts::upsert(conn, user_id, step, &draft.to_value()?)?;
            let view = flow::render_step(conn, step, &draft, merchant_id, today())?;
            edit_view(bot, chat_id, message_id, &view).await;
            Ok(())
        }
        FlowAction::Confirm => {
            let Some(merchant) = &merchant else {
                bot.send_message(chat_id, templates::get(conn, "not_a_merchant")).await?;
                return Ok(());
            };
            handle_confirm(bot, conn, chat_id, message_id, draft, merchant.id).await
        }
        other => {
            let outcome = flow::apply_choice(conn, &mut draft, current_step, &other, merchant_id, today())?;
            present_outcome(bot, conn, chat_id, message_id, current_step, draft, outcome, merchant_id).await
        }
    }
}

async fn handle_confirm(
    bot: &Bot,
    conn: &Connection,
    chat_id: ChatId,
    message_id: MessageId,
    mut draft: Draft,
    merchant_id: i64,
) -> Result<(), HandlerError> {
    let user_id = chat_id.0;
    match flow::finalize(conn, user_id, &draft, merchant_id)? {
        Outcome::Submitted {
            publish_date,
            publish_slot,
        } => {
            let success = templates::render(
                conn,
                "submission_success",
                &[("publish_date", publish_date.as_str()), ("publish_slot", publish_slot.as_str())],
            );
            bot.send_message(chat_id, success).await?;

            if let Some(updated) = merchants::get_by_id(conn, merchant_id)? {
                notifications::notify_admins_submission(bot, conn, &updated).await;
            }
            show_profile_panel(bot, conn, chat_id).await
        }
        Outcome::SlotTaken => {
            // Lost the race at the conditional claim; redo step 9.
            draft.publish_slot = None;
            drafts::upsert(conn, user_id, 9, &draft.to_value()?)?;
            let mut view = flow::render_step(conn, 9, &draft, Some(merchant_id), today())?;
            view.text = format!("{}\n\n{}", templates::get(conn, "slot_taken"), view.text);
            edit_view(bot, chat_id, message_id, &view).await;
            Ok(())
        }
        Outcome::Invalid { message } => {
            let mut view = flow::render_overview(conn, &draft, Some(merchant_id))?;
            view.text = format!("{}\n\n{}", message, view.text);
            edit_view(bot, chat_id, message_id, &view).await;
            Ok(())
        }
        other => {
            log::error!("Unexpected finalize outcome for merchant {}: {:?}", merchant_id, other);
            Ok(())
        }
    }
}

/// Delivers an interpreter outcome in callback mode (edit in place).
#[allow(clippy::too_many_arguments)]
async fn present_outcome(
    bot: &Bot,
    conn: &Connection,
    chat_id: ChatId,
    message_id: MessageId,
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
            edit_view(bot, chat_id, message_id, &view).await;
        }
        Outcome::Stay { notice } => {
            drafts::upsert(conn, user_id, current_step, &draft.to_value()?)?;
            let render_step = if steps::step(current_step).is_some() {
                current_step
            } else {
                // Stale keyboard with no live step; fall back to the overview.
                STEP_CONFIRM
            };
            let mut view = if render_step == STEP_CONFIRM {
                flow::render_overview(conn, &draft, merchant_id)?
            } else {
                flow::render_step(conn, render_step, &draft, merchant_id, today())?
            };
            if let Some(notice) = notice {
                view.text = format!("{}\n\n{}", notice, view.text);
            }
            edit_view(bot, chat_id, message_id, &view).await;
        }
        Outcome::Invalid { message } => {
            let mut view = flow::render_step(conn, current_step, &draft, merchant_id, today())?;
            view.text = format!("{}\n\n{}", message, view.text);
            edit_view(bot, chat_id, message_id, &view).await;
        }
        Outcome::DeadEnd { message, back_to } => {
            drafts::upsert(conn, user_id, back_to, &draft.to_value()?)?;
            let mut view = flow::render_step(conn, back_to, &draft, merchant_id, today())?;
            view.text = format!("{}\n\n{}", message, view.text);
            edit_view(bot, chat_id, message_id, &view).await;
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
            // Only `Confirm` produces these; handled in handle_confirm.
            show_profile_panel(bot, conn, chat_id).await?;
        }
    }
    Ok(())
}
