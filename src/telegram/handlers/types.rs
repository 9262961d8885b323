//! Handler types, dependencies and panel helpers

use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use teloxide::prelude::*;
use teloxide::types::MessageId;

use crate::onboarding::StepView;
use crate::storage::{db, get_connection, merchants};
use crate::telegram::keyboards::view_markup;
use crate::telegram::Bot;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub db_pool: Arc<db::DbPool>,
}

impl HandlerDeps {
    pub fn new(db_pool: Arc<db::DbPool>) -> Self {
        Self { db_pool }
    }

    /// Pool checkout with a handler-friendly error type.
    pub fn conn(&self) -> Result<db::DbConnection, HandlerError> {
        get_connection(&self.db_pool).map_err(|e| Box::new(e) as HandlerError)
    }
}

/// Last profile-panel message per chat. Process-local cache on top of the
/// DB-persisted draft, so panels edit in place instead of stacking; lost
/// on restart, which only costs one extra message.
pub static PANEL_MESSAGE_IDS: Lazy<DashMap<i64, MessageId>> = Lazy::new(DashMap::new);

/// Sends a flow view as a new message.
pub async fn send_view(bot: &Bot, chat_id: ChatId, view: &StepView) -> Result<Message, teloxide::RequestError> {
    bot.send_message(chat_id, view.text.clone())
        .reply_markup(view_markup(view))
        .await
}

/// Edits a message in place to show a flow view; falls back to sending a
/// fresh message when the edit is rejected (deleted message, stale id).
pub async fn edit_view(bot: &Bot, chat_id: ChatId, message_id: MessageId, view: &StepView) {
    let edited = bot
        .edit_message_text(chat_id, message_id, view.text.clone())
        .reply_markup(view_markup(view))
        .await;
    if let Err(e) = edited {
        log::debug!("Edit failed for chat {} ({}), sending fresh message", chat_id.0, e);
        if let Err(e) = send_view(bot, chat_id, view).await {
            log::error!("Failed to send view to chat {}: {}", chat_id.0, e);
        }
    }
}

/// Shows (or refreshes) the profile summary panel for a merchant chat.
pub async fn show_profile_panel(
    bot: &Bot,
    conn: &rusqlite::Connection,
    chat_id: ChatId,
) -> Result<(), HandlerError> {
    let Some(merchant) = merchants::get_by_chat_id(conn, chat_id.0)? else {
        let text = crate::storage::templates::get(conn, "not_a_merchant");
        bot.send_message(chat_id, text).await?;
        return Ok(());
    };

    let view = crate::onboarding::flow::render_profile_summary(conn, &merchant)?;

    if let Some(panel_id) = PANEL_MESSAGE_IDS.get(&chat_id.0).map(|entry| *entry.value()) {
        let edited = bot
            .edit_message_text(chat_id, panel_id, view.text.clone())
            .reply_markup(view_markup(&view))
            .await;
        if edited.is_ok() {
            return Ok(());
        }
    }

    let sent = send_view(bot, chat_id, &view).await?;
    PANEL_MESSAGE_IDS.insert(chat_id.0, sent.id);
    Ok(())
}
