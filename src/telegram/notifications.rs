//! Admin notifications

use rusqlite::Connection;
use teloxide::prelude::*;
use teloxide::types::InlineKeyboardMarkup;

use crate::core::config;
use crate::storage::merchants::Merchant;
use crate::storage::{keywords, regions};
use crate::telegram::callback::{AdminAction, CallbackCommand};
use crate::telegram::keyboards::cb;
use crate::telegram::Bot;

/// Fans a plain text message out to every configured admin. Individual
/// send failures are logged and skipped.
pub async fn notify_admins_text(bot: &Bot, text: &str) {
    for admin_id in config::ADMIN_IDS.iter() {
        if let Err(e) = bot.send_message(ChatId(*admin_id), text.to_string()).await {
            log::warn!("Failed to notify admin {}: {}", admin_id, e);
        }
    }
}

/// The admin contact handle for "get a binding code" prompts.
pub fn admin_display_name() -> String {
    config::ADMIN_USERNAME.clone()
}

/// Announces a fresh submission to the admins with approve/reject buttons.
pub async fn notify_admins_submission(bot: &Bot, conn: &Connection, merchant: &Merchant) {
    let city = match merchant.city_id {
        Some(id) => regions::get_city_by_id(conn, id)
            .ok()
            .flatten()
            .map(|c| c.name)
            .unwrap_or_else(|| "-".to_string()),
        None => "-".to_string(),
    };
    let keyword_names = keywords::get_for_merchant(conn, merchant.id)
        .map(|list| {
            list.into_iter()
                .map(|k| k.name)
                .collect::<Vec<_>>()
                .join("、")
        })
        .unwrap_or_default();

    let text = format!(
        "📮 新的商户资料提交\n\n商户ID：{}\n名称：{}\n类型：{}\n城市：{}\n发布时间：{} {}\n关键词：{}",
        merchant.id,
        merchant.name.clone().unwrap_or_else(|| "-".to_string()),
        merchant
            .merchant_type
            .map(|t| t.display_name().to_string())
            .unwrap_or_else(|| "-".to_string()),
        city,
        merchant.publish_date.clone().unwrap_or_default(),
        merchant.publish_slot.clone().unwrap_or_default(),
        if keyword_names.is_empty() { "-".to_string() } else { keyword_names },
    );

    let markup = InlineKeyboardMarkup::new(vec![vec![
        cb("✅ 通过", CallbackCommand::Admin(AdminAction::Approve(merchant.id))),
        cb("❌ 退回", CallbackCommand::Admin(AdminAction::Reject(merchant.id))),
    ]]);

    for admin_id in config::ADMIN_IDS.iter() {
        let sent = bot
            .send_message(ChatId(*admin_id), text.clone())
            .reply_markup(markup.clone())
            .await;
        if let Err(e) = sent {
            log::warn!("Failed to notify admin {} about submission: {}", admin_id, e);
        }
    }
}

/// Announces a field-level profile edit, listing the changed fields.
pub async fn notify_admins_profile_edit(bot: &Bot, merchant_id: i64, changed: &[&str]) {
    if changed.is_empty() {
        return;
    }
    let text = format!(
        "📝 商家信息更新通知\n商户ID：{}\n变更字段：{}",
        merchant_id,
        changed.join("、")
    );
    notify_admins_text(bot, &text).await;
}
