//! Slash-command endpoints

use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::core::{analytics, config};
use crate::storage::{binding_codes, merchants, templates};
use crate::telegram::admin;
use crate::telegram::handlers::types::{show_profile_panel, HandlerDeps, HandlerError};
use crate::telegram::{Bot, Command};

/// Top-level command endpoint with the catch-log-apologize boundary.
pub async fn handle_command(bot: Bot, msg: Message, cmd: Command, deps: HandlerDeps) -> Result<(), HandlerError> {
    if !msg.chat.is_private() {
        return Ok(());
    }

    if let Err(e) = route_command(&bot, &msg, &cmd, &deps).await {
        log::error!("Command handler error for chat {} ({:?}): {}", msg.chat.id.0, cmd, e);
        if let Ok(conn) = deps.conn() {
            let apology = templates::get(&conn, "error_general");
            let _ = bot.send_message(msg.chat.id, apology).await;
        }
    }
    Ok(())
}

async fn route_command(bot: &Bot, msg: &Message, cmd: &Command, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let conn = deps.conn()?;
    let chat_id = msg.chat.id;

    match cmd {
        Command::Start => {
            if merchants::get_by_chat_id(&conn, chat_id.0)?.is_some() {
                show_profile_panel(bot, &conn, chat_id).await?;
            } else {
                bot.send_message(
                    chat_id,
                    format!(
                        "👋 欢迎！\n\n发送「{}」开始商户注册。\n输入 /help 查看全部命令。",
                        config::REGISTRATION_TRIGGER
                    ),
                )
                .await?;
            }
        }
        Command::Profile => {
            show_profile_panel(bot, &conn, chat_id).await?;
        }
        Command::Help => {
            let mut text = Command::descriptions().to_string();
            text.push_str(&format!("\n\n发送「{}」开始商户注册。", config::REGISTRATION_TRIGGER));
            bot.send_message(chat_id, text).await?;
        }
        Command::Admin => {
            if !config::is_admin(chat_id.0) {
                return Ok(());
            }
            admin::send_panel(bot, chat_id).await?;
        }
        Command::Gencode => {
            if !config::is_admin(chat_id.0) {
                return Ok(());
            }
            let code = binding_codes::generate(&conn, config::binding_code::DEFAULT_EXPIRY_HOURS)?;
            bot.send_message(
                chat_id,
                format!(
                    "🔑 新绑定码：{}\n有效期至：{}",
                    code.code,
                    code.expires_at.as_deref().unwrap_or("永久")
                ),
            )
            .await?;
        }
        Command::Stats => {
            if !config::is_admin(chat_id.0) {
                return Ok(());
            }
            let report = analytics::build_report(&conn, 7)?;
            bot.send_message(chat_id, analytics::render_report(&report)).await?;
        }
    }
    Ok(())
}
