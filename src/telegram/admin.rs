//! Admin panels: binding codes, region and slot management, statistics,
//! submission review
//!
//! Free-text inputs (new city/district/slot names) go through a
//! process-local pending-input map; everything else is callback-driven
//! and edits the panel message in place.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use rusqlite::Connection;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, MessageId};

use lazy_regex::regex_is_match;

use crate::core::types::{ActionType, MerchantStatus};
use crate::core::{analytics, config, AppError};
use crate::storage::{activity_log, binding_codes, keywords, media, merchants, regions, slots};
use crate::telegram::callback::{AdminAction, CallbackCommand};
use crate::telegram::handlers::types::HandlerError;
use crate::telegram::keyboards::cb;
use crate::telegram::Bot;

/// What the next free-text message from this admin means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingInput {
    AddCity,
    AddDistrict(i64),
    AddSlot,
    AddKeyword,
}

static PENDING_INPUT: Lazy<DashMap<i64, PendingInput>> = Lazy::new(DashMap::new);

/// Consumes the pending-input marker for this admin, if any.
pub fn take_pending_input(user_id: i64) -> Option<PendingInput> {
    PENDING_INPUT.remove(&user_id).map(|(_, input)| input)
}

fn set_pending_input(user_id: i64, input: PendingInput) {
    PENDING_INPUT.insert(user_id, input);
}

fn panel_markup() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![cb("📊 活动统计", CallbackCommand::Admin(AdminAction::Stats))],
        vec![cb("🔑 绑定码管理", CallbackCommand::Admin(AdminAction::Codes))],
        vec![cb("🗺️ 地区管理", CallbackCommand::Admin(AdminAction::Regions))],
        vec![cb("⏰ 发布时间槽", CallbackCommand::Admin(AdminAction::Slots))],
        vec![cb("🏷️ 关键词管理", CallbackCommand::Admin(AdminAction::Keywords))],
    ])
}

/// Sends the main admin panel as a new message.
pub async fn send_panel(bot: &Bot, chat_id: ChatId) -> Result<(), HandlerError> {
    bot.send_message(chat_id, "🛠️ 管理面板")
        .reply_markup(panel_markup())
        .await?;
    Ok(())
}

async fn edit_panel(bot: &Bot, chat_id: ChatId, message_id: MessageId, text: String, markup: InlineKeyboardMarkup) {
    let edited = bot
        .edit_message_text(chat_id, message_id, text.clone())
        .reply_markup(markup.clone())
        .await;
    if edited.is_err() {
        if let Err(e) = bot.send_message(chat_id, text).reply_markup(markup).await {
            log::error!("Failed to show admin panel for chat {}: {}", chat_id.0, e);
        }
    }
}

fn back_row() -> Vec<teloxide::types::InlineKeyboardButton> {
    vec![cb("⬅️ 返回管理面板", CallbackCommand::Admin(AdminAction::Panel))]
}

/// Dispatches one admin panel action. Caller has already checked the
/// admin gate.
pub async fn handle_action(
    bot: &Bot,
    conn: &Connection,
    chat_id: ChatId,
    message_id: MessageId,
    action: AdminAction,
) -> Result<(), HandlerError> {
    match action {
        AdminAction::Panel => {
            edit_panel(bot, chat_id, message_id, "🛠️ 管理面板".to_string(), panel_markup()).await;
        }
        AdminAction::Stats => {
            let report = analytics::build_report(conn, 7)?;
            let mut text = analytics::render_report(&report);
            text.push_str("\n🧾 商户状态分布：\n");
            for (status, count) in merchants::count_by_status(conn)? {
                text.push_str(&format!("• {}: {}\n", status, count));
            }
            edit_panel(bot, chat_id, message_id, text, InlineKeyboardMarkup::new(vec![back_row()])).await;
        }
        AdminAction::Codes => {
            show_codes(bot, conn, chat_id, message_id, None).await?;
        }
        AdminAction::GenCode => {
            let code = binding_codes::generate(conn, config::binding_code::DEFAULT_EXPIRY_HOURS)?;
            log_admin_action(conn, chat_id.0, "generate_binding_code", &code.code);
            show_codes(bot, conn, chat_id, message_id, Some(format!("🔑 新绑定码：{}", code.code))).await?;
        }
        AdminAction::Regions => {
            show_regions(bot, conn, chat_id, message_id).await?;
        }
        AdminAction::ShowCity(city_id) => {
            show_city(bot, conn, chat_id, message_id, city_id).await?;
        }
        AdminAction::AddCity => {
            set_pending_input(chat_id.0, PendingInput::AddCity);
            bot.send_message(chat_id, "请输入新城市名称：").await?;
        }
        AdminAction::AddDistrict(city_id) => {
            set_pending_input(chat_id.0, PendingInput::AddDistrict(city_id));
            bot.send_message(chat_id, "请输入新地区名称：").await?;
        }
        AdminAction::ToggleCity(city_id) => {
            regions::toggle_city(conn, city_id)?;
            show_city(bot, conn, chat_id, message_id, city_id).await?;
        }
        AdminAction::DeleteCity(city_id) => {
            match regions::delete_city(conn, city_id) {
                Ok(()) => {
                    log_admin_action(conn, chat_id.0, "delete_city", &city_id.to_string());
                    show_regions(bot, conn, chat_id, message_id).await?;
                }
                Err(AppError::Conflict(reason)) => {
                    bot.send_message(chat_id, format!("⚠️ 无法删除：{}", reason)).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }
        AdminAction::ToggleDistrict(district_id) => {
            let city_id = regions::get_district_by_id(conn, district_id)?.map(|d| d.city_id);
            regions::toggle_district(conn, district_id)?;
            match city_id {
                Some(city_id) => show_city(bot, conn, chat_id, message_id, city_id).await?,
                None => show_regions(bot, conn, chat_id, message_id).await?,
            }
        }
        AdminAction::DeleteDistrict(district_id) => {
            let city_id = regions::get_district_by_id(conn, district_id)?.map(|d| d.city_id);
            regions::delete_district(conn, district_id)?;
            log_admin_action(conn, chat_id.0, "delete_district", &district_id.to_string());
            match city_id {
                Some(city_id) => show_city(bot, conn, chat_id, message_id, city_id).await?,
                None => show_regions(bot, conn, chat_id, message_id).await?,
            }
        }
        AdminAction::Slots => {
            show_slots(bot, conn, chat_id, message_id).await?;
        }
        AdminAction::AddSlot => {
            set_pending_input(chat_id.0, PendingInput::AddSlot);
            bot.send_message(chat_id, "请输入发布时间（格式 HH:MM，例如 20:00）：").await?;
        }
        AdminAction::ToggleSlot(slot_id) => {
            slots::toggle(conn, slot_id)?;
            show_slots(bot, conn, chat_id, message_id).await?;
        }
        AdminAction::DeleteSlot(slot_id) => {
            slots::delete(conn, slot_id)?;
            show_slots(bot, conn, chat_id, message_id).await?;
        }
        AdminAction::Keywords => {
            show_keywords(bot, conn, chat_id, message_id).await?;
        }
        AdminAction::AddKeyword => {
            set_pending_input(chat_id.0, PendingInput::AddKeyword);
            bot.send_message(chat_id, "请输入新关键词：").await?;
        }
        AdminAction::ToggleKeyword(keyword_id) => {
            keywords::toggle(conn, keyword_id)?;
            show_keywords(bot, conn, chat_id, message_id).await?;
        }
        AdminAction::DeleteKeyword(keyword_id) => {
            keywords::delete(conn, keyword_id)?;
            log_admin_action(conn, chat_id.0, "delete_keyword", &keyword_id.to_string());
            show_keywords(bot, conn, chat_id, message_id).await?;
        }
        AdminAction::Approve(merchant_id) => {
            review_merchant(bot, conn, chat_id, message_id, merchant_id, true).await?;
        }
        AdminAction::Reject(merchant_id) => {
            review_merchant(bot, conn, chat_id, message_id, merchant_id, false).await?;
        }
    }
    Ok(())
}

async fn show_codes(
    bot: &Bot,
    conn: &Connection,
    chat_id: ChatId,
    message_id: MessageId,
    notice: Option<String>,
) -> Result<(), HandlerError> {
    let stats = binding_codes::statistics(conn)?;
    let live = binding_codes::list(conn, false, 10)?;

    let mut text = String::new();
    if let Some(notice) = notice {
        text.push_str(&notice);
        text.push_str("\n\n");
    }
    text.push_str(&format!(
        "🔑 绑定码\n\n总数：{}\n已使用：{}\n当前有效：{}\n24小时内新建：{}\n",
        stats.total, stats.used, stats.valid, stats.recent_24h
    ));
    if !live.is_empty() {
        text.push_str("\n有效绑定码：\n");
        for code in &live {
            text.push_str(&format!(
                "• {}（{}）\n",
                code.code,
                code.expires_at.as_deref().unwrap_or("永久")
            ));
        }
    }

    let markup = InlineKeyboardMarkup::new(vec![
        vec![cb("➕ 生成绑定码", CallbackCommand::Admin(AdminAction::GenCode))],
        back_row(),
    ]);
    edit_panel(bot, chat_id, message_id, text, markup).await;
    Ok(())
}

async fn show_regions(
    bot: &Bot,
    conn: &Connection,
    chat_id: ChatId,
    message_id: MessageId,
) -> Result<(), HandlerError> {
    let cities = regions::get_all_cities(conn)?;

    let mut rows: Vec<Vec<teloxide::types::InlineKeyboardButton>> = cities
        .iter()
        .map(|city| {
            let marker = if city.is_active { "✅" } else { "🚫" };
            vec![cb(
                format!("{} {}", marker, city.name),
                CallbackCommand::Admin(AdminAction::ShowCity(city.id)),
            )]
        })
        .collect();
    rows.push(vec![cb("➕ 新增城市", CallbackCommand::Admin(AdminAction::AddCity))]);
    rows.push(back_row());

    let text = format!("🗺️ 地区管理\n\n共 {} 个城市，点击查看地区。", cities.len());
    edit_panel(bot, chat_id, message_id, text, InlineKeyboardMarkup::new(rows)).await;
    Ok(())
}

async fn show_city(
    bot: &Bot,
    conn: &Connection,
    chat_id: ChatId,
    message_id: MessageId,
    city_id: i64,
) -> Result<(), HandlerError> {
    let Some(city) = regions::get_city_by_id(conn, city_id)? else {
        show_regions(bot, conn, chat_id, message_id).await?;
        return Ok(());
    };
    let districts = regions::get_all_districts_by_city(conn, city_id)?;

    let mut rows: Vec<Vec<teloxide::types::InlineKeyboardButton>> = Vec::new();
    for district in &districts {
        let marker = if district.is_active { "✅" } else { "🚫" };
        rows.push(vec![
            cb(
                format!("{} {}", marker, district.name),
                CallbackCommand::Admin(AdminAction::ToggleDistrict(district.id)),
            ),
            cb("🗑️", CallbackCommand::Admin(AdminAction::DeleteDistrict(district.id))),
        ]);
    }
    rows.push(vec![cb(
        "➕ 新增地区",
        CallbackCommand::Admin(AdminAction::AddDistrict(city_id)),
    )]);
    rows.push(vec![
        cb(
            if city.is_active { "🚫 停用城市" } else { "✅ 启用城市" },
            CallbackCommand::Admin(AdminAction::ToggleCity(city_id)),
        ),
        cb("🗑️ 删除城市", CallbackCommand::Admin(AdminAction::DeleteCity(city_id))),
    ]);
    rows.push(vec![cb("⬅️ 返回地区列表", CallbackCommand::Admin(AdminAction::Regions))]);

    let text = format!(
        "🏙️ {}（{}）\n\n地区数：{}\n点击地区名切换启用状态。",
        city.name,
        if city.is_active { "启用中" } else { "已停用" },
        districts.len()
    );
    edit_panel(bot, chat_id, message_id, text, InlineKeyboardMarkup::new(rows)).await;
    Ok(())
}

async fn show_slots(
    bot: &Bot,
    conn: &Connection,
    chat_id: ChatId,
    message_id: MessageId,
) -> Result<(), HandlerError> {
    let all = slots::all(conn)?;

    let mut rows: Vec<Vec<teloxide::types::InlineKeyboardButton>> = Vec::new();
    for slot in &all {
        let marker = if slot.is_active { "✅" } else { "🚫" };
        rows.push(vec![
            cb(
                format!("{} {}", marker, slot.time_str),
                CallbackCommand::Admin(AdminAction::ToggleSlot(slot.id)),
            ),
            cb("🗑️", CallbackCommand::Admin(AdminAction::DeleteSlot(slot.id))),
        ]);
    }
    rows.push(vec![cb("➕ 新增时间槽", CallbackCommand::Admin(AdminAction::AddSlot))]);
    rows.push(back_row());

    let text = format!("⏰ 发布时间槽\n\n共 {} 个，点击切换启用状态。", all.len());
    edit_panel(bot, chat_id, message_id, text, InlineKeyboardMarkup::new(rows)).await;
    Ok(())
}

async fn show_keywords(
    bot: &Bot,
    conn: &Connection,
    chat_id: ChatId,
    message_id: MessageId,
) -> Result<(), HandlerError> {
    let all = keywords::all(conn)?;

    let mut rows: Vec<Vec<teloxide::types::InlineKeyboardButton>> = Vec::new();
    for keyword in &all {
        let marker = if keyword.is_active { "✅" } else { "🚫" };
        rows.push(vec![
            cb(
                format!("{} {}", marker, keyword.name),
                CallbackCommand::Admin(AdminAction::ToggleKeyword(keyword.id)),
            ),
            cb("🗑️", CallbackCommand::Admin(AdminAction::DeleteKeyword(keyword.id))),
        ]);
    }
    rows.push(vec![cb("➕ 新增关键词", CallbackCommand::Admin(AdminAction::AddKeyword))]);
    rows.push(back_row());

    let text = format!("🏷️ 关键词管理\n\n共 {} 个，点击切换启用状态。", all.len());
    edit_panel(bot, chat_id, message_id, text, InlineKeyboardMarkup::new(rows)).await;
    Ok(())
}

async fn review_merchant(
    bot: &Bot,
    conn: &Connection,
    chat_id: ChatId,
    message_id: MessageId,
    merchant_id: i64,
    approve: bool,
) -> Result<(), HandlerError> {
    let Some(merchant) = merchants::get_by_id(conn, merchant_id)? else {
        bot.send_message(chat_id, format!("商户 {} 不存在。", merchant_id)).await?;
        return Ok(());
    };

    let verdict = if approve {
        match merchants::update_status(conn, merchant_id, MerchantStatus::Approved, false) {
            Ok(()) => {
                let _ = bot
                    .send_message(ChatId(merchant.telegram_chat_id), "✅ 您的资料已审核通过，将按预定时间发布。")
                    .await;
                "已通过"
            }
            Err(AppError::Conflict(reason)) => {
                bot.send_message(chat_id, format!("⚠️ {}", reason)).await?;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
    } else {
        // Reset frees the slot for other merchants and empties the
        // gallery so the rejected material is not resubmitted as-is.
        merchants::clear_publish_slot(conn, merchant_id)?;
        media::clear_for_merchant(conn, merchant_id)?;
        merchants::update_status(conn, merchant_id, MerchantStatus::PendingSubmission, true)?;
        let _ = bot
            .send_message(
                ChatId(merchant.telegram_chat_id),
                "❌ 您的资料未通过审核，请修改后重新提交（发布时间需重新选择，媒体需重新上传）。",
            )
            .await;
        "已退回"
    };

    log_admin_action(
        conn,
        chat_id.0,
        if approve { "approve_merchant" } else { "reject_merchant" },
        &merchant_id.to_string(),
    );

    let text = format!("商户 {} 审核结果：{}", merchant_id, verdict);
    edit_panel(bot, chat_id, message_id, text, InlineKeyboardMarkup::new(vec![back_row()])).await;
    Ok(())
}

/// Applies a pending free-text input and confirms.
pub async fn handle_pending_input(
    bot: &Bot,
    conn: &Connection,
    chat_id: ChatId,
    text: &str,
    pending: PendingInput,
) -> Result<(), HandlerError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        bot.send_message(chat_id, "输入为空，已取消。").await?;
        return Ok(());
    }

    match pending {
        PendingInput::AddCity => {
            let id = regions::add_city(conn, trimmed, 0)?;
            log_admin_action(conn, chat_id.0, "add_city", trimmed);
            bot.send_message(chat_id, format!("✅ 城市已添加：{}（ID {}）", trimmed, id)).await?;
        }
        PendingInput::AddDistrict(city_id) => {
            let id = regions::add_district(conn, city_id, trimmed, 0)?;
            log_admin_action(conn, chat_id.0, "add_district", trimmed);
            bot.send_message(chat_id, format!("✅ 地区已添加：{}（ID {}）", trimmed, id)).await?;
        }
        PendingInput::AddSlot => {
            if !regex_is_match!(r"^([01]\d|2[0-3]):[0-5]\d$", trimmed) {
                bot.send_message(chat_id, "时间格式不正确，应为 HH:MM（例如 20:00）。").await?;
                return Ok(());
            }
            let id = slots::add(conn, trimmed, 0)?;
            log_admin_action(conn, chat_id.0, "add_slot", trimmed);
            bot.send_message(chat_id, format!("✅ 时间槽已添加：{}（ID {}）", trimmed, id)).await?;
        }
        PendingInput::AddKeyword => {
            let id = keywords::add(conn, trimmed, 0)?;
            log_admin_action(conn, chat_id.0, "add_keyword", trimmed);
            bot.send_message(chat_id, format!("✅ 关键词已添加：{}（ID {}）", trimmed, id)).await?;
        }
    }
    Ok(())
}

fn log_admin_action(conn: &Connection, admin_id: i64, action: &str, target: &str) {
    if let Err(e) = activity_log::append(
        conn,
        admin_id,
        ActionType::AdminAction,
        serde_json::json!({"action": action, "target": target}),
        None,
    ) {
        log::warn!("Failed to log admin action {}: {}", action, e);
    }
}
