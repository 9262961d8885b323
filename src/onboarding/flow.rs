//! The flow interpreter
//!
//! Renders a step's prompt and input widget from the accumulated draft,
//! applies incoming answers, and decides where the dialog goes next. All
//! functions are Telegram-free: widgets are (label, action) rows the
//! transport layer turns into inline keyboards, which keeps the whole
//! dialog unit-testable against an in-memory database.

use chrono::{Datelike, Duration, NaiveDate};
use rusqlite::Connection;

use crate::core::config::onboarding::{MEDIA_REQUIRED, PUBLISH_DATE_WINDOW};
use crate::core::types::ActionType;
use crate::core::validation::{adv_sentence_notice, normalize_channel_username, validate_price};
use crate::core::AppResult;
use crate::onboarding::draft::Draft;
use crate::onboarding::steps::{self, InputKind, OptionsSource, StepDef, TextField, STEP_CONFIRM, STEP_MEDIA};
use crate::storage::{activity_log, keywords, media, merchants, regions, slots};

/// Semantic button actions. The transport layer encodes these into
/// callback data and decodes them back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowAction {
    ChooseType(String),
    ChooseCity(i64),
    ChooseDistrict(i64),
    ToggleKeyword(i64),
    /// Leave step 8 for the publish-time step (or save in edit mode)
    KeywordsDone,
    PickDate(String),
    PickSlot(String),
    MediaDone,
    GoToStep(u8),
    Overview,
    Confirm,
    /// Re-enter one step in edit mode from the profile summary
    EditField(u8),
    Noop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: FlowAction,
}

impl Button {
    fn new(label: impl Into<String>, action: FlowAction) -> Self {
        Button {
            label: label.into(),
            action,
        }
    }
}

/// What a step looks like on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Widget {
    /// Rows of inline buttons
    Buttons(Vec<Vec<Button>>),
    /// Waiting for a free-text reply
    TextPrompt,
    /// Waiting for photo/video messages
    MediaPrompt { uploaded: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepView {
    pub text: String,
    pub widget: Widget,
}

/// Result of applying one answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Move on and render `next`
    Advance { next: u8, notice: Option<String> },
    /// Re-render the current step (selection toggles, partial picks)
    Stay { notice: Option<String> },
    /// Validation failure: re-prompt the same step with this message
    Invalid { message: String },
    /// No options available; send the user back to an earlier step
    DeadEnd { message: String, back_to: u8 },
    /// Edit mode: the field was written, return to the profile summary
    BackToSummary { notice: Option<String> },
    /// Final confirmation succeeded
    Submitted { publish_date: String, publish_slot: String },
    /// Final confirmation lost the slot race; step 9 must be redone
    SlotTaken,
}

fn weekday_cn(date: NaiveDate) -> &'static str {
    ["周一", "周二", "周三", "周四", "周五", "周六", "周日"][date.weekday().num_days_from_monday() as usize]
}

/// The next calendar dates offered at step 9, as (label, ISO date) pairs.
pub fn date_options(today: NaiveDate) -> Vec<(String, String)> {
    (0..PUBLISH_DATE_WINDOW as i64)
        .map(|offset| {
            let date = today + Duration::days(offset);
            (
                format!("{} ({})", date.format("%m-%d"), weekday_cn(date)),
                date.format("%Y-%m-%d").to_string(),
            )
        })
        .collect()
}

fn step_text(def: &StepDef) -> String {
    format!("{}\n\n{}", def.title, def.prompt)
}

/// Renders one step's prompt and widget.
///
/// # Arguments
///
/// * `merchant_id` - the caller's merchant row, used to exclude their own
///   slot reservation and to count uploaded media
/// * `today` - injected so schedule rendering is deterministic in tests
pub fn render_step(
    conn: &Connection,
    step_number: u8,
    draft: &Draft,
    merchant_id: Option<i64>,
    today: NaiveDate,
) -> AppResult<StepView> {
    let Some(def) = steps::step(step_number) else {
        return Ok(StepView {
            text: "未知步骤，请返回菜单重试。".to_string(),
            widget: Widget::Buttons(vec![vec![Button::new("⬅️ 返回总览", FlowAction::Overview)]]),
        });
    };

    let text = step_text(def);
    match def.kind {
        InputKind::Text(_) => Ok(StepView {
            text,
            widget: Widget::TextPrompt,
        }),
        InputKind::Media => {
            let uploaded = match merchant_id {
                Some(id) => media::count_for_merchant(conn, id)?,
                None => 0,
            };
            let mut view_text = text;
            view_text.push_str(&format!("\n\n当前已上传：{}/{}", uploaded, MEDIA_REQUIRED));
            Ok(StepView {
                text: view_text,
                widget: Widget::MediaPrompt { uploaded },
            })
        }
        InputKind::Choice(source) => {
            let rows = choice_rows(conn, source, draft, merchant_id, today)?;
            if rows.is_empty() && source == OptionsSource::Districts {
                // Dead end: the chosen city has no active districts.
                return Ok(StepView {
                    text: "该城市暂无可选地区，请重新选择城市。".to_string(),
                    widget: Widget::Buttons(vec![vec![Button::new("⬅️ 重新选择城市", FlowAction::GoToStep(2))]]),
                });
            }
            Ok(StepView {
                text,
                widget: Widget::Buttons(rows),
            })
        }
    }
}

fn choice_rows(
    conn: &Connection,
    source: OptionsSource,
    draft: &Draft,
    merchant_id: Option<i64>,
    today: NaiveDate,
) -> AppResult<Vec<Vec<Button>>> {
    let mut rows: Vec<Vec<Button>> = Vec::new();

    match source {
        OptionsSource::Static(options) => {
            for (label, value) in options {
                rows.push(vec![Button::new(*label, FlowAction::ChooseType((*value).to_string()))]);
            }
        }
        OptionsSource::Cities => {
            for city in regions::get_active_cities(conn)? {
                rows.push(vec![Button::new(city.name, FlowAction::ChooseCity(city.id))]);
            }
        }
        OptionsSource::Districts => {
            if let Some(city_id) = draft.city_id {
                for district in regions::get_districts_by_city(conn, city_id)? {
                    rows.push(vec![Button::new(district.name, FlowAction::ChooseDistrict(district.id))]);
                }
            }
        }
        OptionsSource::Keywords => {
            for keyword in keywords::get_active(conn)? {
                let selected = draft.keywords.contains(&keyword.id);
                let label = if selected {
                    format!("✅ {}", keyword.name)
                } else {
                    keyword.name.clone()
                };
                rows.push(vec![Button::new(label, FlowAction::ToggleKeyword(keyword.id))]);
            }
            rows.push(vec![Button::new("➡️ 选择发布时间", FlowAction::KeywordsDone)]);
        }
        OptionsSource::PublishSchedule => {
            for (label, iso) in date_options(today) {
                let prefix = if draft.publish_date.as_deref() == Some(iso.as_str()) {
                    "✅ "
                } else {
                    ""
                };
                rows.push(vec![Button::new(format!("{}{}", prefix, label), FlowAction::PickDate(iso))]);
            }

            if let Some(date) = &draft.publish_date {
                let active_slots = slots::active(conn)?;
                if !active_slots.is_empty() {
                    rows.push(vec![Button::new("🔴 请选择具体时间", FlowAction::Noop)]);
                    let occupied = merchants::occupied_slots_for_date(conn, date, merchant_id)?;
                    for slot in active_slots {
                        let selected = draft.publish_slot.as_deref() == Some(slot.time_str.as_str());
                        if occupied.contains(&slot.time_str) && !selected {
                            rows.push(vec![Button::new(
                                format!("⛔ {}（已被选）", slot.time_str),
                                FlowAction::Noop,
                            )]);
                        } else {
                            let prefix = if selected { "✅ " } else { "" };
                            rows.push(vec![Button::new(
                                format!("{}{}", prefix, slot.time_str),
                                FlowAction::PickSlot(slot.time_str.clone()),
                            )]);
                        }
                    }
                }
            }
        }
    }

    rows.push(vec![Button::new("⬅️ 返回总览", FlowAction::Overview)]);
    Ok(rows)
}

/// Applies a button answer to the draft.
///
/// In edit mode an accepted answer is written straight to the merchant
/// record and the dialog returns to the summary.
pub fn apply_choice(
    conn: &Connection,
    draft: &mut Draft,
    _step_number: u8,
    action: &FlowAction,
    merchant_id: Option<i64>,
    today: NaiveDate,
) -> AppResult<Outcome> {
    match action {
        FlowAction::ChooseType(value) => {
            if value.parse::<crate::core::types::MerchantType>().is_err() {
                return Ok(Outcome::Invalid {
                    message: "未知的商户类型，请重新选择。".to_string(),
                });
            }
            draft.merchant_type = Some(value.clone());
            if draft.edit_mode {
                return write_field_in_edit_mode(conn, draft, merchant_id);
            }
            Ok(Outcome::Advance { next: 2, notice: None })
        }
        FlowAction::ChooseCity(city_id) => {
            if regions::get_city_by_id(conn, *city_id)?.is_none() {
                return Ok(Outcome::Invalid {
                    message: "该城市不存在，请重新选择。".to_string(),
                });
            }
            if draft.city_id != Some(*city_id) {
                draft.district_id = None;
            }
            draft.city_id = Some(*city_id);
            // City alone is not a complete region answer; the district
            // step follows in both modes.
            Ok(Outcome::Advance { next: 3, notice: None })
        }
        FlowAction::ChooseDistrict(district_id) => {
            let Some(district) = regions::get_district_by_id(conn, *district_id)? else {
                return Ok(Outcome::Invalid {
                    message: "该地区不存在，请重新选择。".to_string(),
                });
            };
            if Some(district.city_id) != draft.city_id {
                return Ok(Outcome::Invalid {
                    message: "地区与所选城市不符，请重新选择。".to_string(),
                });
            }
            draft.district_id = Some(*district_id);
            if draft.edit_mode {
                return write_field_in_edit_mode(conn, draft, merchant_id);
            }
            Ok(Outcome::Advance { next: 4, notice: None })
        }
        FlowAction::ToggleKeyword(keyword_id) => {
            if let Some(position) = draft.keywords.iter().position(|id| id == keyword_id) {
                draft.keywords.remove(position);
                return Ok(Outcome::Stay { notice: None });
            }
            if draft.keywords.len() >= crate::core::config::onboarding::MAX_KEYWORDS {
                // Cap reached: selection set unchanged, step re-rendered.
                return Ok(Outcome::Stay {
                    notice: Some(format!(
                        "最多选择 {} 个关键词",
                        crate::core::config::onboarding::MAX_KEYWORDS
                    )),
                });
            }
            draft.keywords.push(*keyword_id);
            Ok(Outcome::Stay { notice: None })
        }
        FlowAction::KeywordsDone => {
            if draft.edit_mode {
                if let Some(id) = merchant_id {
                    keywords::set_for_merchant(conn, id, &draft.keywords)?;
                    return Ok(Outcome::BackToSummary {
                        notice: Some("关键词已保存".to_string()),
                    });
                }
            }
            Ok(Outcome::Advance { next: 9, notice: None })
        }
        FlowAction::PickDate(date) => {
            let window: Vec<String> = date_options(today).into_iter().map(|(_, iso)| iso).collect();
            if !window.contains(date) {
                return Ok(Outcome::Invalid {
                    message: "该日期不可选，请选择最近5天内的日期。".to_string(),
                });
            }
            if draft.publish_date.as_deref() != Some(date.as_str()) {
                draft.publish_slot = None;
            }
            draft.publish_date = Some(date.clone());
            Ok(Outcome::Stay { notice: None })
        }
        FlowAction::PickSlot(slot) => {
            let Some(date) = draft.publish_date.clone() else {
                return Ok(Outcome::Stay {
                    notice: Some("请先选择日期".to_string()),
                });
            };
            let known = slots::active(conn)?.iter().any(|s| s.time_str == *slot);
            if !known {
                return Ok(Outcome::Invalid {
                    message: "该时间段不可选，请重新选择。".to_string(),
                });
            }
            if !merchants::is_slot_available(conn, &date, slot, merchant_id)? {
                return Ok(Outcome::Stay {
                    notice: Some("⛔ 该时间已被其他商户选定，请换一个时间。".to_string()),
                });
            }
            draft.publish_slot = Some(slot.clone());
            if draft.edit_mode {
                if let Some(id) = merchant_id {
                    merchants::update(
                        conn,
                        id,
                        &merchants::MerchantUpdate {
                            publish_date: Some(date),
                            publish_slot: Some(slot.clone()),
                            ..Default::default()
                        },
                    )?;
                    return Ok(Outcome::BackToSummary {
                        notice: Some("发布时间已更新".to_string()),
                    });
                }
            }
            Ok(Outcome::Advance {
                next: STEP_MEDIA,
                notice: None,
            })
        }
        FlowAction::MediaDone => {
            let uploaded = match merchant_id {
                Some(id) => media::count_for_merchant(conn, id)?,
                None => 0,
            };
            if uploaded != MEDIA_REQUIRED {
                return Ok(Outcome::Stay {
                    notice: Some(format!("已上传 {}/{}，请继续发送照片或视频。", uploaded, MEDIA_REQUIRED)),
                });
            }
            if draft.edit_mode {
                return Ok(Outcome::BackToSummary {
                    notice: Some("媒体已更新".to_string()),
                });
            }
            Ok(Outcome::Advance {
                next: STEP_CONFIRM,
                notice: None,
            })
        }
        FlowAction::Noop => Ok(Outcome::Stay { notice: None }),
        _ => Ok(Outcome::Stay { notice: None }),
    }
}

/// Applies a free-text answer to a text step.
pub fn apply_text(
    conn: &Connection,
    draft: &mut Draft,
    step_number: u8,
    input: &str,
    merchant_id: Option<i64>,
) -> AppResult<Outcome> {
    let Some(def) = steps::step(step_number) else {
        return Ok(Outcome::Invalid {
            message: "当前没有等待输入的步骤。".to_string(),
        });
    };
    let InputKind::Text(field) = def.kind else {
        return Ok(Outcome::Invalid {
            message: "当前步骤不接受文字输入。".to_string(),
        });
    };

    let mut notice = None;
    match field {
        TextField::PPrice => match validate_price(input) {
            Ok(price) => draft.p_price = Some(price),
            Err(_) => {
                return Ok(Outcome::Invalid {
                    message: "价格格式不正确，请输入数字（如 300 或 299.9）。".to_string(),
                })
            }
        },
        TextField::PpPrice => match validate_price(input) {
            Ok(price) => draft.pp_price = Some(price),
            Err(_) => {
                return Ok(Outcome::Invalid {
                    message: "价格格式不正确，请输入数字（如 500 或 499.9）。".to_string(),
                })
            }
        },
        TextField::AdvSentence => {
            let trimmed = input.trim();
            if trimmed.is_empty() {
                return Ok(Outcome::Invalid {
                    message: "优势一句话不能为空。".to_string(),
                });
            }
            notice = adv_sentence_notice(trimmed);
            draft.adv_sentence = Some(trimmed.to_string());
        }
        TextField::ChannelUsername => match normalize_channel_username(input) {
            Ok(normalized) => draft.channel_username = Some(normalized),
            Err(_) => {
                return Ok(Outcome::Invalid {
                    message: "频道用户名格式不正确：需5-32位字母/数字/下划线，或 t.me 链接。".to_string(),
                })
            }
        },
    }

    if draft.edit_mode {
        return write_field_in_edit_mode(conn, draft, merchant_id);
    }
    Ok(Outcome::Advance {
        next: step_number + 1,
        notice,
    })
}

/// Edit mode epilogue: flush the draft's fields onto the merchant row.
fn write_field_in_edit_mode(conn: &Connection, draft: &Draft, merchant_id: Option<i64>) -> AppResult<Outcome> {
    let Some(id) = merchant_id else {
        return Ok(Outcome::Invalid {
            message: "未找到商户信息，请先完成绑定。".to_string(),
        });
    };
    merchants::update(conn, id, &draft.as_update())?;
    Ok(Outcome::BackToSummary {
        notice: Some("已保存".to_string()),
    })
}

/// Final confirmation. Verifies completeness, re-checks the slot and
/// performs the conditional claim, writes the full record and clears the
/// draft on success.
pub fn finalize(conn: &Connection, user_id: i64, draft: &Draft, merchant_id: i64) -> AppResult<Outcome> {
    let Some(merchant) = merchants::get_by_id(conn, merchant_id)? else {
        return Ok(Outcome::Invalid {
            message: "未找到商户信息，请先完成绑定。".to_string(),
        });
    };
    // Approved/published/expired profiles are past the submission stage;
    // only admins move them from there.
    if !merchant.status.allows_submission() {
        return Ok(Outcome::Invalid {
            message: format!("当前状态（{}）不可提交审核。", merchant.status.display_name()),
        });
    }

    // (d) all required scalar fields non-empty
    let missing = draft.missing_required_steps();
    if !missing.is_empty() {
        let titles: Vec<&str> = missing
            .iter()
            .filter_map(|&n| steps::step(n).map(|def| def.title))
            .collect();
        return Ok(Outcome::Invalid {
            message: format!("以下步骤尚未完成：\n{}", titles.join("\n")),
        });
    }

    // (a) channel identifier present and well-formed
    let channel = draft.channel_username.as_deref().unwrap_or_default();
    if normalize_channel_username(channel).is_err() {
        return Ok(Outcome::Invalid {
            message: "频道用户名无效，请重新填写步骤7。".to_string(),
        });
    }

    // (c) media count exactly as required
    let uploaded = media::count_for_merchant(conn, merchant_id)?;
    if uploaded != MEDIA_REQUIRED {
        return Ok(Outcome::Invalid {
            message: format!("媒体数量不足：{}/{}，请完成步骤10。", uploaded, MEDIA_REQUIRED),
        });
    }

    let date = draft.publish_date.clone().unwrap_or_default();
    let slot = draft.publish_slot.clone().unwrap_or_default();

    // Write the scalar fields and the keyword set first; the slot claim
    // decides whether the submission goes through.
    merchants::update(conn, merchant_id, &draft.as_update())?;
    keywords::set_for_merchant(conn, merchant_id, &draft.keywords)?;

    // (b) the chosen slot must still be available: conditional claim
    if !merchants::finalize_submission(conn, merchant_id, &date, &slot)? {
        return Ok(Outcome::SlotTaken);
    }

    crate::storage::drafts::clear(conn, user_id)?;
    if let Err(e) = activity_log::append(
        conn,
        user_id,
        ActionType::MerchantRegistration,
        serde_json::json!({
            "action": "profile_submitted",
            "publish_date": date,
            "publish_slot": slot,
        }),
        Some(merchant_id),
    ) {
        log::warn!("Failed to log submission for merchant {}: {}", merchant_id, e);
    }

    Ok(Outcome::Submitted {
        publish_date: date,
        publish_slot: slot,
    })
}

/// Seeds an edit-mode draft from the stored merchant record so the
/// per-step widgets show the current values.
pub fn draft_from_merchant(conn: &Connection, merchant: &merchants::Merchant) -> AppResult<Draft> {
    Ok(Draft {
        merchant_type: merchant.merchant_type.map(|t| t.to_string()),
        city_id: merchant.city_id,
        district_id: merchant.district_id,
        p_price: merchant.p_price.clone(),
        pp_price: merchant.pp_price.clone(),
        adv_sentence: merchant.adv_sentence.clone(),
        channel_username: merchant.channel_username.clone(),
        keywords: keywords::get_for_merchant(conn, merchant.id)?
            .into_iter()
            .map(|k| k.id)
            .collect(),
        publish_date: merchant.publish_date.clone(),
        publish_slot: merchant.publish_slot.clone(),
        edit_mode: true,
    })
}

/// The progress overview panel: per-step markers, jump buttons, preview
/// and the final confirmation entry.
pub fn render_overview(conn: &Connection, draft: &Draft, merchant_id: Option<i64>) -> AppResult<StepView> {
    let media_count = match merchant_id {
        Some(id) => media::count_for_merchant(conn, id)?,
        None => 0,
    };

    let mut rows: Vec<Vec<Button>> = Vec::new();
    for def in steps::STEPS.iter().filter(|d| d.number < STEP_MEDIA) {
        let marker = if draft.step_filled(def.number) { "✅" } else { "•" };
        rows.push(vec![Button::new(
            format!("{} {}", marker, def.title),
            FlowAction::GoToStep(def.number),
        )]);
    }
    rows.push(vec![Button::new(
        format!("🖼️ 上传媒体（{}/{}）", media_count, MEDIA_REQUIRED),
        FlowAction::GoToStep(STEP_MEDIA),
    )]);
    rows.push(vec![Button::new("📤 提交审核", FlowAction::Confirm)]);

    let filled = (1u8..=9).filter(|&n| draft.step_filled(n)).count();
    let text = format!(
        "📌 资料填写进度总览\n\n已完成步骤：{}/9\n媒体上传：{}/{}\n点击任一步骤可填写或修改。",
        filled, media_count, MEDIA_REQUIRED
    );

    Ok(StepView {
        text,
        widget: Widget::Buttons(rows),
    })
}

/// The profile summary panel shown after submission and during edits.
pub fn render_profile_summary(conn: &Connection, merchant: &merchants::Merchant) -> AppResult<StepView> {
    let city_name = match merchant.city_id {
        Some(id) => regions::get_city_by_id(conn, id)?.map(|c| c.name),
        None => None,
    };
    let district_name = match merchant.district_id {
        Some(id) => regions::get_district_by_id(conn, id)?.map(|d| d.name),
        None => None,
    };
    let keyword_names: Vec<String> = keywords::get_for_merchant(conn, merchant.id)?
        .into_iter()
        .map(|k| k.name)
        .collect();
    let media_count = media::count_for_merchant(conn, merchant.id)?;

    let dash = || "-".to_string();
    let publish = match (&merchant.publish_date, &merchant.publish_slot) {
        (Some(date), Some(slot)) => format!("{} {}", date, slot),
        _ => dash(),
    };

    let text = format!(
        "📋 我的资料\n\n\
         类型：{}\n城市：{}\n地区：{}\nP价格：{}\nPP价格：{}\n优势：{}\n频道：{}\n\
         关键词：{}\n发布时间：{}\n媒体：{}/{}\n状态：{}",
        merchant.merchant_type.map(|t| t.display_name().to_string()).unwrap_or_else(dash),
        city_name.unwrap_or_else(dash),
        district_name.unwrap_or_else(dash),
        merchant.p_price.clone().unwrap_or_else(dash),
        merchant.pp_price.clone().unwrap_or_else(dash),
        merchant.adv_sentence.clone().unwrap_or_else(dash),
        merchant.channel_username.clone().unwrap_or_else(dash),
        if keyword_names.is_empty() { dash() } else { keyword_names.join("、") },
        publish,
        media_count,
        MEDIA_REQUIRED,
        merchant.status.display_name(),
    );

    let mut rows: Vec<Vec<Button>> = vec![
        vec![
            Button::new("修改类型", FlowAction::EditField(1)),
            Button::new("修改地区", FlowAction::EditField(2)),
        ],
        vec![
            Button::new("修改P价格", FlowAction::EditField(4)),
            Button::new("修改PP价格", FlowAction::EditField(5)),
        ],
        vec![
            Button::new("修改优势", FlowAction::EditField(6)),
            Button::new("修改频道", FlowAction::EditField(7)),
        ],
        vec![
            Button::new("修改关键词", FlowAction::EditField(8)),
            Button::new("修改发布时间", FlowAction::EditField(9)),
        ],
        vec![Button::new("🖼️ 管理媒体", FlowAction::EditField(STEP_MEDIA))],
    ];
    // Re-submission stays open while the profile waits on review.
    if merchant.status.allows_submission() {
        rows.push(vec![Button::new("📌 填写进度总览", FlowAction::Overview)]);
    }

    Ok(StepView {
        text,
        widget: Widget::Buttons(rows),
    })
}
