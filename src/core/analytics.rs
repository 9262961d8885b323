//! Read-side activity analytics
//!
//! Straight-line aggregation over recent activity-log rows: everything is
//! fetched and grouped in memory with plain maps, re-run per request. No
//! incremental materialization.

use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use rusqlite::Connection;

use crate::core::types::ActionType;
use crate::core::AppResult;
use crate::storage::activity_log::{self, LogEntry};

/// Registration funnel counters (distinct users per stage).
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Funnel {
    pub triggered: usize,
    pub redeemed: usize,
    pub submitted: usize,
}

#[derive(Debug, Default)]
pub struct ActivityReport {
    pub window_days: i64,
    pub total_events: usize,
    pub active_users: usize,
    /// Per-action totals, busiest first
    pub by_action: Vec<(String, usize)>,
    /// Events per calendar day, oldest first
    pub daily: Vec<(String, usize)>,
    /// Events per hour of day (UTC)
    pub hourly: [usize; 24],
    /// Per-button click counts, busiest first
    pub button_clicks: Vec<(String, usize)>,
    pub funnel: Funnel,
}

const SCAN_LIMIT: usize = 10_000;

/// Scans the last `days` days of activity and aggregates in memory.
pub fn build_report(conn: &Connection, days: i64) -> AppResult<ActivityReport> {
    let entries = activity_log::recent(conn, days, SCAN_LIMIT)?;
    Ok(aggregate(days, &entries))
}

fn aggregate(days: i64, entries: &[LogEntry]) -> ActivityReport {
    let mut by_action: HashMap<String, usize> = HashMap::new();
    let mut daily: HashMap<String, usize> = HashMap::new();
    let mut hourly = [0usize; 24];
    let mut button_clicks: HashMap<String, usize> = HashMap::new();
    let mut users: HashSet<i64> = HashSet::new();
    let mut triggered: HashSet<i64> = HashSet::new();
    let mut redeemed: HashSet<i64> = HashSet::new();
    let mut submitted: HashSet<i64> = HashSet::new();

    for entry in entries {
        users.insert(entry.user_id);

        *by_action.entry(entry.action_type.to_string()).or_insert(0) += 1;

        // created_at is "YYYY-MM-DD HH:MM:SS"
        if entry.created_at.len() >= 13 {
            *daily.entry(entry.created_at[..10].to_string()).or_insert(0) += 1;
            if let Ok(hour) = entry.created_at[11..13].parse::<usize>() {
                if hour < 24 {
                    hourly[hour] += 1;
                }
            }
        }

        if entry.action_type == ActionType::ButtonClick {
            if let Some(button) = entry.details.get("button").and_then(|v| v.as_str()) {
                *button_clicks.entry(button.to_string()).or_insert(0) += 1;
            }
        }

        match entry.details.get("action").and_then(|v| v.as_str()) {
            Some("registration_trigger") => {
                triggered.insert(entry.user_id);
            }
            Some("profile_submitted") => {
                submitted.insert(entry.user_id);
            }
            _ => {}
        }
        if entry.action_type == ActionType::BindingCodeUsed {
            redeemed.insert(entry.user_id);
        }
    }

    let by_action: Vec<(String, usize)> = by_action
        .into_iter()
        .sorted_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)))
        .collect();
    let daily: Vec<(String, usize)> = daily.into_iter().sorted().collect();
    let button_clicks: Vec<(String, usize)> = button_clicks
        .into_iter()
        .sorted_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)))
        .collect();

    ActivityReport {
        window_days: days,
        total_events: entries.len(),
        active_users: users.len(),
        by_action,
        daily,
        hourly,
        button_clicks,
        funnel: Funnel {
            triggered: triggered.len(),
            redeemed: redeemed.len(),
            submitted: submitted.len(),
        },
    }
}

/// ASCII bar chart of daily activity (last 7 days shown).
fn daily_chart(daily: &[(String, usize)]) -> String {
    if daily.is_empty() {
        return "暂无数据\n".to_string();
    }

    let max_count = daily.iter().map(|(_, count)| *count).max().unwrap_or(1).max(1);
    let max_bars = 10usize;

    let mut chart = String::new();
    for (day, count) in daily.iter().rev().take(7).rev() {
        let bars = count * max_bars / max_count;
        let bar = "█".repeat(bars) + &"░".repeat(max_bars - bars);
        // "YYYY-MM-DD" -> "DD.MM"
        let short = match day.split('-').collect::<Vec<_>>()[..] {
            [_, month, date] => format!("{}.{}", date, month),
            _ => day.clone(),
        };
        chart.push_str(&format!("{}: {} {}\n", short, bar, count));
    }
    chart
}

/// Formats the report for the admin panel.
pub fn render_report(report: &ActivityReport) -> String {
    let mut text = format!(
        "📊 最近 {} 天活动统计\n\n事件总数：{}\n活跃用户：{}\n\n",
        report.window_days, report.total_events, report.active_users
    );

    if !report.by_action.is_empty() {
        text.push_str("📁 按类型：\n");
        for (action, count) in &report.by_action {
            text.push_str(&format!("• {}: {}\n", action, count));
        }
        text.push('\n');
    }

    text.push_str("📅 每日活动：\n");
    text.push_str(&daily_chart(&report.daily));
    text.push('\n');

    if let Some(peak_hour) = report.hourly.iter().enumerate().max_by_key(|(_, c)| **c).map(|(h, _)| h) {
        if report.hourly[peak_hour] > 0 {
            text.push_str(&format!("⏰ 活动高峰时段：{:02}:00（UTC）\n\n", peak_hour));
        }
    }

    if !report.button_clicks.is_empty() {
        text.push_str("🏆 按钮点击排行：\n");
        for (button, count) in report.button_clicks.iter().take(5) {
            text.push_str(&format!("• {}: {}\n", button, count));
        }
        text.push('\n');
    }

    text.push_str(&format!(
        "🪜 注册漏斗：触发 {} → 绑定 {} → 提交 {}\n",
        report.funnel.triggered, report.funnel.redeemed, report.funnel.submitted
    ));

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db::open_in_memory;
    use serde_json::json;

    fn log(conn: &Connection, user: i64, action: ActionType, details: serde_json::Value) {
        activity_log::append(conn, user, action, details, None).unwrap();
    }

    #[test]
    fn test_report_counts_and_funnel() {
        let conn = open_in_memory().unwrap();

        log(&conn, 1, ActionType::UserInteraction, json!({"action": "registration_trigger"}));
        log(&conn, 1, ActionType::BindingCodeUsed, json!({"code": "AAAA1111"}));
        log(&conn, 1, ActionType::MerchantRegistration, json!({"action": "profile_submitted"}));
        log(&conn, 2, ActionType::UserInteraction, json!({"action": "registration_trigger"}));
        log(&conn, 3, ActionType::ButtonClick, json!({"button": "city:1"}));
        log(&conn, 3, ActionType::ButtonClick, json!({"button": "city:1"}));
        log(&conn, 3, ActionType::ButtonClick, json!({"button": "slot:20:00"}));

        let report = build_report(&conn, 7).unwrap();
        assert_eq!(report.total_events, 7);
        assert_eq!(report.active_users, 3);
        assert_eq!(
            report.funnel,
            Funnel {
                triggered: 2,
                redeemed: 1,
                submitted: 1
            }
        );
        assert_eq!(report.by_action[0], ("button_click".to_string(), 3));
        assert_eq!(report.button_clicks[0], ("city:1".to_string(), 2));
        // All events landed today.
        assert_eq!(report.daily.len(), 1);
        assert_eq!(report.daily[0].1, 7);
        assert_eq!(report.hourly.iter().sum::<usize>(), 7);
    }

    #[test]
    fn test_report_window_excludes_old_rows() {
        let conn = open_in_memory().unwrap();
        log(&conn, 1, ActionType::SystemEvent, json!({}));
        conn.execute(
            "INSERT INTO activity_logs (user_id, action_type, details, created_at)
             VALUES (2, 'system_event', '{}', datetime('now', '-30 days'))",
            [],
        )
        .unwrap();

        let report = build_report(&conn, 7).unwrap();
        assert_eq!(report.total_events, 1);
        assert_eq!(report.active_users, 1);
    }

    #[test]
    fn test_render_report_mentions_key_sections() {
        let conn = open_in_memory().unwrap();
        log(&conn, 1, ActionType::ButtonClick, json!({"button": "menu"}));

        let report = build_report(&conn, 7).unwrap();
        let text = render_report(&report);
        assert!(text.contains("事件总数：1"));
        assert!(text.contains("按钮点击排行"));
        assert!(text.contains("注册漏斗"));
    }

    #[test]
    fn test_empty_report_renders() {
        let conn = open_in_memory().unwrap();
        let report = build_report(&conn, 7).unwrap();
        let text = render_report(&report);
        assert!(text.contains("暂无数据"));
    }
}
