//! User-facing message templates
//!
//! Key→string lookup backed by the `templates` table so operators can
//! reword the bot without a deploy; every key has a compiled-in default.

use rusqlite::{params, Connection, OptionalExtension};

use crate::core::AppResult;

/// Compiled-in fallbacks. The table overrides these per key.
pub const DEFAULTS: &[(&str, &str)] = &[
    (
        "binding_code_request",
        "🔑 要注册为商户，您需要一个绑定码。请联系管理员 {admin_username} 获取您的绑定码。",
    ),
    ("binding_code_prompt", "请输入您的8位绑定码："),
    ("invalid_binding_code", "❌ 绑定码格式不正确，应为8位大写字母和数字。"),
    ("error_general", "⚠️ 系统繁忙，请稍后重试。"),
    ("merchant_already_registered", "您已是注册商户（当前状态：{status_display}）。"),
    ("merchant_account_suspended", "您的账号已过期，请联系管理员恢复。"),
    ("slot_taken", "⛔ 该时间已被其他商户选定，请换一个时间。"),
    (
        "submission_success",
        "✅ 资料已提交审核！发布时间：{publish_date} {publish_slot}。审核通过后将自动发布。",
    ),
    ("not_a_merchant", "未找到商户信息，请先完成绑定。"),
];

fn default_for(key: &str) -> Option<&'static str> {
    DEFAULTS.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

/// Fetches a template by key: DB row first, compiled default second.
/// Unknown keys fall back to the key itself so a typo is visible in chat
/// instead of silently dropping the message.
pub fn get(conn: &Connection, key: &str) -> String {
    let stored: Option<String> = conn
        .query_row("SELECT content FROM templates WHERE key = ?", params![key], |row| row.get(0))
        .optional()
        .unwrap_or_else(|e| {
            log::error!("Template lookup failed for {}: {}", key, e);
            None
        });

    if let Some(content) = stored {
        return content;
    }
    match default_for(key) {
        Some(content) => content.to_string(),
        None => {
            log::warn!("Unknown template key: {}", key);
            key.to_string()
        }
    }
}

/// Fetches a template and substitutes `{name}` placeholders.
pub fn render(conn: &Connection, key: &str, args: &[(&str, &str)]) -> String {
    let mut content = get(conn, key);
    for (name, value) in args {
        content = content.replace(&format!("{{{}}}", name), value);
    }
    content
}

/// Stores an operator override for a key.
pub fn set(conn: &Connection, key: &str, content: &str) -> AppResult<()> {
    conn.execute(
        "INSERT INTO templates (key, content) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET content = excluded.content",
        params![key, content],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db::open_in_memory;

    #[test]
    fn test_default_fallback() {
        let conn = open_in_memory().unwrap();
        assert_eq!(get(&conn, "binding_code_prompt"), "请输入您的8位绑定码：");
    }

    #[test]
    fn test_db_overrides_default() {
        let conn = open_in_memory().unwrap();
        set(&conn, "binding_code_prompt", "输入绑定码！").unwrap();
        assert_eq!(get(&conn, "binding_code_prompt"), "输入绑定码！");

        // Overwrite again.
        set(&conn, "binding_code_prompt", "v2").unwrap();
        assert_eq!(get(&conn, "binding_code_prompt"), "v2");
    }

    #[test]
    fn test_unknown_key_surfaces_itself() {
        let conn = open_in_memory().unwrap();
        assert_eq!(get(&conn, "no_such_key"), "no_such_key");
    }

    #[test]
    fn test_render_substitutes_placeholders() {
        let conn = open_in_memory().unwrap();
        let text = render(&conn, "binding_code_request", &[("admin_username", "@boss")]);
        assert!(text.contains("@boss"));
        assert!(!text.contains("{admin_username}"));
    }
}
