use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Database file path
/// Read from DATABASE_PATH environment variable
/// Default: shangbang.sqlite
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "shangbang.sqlite".to_string()));

/// Custom Bot API server URL (optional)
/// Read from BOT_API_URL environment variable
pub static BOT_API_URL: Lazy<Option<String>> = Lazy::new(|| env::var("BOT_API_URL").ok());

/// Admin chat ids, comma separated
/// Read from ADMIN_IDS environment variable, e.g. "123456,987654"
/// Unparseable entries are skipped
pub static ADMIN_IDS: Lazy<Vec<i64>> = Lazy::new(|| {
    env::var("ADMIN_IDS")
        .unwrap_or_default()
        .split(',')
        .filter_map(|part| part.trim().parse::<i64>().ok())
        .collect()
});

/// Returns true if the given chat id belongs to an administrator.
pub fn is_admin(chat_id: i64) -> bool {
    ADMIN_IDS.contains(&chat_id)
}

/// Admin contact handle shown in "get a binding code" prompts
/// Read from ADMIN_USERNAME environment variable, e.g. "@boss"
pub static ADMIN_USERNAME: Lazy<String> =
    Lazy::new(|| env::var("ADMIN_USERNAME").unwrap_or_else(|_| "管理员".to_string()));

/// Network configuration
pub mod network {
    use super::Duration;

    /// Timeout for outbound Telegram API calls (seconds)
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;

    /// Outbound request timeout duration
    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}

/// Binding code configuration
pub mod binding_code {
    /// Code length in characters
    pub const LENGTH: usize = 8;

    /// Allowed alphabet: uppercase letters and digits
    pub const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

    /// Maximum generation attempts before giving up on a collision streak
    pub const MAX_GENERATION_ATTEMPTS: u32 = 10;

    /// Default code lifetime in hours; 0 means no expiry
    pub const DEFAULT_EXPIRY_HOURS: i64 = 24;
}

/// Onboarding flow configuration
pub mod onboarding {
    /// Exact number of media items required before submission
    pub const MEDIA_REQUIRED: usize = 6;

    /// Maximum number of selectable keywords
    pub const MAX_KEYWORDS: usize = 3;

    /// Soft recommendation for the advantage sentence length (characters)
    pub const ADV_SENTENCE_SOFT_LIMIT: usize = 30;

    /// How many calendar days ahead (including today) are offered as
    /// publish dates
    pub const PUBLISH_DATE_WINDOW: usize = 5;

    /// Persisted drafts older than this are swept by `cleanup`
    pub const DRAFT_TTL_HOURS: i64 = 24;
}

/// Activity log retention
pub mod retention {
    /// Activity log rows older than this many days are pruned
    pub const ACTIVITY_LOG_DAYS: i64 = 90;
}

/// The plain-text message that starts merchant registration.
pub const REGISTRATION_TRIGGER: &str = "上榜流程";
