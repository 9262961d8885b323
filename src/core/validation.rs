//! User input validation for onboarding steps
//!
//! Provides the free-text validators used by the flow interpreter:
//! - price fields (decimal with optional cents)
//! - channel username normalization (`@name`, bare `name`, or a `t.me` link)

use lazy_regex::regex_is_match;
use thiserror::Error;
use url::Url;

/// Validation errors
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Price does not match the decimal-with-optional-cents pattern
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    /// Channel username is malformed or outside the 5-32 char range
    #[error("Invalid channel username: {0}")]
    InvalidChannelUsername(String),

    /// Required free-text input was empty
    #[error("Empty input for {0}")]
    Empty(&'static str),
}

/// Validates a price entered as free text.
///
/// Accepts integers and decimals with at most two fractional digits
/// ("300", "299.9", "88.50"). Leading/trailing whitespace is ignored.
///
/// # Returns
/// * `Ok(String)` with the trimmed value as entered
/// * `Err(ValidationError::InvalidPrice)` otherwise
pub fn validate_price(input: &str) -> Result<String, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty("price"));
    }
    if regex_is_match!(r"^\d+(\.\d{1,2})?$", trimmed) {
        Ok(trimmed.to_string())
    } else {
        Err(ValidationError::InvalidPrice(input.to_string()))
    }
}

/// Normalizes a channel identifier to the canonical `@name` form.
///
/// Accepted inputs:
/// - `@name`
/// - bare `name`
/// - a `t.me` / `telegram.me` link, with or without scheme
///
/// The username itself must start with a letter and be 5-32 characters of
/// letters, digits and underscores.
///
/// # Examples
/// ```
/// use shangbang::core::validation::normalize_channel_username;
///
/// assert_eq!(normalize_channel_username("https://t.me/FooBar_1").unwrap(), "@FooBar_1");
/// assert_eq!(normalize_channel_username("@mychannel").unwrap(), "@mychannel");
/// assert_eq!(normalize_channel_username("mychannel").unwrap(), "@mychannel");
/// assert!(normalize_channel_username("foo").is_err());
/// ```
pub fn normalize_channel_username(input: &str) -> Result<String, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty("channel username"));
    }

    let candidate = match extract_from_link(trimmed) {
        Some(name) => name,
        None => trimmed.strip_prefix('@').unwrap_or(trimmed).to_string(),
    };

    if regex_is_match!(r"^[A-Za-z][A-Za-z0-9_]{4,31}$", &candidate) {
        Ok(format!("@{}", candidate))
    } else {
        Err(ValidationError::InvalidChannelUsername(input.to_string()))
    }
}

/// Pulls the username out of a Telegram link, if the input is one.
fn extract_from_link(input: &str) -> Option<String> {
    let lowered = input.to_ascii_lowercase();
    if !lowered.contains("t.me/") && !lowered.contains("telegram.me/") {
        return None;
    }

    let with_scheme = if lowered.starts_with("http://") || lowered.starts_with("https://") {
        input.to_string()
    } else {
        format!("https://{}", input)
    };

    let url = Url::parse(&with_scheme).ok()?;
    let host = url.host_str()?;
    let is_telegram = host == "t.me"
        || host.ends_with(".t.me")
        || host == "telegram.me"
        || host.ends_with(".telegram.me");
    if !is_telegram {
        return None;
    }

    url.path_segments()?
        .find(|segment| !segment.is_empty())
        .map(|segment| segment.to_string())
}

/// Soft length notice for the advantage sentence. Never rejects; the
/// limit is a recommendation only.
pub fn adv_sentence_notice(input: &str) -> Option<String> {
    let count = input.trim().chars().count();
    if count > crate::core::config::onboarding::ADV_SENTENCE_SOFT_LIMIT {
        Some(format!(
            "提示：建议控制在 {} 字以内（当前 {} 字），已保存。",
            crate::core::config::onboarding::ADV_SENTENCE_SOFT_LIMIT,
            count
        ))
    } else {
        None
    }
}
