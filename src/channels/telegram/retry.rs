//! Failure classification and backoff for Telegram Bot API calls

use std::time::Duration;

use crate::Error;

/// Upper bound on a server-requested delay
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Determine whether an HTTP status and response body indicate a recoverable error.
///
/// Recoverable errors are worth retrying: rate limits (429), server errors (5xx),
/// polling conflicts (409) and transient network-level failures surfaced in the body text.
#[must_use]
pub fn is_recoverable(status: u16, body: &str) -> bool {
    if status == 429 || status == 409 {
        return true;
    }

    if (500..600).contains(&status) {
        return true;
    }

    let lower = body.to_lowercase();
    lower.contains("connection reset")
        || lower.contains("timed out")
        || lower.contains("dns error")
}

/// Whether a failure body says the bot lost access to the chat
#[must_use]
pub fn is_revoked(status: u16, body: &str) -> bool {
    if status == 403 {
        return true;
    }

    let lower = body.to_lowercase();
    lower.contains("bot was blocked by the user")
        || lower.contains("bot was kicked")
        || lower.contains("not enough rights")
}

/// Extract a `retry_after` duration from a Telegram Bot API error body.
///
/// Telegram encodes the value in seconds at `parameters.retry_after`.
/// Returns `None` if the field is absent or the body is not valid JSON.
///
/// # Examples
///
/// ```
/// use mariusz::channels::retry::parse_retry_after;
/// let body = r#"{"parameters": {"retry_after": 30}}"#;
/// let dur = parse_retry_after(body);
/// assert_eq!(dur, Some(std::time::Duration::from_secs(30)));
/// ```
#[must_use]
pub fn parse_retry_after(body: &str) -> Option<Duration> {
    let v: serde_json::Value = serde_json::from_str(body).ok()?;
    let secs = v.get("parameters")?.get("retry_after")?.as_u64()?;

    Some(Duration::from_secs(secs))
}

/// Map a failed Bot API call onto the bot's error taxonomy
///
/// `chat_id` is the conversation the call concerned, if any. Calls without a
/// conversation (getUpdates) never produce recipient-scoped errors.
#[must_use]
pub fn classify(method: &str, chat_id: Option<i64>, status: u16, body: &str) -> Error {
    if status == 401 {
        return Error::Fatal(format!("Telegram rejected the bot token on {method}"));
    }

    if is_recoverable(status, body) {
        return Error::TransientNetwork {
            message: format!("Telegram {method}: {status} - {body}"),
            retry_after: parse_retry_after(body).map(|d| d.min(MAX_RETRY_AFTER)),
        };
    }

    match chat_id {
        Some(chat_id) if is_revoked(status, body) => Error::AuthorizationRevoked { chat_id },
        Some(chat_id) if (400..500).contains(&status) => Error::DeliveryRejected {
            chat_id,
            reason: body.to_string(),
        },
        _ => Error::Fatal(format!("Telegram {method}: {status} - {body}")),
    }
}

/// Delay before retrying after a transient failure
///
/// A server-provided `retry_after` wins over the configured fixed backoff.
#[must_use]
pub fn backoff_delay(fixed: Duration, err: &Error) -> Duration {
    err.retry_after().map_or(fixed, |ra| ra.min(MAX_RETRY_AFTER))
}
