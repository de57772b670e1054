//! Newsletter subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Longest address accepted (RFC 5321 path limit).
pub const MAX_EMAIL_LEN: usize = 254;

/// A newsletter subscription row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    /// Normalised (trimmed, lowercase) address; primary key.
    pub email: String,
    /// Where the signup came from (footer, pricing page, ...).
    pub source: String,
    /// Most recent subscribe time.
    pub subscribed_at: DateTime<Utc>,
    /// Set while unsubscribed.
    pub unsubscribed_at: Option<DateTime<Utc>>,
}

impl Subscriber {
    /// Whether the address currently receives mail.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.unsubscribed_at.is_none()
    }
}

/// Trim, lowercase and sanity-check an email address.
///
/// This is a shape check (one `@`, non-empty local part, dotted domain), not
/// full RFC validation.
///
/// # Errors
///
/// `InvalidInput` if the address is malformed.
pub fn normalize_email(raw: &str) -> Result<String, CoreError> {
    let email = raw.trim().to_lowercase();
    let invalid = || CoreError::InvalidInput(format!("invalid email address: {raw:?}"));

    if email.is_empty() || email.len() > MAX_EMAIL_LEN || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return Err(invalid());
    }
    Ok(email)
}
