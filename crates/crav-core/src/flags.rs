//! Feature flags.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::UserId;

/// Longest accepted flag key.
pub const MAX_FLAG_KEY_LEN: usize = 64;

/// A feature toggle with optional percentage rollout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlag {
    /// Unique key, e.g. `avatar_glow`.
    pub key: String,

    /// Master switch.
    pub enabled: bool,

    /// What the flag controls.
    #[serde(default)]
    pub description: String,

    /// Share of users (0-100) that see the feature while enabled.
    pub rollout_percent: u8,

    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl FeatureFlag {
    /// A fully rolled-out flag.
    #[must_use]
    pub fn new(key: impl Into<String>, enabled: bool) -> Self {
        Self {
            key: key.into(),
            enabled,
            description: String::new(),
            rollout_percent: 100,
            updated_at: Utc::now(),
        }
    }

    /// Check that the key and rollout are well formed.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when the key is empty, too long or contains characters
    /// other than lowercase ASCII, digits, `_`, `-` and `.`, or when the
    /// rollout exceeds 100.
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_key(&self.key)?;
        if self.rollout_percent > 100 {
            return Err(CoreError::InvalidInput(
                "rollout_percent must be between 0 and 100".into(),
            ));
        }
        Ok(())
    }

    /// Whether the flag is on for a given caller.
    ///
    /// Anonymous callers only see fully rolled-out flags. Signed-in users get
    /// a stable bucket so their answer does not flip between requests.
    #[must_use]
    pub fn is_enabled_for(&self, user: Option<&UserId>) -> bool {
        if !self.enabled {
            return false;
        }
        if self.rollout_percent >= 100 {
            return true;
        }
        match user {
            Some(user_id) => rollout_bucket(&self.key, user_id) < self.rollout_percent,
            None => false,
        }
    }
}

/// Validate a flag key.
///
/// # Errors
///
/// `InvalidInput` if the key is malformed.
pub fn validate_key(key: &str) -> Result<(), CoreError> {
    let well_formed = !key.is_empty()
        && key.len() <= MAX_FLAG_KEY_LEN
        && key
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || matches!(b, b'_' | b'-' | b'.'));
    if well_formed {
        Ok(())
    } else {
        Err(CoreError::InvalidInput(format!("invalid flag key: {key:?}")))
    }
}

/// Stable 0-99 bucket for a (flag, user) pair.
#[must_use]
pub fn rollout_bucket(key: &str, user_id: &UserId) -> u8 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0100_0000_01b3;

    let user = user_id.to_string();
    let hash = key
        .bytes()
        .chain(std::iter::once(b':'))
        .chain(user.bytes())
        .fold(FNV_OFFSET, |acc, b| (acc ^ u64::from(b)).wrapping_mul(FNV_PRIME));

    // hash % 100 always fits in a u8.
    u8::try_from(hash % 100).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_flag_is_off_for_everyone() {
        let flag = FeatureFlag::new("beta_studio", false);
        assert!(!flag.is_enabled_for(None));
        assert!(!flag.is_enabled_for(Some(&UserId::generate())));
    }

    #[test]
    fn full_rollout_is_on_for_anonymous() {
        let flag = FeatureFlag::new("beta_studio", true);
        assert!(flag.is_enabled_for(None));
    }

    #[test]
    fn partial_rollout_is_off_for_anonymous() {
        let mut flag = FeatureFlag::new("beta_studio", true);
        flag.rollout_percent = 50;
        assert!(!flag.is_enabled_for(None));
    }

    #[test]
    fn bucket_is_stable_and_in_range() {
        let user = UserId::generate();
        let first = rollout_bucket("avatar_glow", &user);
        assert_eq!(first, rollout_bucket("avatar_glow", &user));
        assert!(first < 100);
    }

    #[test]
    fn zero_rollout_is_off_for_everyone() {
        let mut flag = FeatureFlag::new("avatar_glow", true);
        flag.rollout_percent = 0;
        for _ in 0..50 {
            assert!(!flag.is_enabled_for(Some(&UserId::generate())));
        }
    }

    #[test]
    fn key_validation() {
        assert!(validate_key("chat.widget-v2_beta").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("Has Spaces").is_err());
        assert!(validate_key(&"a".repeat(MAX_FLAG_KEY_LEN + 1)).is_err());

        let mut flag = FeatureFlag::new("ok", true);
        flag.rollout_percent = 101;
        assert!(flag.validate().is_err());
    }
}
