//! Signature and shared-secret helpers.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Hex-encoded HMAC-SHA256 of `message` under `secret`.
///
/// # Panics
///
/// Never in practice: HMAC accepts keys of any length (RFC 2104), so
/// `new_from_slice` cannot fail for `Hmac<Sha256>`.
#[must_use]
pub fn hmac_sha256_hex(secret: &str, message: &str) -> String {
    // INVARIANT: HMAC-SHA256 accepts keys of any size per RFC 2104.
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC-SHA256 accepts any key size");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Compare two strings without short-circuiting on the first difference.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Check a presented shared secret against the configured one.
///
/// An unset or empty configured secret rejects everything.
#[must_use]
pub fn secret_matches(presented: Option<&str>, configured: Option<&str>) -> bool {
    match (presented, configured) {
        (Some(presented), Some(configured)) if !configured.is_empty() => {
            constant_time_eq(presented, configured)
        }
        _ => false,
    }
}

/// Build a `Stripe-Signature` header value for `payload` signed at `timestamp`.
#[must_use]
pub fn stripe_signature_header(secret: &str, timestamp: i64, payload: &str) -> String {
    let signature = hmac_sha256_hex(secret, &format!("{timestamp}.{payload}"));
    format!("t={timestamp},v1={signature}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmac_matches_rfc_4231_case_2() {
        assert_eq!(
            hmac_sha256_hex("Jefe", "what do ya want for nothing?"),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn constant_time_eq_compares_whole_strings() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(constant_time_eq("", ""));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "ab"));
        assert!(!constant_time_eq("abc", "ABC"));
    }

    #[test]
    fn unset_secret_rejects_everything() {
        assert!(secret_matches(Some("s3cret"), Some("s3cret")));
        assert!(!secret_matches(Some("s3cret"), Some("other")));
        assert!(!secret_matches(None, Some("s3cret")));
        assert!(!secret_matches(Some(""), Some("")));
        assert!(!secret_matches(Some("anything"), None));
    }

    #[test]
    fn signature_header_has_timestamp_and_v1() {
        let header = stripe_signature_header("whsec_test", 1_700_000_000, "{}");
        assert!(header.starts_with("t=1700000000,v1="));
        assert_eq!(header.len(), "t=1700000000,v1=".len() + 64);
    }
}
