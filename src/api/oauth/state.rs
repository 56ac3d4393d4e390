//! CSRF state for the consent flow.
//!
//! The nonce lives only in a short-lived, HTTP-only cookie scoped to the
//! provider. The callback compares it against the `state` query parameter
//! and clears the cookie whatever the outcome.

use super::OAuthProvider;
use rand::RngCore;

/// Random bytes in a state nonce (hex encoded on the wire).
const STATE_BYTES: usize = 32;

/// Generates a new state nonce.
pub fn generate_state() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Compares the cookie nonce with the one the provider echoed back.
///
/// Missing or empty on either side is a failure. Equal-length inputs are
/// compared in constant time.
pub fn validate_state(cookie_state: Option<&str>, returned_state: Option<&str>) -> bool {
    match (cookie_state, returned_state) {
        (Some(cookie), Some(returned)) if !cookie.is_empty() && !returned.is_empty() => {
            constant_time_eq(cookie.as_bytes(), returned.as_bytes())
        }
        _ => false,
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// `Set-Cookie` value storing a pending state nonce.
pub fn state_cookie(provider: OAuthProvider, state: &str, max_age_seconds: u64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Max-Age={}; Path=/; HttpOnly; SameSite=Lax",
        provider.state_cookie_name(),
        state,
        max_age_seconds
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value deleting the state cookie.
pub fn clear_state_cookie(provider: OAuthProvider, secure: bool) -> String {
    state_cookie(provider, "", 0, secure)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_state_is_hex_and_unique() {
        let a = generate_state();
        let b = generate_state();

        assert_eq!(a.len(), STATE_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_equal_states_validate() {
        let state = generate_state();
        assert!(validate_state(Some(&state), Some(&state)));
    }

    #[test]
    fn test_single_character_difference_fails() {
        assert!(!validate_state(Some("abcdef"), Some("abcdeg")));
        assert!(!validate_state(Some("Abcdef"), Some("abcdef")));
    }

    #[test]
    fn test_length_mismatch_fails() {
        assert!(!validate_state(Some("abc"), Some("abcd")));
        assert!(!validate_state(Some("abcd"), Some("abc")));
    }

    #[test]
    fn test_missing_side_fails() {
        assert!(!validate_state(None, Some("abc")));
        assert!(!validate_state(Some("abc"), None));
        assert!(!validate_state(None, None));
        assert!(!validate_state(Some(""), Some("")));
    }

    #[test]
    fn test_validation_is_symmetric() {
        let pairs = [("abc", "abc"), ("abc", "abd"), ("abc", "abcd")];
        for (a, b) in pairs {
            assert_eq!(
                validate_state(Some(a), Some(b)),
                validate_state(Some(b), Some(a))
            );
        }
    }

    #[test]
    fn test_state_cookie_format() {
        let cookie = state_cookie(OAuthProvider::Google, "nonce", 600, false);
        assert_eq!(
            cookie,
            "oauth_state_google=nonce; Max-Age=600; Path=/; HttpOnly; SameSite=Lax"
        );

        let secure = state_cookie(OAuthProvider::Facebook, "nonce", 600, true);
        assert!(secure.starts_with("oauth_state_facebook=nonce;"));
        assert!(secure.ends_with("; Secure"));
    }

    #[test]
    fn test_clear_cookie_expires_immediately() {
        let cookie = clear_state_cookie(OAuthProvider::Google, false);
        assert!(cookie.starts_with("oauth_state_google=;"));
        assert!(cookie.contains("Max-Age=0"));
    }
}
