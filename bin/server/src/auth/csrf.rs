//! Double-submit CSRF tokens.
//!
//! The cookie holds `token|sha256(token + secret)`; a state-changing POST must
//! echo `token` in its `csrfToken` field. Only the server can mint a cookie
//! whose hash verifies.

use rand::RngCore;
use sha2::{Digest, Sha256};

/// A CSRF token and the cookie value that vouches for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfPair {
    pub token: String,
    pub cookie_value: String,
}

fn digest(token: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Mints a fresh random token.
#[must_use]
pub fn issue(secret: &str) -> CsrfPair {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let token = hex::encode(bytes);
    let cookie_value = format!("{token}|{}", digest(&token, secret));
    CsrfPair {
        token,
        cookie_value,
    }
}

/// Returns the token inside a cookie value if its hash verifies.
#[must_use]
pub fn token_from_cookie(cookie_value: &str, secret: &str) -> Option<String> {
    let (token, hash) = cookie_value.split_once('|')?;
    if token.is_empty() || !constant_time_eq(hash.as_bytes(), digest(token, secret).as_bytes()) {
        return None;
    }
    Some(token.to_string())
}

/// Checks a submitted form token against the CSRF cookie.
#[must_use]
pub fn verify(cookie_value: Option<&str>, submitted: Option<&str>, secret: &str) -> bool {
    let (Some(cookie_value), Some(submitted)) = (cookie_value, submitted) else {
        return false;
    };
    token_from_cookie(cookie_value, secret)
        .is_some_and(|token| constant_time_eq(token.as_bytes(), submitted.as_bytes()))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
