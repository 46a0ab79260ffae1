//! Cookie names and builders for the auth flows.

use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration as TimeDuration;

const SESSION_TOKEN: &str = "authjs.session-token";
const CSRF_TOKEN: &str = "authjs.csrf-token";
const OAUTH_STATE: &str = "authjs.oauth-state";

/// Lifetime of the cookie that carries OAuth state between redirect and callback.
pub const OAUTH_STATE_MAX_AGE: TimeDuration = TimeDuration::minutes(15);

/// Cookie names and flags for one deployment.
///
/// Secure deployments use the `__Secure-` and `__Host-` prefixes so browsers
/// refuse to accept the cookies over plain HTTP.
#[derive(Debug, Clone)]
pub struct AuthCookies {
    pub session_token: String,
    pub csrf_token: String,
    pub oauth_state: String,
    secure: bool,
}

impl AuthCookies {
    #[must_use]
    pub fn new(secure: bool) -> Self {
        let (secure_prefix, host_prefix) = if secure {
            ("__Secure-", "__Host-")
        } else {
            ("", "")
        };
        Self {
            session_token: format!("{secure_prefix}{SESSION_TOKEN}"),
            csrf_token: format!("{host_prefix}{CSRF_TOKEN}"),
            oauth_state: format!("{secure_prefix}{OAUTH_STATE}"),
            secure,
        }
    }

    /// Builds an HTTP-only cookie scoped to the whole site.
    ///
    /// Without `max_age` the cookie lasts for the browser session.
    #[must_use]
    pub fn build(
        &self,
        name: &str,
        value: String,
        max_age: Option<TimeDuration>,
    ) -> Cookie<'static> {
        let mut cookie = Cookie::build((name.to_string(), value))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax);
        if let Some(max_age) = max_age {
            cookie = cookie.max_age(max_age);
        }
        cookie.build()
    }

    /// Builds a cookie that clears `name`.
    #[must_use]
    pub fn removal(&self, name: &str) -> Cookie<'static> {
        Cookie::build((name.to_string(), ""))
            .path("/")
            .secure(self.secure)
            .max_age(TimeDuration::ZERO)
            .build()
    }
}
