//! Session tokens and the request-facing session view.
//!
//! Sessions are stateless: after a successful sign-in the server issues a
//! signed token (`TokenClaims`) in a cookie, and every request rebuilds the
//! `Session` view from it. The claims are never persisted. `SessionRecord`
//! is the row shape used by adapters that track sessions in the database.

use chrono::{DateTime, Duration, TimeZone, Utc};
use coursegate_core::{TokenId, UserId};
use serde::{Deserialize, Serialize};

use crate::credentials::AuthorizedUser;
use crate::role::Role;

/// Claims carried inside a signed session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: the local user ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    /// Role copied from the user record at sign-in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Issued-at, Unix seconds.
    pub iat: i64,
    /// Expiry, Unix seconds.
    pub exp: i64,
    pub jti: TokenId,
}

impl TokenClaims {
    /// Builds the default claims for a freshly authenticated user.
    ///
    /// The role is left unset; token enrichment copies it in.
    #[must_use]
    pub fn for_user(user: &AuthorizedUser, now: DateTime<Utc>, max_age: Duration) -> Self {
        Self {
            sub: Some(user.id.clone()),
            name: user.name.clone(),
            email: Some(user.email.clone()),
            picture: user.image.clone(),
            role: None,
            iat: now.timestamp(),
            exp: (now + max_age).timestamp(),
            jti: TokenId::generate(),
        }
    }

    /// Re-stamps the token so it lives for `max_age` from `now`.
    #[must_use]
    pub fn refreshed(mut self, now: DateTime<Utc>, max_age: Duration) -> Self {
        self.iat = now.timestamp();
        self.exp = (now + max_age).timestamp();
        self.jti = TokenId::generate();
        self
    }

    /// Returns the expiry as a timestamp.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// The user part of a request-facing session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<UserId>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

/// Session as returned to callers and the `/session` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: SessionUser,
    pub expires: DateTime<Utc>,
}

impl Session {
    /// Builds the default session view from token claims.
    ///
    /// Only the profile fields are copied here; the subject and role are
    /// applied by session projection.
    #[must_use]
    pub fn from_claims(claims: &TokenClaims) -> Self {
        Self {
            user: SessionUser {
                id: None,
                name: claims.name.clone(),
                email: claims.email.clone(),
                image: claims.picture.clone(),
                role: None,
            },
            expires: claims.expires_at(),
        }
    }

    /// Returns the user ID, if the session has been projected.
    #[must_use]
    pub fn user_id(&self) -> Option<&UserId> {
        self.user.id.as_ref()
    }

    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.user.role
    }
}

/// A database-tracked session row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    /// Opaque token stored in the session cookie.
    pub session_token: String,
    pub user_id: UserId,
    pub expires: DateTime<Utc>,
}

impl SessionRecord {
    /// Creates a session row valid for `duration` from now.
    #[must_use]
    pub fn new(session_token: String, user_id: UserId, duration: Duration) -> Self {
        Self {
            session_token,
            user_id,
            expires: Utc::now() + duration,
        }
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires
    }
}
