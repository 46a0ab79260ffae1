//! User and linked-account records.
//!
//! A `User` is the local identity. An `Account` links that identity to an
//! external provider account, keyed by `(provider, provider_account_id)`.
//! Users that sign in with email and password have no account link; their
//! password hash lives on the user record.

use chrono::{DateTime, Utc};
use coursegate_core::UserId;
use serde::{Deserialize, Serialize};

use crate::role::Role;

/// A local user record.
///
/// The password hash is never serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    id: UserId,
    email: String,
    name: Option<String>,
    email_verified: Option<DateTime<Utc>>,
    image: Option<String>,
    #[serde(skip)]
    hashed_password: Option<String>,
    role: Option<Role>,
}

impl User {
    /// Creates a new user with a generated ID and only an email address.
    #[must_use]
    pub fn new(email: String) -> Self {
        Self {
            id: UserId::generate(),
            email,
            name: None,
            email_verified: None,
            image: None,
            hashed_password: None,
            role: None,
        }
    }

    /// Creates a user with all fields specified.
    ///
    /// Use this when reconstituting a user from storage.
    #[must_use]
    pub fn with_all_fields(
        id: UserId,
        email: String,
        name: Option<String>,
        email_verified: Option<DateTime<Utc>>,
        image: Option<String>,
        hashed_password: Option<String>,
        role: Option<Role>,
    ) -> Self {
        Self {
            id,
            email,
            name,
            email_verified,
            image,
            hashed_password,
            role,
        }
    }

    #[must_use]
    pub fn id(&self) -> &UserId {
        &self.id
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns when the email address was verified, if ever.
    #[must_use]
    pub fn email_verified(&self) -> Option<DateTime<Utc>> {
        self.email_verified
    }

    /// Returns the avatar URL, if any.
    #[must_use]
    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    /// Returns the stored bcrypt hash, if a password has been set.
    #[must_use]
    pub fn hashed_password(&self) -> Option<&str> {
        self.hashed_password.as_deref()
    }

    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn set_name(&mut self, name: Option<String>) {
        self.name = name;
    }

    pub fn set_email_verified(&mut self, verified: Option<DateTime<Utc>>) {
        self.email_verified = verified;
    }

    pub fn set_image(&mut self, image: Option<String>) {
        self.image = image;
    }

    /// Sets the stored password hash. The value must already be hashed.
    pub fn set_hashed_password(&mut self, hash: Option<String>) {
        self.hashed_password = hash;
    }

    pub fn set_role(&mut self, role: Option<Role>) {
        self.role = role;
    }
}

/// How an account authenticates against its provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    /// Plain OAuth 2.0.
    OAuth,
    /// OpenID Connect.
    Oidc,
}

impl AccountKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OAuth => "oauth",
            Self::Oidc => "oidc",
        }
    }
}

/// Link between a local user and an external provider account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// The local user this account belongs to.
    pub user_id: UserId,
    pub kind: AccountKind,
    /// Provider identifier, e.g. "google".
    pub provider: String,
    /// The provider's stable subject identifier for this account.
    pub provider_account_id: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// Access token expiry as a Unix timestamp in seconds.
    pub expires_at: Option<i64>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
    pub id_token: Option<String>,
}

impl Account {
    /// Creates an account link with no provider tokens.
    #[must_use]
    pub fn new(
        user_id: UserId,
        kind: AccountKind,
        provider: String,
        provider_account_id: String,
    ) -> Self {
        Self {
            user_id,
            kind,
            provider,
            provider_account_id,
            access_token: None,
            refresh_token: None,
            expires_at: None,
            token_type: None,
            scope: None,
            id_token: None,
        }
    }
}
