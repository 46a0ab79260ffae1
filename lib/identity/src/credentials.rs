//! Email and password sign-in.
//!
//! Every rejection (malformed input, unknown email, no password set, wrong
//! password, unreadable hash) collapses into `Ok(None)` so a caller cannot
//! learn which one happened. Only adapter failures surface as errors.

use coursegate_core::{Result, UserId};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::adapter::SessionAdapter;
use crate::error::AuthenticationError;
use crate::role::Role;
use crate::user::User;

/// The identity produced by a successful sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedUser {
    pub id: UserId,
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub role: Option<Role>,
}

impl From<&User> for AuthorizedUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id().clone(),
            email: user.email().to_string(),
            name: user.name().map(str::to_string),
            image: user.image().map(str::to_string),
            role: user.role(),
        }
    }
}

/// Raw sign-in input.
///
/// Fields stay untyped until `authorize` checks them, since form and JSON
/// bodies may carry anything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub email: Option<Value>,
    #[serde(default)]
    pub password: Option<Value>,
}

impl Credentials {
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: Some(Value::String(email.into())),
            password: Some(Value::String(password.into())),
        }
    }

    fn non_empty(value: Option<&Value>) -> Option<&str> {
        match value {
            Some(Value::String(s)) if !s.is_empty() => Some(s.as_str()),
            _ => None,
        }
    }
}

/// Checks an email and password against the stored bcrypt hash.
///
/// On success the identity carries only `id`, `email` and `role`.
#[instrument(skip_all)]
pub async fn authorize(
    adapter: &dyn SessionAdapter,
    credentials: &Credentials,
) -> Result<Option<AuthorizedUser>, AuthenticationError> {
    let (Some(email), Some(password)) = (
        Credentials::non_empty(credentials.email.as_ref()),
        Credentials::non_empty(credentials.password.as_ref()),
    ) else {
        debug!("credential sign-in rejected: missing field");
        return Ok(None);
    };

    let Some(user) = adapter.get_user_by_email(email).await? else {
        debug!("credential sign-in rejected");
        return Ok(None);
    };
    let Some(hash) = user.hashed_password().map(str::to_string) else {
        debug!("credential sign-in rejected");
        return Ok(None);
    };

    let password = password.to_string();
    let verified = match tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await
    {
        Ok(Ok(matches)) => matches,
        Ok(Err(e)) => {
            warn!(user_id = %user.id(), error = %e, "stored password hash is unreadable");
            false
        }
        Err(e) => {
            warn!(error = %e, "password verification task failed");
            false
        }
    };

    if !verified {
        debug!("credential sign-in rejected");
        return Ok(None);
    }

    debug!(user_id = %user.id(), "credential sign-in accepted");
    Ok(Some(AuthorizedUser {
        id: user.id().clone(),
        email: user.email().to_string(),
        name: None,
        image: None,
        role: user.role(),
    }))
}

/// Hashes a password for storage with the default bcrypt cost.
pub async fn hash_password(password: &str) -> Result<String, AuthenticationError> {
    let password = password.to_string();
    let hashed = tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| AuthenticationError::Adapter {
            details: format!("hashing task failed: {e}"),
        })?
        .map_err(|e| AuthenticationError::Adapter {
            details: format!("failed to hash password: {e}"),
        })?;
    Ok(hashed)
}
