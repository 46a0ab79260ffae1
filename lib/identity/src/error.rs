//! Error types for the identity crate.
//!
//! Errors are designed for layered context using rootcause. Rejected
//! credentials are deliberately *not* errors: the credential provider returns
//! `Ok(None)` for every rejection so callers cannot tell the cases apart.

use std::fmt;

/// Errors from authentication operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationError {
    /// The session adapter or its database failed.
    Adapter { details: String },
    /// A session token could not be signed.
    TokenEncoding { reason: String },
    /// A session token failed signature or structural validation.
    InvalidToken { reason: String },
    /// A session token is past its expiry.
    TokenExpired,
    /// The external identity provider reported an error.
    ProviderError { provider: String, reason: String },
    /// The provider profile is missing a required claim.
    MissingClaim { claim: String },
    /// A user with this email exists but is not linked to the provider account.
    AccountNotLinked { provider: String },
    /// A record with this email already exists.
    DuplicateEmail,
}

impl fmt::Display for AuthenticationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Adapter { details } => {
                write!(f, "session adapter error: {details}")
            }
            Self::TokenEncoding { reason } => {
                write!(f, "failed to sign session token: {reason}")
            }
            Self::InvalidToken { reason } => {
                write!(f, "invalid session token: {reason}")
            }
            Self::TokenExpired => {
                write!(f, "session token has expired")
            }
            Self::ProviderError { provider, reason } => {
                write!(f, "identity provider '{provider}' error: {reason}")
            }
            Self::MissingClaim { claim } => {
                write!(f, "missing required claim: {claim}")
            }
            Self::AccountNotLinked { provider } => {
                write!(
                    f,
                    "email already belongs to a user not linked to '{provider}'"
                )
            }
            Self::DuplicateEmail => {
                write!(f, "a user with this email already exists")
            }
        }
    }
}

impl std::error::Error for AuthenticationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_error_display() {
        let err = AuthenticationError::Adapter {
            details: "connection refused".to_string(),
        };
        assert!(err.to_string().contains("adapter"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn provider_error_display() {
        let err = AuthenticationError::ProviderError {
            provider: "google".to_string(),
            reason: "token exchange failed".to_string(),
        };
        assert!(err.to_string().contains("google"));
        assert!(err.to_string().contains("token exchange failed"));
    }

    #[test]
    fn account_not_linked_does_not_leak_email() {
        let err = AuthenticationError::AccountNotLinked {
            provider: "google".to_string(),
        };
        assert!(!err.to_string().contains('@'));
    }

    #[test]
    fn token_expired_display() {
        assert!(AuthenticationError::TokenExpired.to_string().contains("expired"));
    }
}
