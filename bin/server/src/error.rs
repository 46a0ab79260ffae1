//! Error types for the HTTP auth layer.
//!
//! Every failure maps to a short code that is passed to the sign-in or error
//! page as `?error=<Code>`. Details stay in the logs.

use coursegate_identity::AuthenticationError;
use rootcause::Report;
use std::fmt;

/// Errors surfaced by sign-in, callback and sign-out flows.
#[derive(Debug)]
pub enum AuthError {
    /// The adapter or another server component failed.
    Configuration { details: String },
    /// An OAuth callback could not be completed.
    OAuthCallback { reason: String },
    /// The provider email already belongs to an unlinked user.
    AccountNotLinked { provider: String },
    /// The CSRF cookie or form token was missing or did not match.
    MissingCsrf,
    /// Email and password were rejected.
    CredentialsSignin,
    /// No provider with this ID is configured.
    UnknownProvider { id: String },
}

impl AuthError {
    /// The code passed to the sign-in or error page.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration { .. } | Self::UnknownProvider { .. } => "Configuration",
            Self::OAuthCallback { .. } => "OAuthCallback",
            Self::AccountNotLinked { .. } => "OAuthAccountNotLinked",
            Self::MissingCsrf => "MissingCSRF",
            Self::CredentialsSignin => "CredentialsSignin",
        }
    }

    /// Whether the user is sent back to the sign-in page instead of the error page.
    #[must_use]
    pub fn shows_on_sign_in_page(&self) -> bool {
        matches!(self, Self::CredentialsSignin)
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration { details } => write!(f, "auth configuration error: {details}"),
            Self::OAuthCallback { reason } => write!(f, "OAuth callback failed: {reason}"),
            Self::AccountNotLinked { provider } => {
                write!(f, "account is not linked to provider '{provider}'")
            }
            Self::MissingCsrf => write!(f, "CSRF token missing or invalid"),
            Self::CredentialsSignin => write!(f, "credentials rejected"),
            Self::UnknownProvider { id } => write!(f, "unknown provider '{id}'"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<Report<AuthenticationError>> for AuthError {
    fn from(report: Report<AuthenticationError>) -> Self {
        match report.current_context() {
            AuthenticationError::AccountNotLinked { provider } => Self::AccountNotLinked {
                provider: provider.clone(),
            },
            AuthenticationError::ProviderError { .. }
            | AuthenticationError::MissingClaim { .. }
            | AuthenticationError::InvalidToken { .. }
            | AuthenticationError::TokenExpired => Self::OAuthCallback {
                reason: report.to_string(),
            },
            AuthenticationError::Adapter { .. }
            | AuthenticationError::TokenEncoding { .. }
            | AuthenticationError::DuplicateEmail => Self::Configuration {
                details: report.to_string(),
            },
        }
    }
}
