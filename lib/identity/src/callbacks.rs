//! Claim propagation between the user record, the token and the session.
//!
//! Two pure transforms run in sequence:
//! - `enrich_token` runs when a token is issued or re-read. The user is only
//!   present on the sign-in that starts a token's lifetime, so the role is
//!   captured once and never re-read from the database.
//! - `project_session` runs whenever a session is read and copies the
//!   subject and role from the token into the session view.

use crate::credentials::AuthorizedUser;
use crate::session::{Session, TokenClaims};

/// Copies the role from a freshly authenticated user into the token.
///
/// Without a user the token is returned unchanged.
#[must_use]
pub fn enrich_token(mut token: TokenClaims, user: Option<&AuthorizedUser>) -> TokenClaims {
    if let Some(user) = user {
        token.role = user.role;
    }
    token
}

/// Overwrites the session's user ID and role from the token subject.
///
/// Tokens without a subject leave the session untouched.
#[must_use]
pub fn project_session(mut session: Session, token: &TokenClaims) -> Session {
    if let Some(sub) = &token.sub {
        session.user.id = Some(sub.clone());
        session.user.role = token.role;
    }
    session
}
