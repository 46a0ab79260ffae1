//! Identity, credentials and session claims for coursegate.
//!
//! This crate provides:
//! - User and account records (`User`, `Account`) and the `Role` claim
//! - The `SessionAdapter` storage contract with an in-memory implementation
//! - Email and password sign-in (`authorize`)
//! - Signed session tokens (`TokenCodec`, `TokenClaims`) and the
//!   request-facing `Session` view
//! - The claim callbacks that carry a user's role from sign-in into every
//!   later session read
//!
//! # Example
//!
//! ```
//! use coursegate_identity::{
//!     AuthorizedUser, Role, Session, TokenClaims, TokenCodec, enrich_token, project_session,
//! };
//! use chrono::{Duration, Utc};
//!
//! let user = AuthorizedUser {
//!     id: "42".into(),
//!     email: "ada@example.com".to_string(),
//!     name: None,
//!     image: None,
//!     role: Some(Role::Instructor),
//! };
//!
//! let codec = TokenCodec::new("dev-secret");
//! let claims = enrich_token(
//!     TokenClaims::for_user(&user, Utc::now(), Duration::days(30)),
//!     Some(&user),
//! );
//! let token = codec.encode(&claims).unwrap();
//!
//! let read_back = codec.decode(&token).unwrap();
//! let session = project_session(Session::from_claims(&read_back), &read_back);
//! assert_eq!(session.role(), Some(Role::Instructor));
//! ```

pub mod adapter;
pub mod callbacks;
pub mod credentials;
pub mod error;
pub mod role;
pub mod session;
pub mod token;
pub mod user;

pub use adapter::{MemoryAdapter, SessionAdapter};
pub use callbacks::{enrich_token, project_session};
pub use credentials::{AuthorizedUser, Credentials, authorize, hash_password};
pub use error::AuthenticationError;
pub use role::{Role, UnknownRole};
pub use session::{Session, SessionRecord, SessionUser, TokenClaims};
pub use token::TokenCodec;
pub use user::{Account, AccountKind, User};
