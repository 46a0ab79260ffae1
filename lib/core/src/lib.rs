//! Core domain types and utilities for the coursegate platform.
//!
//! This crate provides the identifier types and the error-handling
//! foundation shared by the identity library and the server.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ParseIdError, TokenId, UserId};
