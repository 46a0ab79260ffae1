//! coursegate authentication gateway.
//!
//! Signs users in with Google or with an email and password, carries their
//! course role in a signed session token, and exposes the session to the
//! rest of the platform.

pub mod app;
pub mod auth;
pub mod config;
pub mod error;
