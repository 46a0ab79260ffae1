//! Error handling foundation for coursegate.
//!
//! Only the `Result` alias lives here. The identity library and the server
//! each define their own error enums and wrap them in a rootcause `Report`.
//! The server classifies identity reports by their current context and maps
//! them onto its own error codes.

use rootcause::Report;

/// Result alias over rootcause's `Report`.
///
/// `C` is the context type of the report, usually a crate's error enum.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
