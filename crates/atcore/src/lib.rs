#![doc = include_str!("../../../README.md")]
#![warn(missing_docs)]

/// Authenticated HTTP client tying together the vault, OAuth engine and
/// app-password fallback behind a single auto-refreshing facade.
pub mod client;
/// Unified error type and semantic error-kind taxonomy for the facade.
pub mod error;

pub use client::Client;
pub use error::{AuthCoreError, ErrorKind};

pub use atcore_common as common;
pub use atcore_identity as identity;
pub use atcore_oauth as oauth;
pub use atcore_vault as vault;
