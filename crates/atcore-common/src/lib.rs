#[macro_use]
pub mod cowstr;
#[macro_use]
pub mod into_static;

/// Shared client/session error taxonomy.
pub mod error;
/// Minimal transport trait so the OAuth and credential-session flows can be
/// generic over the HTTP client implementation.
pub mod http_client;
/// Pluggable session/token storage trait and an in-memory implementation.
pub mod session;
pub mod types;

pub use cowstr::CowStr;
pub use http_client::AuthorizationToken;
pub use into_static::IntoStatic;

pub use smol_str;
pub use url;
