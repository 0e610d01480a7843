//! Error taxonomy for the authenticated client facade.
//!
//! Aggregates the lower-level error types from identity resolution, the
//! OAuth engine, the app-password fallback and the vault behind one enum,
//! with a semantic [`ErrorKind`] a caller can match on without reaching
//! into each wrapped variant.

use miette::Diagnostic;

/// Semantic error category, independent of which component raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed handle, DID, URL, or port.
    InvalidInput,
    /// DNS, connect, TLS, timeout, or connection reset.
    NetworkError,
    /// Well-known or PLC lookup returned a bad status, missing DID, or
    /// invalid format.
    DidResolveFailed,
    /// The DID document doesn't claim the handle being logged in.
    HandleVerificationFailed,
    /// Issuer mismatch, missing PAR endpoint, or unsupported algorithms.
    MetadataInvalid,
    /// The callback `state` differs from the flow that started it.
    StateMismatch,
    /// No credentials are stored for the requested handle.
    AuthRequired,
    /// The refresh token was exhausted or rejected; re-authentication is
    /// required.
    AuthExpired,
    /// A keychain or file I/O failure while reading or writing the vault.
    StorageError,
    /// No secret storage backend is usable on this platform.
    KeyringUnavailable,
    /// An invariant was violated; should not normally occur.
    InternalError,
}

/// Unified error type returned by the authenticated client.
#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum AuthCoreError {
    /// Identity resolution (handle/DID document) failed.
    #[error(transparent)]
    #[diagnostic(code(atcore::identity))]
    Identity(#[from] atcore_identity::resolver::IdentityError),

    /// The OAuth flow engine rejected or failed a request.
    #[error(transparent)]
    #[diagnostic(code(atcore::oauth))]
    OAuth(#[from] atcore_oauth::error::OAuthError),

    /// The app-password login/refresh flow rejected or failed a request.
    #[error(transparent)]
    #[diagnostic(code(atcore::app_password))]
    AppPassword(#[from] atcore_oauth::app_password::AppPasswordError),

    /// The credential vault failed to load, save, or enumerate an account.
    #[error(transparent)]
    #[diagnostic(code(atcore::vault))]
    Vault(#[from] atcore_vault::VaultError),

    /// No credentials are stored for the requested handle.
    #[error("no credentials stored for handle {0:?}; call login_oauth or login_app_password first")]
    #[diagnostic(code(atcore::auth_required))]
    AuthRequired(String),

    /// The handle's refresh token was rejected or is no longer valid.
    #[error("session for {0:?} has expired and could not be refreshed")]
    #[diagnostic(code(atcore::auth_expired))]
    AuthExpired(String),

    /// An internal invariant was violated.
    #[error("internal error: {0}")]
    #[diagnostic(code(atcore::internal))]
    Internal(String),
}

impl AuthCoreError {
    /// The semantic category this error falls under.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Identity(atcore_identity::resolver::IdentityError::UnsupportedDidMethod(_)) => {
                ErrorKind::InvalidInput
            }
            Self::Identity(atcore_identity::resolver::IdentityError::Http(_)) => ErrorKind::NetworkError,
            Self::Identity(_) => ErrorKind::DidResolveFailed,
            Self::OAuth(atcore_oauth::error::OAuthError::Callback(
                atcore_oauth::error::CallbackError::IssuerMismatch { .. },
            )) => ErrorKind::StateMismatch,
            Self::OAuth(atcore_oauth::error::OAuthError::Callback(
                atcore_oauth::error::CallbackError::MissingState,
            )) => ErrorKind::StateMismatch,
            Self::OAuth(atcore_oauth::error::OAuthError::Resolver(e))
                if matches!(
                    e.kind(),
                    atcore_oauth::resolver::ResolverErrorKind::HandleAliasMismatch(_)
                ) =>
            {
                ErrorKind::HandleVerificationFailed
            }
            Self::OAuth(atcore_oauth::error::OAuthError::Resolver(_)) => ErrorKind::MetadataInvalid,
            Self::OAuth(_) => ErrorKind::NetworkError,
            Self::AppPassword(_) => ErrorKind::NetworkError,
            Self::Vault(atcore_vault::VaultError::NotFound(_)) => ErrorKind::AuthRequired,
            Self::Vault(atcore_vault::VaultError::KeyringUnavailable) => ErrorKind::KeyringUnavailable,
            Self::Vault(atcore_vault::VaultError::Invariant(_)) => ErrorKind::InternalError,
            Self::Vault(_) => ErrorKind::StorageError,
            Self::AuthRequired(_) => ErrorKind::AuthRequired,
            Self::AuthExpired(_) => ErrorKind::AuthExpired,
            Self::Internal(_) => ErrorKind::InternalError,
        }
    }
}

/// Convenience alias for authenticated-client operations.
pub type Result<T> = core::result::Result<T, AuthCoreError>;
