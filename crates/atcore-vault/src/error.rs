//! Error taxonomy for the credential vault.

use miette::Diagnostic;

/// Errors raised while loading, saving, or enumerating vault credentials.
#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum VaultError {
    /// No credentials are stored for the given handle.
    #[error("no credentials stored for handle {0:?}")]
    #[diagnostic(code(atcore_vault::not_found))]
    NotFound(String),

    /// Neither the OS keychain nor the plaintext fallback could service a
    /// secret read or write.
    #[error("no usable secret storage backend is available")]
    #[diagnostic(code(atcore_vault::keyring_unavailable))]
    KeyringUnavailable,

    /// A keychain operation failed for a reason other than plain
    /// unavailability (denied, locked, entry too large, etc).
    #[error("keychain error: {0}")]
    #[diagnostic(code(atcore_vault::keychain))]
    Keychain(#[source] keyring::Error),

    /// Reading or writing the plaintext index or secret file failed.
    #[error("storage I/O error: {0}")]
    #[diagnostic(code(atcore_vault::storage))]
    Storage(#[from] std::io::Error),

    /// A stored credential or index record failed to (de)serialize.
    #[error("failed to (de)serialize vault record: {0}")]
    #[diagnostic(code(atcore_vault::serde))]
    Serde(#[from] serde_json::Error),

    /// The platform config directory could not be determined.
    #[error("could not determine a platform config directory")]
    #[diagnostic(code(atcore_vault::no_config_dir))]
    NoConfigDir,

    /// An invariant of the vault's on-disk layout was violated (e.g. an
    /// index entry with no corresponding secret). Should not normally occur.
    #[error("vault invariant violated: {0}")]
    #[diagnostic(code(atcore_vault::invariant))]
    Invariant(String),
}

/// Convenience alias for vault operations.
pub type Result<T> = core::result::Result<T, VaultError>;
