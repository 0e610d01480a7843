//! Data model stored by the vault: secrets (`Credentials`) and the
//! plaintext index (`Account`, `VaultIndex`).

use atcore_common::CowStr;
use atcore_common::types::datetime::Datetime;
use atcore_oauth::types::OAuthTokenType;
use jose_jwk::Key;
use serde::{Deserialize, Serialize};

/// Which secret-storage tier a given account's credentials live in.
///
/// Recorded alongside the plaintext [`Account`] record so a future load
/// knows where to look without probing every tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// OS-provided keychain/credential manager, via the `keyring` crate.
    Keychain,
    /// Plain file with owner-only permissions, used only when no keychain
    /// service is reachable.
    PlaintextFile,
}

/// The secret half of an account: everything needed to authenticate,
/// serialized as a single JSON document under the secret-backend key
/// `user:<handle>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    /// The account's handle, e.g. `alice.example.com`.
    pub handle: CowStr<'static>,
    /// The account's DID.
    pub did: CowStr<'static>,
    /// The PDS service endpoint this session authenticates against.
    pub pds_url: CowStr<'static>,
    /// `DPoP` for an OAuth session, `Bearer` for an app-password session.
    pub token_type: OAuthTokenType,
    /// Current access token.
    pub access_token: CowStr<'static>,
    /// Refresh token, if the server issued one.
    pub refresh_token: Option<CowStr<'static>>,
    /// Access token expiry instant.
    pub expires_at: Option<Datetime>,
    /// Granted scope string, space-separated.
    pub scope: Option<CowStr<'static>>,
    /// The DPoP private key bound to this session. `None` for app-password
    /// (`Bearer`) sessions, which carry no DPoP key.
    pub dpop_key: Option<Key>,
    /// The authorization server this session's tokens were issued by.
    /// `None` for app-password sessions, which refresh directly against
    /// the PDS instead of a separate authorization server.
    pub authserver_url: Option<CowStr<'static>>,
    /// The authorization server's token endpoint, so a refresh can be
    /// issued without re-running server metadata discovery.
    pub authserver_token_endpoint: Option<CowStr<'static>>,
    /// The authorization server's revocation endpoint, if advertised.
    pub authserver_revocation_endpoint: Option<CowStr<'static>>,
    /// Which secret backend this record was written to.
    pub storage_backend: StorageBackend,
}

/// The plaintext half of an account: metadata the UI can enumerate without
/// touching the secret backend. Persisted in the index file alongside
/// every other account's record, never alongside a secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// The account's handle.
    pub handle: CowStr<'static>,
    /// The account's DID.
    pub did: CowStr<'static>,
    /// The PDS service endpoint this session authenticates against.
    pub pds_url: CowStr<'static>,
    /// Which secret backend holds this account's `Credentials`.
    pub storage_backend: StorageBackend,
    /// When this account was first added to the vault.
    pub created_at: Datetime,
    /// When this account's credentials were last loaded.
    pub last_used_at: Datetime,
}

/// Persisted, non-secret vault settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultSettings {
    /// Whether the authenticated client should refresh expiring sessions
    /// automatically rather than surfacing `AuthExpired`.
    pub auto_refresh: bool,
    /// How many minutes before expiry a token is eligible for refresh.
    pub refresh_threshold_minutes: u32,
    /// How many days a refresh token is trusted before forcing re-auth,
    /// independent of the server's own expiry.
    pub token_rotation_days: u32,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            auto_refresh: true,
            refresh_threshold_minutes: 5,
            token_rotation_days: 90,
        }
    }
}

/// The on-disk shape of the plaintext index file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultIndex {
    /// Index file format version.
    pub version: CowStr<'static>,
    /// Every account the vault currently tracks.
    pub accounts: Vec<Account>,
    /// The handle to use when the caller doesn't name one.
    pub default_account: Option<CowStr<'static>>,
    /// Persisted vault-wide settings.
    pub settings: VaultSettings,
}

impl Default for VaultIndex {
    fn default() -> Self {
        Self {
            version: CowStr::new_static("2.0"),
            accounts: Vec::new(),
            default_account: None,
            settings: VaultSettings::default(),
        }
    }
}
