//! Vault configuration.

use bon::Builder;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for opening a [`crate::Vault`].
///
/// Built with [`bon`], matching the builder style the rest of this
/// workspace uses for option-heavy constructors.
#[derive(Debug, Clone, Builder)]
#[builder(start_fn = new)]
pub struct VaultConfig {
    /// Overrides the platform config directory (`$XDG_CONFIG_HOME`,
    /// `~/Library/Application Support`, `%APPDATA%`, ...). Mostly useful
    /// for tests.
    pub config_dir: Option<PathBuf>,

    /// Fixed local redirect port for the loopback OAuth callback, or `None`
    /// to bind an ephemeral port chosen by the OS.
    pub redirect_port: Option<u16>,

    /// How long the loopback listener waits to bind before giving up.
    #[builder(default = Duration::from_secs(5))]
    pub loopback_bind_timeout: Duration,

    /// How many minutes before expiry a token becomes eligible for
    /// proactive refresh.
    #[builder(default = 5)]
    pub refresh_threshold_minutes: u32,

    /// Whether the authenticated client refreshes expiring sessions on its
    /// own rather than surfacing `AuthExpired` to the caller.
    #[builder(default = true)]
    pub auto_refresh: bool,

    /// How many days a refresh token is trusted before the vault forces
    /// re-authentication, independent of the server's own expiry.
    #[builder(default = 90)]
    pub token_rotation_days: u32,
}

impl Default for VaultConfig {
    fn default() -> Self {
        VaultConfig::new().build()
    }
}

impl VaultConfig {
    /// Resolve the directory this vault's index file lives in, honoring
    /// [`VaultConfig::config_dir`] when set and falling back to the
    /// platform-appropriate config directory otherwise.
    pub(crate) fn resolve_dir(&self) -> crate::error::Result<PathBuf> {
        if let Some(dir) = &self.config_dir {
            return Ok(dir.clone());
        }
        dirs::config_dir()
            .map(|d| d.join("atcore"))
            .ok_or(crate::error::VaultError::NoConfigDir)
    }
}
