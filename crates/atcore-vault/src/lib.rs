//! Multi-account credential vault for AT Protocol sessions.
//!
//! Splits each account into two halves: a secret half (`Credentials`)
//! stored in the OS keychain when one is reachable, and a plaintext half
//! (`Account`) stored in an index file so a caller can list accounts
//! without touching the secret backend at all.

mod backend;
/// Vault configuration.
pub mod config;
/// Error taxonomy for vault operations.
pub mod error;
/// The secret and plaintext record types the vault persists.
pub mod types;

pub use config::VaultConfig;
pub use error::{Result, VaultError};
pub use types::{Account, Credentials, StorageBackend, VaultIndex, VaultSettings};

use atcore_common::types::datetime::Datetime;
use backend::{KeychainBackend, PlaintextFileBackend, SecretBackend};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

const DEFAULT_HANDLE_KEY: &str = "default_handle";

fn secret_key(handle: &str) -> String {
    format!("user:{handle}")
}

/// Handle-keyed credential store backed by the OS keychain (or a plaintext
/// file, if no keychain service is reachable) plus a plaintext index file
/// for account metadata.
pub struct Vault {
    config: VaultConfig,
    index_path: PathBuf,
    backend: Arc<dyn SecretBackend>,
    index: RwLock<VaultIndex>,
}

impl Vault {
    /// Open (or initialize) a vault using the given configuration.
    ///
    /// Probes the OS keychain by writing, reading back, and deleting a
    /// sentinel value. If that fails for any reason the vault falls back
    /// to a plaintext file under the same config directory and logs a
    /// [`VaultError::KeyringUnavailable`]-shaped warning.
    pub async fn open(config: VaultConfig) -> Result<Self> {
        let dir = config.resolve_dir()?;
        let index_path = dir.join("accounts.json");

        let backend: Arc<dyn SecretBackend> =
            match tokio::task::spawn_blocking(KeychainBackend::probe).await {
                Ok(true) => Arc::new(KeychainBackend),
                _ => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("no usable OS keychain found, falling back to a plaintext credential file");
                    Arc::new(PlaintextFileBackend::new(dir.join("secrets.json")))
                }
            };

        let index = Self::load_index(&index_path).await?;

        Ok(Self {
            config,
            index_path,
            backend,
            index: RwLock::new(index),
        })
    }

    async fn load_index(path: &std::path::Path) -> Result<VaultIndex> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(VaultIndex::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_index(&self, index: &VaultIndex) -> Result<()> {
        if let Some(parent) = self.index_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
            set_dir_permissions(parent)?;
        }
        let tmp_path = self.index_path.with_extension("tmp");
        tokio::fs::write(&tmp_path, serde_json::to_vec_pretty(index)?).await?;
        set_file_permissions(&tmp_path)?;
        tokio::fs::rename(&tmp_path, &self.index_path).await?;
        Ok(())
    }

    /// Store `credentials`, creating or updating the matching `Account`
    /// record. Marks the stored backend tag on both records so a later
    /// `load` knows where the secret lives.
    pub async fn save(&self, credentials: Credentials) -> Result<()> {
        let handle = credentials.handle.to_string();
        let key = secret_key(&handle);
        let backend = self.backend.clone();
        let serialized = serde_json::to_string(&credentials)?;
        tokio::task::spawn_blocking(move || backend.set(&key, &serialized))
            .await
            .map_err(|e| VaultError::Invariant(e.to_string()))??;

        let mut index = self.index.write().await;
        let now = Datetime::now();
        if let Some(existing) = index.accounts.iter_mut().find(|a| a.handle.as_ref() == handle) {
            existing.did = credentials.did.clone();
            existing.pds_url = credentials.pds_url.clone();
            existing.storage_backend = self.backend.kind();
            existing.last_used_at = now;
        } else {
            index.accounts.push(Account {
                handle: credentials.handle.clone(),
                did: credentials.did.clone(),
                pds_url: credentials.pds_url.clone(),
                storage_backend: self.backend.kind(),
                created_at: now.clone(),
                last_used_at: now,
            });
        }
        self.write_index(&index).await
    }

    /// Load the stored `Credentials` for `handle`, bumping its `last_used_at`.
    pub async fn load(&self, handle: &str) -> Result<Credentials> {
        let key = secret_key(handle);
        let backend = self.backend.clone();
        let raw = tokio::task::spawn_blocking(move || backend.get(&key))
            .await
            .map_err(|e| VaultError::Invariant(e.to_string()))??
            .ok_or_else(|| VaultError::NotFound(handle.to_string()))?;
        let credentials: Credentials = serde_json::from_str(&raw)?;

        let mut index = self.index.write().await;
        if let Some(account) = index.accounts.iter_mut().find(|a| a.handle.as_ref() == handle) {
            account.last_used_at = Datetime::now();
            self.write_index(&index).await?;
        }

        Ok(credentials)
    }

    /// Remove a handle's credentials and its account record. If `handle`
    /// was the default, the default is cleared.
    pub async fn delete(&self, handle: &str) -> Result<()> {
        let key = secret_key(handle);
        let backend = self.backend.clone();
        tokio::task::spawn_blocking(move || backend.delete(&key))
            .await
            .map_err(|e| VaultError::Invariant(e.to_string()))??;

        let mut index = self.index.write().await;
        index.accounts.retain(|a| a.handle.as_ref() != handle);
        if index.default_account.as_deref() == Some(handle) {
            index.default_account = None;
        }
        self.write_index(&index).await
    }

    /// List every account's plaintext metadata, without touching the
    /// secret backend.
    pub async fn list(&self) -> Vec<Account> {
        self.index.read().await.accounts.clone()
    }

    /// Look up the handle whose `Account` record carries the given DID, if
    /// any. Used to recover a handle when only a DID is known (e.g.
    /// restoring an OAuth session after a restart).
    pub async fn handle_for_did(&self, did: &str) -> Option<String> {
        self.index
            .read()
            .await
            .accounts
            .iter()
            .find(|a| a.did.as_ref() == did)
            .map(|a| a.handle.to_string())
    }

    /// Name `handle` as the default account. Errors if no record exists
    /// for it yet.
    pub async fn set_default(&self, handle: &str) -> Result<()> {
        let mut index = self.index.write().await;
        if !index.accounts.iter().any(|a| a.handle.as_ref() == handle) {
            return Err(VaultError::NotFound(handle.to_string()));
        }
        index.default_account = Some(handle.to_string().into());
        self.write_index(&index).await
    }

    /// The current default handle, if one is set.
    pub async fn get_default(&self) -> Option<String> {
        self.index
            .read()
            .await
            .default_account
            .as_ref()
            .map(|h| h.to_string())
    }

    /// The config this vault was opened with.
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Which secret-storage tier this vault resolved to at open time.
    pub fn backend_kind(&self) -> StorageBackend {
        self.backend.kind()
    }
}

#[cfg(unix)]
fn set_file_permissions(path: &std::path::Path) -> Result<()> {
    rustix::fs::chmod(path, rustix::fs::Mode::from_raw_mode(0o600)).map_err(|e| std::io::Error::from(e).into())
}

#[cfg(unix)]
fn set_dir_permissions(path: &std::path::Path) -> Result<()> {
    rustix::fs::chmod(path, rustix::fs::Mode::from_raw_mode(0o700)).map_err(|e| std::io::Error::from(e).into())
}

#[cfg(not(unix))]
fn set_file_permissions(_path: &std::path::Path) -> Result<()> {
    Ok(())
}

#[cfg(not(unix))]
fn set_dir_permissions(_path: &std::path::Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use atcore_oauth::types::OAuthTokenType;

    fn test_credentials(handle: &str) -> Credentials {
        Credentials {
            handle: handle.to_string().into(),
            did: "did:plc:alice".to_string().into(),
            pds_url: "https://pds.example".to_string().into(),
            token_type: OAuthTokenType::Bearer,
            access_token: "access-token".to_string().into(),
            refresh_token: Some("refresh-token".to_string().into()),
            expires_at: None,
            scope: Some("atproto".to_string().into()),
            dpop_key: None,
            authserver_url: None,
            authserver_token_endpoint: None,
            authserver_revocation_endpoint: None,
            storage_backend: StorageBackend::PlaintextFile,
        }
    }

    #[tokio::test]
    async fn save_load_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let config = VaultConfig::new().config_dir(dir.path().to_path_buf()).build();
        let vault = Vault::open(config).await.unwrap();

        vault.save(test_credentials("alice.example.com")).await.unwrap();

        let loaded = vault.load("alice.example.com").await.unwrap();
        assert_eq!(loaded.did.as_ref(), "did:plc:alice");

        let accounts = vault.list().await;
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].handle.as_ref(), "alice.example.com");

        vault.delete("alice.example.com").await.unwrap();
        assert!(vault.load("alice.example.com").await.is_err());
        assert!(vault.list().await.is_empty());
    }

    #[tokio::test]
    async fn default_handle_requires_existing_account() {
        let dir = tempfile::tempdir().unwrap();
        let config = VaultConfig::new().config_dir(dir.path().to_path_buf()).build();
        let vault = Vault::open(config).await.unwrap();

        assert!(vault.set_default("alice.example.com").await.is_err());

        vault.save(test_credentials("alice.example.com")).await.unwrap();
        vault.set_default("alice.example.com").await.unwrap();
        assert_eq!(vault.get_default().await.as_deref(), Some("alice.example.com"));
    }

    #[tokio::test]
    async fn deleting_default_clears_it() {
        let dir = tempfile::tempdir().unwrap();
        let config = VaultConfig::new().config_dir(dir.path().to_path_buf()).build();
        let vault = Vault::open(config).await.unwrap();

        vault.save(test_credentials("alice.example.com")).await.unwrap();
        vault.set_default("alice.example.com").await.unwrap();
        vault.delete("alice.example.com").await.unwrap();
        assert_eq!(vault.get_default().await, None);
    }

    #[tokio::test]
    async fn reopening_loads_persisted_index() {
        let dir = tempfile::tempdir().unwrap();
        let config = || VaultConfig::new().config_dir(dir.path().to_path_buf()).build();

        let vault = Vault::open(config()).await.unwrap();
        vault.save(test_credentials("alice.example.com")).await.unwrap();
        drop(vault);

        let reopened = Vault::open(config()).await.unwrap();
        let accounts = reopened.list().await;
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].handle.as_ref(), "alice.example.com");
    }
}
