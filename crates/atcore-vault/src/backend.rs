//! Secret-storage backends.
//!
//! The vault tries the OS keychain first and falls back to a plain,
//! owner-only-permissions file when no keychain service is reachable (e.g.
//! headless Linux with no secret-service daemon running). An encrypted-file
//! middle tier is named in the design but not implemented here: nothing in
//! the surveyed crates gives a grounded, idiomatic way to derive and manage
//! the passphrase, so it's a deliberate gap rather than a silent omission.

use crate::error::{Result, VaultError};
use crate::types::StorageBackend;

const KEYCHAIN_SERVICE: &str = "atcore";
const PROBE_ACCOUNT: &str = "__atcore_probe__";

/// A place `Credentials` JSON documents can be written and read, keyed by
/// `user:<handle>` (or the distinguished key `default_handle`).
pub(crate) trait SecretBackend: Send + Sync {
    fn kind(&self) -> StorageBackend;
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn delete(&self, key: &str) -> Result<()>;
}

/// OS keychain backend via `keyring`. All calls are blocking; callers run
/// them through `spawn_blocking`.
pub(crate) struct KeychainBackend;

impl KeychainBackend {
    fn entry(key: &str) -> Result<keyring::Entry> {
        keyring::Entry::new(KEYCHAIN_SERVICE, key).map_err(VaultError::Keychain)
    }

    /// Write, read back, and delete a sentinel value to check that a usable
    /// keychain service is actually reachable. `keyring::Entry::new` alone
    /// succeeds even when the backing service is absent; only an operation
    /// reveals that.
    pub(crate) fn probe() -> bool {
        let Ok(entry) = Self::entry(PROBE_ACCOUNT) else {
            return false;
        };
        if entry.set_password("probe").is_err() {
            return false;
        }
        let readable = entry.get_password().is_ok();
        let _ = entry.delete_password();
        readable
    }
}

impl SecretBackend for KeychainBackend {
    fn kind(&self) -> StorageBackend {
        StorageBackend::Keychain
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        match Self::entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(VaultError::Keychain(e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        Self::entry(key)?
            .set_password(value)
            .map_err(VaultError::Keychain)
    }

    fn delete(&self, key: &str) -> Result<()> {
        match Self::entry(key)?.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(VaultError::Keychain(e)),
        }
    }
}

/// Last-resort plaintext file backend: one JSON object mapping secret keys
/// to their serialized value, written atomically (`.tmp` + rename) with
/// 0600 file / 0700 directory permissions on unix.
pub(crate) struct PlaintextFileBackend {
    path: std::path::PathBuf,
}

impl PlaintextFileBackend {
    pub(crate) fn new(path: std::path::PathBuf) -> Self {
        Self { path }
    }

    fn read_map(&self) -> Result<serde_json::Map<String, serde_json::Value>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(serde_json::Map::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_map(&self, map: &serde_json::Map<String, serde_json::Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
            set_dir_permissions(parent)?;
        }
        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, serde_json::to_vec_pretty(map)?)?;
        set_file_permissions(&tmp_path)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl SecretBackend for PlaintextFileBackend {
    fn kind(&self) -> StorageBackend {
        StorageBackend::PlaintextFile
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_map()?.get(key).and_then(|v| v.as_str()).map(String::from))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self.read_map()?;
        map.insert(key.to_string(), serde_json::Value::String(value.to_string()));
        self.write_map(&map)
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut map = self.read_map()?;
        map.remove(key);
        self.write_map(&map)
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

    #[test]
    fn plaintext_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let backend = PlaintextFileBackend::new(dir.path().join("secrets.json"));

        assert_eq!(backend.get("user:alice.example.com").unwrap(), None);

        backend.set("user:alice.example.com", "{\"handle\":\"alice.example.com\"}").unwrap();
        assert_eq!(
            backend.get("user:alice.example.com").unwrap().as_deref(),
            Some("{\"handle\":\"alice.example.com\"}")
        );

        backend.delete("user:alice.example.com").unwrap();
        assert_eq!(backend.get("user:alice.example.com").unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn plaintext_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let backend = PlaintextFileBackend::new(dir.path().join("secrets.json"));
        backend.set("user:alice.example.com", "value").unwrap();

        let mode = std::fs::metadata(dir.path().join("secrets.json"))
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(mode, 0o600);
    }
}
