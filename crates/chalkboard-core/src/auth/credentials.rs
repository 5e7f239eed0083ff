use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use keyring::Entry;

/// Fixed key the session record is stored under
pub const STORAGE_KEY: &str = "user";

/// Session file name in the cache directory
const SESSION_FILE: &str = "session.json";

/// Keychain service name
const SERVICE_NAME: &str = "chalkboard";

/// Durable slot holding the serialized session record.
///
/// Only `SessionManager` writes through this trait.
pub trait CredentialStore: Send + Sync {
    /// Read the raw record, `None` if the slot is empty
    fn load(&self) -> Result<Option<String>>;

    /// Overwrite the slot
    fn save(&self, record: &str) -> Result<()>;

    /// Empty the slot. Clearing an empty slot succeeds.
    fn clear(&self) -> Result<()>;
}

/// Session record stored as a JSON file.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            path: cache_dir.join(SESSION_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents =
            std::fs::read_to_string(&self.path).context("Failed to read session file")?;
        Ok(Some(contents))
    }

    fn save(&self, record: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create session directory")?;
        }
        std::fs::write(&self.path, record).context("Failed to write session file")?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).context("Failed to remove session file")?;
        }
        Ok(())
    }
}

/// Session record stored in the OS keychain.
pub struct KeyringCredentialStore {
    service: String,
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new(SERVICE_NAME)
    }
}

impl KeyringCredentialStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(&self.service, STORAGE_KEY).context("Failed to create keyring entry")
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn load(&self) -> Result<Option<String>> {
        match self.entry()?.get_password() {
            Ok(record) => Ok(Some(record)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to read session from keychain"),
        }
    }

    fn save(&self, record: &str) -> Result<()> {
        self.entry()?
            .set_password(record)
            .context("Failed to store session in keychain")
    }

    fn clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete session from keychain"),
        }
    }
}

/// In-process slot. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryCredentialStore {
    slot: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn with_record(record: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(record.into())),
        }
    }

    /// Current contents of the slot
    pub fn snapshot(&self) -> Option<String> {
        self.slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.snapshot())
    }

    fn save(&self, record: &str) -> Result<()> {
        *self
            .slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(record.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self
            .slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(&dir.path().join("nested"));

        assert!(store.load().unwrap().is_none());

        store.save(r#"{"username":"aluno"}"#).unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some(r#"{"username":"aluno"}"#));

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        assert!(!store.path().exists());

        // Clearing twice is fine
        store.clear().unwrap();
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryCredentialStore::with_record("x");
        assert_eq!(store.load().unwrap().as_deref(), Some("x"));
        store.save("y").unwrap();
        assert_eq!(store.snapshot().as_deref(), Some("y"));
        store.clear().unwrap();
        assert!(store.snapshot().is_none());
    }

    #[test]
    fn test_keyring_store_round_trip() {
        let store = KeyringCredentialStore::new("chalkboard-test-round-trip");

        // Hosts without a keychain service refuse the write
        if let Err(e) = store.save(r#"{"username":"aluno"}"#) {
            eprintln!("keychain unavailable, skipping: {:#}", e);
            return;
        }

        // A fresh entry must see what the previous one stored
        let reopened = KeyringCredentialStore::new("chalkboard-test-round-trip");
        let loaded = reopened.load();
        let _ = store.clear();
        let loaded = match loaded {
            Ok(loaded) => loaded,
            Err(e) => {
                eprintln!("keychain read refused, skipping: {:#}", e);
                return;
            }
        };
        assert_eq!(loaded.as_deref(), Some(r#"{"username":"aluno"}"#));
    }
}
