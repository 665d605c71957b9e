use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use keyring::Entry;
use tracing::{debug, info, warn};

use super::claims::token_expired;
use super::session::Session;
use crate::models::UserRecord;

/// Keyring service name
const SERVICE_NAME: &str = "modelgate";

/// Credentials file name in the storage directory
const CREDENTIALS_FILE: &str = "credentials.json";

/// Storage key for the bearer token
pub const TOKEN_KEY: &str = "token";

/// Storage key for the JSON-serialized user record
pub const USER_KEY: &str = "user";

/// Durable string key-value storage for the persisted session.
pub trait CredentialBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// JSON object on disk, one entry per key.
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path(&self) -> PathBuf {
        self.dir.join(CREDENTIALS_FILE)
    }

    fn read_all(&self) -> Result<HashMap<String, String>> {
        let path = self.path();
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let contents = std::fs::read_to_string(&path)
            .context("Failed to read credentials file")?;
        serde_json::from_str(&contents).context("Failed to parse credentials file")
    }

    fn write_all(&self, entries: &HashMap<String, String>) -> Result<()> {
        let path = self.path();
        if entries.is_empty() {
            if path.exists() {
                std::fs::remove_file(&path).context("Failed to remove credentials file")?;
            }
            return Ok(());
        }
        std::fs::create_dir_all(&self.dir).context("Failed to create storage directory")?;
        let contents = serde_json::to_string_pretty(entries)?;
        std::fs::write(&path, contents).context("Failed to write credentials file")?;
        Ok(())
    }
}

impl CredentialBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        // A corrupt file is replaced rather than blocking the write
        let mut entries = self.read_all().unwrap_or_default();
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.read_all().unwrap_or_default();
        entries.remove(key);
        self.write_all(&entries)
    }
}

/// OS keychain, one keyring entry per key.
pub struct KeyringBackend;

impl KeyringBackend {
    fn entry(key: &str) -> Result<Entry> {
        Entry::new(SERVICE_NAME, key).context("Failed to create keyring entry")
    }
}

impl CredentialBackend for KeyringBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match Self::entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve value from keychain"),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        Self::entry(key)?
            .set_password(value)
            .context("Failed to store value in keychain")
    }

    fn remove(&self, key: &str) -> Result<()> {
        match Self::entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete value from keychain"),
        }
    }
}

/// Process-local storage, used by tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CredentialBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries().remove(key);
        Ok(())
    }
}

/// Persists the `(token, user)` pair under the fixed `token` and `user` keys.
pub struct CredentialStore {
    backend: Box<dyn CredentialBackend>,
}

impl CredentialStore {
    pub fn new(backend: Box<dyn CredentialBackend>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryBackend::new()))
    }

    /// Read the persisted session.
    ///
    /// Best-effort: absent, partial, unparsable or expired data all yield
    /// `None` so startup always proceeds, unauthenticated if need be.
    pub fn load(&self) -> Option<Session> {
        let token = match self.backend.get(TOKEN_KEY) {
            Ok(Some(token)) if !token.is_empty() => token,
            Ok(_) => {
                debug!("No persisted token");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read persisted token");
                return None;
            }
        };

        let raw_user = match self.backend.get(USER_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                warn!("Persisted token has no user record, ignoring");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read persisted user");
                return None;
            }
        };

        let user: UserRecord = match serde_json::from_str(&raw_user) {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "Persisted user record is corrupt, ignoring");
                return None;
            }
        };

        if token_expired(&token) {
            info!(username = %user.username, "Persisted token has expired");
            return None;
        }

        Session::new(token, user).ok()
    }

    /// Persist the pair. The token is written last so a half-finished
    /// save never pairs a token with another user's record; on failure
    /// both keys are removed.
    pub fn save(&self, session: &Session) -> Result<()> {
        let user = serde_json::to_string(&session.user).context("Failed to serialize user")?;

        let written = self
            .backend
            .remove(TOKEN_KEY)
            .and_then(|()| self.backend.set(USER_KEY, &user))
            .and_then(|()| self.backend.set(TOKEN_KEY, &session.token));

        if let Err(e) = written {
            if let Err(cleanup) = self.clear() {
                warn!(error = %cleanup, "Failed to remove partially saved session");
            }
            return Err(e);
        }
        Ok(())
    }

    /// Remove both keys, user first. Both removals are attempted; the
    /// first error is returned.
    pub fn clear(&self) -> Result<()> {
        let user = self.backend.remove(USER_KEY);
        let token = self.backend.remove(TOKEN_KEY);
        user.and(token)
    }
}
