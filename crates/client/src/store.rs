//! Persistent storage for the session credential.
//!
//! One token, stored under one well-known key. Three backends:
//!
//! | Backend   | Where                                       |
//! |-----------|---------------------------------------------|
//! | `file`    | `~/.learnhub/credentials.json` (`0o600`)    |
//! | `keyring` | OS keychain (service / storage key)         |
//! | `memory`  | process memory only                         |

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lh_domain::config::{CredentialBackend, CredentialsConfig};
use lh_domain::error::{Error, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::types::Credential;

/// Where the session credential survives between runs.
pub trait CredentialStore: Send + Sync {
    /// Short backend name for logs and trace events.
    fn backend(&self) -> &'static str;

    /// The stored credential, if any.
    fn load(&self) -> Result<Option<Credential>>;

    fn save(&self, credential: &Credential) -> Result<()>;

    /// Remove the stored credential. Clearing an empty store succeeds.
    fn clear(&self) -> Result<()>;
}

/// Build the configured store.
pub fn create_store(cfg: &CredentialsConfig) -> Result<Arc<dyn CredentialStore>> {
    tracing::debug!(
        backend = cfg.backend.as_str(),
        key = %cfg.storage_key,
        "creating credential store"
    );
    match cfg.backend {
        CredentialBackend::File => {
            let path = match &cfg.path {
                Some(p) => p.clone(),
                None => FileCredentialStore::default_path()?,
            };
            tracing::debug!(path = %path.display(), "using file credential store");
            Ok(Arc::new(FileCredentialStore::new(path, &cfg.storage_key)))
        }
        CredentialBackend::Keyring => {
            tracing::debug!(service = %cfg.keyring_service, "using keyring credential store");
            Ok(Arc::new(KeyringCredentialStore::new(
                &cfg.keyring_service,
                &cfg.storage_key,
            )))
        }
        CredentialBackend::Memory => Ok(Arc::new(MemoryCredentialStore::new())),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// File backend
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// On-disk format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct CredentialFile {
    #[serde(default)]
    entries: HashMap<String, Credential>,
}

/// JSON file store, shared-locked for reads and exclusively locked for
/// writes. On Unix the file is created with mode `0o600`.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
    key: String,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
        }
    }

    /// `~/.learnhub/credentials.json`
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| {
            Error::Credential("unable to determine home directory for credential storage".into())
        })?;
        Ok(home.join(".learnhub").join("credentials.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(&self) -> Result<CredentialFile> {
        if !self.path.exists() {
            return Ok(CredentialFile::default());
        }
        let file = std::fs::File::open(&self.path)?;
        fs2::FileExt::lock_shared(&file)
            .map_err(|e| Error::Credential(format!("credential file lock failed: {e}")))?;
        let raw = std::io::read_to_string(&file)?;
        fs2::FileExt::unlock(&file)
            .map_err(|e| Error::Credential(format!("credential file unlock failed: {e}")))?;
        if raw.trim().is_empty() {
            return Ok(CredentialFile::default());
        }
        serde_json::from_str(&raw)
            .map_err(|e| Error::Credential(format!("corrupt credential file: {e}")))
    }

    /// Write the whole file, creating the parent directory if needed.
    ///
    /// On Unix the file is opened with mode `0o600` from the start so the
    /// token is never world-readable, even briefly.
    fn write_file(&self, contents: &CredentialFile) -> Result<()> {
        use std::io::Write;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(contents)?;

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let file = options.open(&self.path)?;
        fs2::FileExt::lock_exclusive(&file)
            .map_err(|e| Error::Credential(format!("credential file lock failed: {e}")))?;
        let mut writer = std::io::BufWriter::new(&file);
        writer.write_all(json.as_bytes())?;
        writer.flush()?;
        // Lock is released when `file` is dropped.
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn backend(&self) -> &'static str {
        "file"
    }

    fn load(&self) -> Result<Option<Credential>> {
        let contents = self.read_file()?;
        Ok(contents
            .entries
            .get(&self.key)
            .filter(|c| !c.is_empty())
            .cloned())
    }

    fn save(&self, credential: &Credential) -> Result<()> {
        let mut contents = self.read_file()?;
        contents.entries.insert(self.key.clone(), credential.clone());
        self.write_file(&contents)
    }

    fn clear(&self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        let mut contents = self.read_file()?;
        if contents.entries.remove(&self.key).is_none() {
            return Ok(());
        }
        self.write_file(&contents)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Keyring backend
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// OS keychain store (macOS Keychain, Windows Credential Manager, Linux
/// Secret Service). Unavailable on headless systems without a keychain
/// daemon; every call then fails with `Error::Credential`.
#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    service: String,
    account: String,
}

impl KeyringCredentialStore {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service, &self.account)
            .map_err(|e| Error::Credential(format!("keyring entry creation failed: {e}")))
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn backend(&self) -> &'static str {
        "keyring"
    }

    fn load(&self) -> Result<Option<Credential>> {
        match self.entry()?.get_password() {
            Ok(token) if token.trim().is_empty() => Ok(None),
            Ok(token) => Ok(Some(Credential::new(token))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(Error::Credential(format!("keyring get_password failed: {e}"))),
        }
    }

    fn save(&self, credential: &Credential) -> Result<()> {
        self.entry()?
            .set_password(credential.expose())
            .map_err(|e| Error::Credential(format!("keyring set_password failed: {e}")))
    }

    fn clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(Error::Credential(format!("keyring delete failed: {e}"))),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Memory backend
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    slot: Mutex<Option<Credential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that starts out holding `credential`.
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            slot: Mutex::new(Some(credential)),
        }
    }

    /// Current contents, without going through the trait.
    pub fn peek(&self) -> Option<Credential> {
        self.slot.lock().clone()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn load(&self) -> Result<Option<Credential>> {
        Ok(self.slot.lock().clone())
    }

    fn save(&self, credential: &Credential) -> Result<()> {
        *self.slot.lock() = Some(credential.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.slot.lock() = None;
        Ok(())
    }
}
