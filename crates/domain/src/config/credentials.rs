use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Credential persistence
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub backend: CredentialBackend,
    /// Key the token is stored under (file entry name / keychain account).
    #[serde(default = "d_storage_key")]
    pub storage_key: String,
    /// Override for the file backend. Defaults to
    /// `~/.learnhub/credentials.json`.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "d_keyring_service")]
    pub keyring_service: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    #[default]
    File,
    Keyring,
    Memory,
}

impl CredentialBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            CredentialBackend::File => "file",
            CredentialBackend::Keyring => "keyring",
            CredentialBackend::Memory => "memory",
        }
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            backend: CredentialBackend::File,
            storage_key: d_storage_key(),
            path: None,
            keyring_service: d_keyring_service(),
        }
    }
}

fn d_storage_key() -> String {
    "token".into()
}
fn d_keyring_service() -> String {
    "learnhub".into()
}
