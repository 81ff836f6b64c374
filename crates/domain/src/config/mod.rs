mod api;
mod credentials;
mod observability;

pub use api::*;
pub use credentials::*;
pub use observability::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let base_url = self.api.base_url.trim();
        if base_url.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "api.base_url".into(),
                message: "base_url must not be empty".into(),
            });
        } else if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "api.base_url".into(),
                message: "base_url must start with http:// or https://".into(),
            });
        } else if base_url.starts_with("http://") && !is_loopback_url(base_url) {
            // Tokens travel in a header on every request.
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "api.base_url".into(),
                message: "plain http to a non-local host sends the token unencrypted".into(),
            });
        }

        if self.api.timeout_ms == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "api.timeout_ms".into(),
                message: "timeout_ms must be greater than 0".into(),
            });
        }

        if self.api.max_retries > 10 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "api.max_retries".into(),
                message: format!("{} retries is unusually high", self.api.max_retries),
            });
        }

        if self.credentials.storage_key.trim().is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "credentials.storage_key".into(),
                message: "storage_key must not be empty".into(),
            });
        }

        if self.credentials.backend == CredentialBackend::Keyring
            && self.credentials.keyring_service.trim().is_empty()
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "credentials.keyring_service".into(),
                message: "keyring_service must not be empty when backend = \"keyring\"".into(),
            });
        }

        if self.credentials.backend == CredentialBackend::Memory {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "credentials.backend".into(),
                message: "memory backend forgets the session when the process exits".into(),
            });
        }

        errors
    }
}

fn is_loopback_url(url: &str) -> bool {
    let rest = url
        .trim_start_matches("http://")
        .trim_start_matches("https://");
    if rest.starts_with("[::1]") {
        return true;
    }
    let host = rest.split(['/', ':']).next().unwrap_or_default();
    matches!(host, "localhost" | "127.0.0.1")
}
