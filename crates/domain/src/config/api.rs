use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Backend API connection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Environment variable that overrides `api.base_url` when set.
pub const API_URL_ENV: &str = "LH_API_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "d_base_url")]
    pub base_url: String,
    #[serde(default = "d_8000")]
    pub timeout_ms: u64,
    /// Retries for idempotent GETs on 5xx / transport failure.
    /// Mutations are never retried.
    #[serde(default)]
    pub max_retries: u32,
    /// Sent as `X-Client-Type` on every request.
    #[serde(default = "d_client_type")]
    pub client_type: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
            timeout_ms: 8000,
            max_retries: 0,
            client_type: d_client_type(),
        }
    }
}

impl ApiConfig {
    /// Apply the `LH_API_URL` override, if present and non-empty.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.base_url = url;
            }
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_base_url() -> String {
    "http://localhost:8000".into()
}
fn d_8000() -> u64 {
    8000
}
fn d_client_type() -> String {
    "learnhub-cli".into()
}
