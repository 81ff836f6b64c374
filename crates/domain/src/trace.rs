use serde::Serialize;

/// Structured trace events emitted across all LearnHub crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    ApiCall {
        endpoint: String,
        status: u16,
        duration_ms: u64,
        attempt: u32,
    },
    SessionRestored {
        outcome: String,
        user_id: Option<i64>,
    },
    SessionChanged {
        from: String,
        to: String,
        reason: String,
    },
    CredentialPersisted {
        backend: String,
    },
    CredentialCleared {
        backend: String,
        reason: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "lh_event");
    }
}
