//! `lh-client`: session management for the LearnHub account API.
//!
//! Provides the [`AuthApi`] trait that abstracts over the backend's
//! `/api/auth/` endpoints, a production REST implementation
//! ([`RestAuthClient`]), pluggable [`CredentialStore`] backends for the
//! persisted token, and the [`SessionManager`] that ties them together as
//! the single source of truth for who is logged in.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use lh_domain::config::Config;
//! use lh_client::{create_session_manager, SessionStatus};
//!
//! # async fn example() -> lh_domain::error::Result<()> {
//! let sessions = create_session_manager(&Config::default())?;
//!
//! if sessions.restore().await == SessionStatus::Anonymous {
//!     match sessions.login("user@example.com", "correct").await {
//!         Ok(user) => println!("welcome, {}", user.display_name()),
//!         Err(failure) => eprintln!("{}", failure.message),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod provider;
pub mod rest;
pub mod session;
pub mod store;
pub mod types;

// ── Re-exports for ergonomic imports ─────────────────────────────────

pub use provider::AuthApi;
pub use rest::{from_reqwest, RestAuthClient};
pub use session::{
    AuthFailure, FailureKind, Outcome, Session, SessionManager, SessionStatus, NOT_LOGGED_IN,
};
pub use store::{
    create_store, CredentialStore, FileCredentialStore, KeyringCredentialStore,
    MemoryCredentialStore,
};
pub use types::{
    extract_error_message, AuthResponse, Credential, LoginRequest, PasswordChange,
    PasswordResetConfirm, PasswordResetRequest, ProfileFields, ProfileUpdate, Registration,
};

use std::sync::Arc;

use lh_domain::config::Config;
use lh_domain::error::Result;

/// Build a [`SessionManager`] wired to the REST backend and the configured
/// credential store. The session starts `Unresolved`.
pub fn create_session_manager(cfg: &Config) -> Result<Arc<SessionManager>> {
    let api = RestAuthClient::new(&cfg.api)?;
    let store = create_store(&cfg.credentials)?;
    tracing::debug!(
        base_url = %api.base_url(),
        store = store.backend(),
        "session manager ready"
    );
    Ok(Arc::new(SessionManager::new(Arc::new(api), store)))
}
