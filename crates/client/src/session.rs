//! The session manager: single owner of "am I logged in, and as whom".
//!
//! `SessionManager` holds the [`Session`] (credential, current user,
//! status), the [`CredentialStore`] the credential is persisted in, and the
//! [`AuthApi`] it talks to. The authorization header is derived from the
//! in-memory credential on every request, so the header, the credential and
//! the user can only change together.
//!
//! Every operation reports failure through [`AuthFailure`], carrying the
//! message callers display verbatim. `logout` cannot fail: whatever the
//! backend says, the local session ends.

use std::fmt;
use std::sync::Arc;

use lh_domain::error::Error;
use lh_domain::trace::TraceEvent;
use lh_domain::user::{Activity, LearningProfile, User};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::provider::AuthApi;
use crate::store::CredentialStore;
use crate::types::{
    Credential, LoginRequest, PasswordChange, PasswordResetConfirm, PasswordResetRequest,
    ProfileFields, ProfileUpdate, Registration,
};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionStatus {
    /// Startup: the persisted credential has not been checked yet.
    #[default]
    Unresolved,
    Anonymous,
    Authenticated,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Unresolved => "unresolved",
            SessionStatus::Anonymous => "anonymous",
            SessionStatus::Authenticated => "authenticated",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client-side record of authentication status and identity.
///
/// Fields are private: the only transitions are [`Session::authenticate`]
/// and [`Session::end`], which keep `current_user.is_some()` equivalent to
/// `status == Authenticated`.
#[derive(Debug, Clone, Default)]
pub struct Session {
    credential: Option<Credential>,
    current_user: Option<User>,
    status: SessionStatus,
}

impl Session {
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn current_user(&self) -> Option<&User> {
        self.current_user.as_ref()
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    fn authenticate(&mut self, credential: Credential, user: User) {
        self.credential = Some(credential);
        self.current_user = Some(user);
        self.status = SessionStatus::Authenticated;
    }

    /// Drop credential and user together.
    fn end(&mut self) {
        self.credential = None;
        self.current_user = None;
        self.status = SessionStatus::Anonymous;
    }

    /// Swap in a fresh user record, but only for the session that asked
    /// for it. A logout or re-login during the request wins.
    fn replace_user(&mut self, requested_with: &Credential, user: User) -> bool {
        if self.status == SessionStatus::Authenticated
            && self.credential.as_ref() == Some(requested_with)
        {
            self.current_user = Some(user);
            true
        } else {
            false
        }
    }

    /// Merge an update response into the user, under the same guard as
    /// [`replace_user`](Self::replace_user).
    fn merge_profile(&mut self, requested_with: &Credential, fields: &ProfileFields) -> bool {
        if self.status != SessionStatus::Authenticated || !self.holds(requested_with) {
            return false;
        }
        match self.current_user.as_mut() {
            Some(user) => {
                fields.apply_to(user);
                true
            }
            None => false,
        }
    }

    fn holds(&self, credential: &Credential) -> bool {
        self.credential.as_ref() == Some(credential)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Failures
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Coarse error class, for callers that branch on the kind of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Network or timeout; the request may not have reached the server.
    Transport,
    /// 401/403, or no credential held.
    Authentication,
    /// 4xx other than 401/403.
    Validation,
    /// 5xx.
    Server,
    /// The credential could not be persisted or read.
    Storage,
    /// Anything else (unparseable response, bad config).
    Internal,
}

impl From<&Error> for FailureKind {
    fn from(e: &Error) -> Self {
        if e.is_transport() {
            return FailureKind::Transport;
        }
        if e.is_auth() {
            return FailureKind::Authentication;
        }
        match e {
            Error::Validation { .. } => FailureKind::Validation,
            Error::Server { .. } => FailureKind::Server,
            Error::Credential(_) | Error::Io(_) => FailureKind::Storage,
            _ => FailureKind::Internal,
        }
    }
}

/// A failed session operation. `message` is suitable for display as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct AuthFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl AuthFailure {
    /// Build the user-facing failure for `err`.
    ///
    /// The server's message wins. Transport and server errors without one
    /// fall back to `fallback`. Local errors append their detail to
    /// `fallback`, since nothing else explains them.
    fn from_error(err: &Error, fallback: &str) -> Self {
        let kind = FailureKind::from(err);
        let message = match err.server_message() {
            Some(msg) => msg.to_owned(),
            None => match kind {
                FailureKind::Transport
                | FailureKind::Server
                | FailureKind::Validation
                | FailureKind::Authentication => fallback.to_owned(),
                FailureKind::Storage | FailureKind::Internal => format!("{fallback}: {err}"),
            },
        };
        Self { kind, message }
    }
}

/// Result of a session operation.
pub type Outcome<T = ()> = std::result::Result<T, AuthFailure>;

pub const NOT_LOGGED_IN: &str = "You are not logged in";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Manager
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Owns the session, its persisted credential, and the backend handle.
///
/// Cheap to share behind an `Arc`. The state lock is never held across
/// `.await`: each operation snapshots the credential, awaits the backend,
/// then applies its transition in one write. Store writes happen inside
/// that same write, so the persisted credential always matches the
/// in-memory one. Overlapping logins race and the last response to land
/// wins.
pub struct SessionManager {
    api: Arc<dyn AuthApi>,
    store: Arc<dyn CredentialStore>,
    state: RwLock<Session>,
    /// Serialises `restore` so the backend is asked at most once.
    resolving: tokio::sync::Mutex<()>,
    last_error: Mutex<Option<String>>,
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("store", &self.store.backend())
            .field("state", &*self.state.read())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// A manager in `Unresolved` state. Call [`restore`](Self::restore)
    /// before relying on [`status`](Self::status).
    pub fn new(api: Arc<dyn AuthApi>, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            api,
            store,
            state: RwLock::new(Session::default()),
            resolving: tokio::sync::Mutex::new(()),
            last_error: Mutex::new(None),
        }
    }

    // ── projections ──────────────────────────────────────────────────

    /// A copy of the whole session, consistent at one instant.
    pub fn snapshot(&self) -> Session {
        self.state.read().clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.state.read().status
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.read().current_user.clone()
    }

    pub fn credential(&self) -> Option<Credential> {
        self.state.read().credential.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.status() == SessionStatus::Authenticated
    }

    pub fn is_instructor(&self) -> bool {
        self.state
            .read()
            .current_user
            .as_ref()
            .is_some_and(User::is_instructor)
    }

    pub fn is_admin(&self) -> bool {
        self.state
            .read()
            .current_user
            .as_ref()
            .is_some_and(User::is_admin)
    }

    /// `Authorization` header value for the current credential, if any.
    /// Other API clients should read this per request.
    pub fn auth_header(&self) -> Option<String> {
        self.state
            .read()
            .credential
            .as_ref()
            .map(Credential::header_value)
    }

    /// Message of the most recent failed operation.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    pub fn clear_error(&self) {
        *self.last_error.lock() = None;
    }

    // ── lifecycle ────────────────────────────────────────────────────

    /// Rehydrate the session from the persisted credential.
    ///
    /// Resolves the session exactly once: concurrent and later calls return
    /// the current status without touching the store or the backend. Never
    /// leaves the session `Unresolved`. A stored credential the backend does
    /// not accept, for whatever reason, is removed from the store.
    ///
    /// A login, registration or logout that completes while the check is in
    /// flight wins: the restore result is then discarded.
    pub async fn restore(&self) -> SessionStatus {
        let _resolving = self.resolving.lock().await;
        let current = self.status();
        if current != SessionStatus::Unresolved {
            debug!(status = %current, "session already resolved; restore is a no-op");
            return current;
        }
        self.clear_error();

        let Some(credential) = self.load_persisted() else {
            self.transition("no stored credential", |s| {
                if s.status == SessionStatus::Unresolved {
                    s.end();
                }
            });
            self.restored("anonymous", None);
            return self.status();
        };

        match self.api.current_user(&credential).await {
            Ok(user) => {
                let user_id = user.id;
                let applied = self.transition("restored", |s| {
                    if s.status != SessionStatus::Unresolved {
                        return false;
                    }
                    s.authenticate(credential, user);
                    true
                });
                if applied {
                    info!(user_id, "session restored");
                    self.restored("authenticated", Some(user_id));
                } else {
                    debug!("session resolved elsewhere during restore; keeping it");
                }
            }
            Err(e) => {
                let applied = self.transition("restore failed", |s| {
                    if s.status != SessionStatus::Unresolved {
                        return false;
                    }
                    // Only clear what this restore read.
                    if matches!(self.store.load(), Ok(Some(ref c)) if *c == credential) {
                        self.forget_persisted("restore failed");
                    }
                    s.end();
                    true
                });
                if applied {
                    warn!(error = %e, "stored credential rejected; cleared it");
                    self.restored("rejected", None);
                } else {
                    debug!(error = %e, "restore failed after session resolved elsewhere; ignoring");
                }
            }
        }
        self.status()
    }

    /// Log in with email + password.
    ///
    /// On failure the prior session, whatever it was, is left untouched.
    pub async fn login(&self, email: &str, password: &str) -> Outcome<User> {
        const FALLBACK: &str = "Login failed";
        self.clear_error();

        let req = LoginRequest {
            email: email.trim().to_owned(),
            password: password.to_owned(),
        };
        let resp = match self.api.login(&req).await {
            Ok(resp) => resp,
            Err(e) => return Err(self.fail("login", &e, FALLBACK)),
        };
        if resp.token.is_empty() {
            let e = Error::Other("server returned an empty token".into());
            return Err(self.fail("login", &e, FALLBACK));
        }
        self.establish(resp.token, resp.user, "login")
            .map_err(|e| self.fail("login", &e, FALLBACK))
    }

    /// Create an account and log straight into it. Same contract as
    /// [`login`](Self::login).
    pub async fn register(&self, registration: &Registration) -> Outcome<User> {
        const FALLBACK: &str = "Registration failed";
        self.clear_error();

        let resp = match self.api.register(registration).await {
            Ok(resp) => resp,
            Err(e) => return Err(self.fail("register", &e, FALLBACK)),
        };
        if resp.token.is_empty() {
            let e = Error::Other("server returned an empty token".into());
            return Err(self.fail("register", &e, FALLBACK));
        }
        self.establish(resp.token, resp.user, "register")
            .map_err(|e| self.fail("register", &e, FALLBACK))
    }

    /// End the session. Always leaves it `Anonymous` with nothing
    /// persisted; a failing remote logout is only logged.
    ///
    /// Before [`restore`](Self::restore) has run, the persisted credential
    /// is revoked as-is, without validating it first.
    pub async fn logout(&self) {
        self.clear_error();

        let session = self.snapshot();
        let held = if session.status == SessionStatus::Unresolved {
            self.load_persisted()
        } else {
            session.credential
        };
        match held {
            Some(credential) => {
                if let Err(e) = self.api.logout(&credential).await {
                    warn!(error = %e, "remote logout failed; clearing local session anyway");
                }
            }
            None => debug!("logout without a credential; skipping remote call"),
        }

        self.transition("logout", |s| {
            self.forget_persisted("logout");
            s.end();
        });
    }

    /// Re-fetch the current user. An authentication failure ends the
    /// session the same way a rejected restore does; other failures leave
    /// it as it was.
    pub async fn refresh(&self) -> Outcome<User> {
        const FALLBACK: &str = "Could not load your account";
        self.clear_error();

        let credential = self.require_credential("refresh")?;
        match self.api.current_user(&credential).await {
            Ok(user) => {
                self.state.write().replace_user(&credential, user.clone());
                Ok(user)
            }
            Err(e) => {
                if e.is_auth() {
                    let ended = self.transition("refresh rejected", |s| {
                        if !s.holds(&credential) {
                            return false;
                        }
                        self.forget_persisted("refresh rejected");
                        s.end();
                        true
                    });
                    if ended {
                        warn!(error = %e, "credential no longer accepted; session ended");
                    }
                }
                Err(self.fail("refresh", &e, FALLBACK))
            }
        }
    }

    // ── account mutations ────────────────────────────────────────────

    /// Apply a partial profile update. The fields the server echoes back
    /// are merged into the current user, which is returned.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Outcome<User> {
        const FALLBACK: &str = "Profile update failed";
        self.clear_error();

        let (credential, mut user) = self.require_session("update_profile")?;
        match self.api.update_profile(&credential, update).await {
            Ok(fields) => {
                fields.apply_to(&mut user);
                if !self.state.write().merge_profile(&credential, &fields) {
                    debug!("session changed during profile update; keeping newer session");
                }
                Ok(user)
            }
            Err(e) => Err(self.fail("update_profile", &e, FALLBACK)),
        }
    }

    /// Change the password. The current user is not touched.
    pub async fn change_password(&self, change: &PasswordChange) -> Outcome {
        const FALLBACK: &str = "Password change failed";
        self.clear_error();

        let credential = self.require_credential("change_password")?;
        self.api
            .change_password(&credential, change)
            .await
            .map_err(|e| self.fail("change_password", &e, FALLBACK))
    }

    pub async fn learning_profile(&self) -> Outcome<LearningProfile> {
        self.clear_error();
        let credential = self.require_credential("learning_profile")?;
        self.api
            .learning_profile(&credential)
            .await
            .map_err(|e| self.fail("learning_profile", &e, "Could not load your learning profile"))
    }

    pub async fn activities(&self) -> Outcome<Vec<Activity>> {
        self.clear_error();
        let credential = self.require_credential("activities")?;
        self.api
            .activities(&credential)
            .await
            .map_err(|e| self.fail("activities", &e, "Could not load your activity"))
    }

    /// Ask the backend to send a reset email. Works without a session.
    pub async fn request_password_reset(&self, email: &str) -> Outcome {
        self.clear_error();
        let req = PasswordResetRequest {
            email: email.trim().to_owned(),
        };
        self.api
            .request_password_reset(&req)
            .await
            .map_err(|e| self.fail("request_password_reset", &e, "Password reset failed"))
    }

    /// Complete a reset with the emailed token. Works without a session.
    pub async fn confirm_password_reset(&self, confirm: &PasswordResetConfirm) -> Outcome {
        self.clear_error();
        self.api
            .confirm_password_reset(confirm)
            .await
            .map_err(|e| self.fail("confirm_password_reset", &e, "Password reset failed"))
    }

    // ── internals ────────────────────────────────────────────────────

    /// Persist and switch the in-memory session under one write lock, so
    /// a store failure leaves both the old session and the old stored
    /// credential, and overlapping calls cannot interleave the two steps.
    fn establish(
        &self,
        credential: Credential,
        user: User,
        reason: &str,
    ) -> lh_domain::error::Result<User> {
        let user_id = user.id;
        let returned = user.clone();
        self.transition(reason, |s| {
            self.store.save(&credential)?;
            s.authenticate(credential, user);
            Ok::<_, Error>(())
        })?;

        TraceEvent::CredentialPersisted {
            backend: self.store.backend().into(),
        }
        .emit();
        info!(user_id, reason, "session established");
        Ok(returned)
    }

    /// Apply a state change in one write and trace the status edge. Store
    /// calls made inside `apply` run under the same lock; they are sync.
    fn transition<T>(&self, reason: &str, apply: impl FnOnce(&mut Session) -> T) -> T {
        let (from, to, out) = {
            let mut state = self.state.write();
            let from = state.status;
            let out = apply(&mut state);
            (from, state.status, out)
        };
        if from != to {
            debug!(%from, %to, reason, "session transition");
            TraceEvent::SessionChanged {
                from: from.to_string(),
                to: to.to_string(),
                reason: reason.into(),
            }
            .emit();
        }
        out
    }

    fn restored(&self, outcome: &str, user_id: Option<i64>) {
        TraceEvent::SessionRestored {
            outcome: outcome.into(),
            user_id,
        }
        .emit();
    }

    /// Best-effort removal of the persisted credential.
    /// The stored credential; a read failure counts as none.
    fn load_persisted(&self) -> Option<Credential> {
        self.store.load().unwrap_or_else(|e| {
            warn!(backend = self.store.backend(), error = %e, "could not read stored credential");
            None
        })
    }

    fn forget_persisted(&self, reason: &str) {
        match self.store.clear() {
            Ok(()) => TraceEvent::CredentialCleared {
                backend: self.store.backend().into(),
                reason: reason.into(),
            }
            .emit(),
            Err(e) => warn!(
                backend = self.store.backend(),
                error = %e,
                "failed to clear stored credential"
            ),
        }
    }

    /// The credential and user of an authenticated session, read together.
    fn require_session(&self, op: &str) -> Outcome<(Credential, User)> {
        let held = {
            let state = self.state.read();
            match (state.status, &state.credential, &state.current_user) {
                (SessionStatus::Authenticated, Some(c), Some(u)) => Some((c.clone(), u.clone())),
                _ => None,
            }
        };
        held.ok_or_else(|| {
            let e = Error::Auth(NOT_LOGGED_IN.into());
            self.fail(op, &e, NOT_LOGGED_IN)
        })
    }

    fn require_credential(&self, op: &str) -> Outcome<Credential> {
        let held = {
            let state = self.state.read();
            match (state.status, &state.credential) {
                (SessionStatus::Authenticated, Some(credential)) => Some(credential.clone()),
                _ => None,
            }
        };
        held.ok_or_else(|| {
            let e = Error::Auth(NOT_LOGGED_IN.into());
            self.fail(op, &e, NOT_LOGGED_IN)
        })
    }

    fn fail(&self, op: &str, err: &Error, fallback: &str) -> AuthFailure {
        let failure = AuthFailure::from_error(err, fallback);
        warn!(op, kind = ?failure.kind, error = %err, "session operation failed");
        *self.last_error.lock() = Some(failure.message.clone());
        failure
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
