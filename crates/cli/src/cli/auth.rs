//! `learnhub login | register | logout | whoami | status | refresh`.

use std::sync::Arc;

use lh_client::{create_session_manager, Registration, SessionManager, NOT_LOGGED_IN};
use lh_domain::config::Config;
use lh_domain::User;

use super::output::{emit, user_lines};
use super::prompt::{prompt, SecretSource};
use super::Role;

/// Build the session manager, rehydrating the stored session when `restore`
/// is set. Without it the session stays unresolved and the stored token is
/// left alone.
pub async fn open_session(config: &Config, restore: bool) -> anyhow::Result<Arc<SessionManager>> {
    let sessions = create_session_manager(config)?;
    if restore {
        let status = sessions.restore().await;
        tracing::debug!(%status, "session opened");
    }
    Ok(sessions)
}

/// The logged-in user, or the not-logged-in error.
pub fn require_user(sessions: &SessionManager) -> anyhow::Result<User> {
    sessions
        .current_user()
        .ok_or_else(|| anyhow::anyhow!(NOT_LOGGED_IN))
}

pub async fn login(
    sessions: &SessionManager,
    email: Option<String>,
    mut secrets: SecretSource,
    json: bool,
) -> anyhow::Result<()> {
    let email = match email {
        Some(e) => e,
        None => prompt("Email:"),
    };
    if email.is_empty() {
        anyhow::bail!("email is required");
    }
    let password = secrets.read("Password")?;

    let user = sessions.login(&email, &password).await?;
    emit(
        json,
        &user,
        vec![format!("Logged in as {} <{}>", user.display_name(), user.email)],
    )
}

#[allow(clippy::too_many_arguments)]
pub async fn register(
    sessions: &SessionManager,
    username: String,
    email: String,
    first_name: String,
    last_name: String,
    role: Role,
    mut secrets: SecretSource,
    json: bool,
) -> anyhow::Result<()> {
    let password = secrets.read_new("Password")?;
    let registration = Registration {
        username,
        email,
        first_name,
        last_name,
        password_confirm: password.clone(),
        password,
        user_type: role.into(),
    };

    let user = sessions.register(&registration).await?;
    emit(
        json,
        &user,
        vec![format!(
            "Welcome, {}! Your {} account is ready and you are logged in.",
            user.display_name(),
            user.user_type
        )],
    )
}

pub async fn logout(sessions: &SessionManager, json: bool) -> anyhow::Result<()> {
    sessions.logout().await;
    emit(
        json,
        &serde_json::json!({ "status": sessions.status().as_str() }),
        vec!["Logged out; local session cleared".to_string()],
    )
}

pub fn whoami(sessions: &SessionManager, json: bool) -> anyhow::Result<()> {
    let user = require_user(sessions)?;
    emit(json, &user, user_lines(&user))
}

/// Always succeeds: being anonymous is a valid status.
pub fn status(sessions: &SessionManager, json: bool) -> anyhow::Result<()> {
    let user = sessions.current_user();
    let line = match &user {
        Some(u) if sessions.is_admin() => format!("authenticated as {} (admin)", u.email),
        Some(u) => format!("authenticated as {} ({})", u.email, u.user_type),
        None => "not logged in".to_string(),
    };
    emit(
        json,
        &serde_json::json!({
            "status": sessions.status().as_str(),
            "user": user,
        }),
        vec![line],
    )
}

pub async fn refresh(sessions: &SessionManager, json: bool) -> anyhow::Result<()> {
    let user = sessions.refresh().await?;
    emit(json, &user, user_lines(&user))
}
