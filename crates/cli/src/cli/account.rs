//! `learnhub profile | password | activities`.

use lh_client::{PasswordChange, PasswordResetConfirm, ProfileUpdate, SessionManager};

use super::auth::require_user;
use super::output::{activity_line, emit, learning_profile_lines, user_lines};
use super::prompt::SecretSource;

pub async fn profile_show(sessions: &SessionManager, json: bool) -> anyhow::Result<()> {
    require_user(sessions)?;
    let user = sessions.refresh().await?;
    let profile = sessions.learning_profile().await?;

    let mut lines = user_lines(&user);
    lines.push(String::new());
    lines.extend(learning_profile_lines(&profile));
    emit(
        json,
        &serde_json::json!({ "user": user, "learning_profile": profile }),
        lines,
    )
}

pub async fn profile_update(
    sessions: &SessionManager,
    update: ProfileUpdate,
    json: bool,
) -> anyhow::Result<()> {
    if update.is_empty() {
        anyhow::bail!("nothing to update; pass at least one field flag");
    }
    let user = sessions.update_profile(&update).await?;
    let mut lines = vec!["Profile updated".to_string()];
    lines.extend(user_lines(&user));
    emit(json, &user, lines)
}

pub async fn password_change(
    sessions: &SessionManager,
    mut secrets: SecretSource,
    json: bool,
) -> anyhow::Result<()> {
    require_user(sessions)?;
    let old = secrets.read("Current password")?;
    let new = secrets.read_new("New password")?;
    if old == new {
        anyhow::bail!("new password must differ from the current one");
    }
    sessions
        .change_password(&PasswordChange::new(old, new))
        .await?;
    emit(
        json,
        &serde_json::json!({ "changed": true }),
        vec!["Password changed".to_string()],
    )
}

pub async fn password_reset(
    sessions: &SessionManager,
    email: &str,
    json: bool,
) -> anyhow::Result<()> {
    sessions.request_password_reset(email).await?;
    emit(
        json,
        &serde_json::json!({ "requested": true }),
        vec![format!(
            "If {email} belongs to an account, a reset link is on its way"
        )],
    )
}

pub async fn password_reset_confirm(
    sessions: &SessionManager,
    token: String,
    mut secrets: SecretSource,
    json: bool,
) -> anyhow::Result<()> {
    let new_password = secrets.read_new("New password")?;
    let confirm = PasswordResetConfirm {
        token,
        new_password_confirm: new_password.clone(),
        new_password,
    };
    sessions.confirm_password_reset(&confirm).await?;
    emit(
        json,
        &serde_json::json!({ "reset": true }),
        vec!["Password reset; log in with the new password".to_string()],
    )
}

pub async fn activities(
    sessions: &SessionManager,
    limit: Option<usize>,
    json: bool,
) -> anyhow::Result<()> {
    let mut entries = sessions.activities().await?;
    if let Some(limit) = limit {
        entries.truncate(limit);
    }
    let lines = if entries.is_empty() {
        vec!["No activity yet".to_string()]
    } else {
        entries.iter().map(activity_line).collect()
    };
    emit(json, &entries, lines)
}
