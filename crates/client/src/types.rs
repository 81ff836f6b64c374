//! Request/response bodies for the backend's `/api/auth/` endpoints.
//!
//! Secrets (tokens, passwords) never appear in `Debug` output.

use std::fmt;

use lh_domain::user::{Activity, User, UserType};
use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Credential
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Opaque bearer token issued by the backend on login or registration.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token. Only the transport and the credential stores need this.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Value for the `Authorization` header: `Token <credential>`.
    pub fn header_value(&self) -> String {
        format!("Token {}", self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Login / registration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// POST /api/auth/login/: request body.
#[derive(Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// POST /api/auth/register/: request body.
#[derive(Clone, Serialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub password_confirm: String,
    pub user_type: UserType,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("password", &"[REDACTED]")
            .field("password_confirm", &"[REDACTED]")
            .field("user_type", &self.user_type)
            .finish()
    }
}

/// Response body shared by login and registration.
#[derive(Clone, Deserialize)]
pub struct AuthResponse {
    pub token: Credential,
    pub user: User,
    #[serde(default)]
    pub message: Option<String>,
}

impl fmt::Debug for AuthResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthResponse")
            .field("token", &self.token)
            .field("user", &self.user.email)
            .field("message", &self.message)
            .finish()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Profile
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// PUT /api/auth/profile/update/: partial update. `None` fields are
/// omitted from the body and left untouched by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<chrono::NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// PUT /api/auth/profile/update/: response body.
///
/// The server echoes only the editable fields, never `id` or `email`, so
/// this is folded into the held [`User`] rather than replacing it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProfileFields {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    /// Outer `None`: not echoed. `Some(None)`: echoed as `null`.
    #[serde(default, deserialize_with = "echoed")]
    pub avatar: Option<Option<String>>,
    #[serde(default, deserialize_with = "echoed")]
    pub date_of_birth: Option<Option<chrono::NaiveDate>>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub linkedin: Option<String>,
    #[serde(default)]
    pub github: Option<String>,
    #[serde(default)]
    pub twitter: Option<String>,
}

fn echoed<'de, D, T>(d: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(d).map(Some)
}

impl ProfileFields {
    /// Overwrite the fields of `user` that the server echoed.
    pub fn apply_to(&self, user: &mut User) {
        fn set(target: &mut String, value: &Option<String>) {
            if let Some(v) = value {
                target.clone_from(v);
            }
        }
        set(&mut user.first_name, &self.first_name);
        set(&mut user.last_name, &self.last_name);
        set(&mut user.bio, &self.bio);
        set(&mut user.phone_number, &self.phone_number);
        set(&mut user.website, &self.website);
        set(&mut user.linkedin, &self.linkedin);
        set(&mut user.github, &self.github);
        set(&mut user.twitter, &self.twitter);
        if let Some(avatar) = &self.avatar {
            user.avatar.clone_from(avatar);
        }
        if let Some(dob) = self.date_of_birth {
            user.date_of_birth = dob;
        }
        // The server derives this from first + last.
        if self.first_name.is_some() || self.last_name.is_some() {
            user.full_name = None;
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Passwords
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// POST /api/auth/password/change/: request body.
#[derive(Clone, Serialize)]
pub struct PasswordChange {
    pub old_password: String,
    pub new_password: String,
    pub new_password_confirm: String,
}

impl PasswordChange {
    /// Build a change request where the confirmation repeats `new_password`.
    pub fn new(old_password: impl Into<String>, new_password: impl Into<String>) -> Self {
        let new_password = new_password.into();
        Self {
            old_password: old_password.into(),
            new_password_confirm: new_password.clone(),
            new_password,
        }
    }
}

impl fmt::Debug for PasswordChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordChange([REDACTED])")
    }
}

/// POST /api/auth/password/reset/: request body.
#[derive(Debug, Clone, Serialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

/// POST /api/auth/password/reset/confirm/: request body.
#[derive(Clone, Serialize)]
pub struct PasswordResetConfirm {
    pub token: String,
    pub new_password: String,
    pub new_password_confirm: String,
}

impl fmt::Debug for PasswordResetConfirm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordResetConfirm([REDACTED])")
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Activities
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// GET /api/auth/activities/: either a bare list or a DRF page,
/// depending on whether pagination is enabled server-side.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ActivityList {
    Plain(Vec<Activity>),
    Paginated { results: Vec<Activity> },
}

impl ActivityList {
    pub fn into_vec(self) -> Vec<Activity> {
        match self {
            ActivityList::Plain(items) | ActivityList::Paginated { results: items } => items,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Error bodies
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Pull a human-readable message out of an error response body.
///
/// Understands the shapes the backend produces: `{"message": ..}`,
/// `{"detail": ..}`, `{"error": ..}`, `{"non_field_errors": [..]}` and
/// per-field errors like `{"email": ["Enter a valid email address."]}`
/// (rendered as `email: Enter a valid email address.`). Field errors are
/// scanned in key order. Returns `None` for empty or non-JSON bodies.
pub fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    message_from_value(&value)
}

const MESSAGE_KEYS: [&str; 4] = ["message", "detail", "error", "non_field_errors"];

fn message_from_value(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_owned())
        }
        serde_json::Value::Array(items) => items.iter().find_map(message_from_value),
        serde_json::Value::Object(map) => {
            for key in MESSAGE_KEYS {
                if let Some(msg) = map.get(key).and_then(message_from_value) {
                    return Some(msg);
                }
            }
            map.iter()
                .find_map(|(field, v)| message_from_value(v).map(|m| format!("{field}: {m}")))
        }
        _ => None,
    }
}
