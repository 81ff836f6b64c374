//! Account records returned by the backend's `/api/auth/` endpoints.
//!
//! Field names match the wire format (`snake_case`). Everything except
//! `id` and `email` is optional on the wire so that older or trimmed-down
//! serializers still deserialize.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// User
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    #[default]
    Student,
    Instructor,
    Admin,
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UserType::Student => "student",
            UserType::Instructor => "instructor",
            UserType::Admin => "admin",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub user_type: UserType,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub linkedin: String,
    #[serde(default)]
    pub github: String,
    #[serde(default)]
    pub twitter: String,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub profile: Option<LearningProfile>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_instructor(&self) -> bool {
        self.user_type == UserType::Instructor
    }

    pub fn is_admin(&self) -> bool {
        self.is_staff || self.user_type == UserType::Admin
    }

    /// `full_name` if the server sent a non-empty one, otherwise first + last,
    /// falling back to the username and finally the email.
    pub fn display_name(&self) -> String {
        if let Some(name) = self.full_name.as_deref().map(str::trim) {
            if !name.is_empty() {
                return name.to_owned();
            }
        }
        let joined = format!("{} {}", self.first_name, self.last_name);
        let joined = joined.trim();
        if !joined.is_empty() {
            return joined.to_owned();
        }
        if !self.username.is_empty() {
            return self.username.clone();
        }
        self.email.clone()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Learning profile
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

/// GET /api/auth/profile/detail/ (also nested in [`User::profile`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearningProfile {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub skill_level: SkillLevel,
    #[serde(default)]
    pub learning_goals: String,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub total_courses_enrolled: u32,
    #[serde(default)]
    pub total_courses_completed: u32,
    #[serde(default)]
    pub total_learning_hours: u32,
    #[serde(default)]
    pub certificates_earned: u32,
    #[serde(default)]
    pub badges_earned: u32,
    /// Percentage, computed server-side.
    #[serde(default)]
    pub completion_rate: f64,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Activity log
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One entry of GET /api/auth/activities/.
///
/// `activity_type` is kept as a string: the server logs types
/// (`user_login`, `password_changed`, ...) beyond its declared choices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: i64,
    pub activity_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub related_object_id: Option<i64>,
    #[serde(default)]
    pub related_object_type: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}
