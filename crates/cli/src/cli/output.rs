//! Text and JSON rendering for command results.

use lh_domain::{Activity, LearningProfile, User};
use serde::Serialize;

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print `value` as JSON, or its text lines otherwise.
pub fn emit<T: Serialize + ?Sized>(json: bool, value: &T, lines: Vec<String>) -> anyhow::Result<()> {
    if json {
        return print_json(value);
    }
    for line in lines {
        println!("{line}");
    }
    Ok(())
}

pub fn user_lines(user: &User) -> Vec<String> {
    let mut lines = vec![
        format!("{} <{}>", user.display_name(), user.email),
        format!("  id:        {}", user.id),
        format!("  username:  {}", user.username),
        format!("  role:      {}", user.user_type),
    ];
    if user.is_staff {
        lines.push("  staff:     yes".into());
    }
    if !user.email_verified {
        lines.push("  email:     not verified".into());
    }
    let optional = [
        ("bio", user.bio.as_str()),
        ("phone", user.phone_number.as_str()),
        ("website", user.website.as_str()),
        ("linkedin", user.linkedin.as_str()),
        ("github", user.github.as_str()),
        ("twitter", user.twitter.as_str()),
    ];
    for (label, value) in optional {
        if !value.is_empty() {
            lines.push(format!("  {:<10} {value}", format!("{label}:")));
        }
    }
    if let Some(dob) = user.date_of_birth {
        lines.push(format!("  born:      {dob}"));
    }
    lines
}

pub fn learning_profile_lines(p: &LearningProfile) -> Vec<String> {
    let mut lines = vec![
        "Learning profile".to_string(),
        format!("  skill level: {:?}", p.skill_level).to_lowercase(),
        format!(
            "  courses:     {} enrolled, {} completed ({:.0}%)",
            p.total_courses_enrolled, p.total_courses_completed, p.completion_rate
        ),
        format!("  hours:       {}", p.total_learning_hours),
        format!(
            "  awards:      {} certificates, {} badges",
            p.certificates_earned, p.badges_earned
        ),
    ];
    if !p.interests.is_empty() {
        lines.push(format!("  interests:   {}", p.interests.join(", ")));
    }
    if !p.learning_goals.is_empty() {
        lines.push(format!("  goals:       {}", p.learning_goals));
    }
    lines
}

pub fn activity_line(a: &Activity) -> String {
    let when = a
        .timestamp
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".repeat(16));
    format!("{when}  {:<20} {}", a.activity_type, a.description)
}
