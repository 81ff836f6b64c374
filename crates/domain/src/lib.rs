//! `lh-domain`: types shared by every LearnHub crate: the account
//! records the backend returns, the error taxonomy, configuration, and
//! structured trace events.

pub mod config;
pub mod error;
pub mod trace;
pub mod user;

pub use error::{Error, Result};
pub use user::{Activity, LearningProfile, SkillLevel, User, UserType};
