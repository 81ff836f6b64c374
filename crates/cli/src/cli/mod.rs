pub mod account;
pub mod auth;
pub mod config;
pub mod output;
pub mod prompt;

use std::path::Path;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use lh_client::ProfileUpdate;
use lh_domain::config::Config;
use lh_domain::UserType;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "LH_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "learnhub.toml";

/// Manage your LearnHub account and session from the terminal.
#[derive(Debug, Parser)]
#[command(name = "learnhub", version, about)]
pub struct Cli {
    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in with email and password.
    Login {
        /// Account email (prompted when omitted).
        #[arg(long)]
        email: Option<String>,
        /// Read the password from the first line of stdin.
        #[arg(long)]
        password_stdin: bool,
    },
    /// Create an account and log into it.
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        /// Account role.
        #[arg(long, value_enum, default_value_t = Role::Student)]
        role: Role,
        /// Read the password from the first line of stdin.
        #[arg(long)]
        password_stdin: bool,
    },
    /// End the session and forget the stored token.
    Logout,
    /// Show the logged-in user.
    Whoami,
    /// Show whether a session is active.
    Status,
    /// Re-fetch the logged-in user from the server.
    Refresh,
    /// Profile utilities.
    #[command(subcommand)]
    Profile(ProfileCommand),
    /// Password utilities.
    #[command(subcommand)]
    Password(PasswordCommand),
    /// List recent account activity.
    Activities {
        /// Show at most this many entries.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

impl Command {
    /// Whether the command acts on the logged-in user, so the stored token
    /// has to be checked against `/me/` before dispatch. A failed check
    /// forgets the token, which commands that only replace or revoke it
    /// must not risk.
    pub fn restores_session(&self) -> bool {
        !matches!(
            self,
            Command::Login { .. }
                | Command::Register { .. }
                | Command::Logout
                | Command::Password(PasswordCommand::Reset { .. })
                | Command::Password(PasswordCommand::ResetConfirm { .. })
                | Command::Config(_)
                | Command::Version
        )
    }
}

#[derive(Debug, Subcommand)]
pub enum ProfileCommand {
    /// Show the account and learning profile.
    Show,
    /// Change profile fields. Only the flags given are sent.
    Update(ProfileArgs),
}

#[derive(Debug, Default, clap::Args)]
pub struct ProfileArgs {
    #[arg(long)]
    pub first_name: Option<String>,
    #[arg(long)]
    pub last_name: Option<String>,
    #[arg(long)]
    pub bio: Option<String>,
    /// Date of birth as YYYY-MM-DD.
    #[arg(long)]
    pub date_of_birth: Option<NaiveDate>,
    #[arg(long)]
    pub phone_number: Option<String>,
    #[arg(long)]
    pub website: Option<String>,
    #[arg(long)]
    pub linkedin: Option<String>,
    #[arg(long)]
    pub github: Option<String>,
    #[arg(long)]
    pub twitter: Option<String>,
}

impl From<ProfileArgs> for ProfileUpdate {
    fn from(a: ProfileArgs) -> Self {
        ProfileUpdate {
            first_name: a.first_name,
            last_name: a.last_name,
            bio: a.bio,
            date_of_birth: a.date_of_birth,
            phone_number: a.phone_number,
            website: a.website,
            linkedin: a.linkedin,
            github: a.github,
            twitter: a.twitter,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum PasswordCommand {
    /// Change the password of the logged-in account.
    Change {
        /// Read the old and new passwords from the first two lines of stdin.
        #[arg(long)]
        password_stdin: bool,
    },
    /// Ask the server to email a reset token.
    Reset {
        #[arg(long)]
        email: String,
    },
    /// Set a new password with a reset token.
    ResetConfirm {
        /// Token from the reset email.
        #[arg(long)]
        token: String,
        /// Read the new password from the first line of stdin.
        #[arg(long)]
        password_stdin: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

/// Roles a user may pick at registration. Admin accounts are not
/// self-service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Role {
    Student,
    Instructor,
}

impl From<Role> for UserType {
    fn from(r: Role) -> Self {
        match r {
            Role::Student => UserType::Student,
            Role::Instructor => UserType::Instructor,
        }
    }
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path in `LH_CONFIG` (or
/// `learnhub.toml` by default). Returns the parsed [`Config`] and the
/// path that was used.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    let config = load_config_from(Path::new(&config_path))?;
    Ok((config, config_path))
}

/// Parse `path` if it exists, otherwise start from defaults. Environment
/// overrides are applied last.
pub fn load_config_from(path: &Path) -> anyhow::Result<Config> {
    let mut config: Config = if path.exists() {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading {}: {e}", path.display()))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {}: {e}", path.display()))?
    } else {
        Config::default()
    };
    config.api.apply_env();
    Ok(config)
}
