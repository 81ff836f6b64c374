use clap::Parser;
use tracing_subscriber::EnvFilter;

use lh_cli::cli::{self, account, auth, Cli, Command, ConfigCommand, PasswordCommand, ProfileCommand};
use lh_cli::cli::prompt::SecretSource;
use lh_domain::config::{LogFormat, ObservabilityConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let json = args.json;

    match args.command {
        Command::Version => {
            println!("learnhub {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Command::Config(ConfigCommand::Validate) => {
            let (config, config_path) = cli::load_config()?;
            if !cli::config::validate(&config, &config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Config(ConfigCommand::Show) => {
            let (config, _config_path) = cli::load_config()?;
            cli::config::show(&config)
        }
        command => {
            let (config, _config_path) = cli::load_config()?;
            init_cli_tracing(&config.observability);
            let sessions = auth::open_session(&config, command.restores_session()).await?;
            let sessions = sessions.as_ref();

            match command {
                Command::Login { email, password_stdin } => {
                    auth::login(sessions, email, SecretSource::new(password_stdin)?, json).await
                }
                Command::Register {
                    username,
                    email,
                    first_name,
                    last_name,
                    role,
                    password_stdin,
                } => {
                    auth::register(
                        sessions,
                        username,
                        email,
                        first_name,
                        last_name,
                        role,
                        SecretSource::new(password_stdin)?,
                        json,
                    )
                    .await
                }
                Command::Logout => auth::logout(sessions, json).await,
                Command::Whoami => auth::whoami(sessions, json),
                Command::Status => auth::status(sessions, json),
                Command::Refresh => auth::refresh(sessions, json).await,
                Command::Profile(ProfileCommand::Show) => account::profile_show(sessions, json).await,
                Command::Profile(ProfileCommand::Update(fields)) => {
                    account::profile_update(sessions, fields.into(), json).await
                }
                Command::Password(PasswordCommand::Change { password_stdin }) => {
                    account::password_change(sessions, SecretSource::new(password_stdin)?, json)
                        .await
                }
                Command::Password(PasswordCommand::Reset { email }) => {
                    account::password_reset(sessions, &email, json).await
                }
                Command::Password(PasswordCommand::ResetConfirm {
                    token,
                    password_stdin,
                }) => {
                    account::password_reset_confirm(
                        sessions,
                        token,
                        SecretSource::new(password_stdin)?,
                        json,
                    )
                    .await
                }
                Command::Activities { limit } => account::activities(sessions, limit, json).await,
                Command::Version | Command::Config(_) => unreachable!("handled above"),
            }
        }
    }
}

/// Initialize stderr-only tracing for CLI commands.
///
/// `RUST_LOG` wins; otherwise the configured default filter (`warn`) keeps
/// diagnostics out of the way of command output.
fn init_cli_tracing(obs: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&obs.default_filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match obs.log_format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }
}
