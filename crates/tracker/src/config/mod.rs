use clap::{Parser, Subcommand};
use serde::Deserialize;

use crate::error::{AppError, Result};

const DEFAULT_CONFIG_PATH: &str = "config/tracker.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    pub email: String,
    /// Only from the config file or `TRACKER_PASSWORD`.
    pub password: String,
    pub poll_interval_ms: u64,
    pub timezone: String,
    pub level: String,
    /// Run against the in-process store instead of `base_url`.
    pub memory: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            email: String::new(),
            password: String::new(),
            poll_interval_ms: 1000,
            timezone: "Europe/Rome".to_string(),
            level: "info".to_string(),
            memory: false,
        }
    }
}

impl AppConfig {
    pub fn timezone(&self) -> Result<chrono_tz::Tz> {
        self.timezone
            .parse()
            .map_err(|_| AppError::Timezone(self.timezone.clone()))
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Follow the ledger live and print it on every change (default).
    Watch,
    /// Record one expense or investment.
    Add {
        /// `expense` or `investment`.
        #[arg(long)]
        kind: String,
        #[arg(long)]
        title: String,
        /// Amount as typed, e.g. `4.50` or `4,50`.
        #[arg(long)]
        amount: String,
        #[arg(long)]
        category: String,
    },
    /// Delete one transaction by id.
    Remove { id: String },
}

#[derive(Debug, Parser)]
#[command(name = "tracker", disable_version_flag = true)]
struct Args {
    /// Optional config file path (TOML).
    #[arg(long)]
    config: Option<String>,
    /// Override base URL (e.g. http://127.0.0.1:3000).
    #[arg(long)]
    base_url: Option<String>,
    /// Override email (password is never read from CLI).
    #[arg(long)]
    email: Option<String>,
    /// Override timezone (IANA name).
    #[arg(long)]
    timezone: Option<String>,
    /// Use the in-process store, seeded with the configured account.
    #[arg(long)]
    memory: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

pub fn load() -> Result<(AppConfig, Command)> {
    let args = Args::parse();

    let config_path = args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
    let mut builder = config::Config::builder();
    builder = builder.add_source(config::File::with_name(config_path).required(false));
    builder = builder.add_source(config::Environment::with_prefix("TRACKER"));
    let mut settings: AppConfig = builder.build()?.try_deserialize()?;

    if let Some(base_url) = args.base_url {
        settings.base_url = base_url;
    }
    if let Some(email) = args.email {
        settings.email = email;
    }
    if let Some(timezone) = args.timezone {
        settings.timezone = timezone;
    }
    if args.memory {
        settings.memory = true;
    }

    Ok((settings, args.command.unwrap_or(Command::Watch)))
}
