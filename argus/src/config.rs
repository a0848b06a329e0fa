use std::path::PathBuf;

use anyhow::{Result, bail};
use argus_sdk::config::{CHAT_ADDR, ConnectionConfig, EVENTSUB_URL, SUBSCRIPTIONS_URL};
use clap::Parser;
use clap::builder::FalseyValueParser;

/// Live terminal viewer for a Twitch channel's chat and activity feed.
///
/// Every option can also be given through the environment variable shown,
/// or in `~/.config/argus/argus.conf` (falling back to `./.env`).
#[derive(Parser, Debug, Clone)]
#[command(name = "argus", version, about)]
pub struct Cli {
    /// Twitch login used for chat, or a `justinfanNNN` guest name.
    #[arg(long, env = "TWITCH_NICK")]
    pub nick: Option<String>,

    /// OAuth token (without the `oauth:` prefix).
    #[arg(long, env = "TWITCH_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Channel to watch, with or without the leading `#`.
    #[arg(long, env = "TWITCH_CHANNEL")]
    pub channel: Option<String>,

    /// Numeric user ID of the channel's broadcaster.
    #[arg(long, env = "TWITCH_CHANNEL_ID")]
    pub channel_id: Option<String>,

    /// Application client ID for the Helix API.
    #[arg(long, env = "TWITCH_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Print diagnostics and section banners.
    ///
    /// From the environment, anything but an empty value, `0`, `false`,
    /// `no`, `off`, `n` or `f` turns this on.
    #[arg(long, env = "SHOW_LOGS", value_parser = FalseyValueParser::new())]
    pub show_logs: bool,

    /// Chat server address (host:port).
    #[arg(long, env = "ARGUS_CHAT_ADDR", default_value = CHAT_ADDR)]
    pub chat_addr: String,

    /// EventSub WebSocket URL.
    #[arg(long, env = "ARGUS_EVENTSUB_URL", default_value = EVENTSUB_URL)]
    pub eventsub_url: String,

    /// Helix subscriptions endpoint.
    #[arg(long, env = "ARGUS_SUBSCRIPTIONS_URL", default_value = SUBSCRIPTIONS_URL)]
    pub subscriptions_url: String,
}

impl Cli {
    /// Validate required settings, reporting every missing one at once.
    pub fn into_connection_config(self) -> Result<ConnectionConfig> {
        let mut missing = Vec::new();
        let nick = required(self.nick, "TWITCH_NICK", &mut missing);
        let token = required(self.token, "TWITCH_TOKEN", &mut missing);
        let channel = required(self.channel, "TWITCH_CHANNEL", &mut missing);
        let channel_id = required(self.channel_id, "TWITCH_CHANNEL_ID", &mut missing);
        let client_id = required(self.client_id, "TWITCH_CLIENT_ID", &mut missing);

        if !missing.is_empty() {
            bail!(
                "Please set the following environment variables: {}",
                missing.join(", ")
            );
        }

        let mut config = ConnectionConfig::new(nick, token, channel, channel_id, client_id)
            .verbose(self.show_logs);
        config.chat_addr = self.chat_addr;
        config.eventsub_url = self.eventsub_url;
        config.subscriptions_url = self.subscriptions_url;
        Ok(config)
    }
}

fn required(value: Option<String>, name: &'static str, missing: &mut Vec<&'static str>) -> String {
    match value {
        Some(value) if !value.trim().is_empty() => value.trim().to_string(),
        _ => {
            missing.push(name);
            String::new()
        }
    }
}

/// Which settings file, if any, fed the process environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsSource {
    ConfigFile(PathBuf),
    /// The config file could not be loaded; a `.env` file was.
    DotEnv { tried: Option<PathBuf>, path: PathBuf },
    /// Neither file loaded. Only the real environment applies.
    Environment { tried: Option<PathBuf> },
}

impl SettingsSource {
    /// Report where settings came from. Called once logging is up.
    pub fn log(&self) {
        match self {
            SettingsSource::ConfigFile(path) => {
                tracing::debug!("Loaded settings from {}", path.display());
            }
            SettingsSource::DotEnv { tried, path } => {
                log_config_fallback(tried.as_ref());
                tracing::debug!("Loaded settings from {}", path.display());
            }
            SettingsSource::Environment { tried } => {
                log_config_fallback(tried.as_ref());
                tracing::info!("Note: No .env file found. Falling back to system environment variables.");
            }
        }
    }
}

fn log_config_fallback(tried: Option<&PathBuf>) {
    match tried {
        Some(path) => tracing::info!(
            "Error loading config file from {}. Falling back to .env instead",
            path.display()
        ),
        None => tracing::info!("No home directory for the config file. Falling back to .env instead"),
    }
}

/// `$HOME/.config/argus/argus.conf` (`%USERPROFILE%` on Windows).
pub fn config_file_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE"))?;
    Some(PathBuf::from(home).join(".config").join("argus").join("argus.conf"))
}

/// Load `KEY=value` settings into the process environment, before the CLI
/// is parsed. Variables that are already set keep their values.
pub fn load_settings_files() -> SettingsSource {
    load_settings_from(config_file_path())
}

fn load_settings_from(config_file: Option<PathBuf>) -> SettingsSource {
    if let Some(path) = &config_file {
        if dotenvy::from_path(path).is_ok() {
            return SettingsSource::ConfigFile(path.clone());
        }
    }
    match dotenvy::dotenv() {
        Ok(path) => SettingsSource::DotEnv { tried: config_file, path },
        Err(_) => SettingsSource::Environment { tried: config_file },
    }
}
