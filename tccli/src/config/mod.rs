//! Configuration for the `tccli` binary.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file
//! 4. Compiled defaults
//!
//! Without `--config`, the file is looked up at
//! `<config dir>/tccli/config.toml`, then `~/.tcclirc`; a missing file is not
//! an error. An explicit `--config` path that doesn't exist is an error.
//!
//! ```toml
//! name = "my_bot_account"
//! channel = "#my_channel"
//! oauth = "oauth:abcdefghijkl"
//! timestamps = true
//! ```

use std::path::{Path, PathBuf};

use tccli_proto::line::DEFAULT_SERVER_NAME;

use crate::session::ConnectParams;
use crate::transport::{DEFAULT_HOST, DEFAULT_PORT};

/// Required prefix of the account credential.
pub const CREDENTIAL_PREFIX: &str = "oauth:";

/// Leading character of every room name.
pub const ROOM_MARKER: char = '#';

/// Errors that can occur when loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// A required setting was not provided anywhere.
    #[error("missing setting: {0}")]
    Missing(&'static str),

    /// The credential does not carry the `oauth:` prefix.
    #[error("oauth token must start with \"oauth:\"")]
    InvalidCredential,

    /// The room name is empty after the `#` marker.
    #[error("invalid channel name {0:?}")]
    InvalidRoom(String),

    /// Port zero cannot be connected to.
    #[error("port must be non-zero")]
    InvalidPort,
}

/// Config file structure (all fields optional for partial overrides).
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    name: Option<String>,
    channel: Option<String>,
    oauth: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    server_name: Option<String>,
    spectate: Option<bool>,
    timestamps: Option<bool>,
}

/// Fully resolved client configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Chat server host.
    pub host: String,
    /// Chat server port.
    pub port: u16,
    /// Name the server uses for its own notices.
    pub server_name: String,
    /// Account name.
    pub name: Option<String>,
    /// Room to join, normalized to start with `#`.
    pub channel: Option<String>,
    /// Account credential.
    pub oauth: Option<String>,
    /// Read-only mode: typed lines are not sent.
    pub spectate: bool,
    /// Prefix displayed lines with `[HH:MM:SS]`.
    pub timestamps: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            server_name: DEFAULT_SERVER_NAME.to_owned(),
            name: None,
            channel: None,
            oauth: None,
            spectate: false,
            timestamps: false,
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("server_name", &self.server_name)
            .field("name", &self.name)
            .field("channel", &self.channel)
            .field("oauth", &self.oauth.as_ref().map(|_| "<redacted>"))
            .field("spectate", &self.spectate)
            .field("timestamps", &self.timestamps)
            .finish()
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read,
    /// or any config file that exists cannot be parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Resolve a `ClientConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default. Separated from `load()` so it can be
    /// tested without touching the file system.
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            host: cli
                .host
                .clone()
                .or_else(|| file.host.clone())
                .unwrap_or(defaults.host),
            port: cli.port.or(file.port).unwrap_or(defaults.port),
            server_name: file.server_name.clone().unwrap_or(defaults.server_name),
            name: cli.name.clone().or_else(|| file.name.clone()),
            channel: cli
                .channel
                .clone()
                .or_else(|| file.channel.clone())
                .map(|c| normalize_room(&c)),
            oauth: cli.oauth.clone().or_else(|| file.oauth.clone()),
            spectate: cli.spectate || file.spectate.unwrap_or(defaults.spectate),
            timestamps: cli.timestamps || file.timestamps.unwrap_or(defaults.timestamps),
        }
    }

    /// Validate the settings and build the session's [`ConnectParams`].
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Missing`] if name, channel or oauth is unset or empty.
    /// - [`ConfigError::InvalidCredential`] if oauth lacks the `oauth:` prefix.
    /// - [`ConfigError::InvalidRoom`] if the channel is just `#`.
    /// - [`ConfigError::InvalidPort`] if the port is zero.
    pub fn connect_params(&self) -> Result<ConnectParams, ConfigError> {
        let name = required(self.name.as_deref(), "name")?;
        let channel = required(self.channel.as_deref(), "channel")?;
        let oauth = required(self.oauth.as_deref(), "oauth")?;

        if !oauth.starts_with(CREDENTIAL_PREFIX) {
            return Err(ConfigError::InvalidCredential);
        }
        if channel.len() <= ROOM_MARKER.len_utf8() || !channel.starts_with(ROOM_MARKER) {
            return Err(ConfigError::InvalidRoom(channel.to_owned()));
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidPort);
        }

        Ok(
            ConnectParams::new(self.host.clone(), self.port, name, oauth, channel)
                .with_server_name(self.server_name.clone()),
        )
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(
    version,
    about = "Chat in a Twitch room from the terminal",
    after_help = "Type a line and press enter to send it. Type !quit or !exit to leave."
)]
pub struct CliArgs {
    /// Name of the account to use.
    #[arg(short = 'n', long, env = "TCCLI_NAME")]
    pub name: Option<String>,

    /// Channel to join (a leading '#' is added if missing).
    #[arg(short = 'c', long, env = "TCCLI_CHANNEL")]
    pub channel: Option<String>,

    /// OAuth token, including the "oauth:" prefix.
    #[arg(short = 'o', long, env = "TCCLI_OAUTH", hide_env_values = true)]
    pub oauth: Option<String>,

    /// Path to config file (default: `<config dir>/tccli/config.toml`, then `~/.tcclirc`).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Only read the chat; never send typed lines.
    #[arg(long)]
    pub spectate: bool,

    /// Prefix messages with [HH:MM:SS] timestamps.
    #[arg(long)]
    pub timestamps: bool,

    /// Chat server host.
    #[arg(long)]
    pub host: Option<String>,

    /// Chat server port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "TCCLI_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/tccli.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn normalize_room(channel: &str) -> String {
    if channel.starts_with(ROOM_MARKER) {
        channel.to_owned()
    } else {
        format!("{ROOM_MARKER}{channel}")
    }
}

fn required<'a>(value: Option<&'a str>, field: &'static str) -> Result<&'a str, ConfigError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(field))
}

/// Candidate config file locations, in lookup order.
fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("tccli").join("config.toml"));
    }
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".tcclirc"));
    }
    paths
}

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist. Otherwise the default
/// locations are tried in order and the first existing file wins.
fn load_config_file(explicit_path: Option<&Path>) -> Result<ConfigFile, ConfigError> {
    if let Some(path) = explicit_path {
        return read_config_file(path);
    }

    for path in default_config_paths() {
        match read_config_file(&path) {
            Err(ConfigError::ReadFile { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound => {}
            other => {
                tracing::debug!(path = %path.display(), "using config file");
                return other;
            }
        }
    }
    Ok(ConfigFile::default())
}

fn read_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(toml::from_str(&contents)?)
}
