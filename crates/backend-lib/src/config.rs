// ============================
// studyroom-backend-lib/src/config.rs
// ============================
//! Configuration management.
use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Default configuration file, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "studyroom.toml";

/// Prefix for environment overrides, e.g. `STUDYROOM_LIVE__ECHO_TO_SENDER=false`
pub const ENV_PREFIX: &str = "STUDYROOM_";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Where room and user records are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One JSON file per room and per user under `data_dir`
    File,
    /// Process memory only
    Memory,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Data directory path
    pub data_dir: PathBuf,
    /// Storage backend for rooms, memberships and users
    pub storage: StorageBackend,
    /// Log level
    pub log_level: String,
    /// Session TTL in seconds
    pub session_ttl_secs: u64,
    pub rooms: RoomSettings,
    pub live: LiveSettings,
    /// Password requirements
    pub password_requirements: PasswordRequirements,
    pub password_hash: PasswordHashSettings,
}

/// Room directory defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSettings {
    /// Capacity used when a creation request omits `max_participants`
    pub default_max_participants: u32,
    /// Upper bound (and default) for list page size
    pub max_page_size: usize,
}

/// Live channel tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveSettings {
    /// Outbound queue length per connection
    pub channel_capacity: usize,
    /// Upper bound for a single socket write
    pub send_timeout_ms: u64,
    /// Largest inbound frame accepted
    pub max_message_bytes: usize,
    /// Whether a sender receives its own chat/draw/cursor events
    pub echo_to_sender: bool,
}

/// Password complexity requirements
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordRequirements {
    /// Minimum password length
    pub min_length: usize,
    /// Require uppercase letters
    pub require_uppercase: bool,
    /// Require lowercase letters
    pub require_lowercase: bool,
    /// Require digits
    pub require_digit: bool,
    /// Require special characters
    pub require_special: bool,
}

/// scrypt cost parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordHashSettings {
    /// log2 of the scrypt CPU/memory cost
    pub log_n: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            data_dir: PathBuf::from("data"),
            storage: StorageBackend::File,
            log_level: "info".to_string(),
            session_ttl_secs: 60 * 60 * 24 * 7, // 7 days
            rooms: RoomSettings::default(),
            live: LiveSettings::default(),
            password_requirements: PasswordRequirements::default(),
            password_hash: PasswordHashSettings::default(),
        }
    }
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            default_max_participants: 10,
            max_page_size: 100,
        }
    }
}

impl Default for LiveSettings {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
            send_timeout_ms: 5_000,
            max_message_bytes: 64 * 1024,
            echo_to_sender: true,
        }
    }
}

impl Default for PasswordRequirements {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_uppercase: false,
            require_lowercase: false,
            require_digit: true,
            require_special: false,
        }
    }
}

impl Default for PasswordHashSettings {
    fn default() -> Self {
        Self { log_n: 15 }
    }
}

impl Settings {
    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            bail!("unknown log level `{}`", self.log_level);
        }
        if self.session_ttl_secs == 0 {
            bail!("session_ttl_secs must be positive");
        }
        if self.rooms.default_max_participants == 0 {
            bail!("rooms.default_max_participants must be positive");
        }
        if self.rooms.max_page_size == 0 {
            bail!("rooms.max_page_size must be positive");
        }
        if self.live.channel_capacity == 0 {
            bail!("live.channel_capacity must be positive");
        }
        if self.live.send_timeout_ms == 0 {
            bail!("live.send_timeout_ms must be positive");
        }
        if self.live.max_message_bytes == 0 {
            bail!("live.max_message_bytes must be positive");
        }
        if self.password_requirements.min_length < 6 {
            bail!("password_requirements.min_length must be at least 6");
        }
        if !(10..=20).contains(&self.password_hash.log_n) {
            bail!("password_hash.log_n must be between 10 and 20");
        }
        Ok(())
    }
}

/// Load settings: defaults, then the TOML file, then `STUDYROOM_*` variables
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let file = path.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), Path::to_path_buf);

    let settings: Settings = Figment::from(Serialized::defaults(Settings::default()))
        .merge(Toml::file(file))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()?;

    settings.validate()?;
    Ok(settings)
}
