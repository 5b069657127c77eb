//! Configuration management
//!
//! Persistent settings with schema versioning and migrations, stored in
//! `~/.echonative/config.json`. The config is cached in memory and loaded
//! from disk on first access.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::api::client::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};

/// Current config schema version
const CURRENT_VERSION: u32 = 1;

/// Global config instance for caching
static CONFIG: OnceLock<RwLock<Config>> = OnceLock::new();

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Schema version for migrations
    pub version: u32,
    /// Backend connection settings
    pub server: ServerConfig,
    /// Audio recording settings
    pub audio: AudioConfig,
    /// Account defaults
    pub account: AccountConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            server: ServerConfig::default(),
            audio: AudioConfig::default(),
            account: AccountConfig::default(),
        }
    }
}

/// Backend connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Backend base URL
    pub base_url: String,
    /// Bound on every backend exchange, in seconds
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Audio recording configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Selected audio input device ID (None for system default)
    pub device_id: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self { device_id: None }
    }
}

/// Account defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// Actor id used for submissions when not logged in
    pub actor_id: String,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            actor_id: "demo-user".to_string(),
        }
    }
}

/// Get the path to the config file (~/.echonative/config.json)
pub fn get_config_path() -> PathBuf {
    data_dir().join("config.json")
}

/// Get the client data directory (~/.echonative)
pub fn data_dir() -> PathBuf {
    home_dir_or_fallback().join(".echonative")
}

/// Get the home directory, falling back to /tmp if unavailable
fn home_dir_or_fallback() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| {
        tracing::error!("Could not determine home directory, using /tmp");
        PathBuf::from("/tmp")
    })
}

/// Ensure the config directory exists
fn ensure_config_dir() -> Result<(), String> {
    let dir = data_dir();
    if !dir.exists() {
        fs::create_dir_all(&dir)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    Ok(())
}

/// Load configuration from disk
fn load_from_disk() -> Result<Config, String> {
    let path = get_config_path();

    if !path.exists() {
        tracing::info!("Config file not found, using defaults");
        return Ok(Config::default());
    }

    let contents =
        fs::read_to_string(&path).map_err(|e| format!("Failed to read config file: {}", e))?;

    let config: Config =
        serde_json::from_str(&contents).map_err(|e| format!("Failed to parse config: {}", e))?;

    let migrated = migrate_config(config)?;

    Ok(migrated)
}

/// Save configuration to disk
fn save_to_disk(config: &Config) -> Result<(), String> {
    ensure_config_dir()?;

    let path = get_config_path();
    let contents = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialise config: {}", e))?;

    fs::write(&path, contents).map_err(|e| format!("Failed to write config file: {}", e))?;

    tracing::info!("Config saved to disk: base_url={}", config.server.base_url);
    Ok(())
}

/// Migrate configuration from older schema versions
fn migrate_config(mut config: Config) -> Result<Config, String> {
    let original_version = config.version;

    while config.version < CURRENT_VERSION {
        config = apply_migration(config)?;
    }

    if config.version != original_version {
        tracing::info!(
            "Migrated config from version {} to {}",
            original_version,
            config.version
        );
        save_to_disk(&config)?;
    }

    Ok(config)
}

/// Apply a single migration step
fn apply_migration(config: Config) -> Result<Config, String> {
    match config.version {
        0 => {
            let mut migrated = config;
            migrated.version = 1;
            Ok(migrated)
        }
        v => Err(format!("Unknown config version: {}", v)),
    }
}

/// Get the global config instance
fn get_config_instance() -> &'static RwLock<Config> {
    CONFIG.get_or_init(|| {
        let config = load_from_disk().unwrap_or_else(|e| {
            tracing::error!("Failed to load config, using defaults: {}", e);
            Config::default()
        });
        RwLock::new(config)
    })
}

/// Get the current configuration
pub fn get_config() -> Config {
    get_config_instance().read().clone()
}

/// Replace the configuration and persist it to disk
pub fn set_config(mut config: Config) -> Result<(), String> {
    config.version = CURRENT_VERSION;

    save_to_disk(&config)?;

    let mut cached = get_config_instance().write();
    *cached = config;

    tracing::info!("Configuration updated (base_url: {})", cached.server.base_url);
    Ok(())
}

/// Reset configuration to defaults and persist
pub fn reset_config() -> Result<Config, String> {
    let default_config = Config::default();

    save_to_disk(&default_config)?;

    let mut cached = get_config_instance().write();
    *cached = default_config.clone();

    tracing::info!("Configuration reset to defaults");
    Ok(default_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_has_current_version() {
        let config = Config::default();
        assert_eq!(config.version, CURRENT_VERSION);
    }

    #[test]
    fn test_config_serialisation_roundtrip() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialised: Config = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialised.version, config.version);
        assert_eq!(deserialised.server.base_url, config.server.base_url);
        assert_eq!(
            deserialised.server.request_timeout_secs,
            config.server.request_timeout_secs
        );
        assert_eq!(deserialised.account.actor_id, config.account.actor_id);
    }

    #[test]
    fn test_server_config_defaults() {
        let server = ServerConfig::default();
        assert_eq!(server.base_url, DEFAULT_BASE_URL);
        assert_eq!(server.request_timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_audio_config_defaults() {
        let audio = AudioConfig::default();
        assert_eq!(audio.device_id, None);
    }

    #[test]
    fn test_partial_config_deserialisation() {
        // Config should use defaults for missing fields
        let json = r#"{"version": 1, "server": {"base_url": "http://10.0.0.2:9000"}}"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.version, 1);
        assert_eq!(config.server.base_url, "http://10.0.0.2:9000");
        assert_eq!(config.server.request_timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.account.actor_id, "demo-user");
    }

    #[test]
    fn test_config_unknown_fields_ignored() {
        let json = r#"{
            "version": 1,
            "unknown_field": "should be ignored",
            "audio": {"device_id": "mic-2", "extra": true}
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.audio.device_id.as_deref(), Some("mic-2"));
    }

    #[test]
    fn test_migration_from_version_0() {
        let old_config = Config {
            version: 0,
            ..Default::default()
        };

        // apply_migration alone: migrate_config would also write to disk
        let migrated = apply_migration(old_config).unwrap();
        assert_eq!(migrated.version, CURRENT_VERSION);
    }

    #[test]
    fn test_apply_migration_unknown_version() {
        let future_config = Config {
            version: 999,
            ..Default::default()
        };

        let result = apply_migration(future_config);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("Unknown config version"));
    }

    #[test]
    fn test_config_path_format() {
        let path = get_config_path();
        let path_str = path.to_string_lossy();
        assert!(path_str.contains(".echonative"));
        assert!(path_str.ends_with("config.json"));
    }
}
