//! Configuration round-trip tests
//!
//! Exercises serialisation, defaults-for-missing-fields, and version
//! handling against temporary files so the real config is never touched.

use std::fs;

use tempfile::TempDir;

use echonative::config::{AccountConfig, AudioConfig, Config, ServerConfig};

fn write_and_reload(dir: &TempDir, config: &Config) -> Config {
    let path = dir.path().join("config.json");
    let contents = serde_json::to_string_pretty(config).unwrap();
    fs::write(&path, contents).unwrap();

    let reloaded = fs::read_to_string(&path).unwrap();
    serde_json::from_str(&reloaded).unwrap()
}

#[test]
fn default_config_round_trips_through_disk() {
    let dir = TempDir::new().unwrap();
    let config = Config::default();
    let reloaded = write_and_reload(&dir, &config);

    assert_eq!(reloaded.version, config.version);
    assert_eq!(reloaded.server.base_url, config.server.base_url);
    assert_eq!(
        reloaded.server.request_timeout_secs,
        config.server.request_timeout_secs
    );
    assert_eq!(reloaded.audio.device_id, None);
    assert_eq!(reloaded.account.actor_id, "demo-user");
}

#[test]
fn customised_config_round_trips_through_disk() {
    let dir = TempDir::new().unwrap();
    let config = Config {
        version: 1,
        server: ServerConfig {
            base_url: "http://10.1.2.3:9000".to_string(),
            request_timeout_secs: 45,
        },
        audio: AudioConfig {
            device_id: Some("usb-mic-7".to_string()),
        },
        account: AccountConfig {
            actor_id: "alex".to_string(),
        },
    };

    let reloaded = write_and_reload(&dir, &config);
    assert_eq!(reloaded.server.base_url, "http://10.1.2.3:9000");
    assert_eq!(reloaded.server.request_timeout_secs, 45);
    assert_eq!(reloaded.audio.device_id.as_deref(), Some("usb-mic-7"));
    assert_eq!(reloaded.account.actor_id, "alex");
}

#[test]
fn missing_sections_fall_back_to_defaults() {
    let json = r#"{"version": 1}"#;
    let config: Config = serde_json::from_str(json).unwrap();

    assert_eq!(config.server.base_url, ServerConfig::default().base_url);
    assert_eq!(config.audio.device_id, None);
    assert_eq!(config.account.actor_id, "demo-user");
}

#[test]
fn unknown_fields_are_tolerated() {
    let json = r#"{
        "version": 1,
        "server": {"base_url": "http://localhost:8000", "legacy_field": 1},
        "window": {"width": 800}
    }"#;
    let config: Config = serde_json::from_str(json).unwrap();
    assert_eq!(config.version, 1);
    assert_eq!(config.server.base_url, "http://localhost:8000");
}

#[test]
fn empty_file_fails_to_parse() {
    let result = serde_json::from_str::<Config>("");
    assert!(result.is_err());
}
