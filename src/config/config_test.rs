use std::time::Duration;

use serial_test::serial;
use temp_env::with_vars;

use super::*;
use crate::test_utils::CLIENT_KEY_1_DIGEST;

fn cleanup_all_deadman_env_vars() {
    for (key, _) in std::env::vars() {
        if key.starts_with("DEADMAN__") || key == "CONFIG_PATH" {
            std::env::remove_var(&key);
        }
    }
}

fn write_config(
    dir: &tempfile::TempDir,
    body: &str,
) -> String {
    let path = dir.path().join("deadman.toml");
    std::fs::write(&path, body).unwrap();
    path.to_str().unwrap().to_string()
}

fn valid_config_body() -> String {
    format!(
        r#"
        log_level = "debug"

        [watch]
        down_interval = "4s"
        wait_for_first_connection = true
        snapshot_file = "/tmp/deadman-test/snapshot.json"

        [watch.clients.clientid1]
        key = "{CLIENT_KEY_1_DIGEST}"
        name = "Instance Name 1"

        [watch.clients.clientid2]
        name = "Instance Name 2"

        [notify]
        destinations = ["https://hooks.example.com/abc", "log://deadman"]
        repeat_interval = "4s"
        "#
    )
}

#[test]
fn default_config_should_initialize_with_hardcoded_values() {
    let config = AlerterConfig::default();

    assert_eq!(config.log_level, "info");
    assert_eq!(config.watch.down_interval, Duration::from_secs(300));
    assert_eq!(config.watch.poll_interval, Duration::from_secs(1));
    assert!(!config.watch.wait_for_first_connection);
    assert!(config.watch.clients.is_empty());
    assert_eq!(config.notify.repeat_interval, Duration::from_secs(3600));
    assert_eq!(config.server.listen_address.port(), 8080);
    assert!(config.server.metrics_enabled);
}

#[test]
#[serial]
fn load_should_merge_explicit_file() {
    cleanup_all_deadman_env_vars();
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, &valid_config_body());

    let config = AlerterConfig::load(Some(&path)).unwrap().validate().unwrap();

    assert_eq!(config.log_level, "debug");
    assert_eq!(config.watch.down_interval, Duration::from_secs(4));
    assert!(config.watch.wait_for_first_connection);
    assert_eq!(config.watch.clients.len(), 2);
    assert_eq!(config.watch.clients["clientid1"].name, "Instance Name 1");
    assert_eq!(
        config.watch.clients["clientid1"].key.as_deref(),
        Some(CLIENT_KEY_1_DIGEST)
    );
    assert!(config.watch.clients["clientid2"].key.is_none());
    assert_eq!(config.notify.destinations.len(), 2);
    assert_eq!(config.notify.repeat_interval, Duration::from_secs(4));
    // Untouched sections keep their defaults
    assert_eq!(config.notify.send_timeout, Duration::from_secs(10));
    assert_eq!(config.server.listen_address.port(), 8080);
}

#[test]
#[serial]
fn load_should_fail_when_config_file_is_missing() {
    cleanup_all_deadman_env_vars();
    let result = AlerterConfig::load(Some("/nonexistent/deadman-config.toml"));
    assert!(result.is_err());
}

#[test]
#[serial]
fn environment_variables_should_have_highest_priority() {
    cleanup_all_deadman_env_vars();
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, &valid_config_body());

    with_vars(
        vec![
            ("CONFIG_PATH", Some(path.as_str())),
            ("DEADMAN__WATCH__DOWN_INTERVAL", Some("10m")),
            ("DEADMAN__SERVER__LISTEN_ADDRESS", Some("127.0.0.1:9999")),
        ],
        || {
            let config = AlerterConfig::load(None).unwrap().validate().unwrap();

            assert_eq!(config.watch.down_interval, Duration::from_secs(600));
            assert_eq!(config.server.listen_address.port(), 9999);
            // Still coming from the CONFIG_PATH file
            assert_eq!(config.notify.repeat_interval, Duration::from_secs(4));
        },
    );
}

#[test]
fn validation_should_fail_without_clients() {
    let config = AlerterConfig::default();
    assert!(config.validate().is_err());
}

fn config_with_one_client() -> AlerterConfig {
    let mut config = AlerterConfig::default();
    config.watch.clients.insert(
        "clientid1".to_string(),
        ClientConfig {
            key: Some(CLIENT_KEY_1_DIGEST.to_string()),
            name: "Instance Name 1".to_string(),
        },
    );
    config
}

#[test]
fn validation_should_accept_minimal_config() {
    assert!(config_with_one_client().validate().is_ok());
}

#[test]
fn validation_should_reject_malformed_client_key() {
    let mut config = config_with_one_client();
    config.watch.clients.get_mut("clientid1").unwrap().key = Some("clientkey1".to_string());

    match config.validate() {
        Err(Error::InvalidConfig(msg)) => assert!(msg.contains("clientid1")),
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
}

#[test]
fn validation_should_reject_empty_client_name() {
    let mut config = config_with_one_client();
    config.watch.clients.get_mut("clientid1").unwrap().name = "  ".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn validation_should_reject_zero_intervals() {
    let mut config = config_with_one_client();
    config.watch.down_interval = Duration::ZERO;
    assert!(config.validate().is_err());

    let mut config = config_with_one_client();
    config.notify.repeat_interval = Duration::ZERO;
    assert!(config.validate().is_err());
}

#[test]
fn validation_should_reject_destination_without_scheme() {
    let mut config = config_with_one_client();
    config.notify.destinations = vec!["hooks.example.com/abc".to_string()];
    assert!(config.validate().is_err());
}

#[test]
fn validation_should_reject_unknown_log_level() {
    let mut config = config_with_one_client();
    config.log_level = "critical".to_string();
    assert!(config.validate().is_err());

    let mut config = config_with_one_client();
    config.log_level = "WARN".to_string();
    assert!(config.validate().is_ok());
}

#[test]
fn destination_scheme_should_be_lowercased() {
    assert_eq!(
        destination_scheme("HTTPS://hooks.example.com").as_deref(),
        Some("https")
    );
    assert_eq!(destination_scheme("log://x").as_deref(), Some("log"));
    assert!(destination_scheme("://x").is_none());
    assert!(destination_scheme("https://").is_none());
    assert!(destination_scheme("no scheme").is_none());
}

#[test]
fn display_name_should_fall_back_to_client_id() {
    let config = config_with_one_client();
    assert_eq!(config.watch.display_name("clientid1"), "Instance Name 1");
    assert_eq!(config.watch.display_name("other"), "other");
}

#[test]
#[serial]
fn example_config_should_load_and_validate() {
    cleanup_all_deadman_env_vars();
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/deadman.example.toml");

    let config = AlerterConfig::load(Some(path)).unwrap().validate().unwrap();

    assert_eq!(config.watch.clients.len(), 2);
    assert_eq!(config.notify.destinations, vec!["log://deadman".to_string()]);
}
