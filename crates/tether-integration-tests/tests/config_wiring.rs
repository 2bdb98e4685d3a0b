//! Messengers built from the layered config.

mod common;

use serde_json::{Value, json};
use tether_config::Config;
use tether_messenger::MessengerConfig;
use tether_test::TestConfigFile;

use common::Bridge;

const CONFIG: &str = r#"
[messenger]
query_entry_point = "bridge.query"
response_entry_point = "bridge.respond"
assert_on_type_mismatch = false

[messenger.logging]
enabled = true
full = true
unlogged_types = ["tick"]
"#;

#[tokio::test]
async fn test_messenger_config_from_file() {
    let file = TestConfigFile::new(CONFIG).unwrap();
    let config = Config::load_file(file.path()).unwrap();
    let messenger_config = MessengerConfig::from(&config.messenger);

    assert_eq!(messenger_config.query_entry_point, "bridge.query");
    assert_eq!(messenger_config.response_entry_point, "bridge.respond");
    assert!(!messenger_config.assert_on_type_mismatch);
    assert!(messenger_config.logging.enabled);
    assert!(messenger_config.logging.full);
    assert!(messenger_config.logging.unlogged_types.contains("tick"));

    let bridge = Bridge::with_config(messenger_config);
    bridge.host.signal_launch_succeeded();
    let _echo = bridge
        .page
        .register_handler("echo", |payload: Value| async move { Ok(payload) });

    let reply: Value = bridge
        .host
        .send_query("echo", Some(json!({"via": "custom entry points"})))
        .await
        .unwrap();
    assert_eq!(reply, json!({"via": "custom entry points"}));

    let log = bridge.host.query_log();
    assert!(log.is_enabled());
    assert!(log.is_full());
    assert!(!log.should_log("tick"));
    assert!(log.should_log("echo"));
}

#[test]
fn test_default_config_matches_messenger_defaults() {
    let config = Config::default();
    let from_config = MessengerConfig::from(&config.messenger);
    assert_eq!(from_config, MessengerConfig::default());
}
