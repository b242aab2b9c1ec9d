use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use tokio_test::assert_ok;

use application::RuleSnapshotStore;
use domain::automation::{Action, Condition, RepeatPolicy, Rule};
use domain::node::{NodeId, NodeKind};
use infrastructure::{HubConfig, JsonSnapshotStore};

fn scratch_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("nodehub-test-{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn test_load_hub_config() {
    let dir = scratch_dir();
    fs::write(
        dir.join("default.toml"),
        r#"
state_file = "state/rules.json"

[transport]
host = "http://nodehub/"
max_attempts = 4

[automation]
tick_secs = 2

[[nodes]]
id = "lamp"
address = 2
kind = "binary_output"
auto_off_secs = 30

[[nodes]]
id = "bank-0"
address = 9
kind = "binary_output"
bit_index = 0

[[rules]]
action = { type = "SetOn" }
target = "lamp"
condition = { type = "Daily", at = "07:30" }
repeat = { type = "Count", remaining = 3 }
"#,
    )
    .unwrap();

    let config = HubConfig::load(dir.to_str().unwrap()).unwrap();

    assert_eq!(config.transport.endpoint().url(), "ws://nodehub.local/ws");
    assert_eq!(config.transport.policy().max_attempts, 4);
    assert_eq!(config.transport.reconnect_delay_secs, 5);
    assert_eq!(config.automation.tick_secs, 2);
    assert_eq!(config.automation.auto_off_tick_secs, 1);
    assert_eq!(config.nodes.len(), 2);
    assert_eq!(config.nodes[0].kind, NodeKind::BinaryOutput);
    assert_eq!(config.nodes[0].auto_off_secs, Some(30));
    assert_eq!(config.nodes[1].bit_index, Some(0));
    assert_eq!(config.rules.len(), 1);
    assert_eq!(config.rules[0].repeat, RepeatPolicy::Count(3));
    assert!(config.rules[0].enabled);
    assert_eq!(config.state_file, Some(PathBuf::from("state/rules.json")));

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn test_missing_default_config_is_an_error() {
    let dir = scratch_dir();
    assert!(HubConfig::load(dir.to_str().unwrap()).is_err());
    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn test_snapshot_round_trip_keeps_progress() {
    let dir = scratch_dir();
    let store = JsonSnapshotStore::new(dir.join("nested").join("rules.json"));

    assert!(assert_ok!(store.load()).is_none());

    let fired_at = Utc::now();
    let mut rule = Rule::new(
        Condition::countdown(90, fired_at),
        Action::SetOff,
        NodeId::new("pump").unwrap(),
    )
    .with_repeat(RepeatPolicy::Count(2));
    rule.last_fired_at = Some(fired_at);

    assert_ok!(store.save(std::slice::from_ref(&rule)));
    let restored = assert_ok!(store.load()).unwrap();

    assert_eq!(restored, vec![rule]);
    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn test_corrupt_snapshot_reports_error() {
    let dir = scratch_dir();
    let path = dir.join("rules.json");
    fs::write(&path, "{ not json").unwrap();

    assert!(JsonSnapshotStore::new(&path).load().is_err());
    fs::remove_dir_all(dir).unwrap();
}
