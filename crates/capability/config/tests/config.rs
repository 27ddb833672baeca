use fg_config::{AppConfig, ConfigError, GatewayConfig, Subscriptions};

const SAMPLE: &str = r#"{
  "scan_modes": [
    { "id": "every-second", "name": "Every second", "cron": "* * * * * *" }
  ],
  "south": [
    {
      "id": "south-1",
      "name": "Plant A",
      "type": "modbus",
      "settings": { "host": "127.0.0.1", "port": 502 },
      "history": { "max_read_interval_seconds": 600 },
      "items": [
        { "id": "item-1", "name": "power", "scan_mode_id": "every-second", "settings": { "address": 10 } }
      ]
    }
  ],
  "north": [
    {
      "id": "north-1",
      "name": "Broker",
      "type": "console",
      "caching": {
        "send_interval_ms": 1000,
        "retry_interval_ms": 5000,
        "retry_count": 3,
        "timeout_ms": 30000,
        "group_count": 100,
        "max_send_count": 1000,
        "archive": { "enabled": true, "retention_duration_hours": 72 }
      },
      "subscriptions": { "sources": ["south-1"] }
    },
    {
      "id": "north-2",
      "name": "Everything",
      "type": "console",
      "caching": {
        "send_interval_ms": 1000,
        "retry_interval_ms": 5000,
        "retry_count": 0,
        "timeout_ms": 30000,
        "group_count": 10,
        "max_send_count": 5
      }
    }
  ]
}"#;

#[test]
fn load_config_from_env() {
    // Rust 2024 中 set_var 需要显式标注 unsafe（测试进程内可控）。
    unsafe {
        std::env::set_var("FG_ADMIN_ADDR", "127.0.0.1:9999");
        std::env::set_var("FG_ARCHIVE_SWEEP_SECONDS", "60");
    }

    let config = AppConfig::from_env().expect("config");
    assert_eq!(config.admin_addr, "127.0.0.1:9999");
    assert_eq!(config.archive_sweep_seconds, 60);
    assert!(config.admin_enabled);
}

#[test]
fn parse_connector_file() {
    let config = GatewayConfig::from_json(SAMPLE).expect("parsed");
    assert_eq!(config.scan_modes.len(), 1);
    assert_eq!(config.south[0].kind, "modbus");
    assert_eq!(config.south[0].history.max_read_interval_seconds, 600);
    assert_eq!(config.south[0].history.read_delay_ms, 200);
    assert!(config.south[0].enabled);
    assert_eq!(config.south[0].items[0].scan_mode_id, "every-second");

    let north = &config.north[0];
    assert!(north.caching.archive.enabled);
    assert_eq!(north.caching.archive.retention_duration_hours, 72);
    assert_eq!(
        north.subscriptions,
        Subscriptions::Sources(vec!["south-1".to_string()])
    );
    assert!(north.subscriptions.includes("south-1"));
    assert!(!north.subscriptions.includes("south-2"));
    assert_eq!(config.north[1].subscriptions, Subscriptions::All);
    assert!(config.north[1].subscriptions.includes("anything"));
}

#[test]
fn north_validation_rejects_inconsistent_group_sizes() {
    let config = GatewayConfig::from_json(SAMPLE).expect("parsed");
    config.north[0].validate().expect("valid");
    config.south[0].validate().expect("valid");

    let err = config.north[1].validate().expect_err("invalid");
    match err {
        ConfigError::Connector { id, reason } => {
            assert_eq!(id, "north-2");
            assert!(reason.contains("max_send_count"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_caching_field_is_a_parse_error() {
    let json = r#"{ "north": [ { "id": "n", "name": "n", "type": "console",
        "caching": { "send_interval_ms": 1000 } } ] }"#;
    let err = GatewayConfig::from_json(json).expect_err("missing fields");
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn load_reads_file_from_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("connectors.json");
    std::fs::write(&path, SAMPLE).expect("write");
    let config = GatewayConfig::load(&path).expect("loaded");
    assert_eq!(config.north.len(), 2);

    let err = GatewayConfig::load(&dir.path().join("missing.json")).expect_err("missing");
    assert!(matches!(err, ConfigError::File(_)));
}
