use fg_config::{GatewayConfig, NorthConnectorConfig, SouthConnectorConfig};
use fg_engine::{ConnectorFactory, Engine, EngineError};
use fg_protocol::{NORTH_TYPES, ProtocolFactory, SOUTH_TYPES};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn caching() -> serde_json::Value {
    serde_json::json!({
        "send_interval_ms": 100, "retry_interval_ms": 100, "retry_count": 0,
        "timeout_ms": 1000, "group_count": 1, "max_send_count": 10,
        "archive": { "enabled": false, "retention_duration_hours": 0 }
    })
}

fn folder_config(input: &Path, output: &Path) -> GatewayConfig {
    let json = serde_json::json!({
        "scan_modes": [ { "id": "every-second", "name": "Every second", "cron": "* * * * * *" } ],
        "south": [{
            "id": "scanner",
            "name": "Scanner",
            "type": "folder-scanner",
            "settings": { "input_folder": input },
            "items": [{
                "id": "csv", "name": "CSV files", "scan_mode_id": "every-second",
                "settings": { "suffix": ".csv" }
            }]
        }],
        "north": [{
            "id": "writer",
            "name": "Writer",
            "type": "file-writer",
            "settings": { "output_folder": output, "prefix": "out-" },
            "caching": caching()
        }]
    });
    GatewayConfig::from_json(&json.to_string()).expect("parse config")
}

async fn wait_for(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    check()
}

#[test]
fn factory_knows_builtin_types() {
    let factory = ProtocolFactory;
    for kind in SOUTH_TYPES {
        let config: SouthConnectorConfig = serde_json::from_value(serde_json::json!({
            "id": "s", "name": "s", "type": kind,
            "settings": { "host": "127.0.0.1", "input_folder": "/tmp" }
        }))
        .expect("south config");
        assert!(factory.create_south(&config).is_ok(), "south type {kind}");
    }
    for kind in NORTH_TYPES {
        let config: NorthConnectorConfig = serde_json::from_value(serde_json::json!({
            "id": "n", "name": "n", "type": kind,
            "settings": { "host": "127.0.0.1", "topic": "gw/out", "output_folder": "/tmp" },
            "caching": caching()
        }))
        .expect("north config");
        assert!(factory.create_north(&config).is_ok(), "north type {kind}");
    }
}

#[test]
fn factory_rejects_unknown_type_and_bad_settings() {
    let factory = ProtocolFactory;
    let unknown: SouthConnectorConfig = serde_json::from_value(serde_json::json!({
        "id": "s", "name": "s", "type": "opcua"
    }))
    .expect("south config");
    assert!(matches!(
        factory.create_south(&unknown),
        Err(EngineError::UnknownType(kind)) if kind == "opcua"
    ));

    let missing_host: SouthConnectorConfig = serde_json::from_value(serde_json::json!({
        "id": "s", "name": "s", "type": "modbus", "settings": { "port": 502 }
    }))
    .expect("south config");
    assert!(matches!(
        factory.create_south(&missing_host),
        Err(EngineError::Config(_))
    ));
}

#[tokio::test]
async fn scanned_files_are_written_out() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("in");
    let output = dir.path().join("out");
    std::fs::create_dir_all(&input).expect("input dir");
    std::fs::write(input.join("report.csv"), b"a,b\n1,2\n").expect("write input");
    std::fs::write(input.join("notes.txt"), b"skip").expect("write input");

    let config = folder_config(&input, &output);
    let engine = Engine::new(
        dir.path().join("data"),
        Duration::from_secs(3600),
        config.scan_modes.clone(),
        Arc::new(ProtocolFactory),
    );
    let report = engine.start(&config).await;
    assert!(report.failed.is_empty(), "failures: {:?}", report.failed);

    let delivered = wait_for(Duration::from_secs(5), || {
        std::fs::read_dir(&output)
            .map(|entries| {
                entries.filter_map(Result::ok).any(|entry| {
                    let name = entry.file_name().to_string_lossy().into_owned();
                    name.starts_with("out-report") && name.ends_with(".csv")
                })
            })
            .unwrap_or(false)
    })
    .await;
    engine.stop().await;

    assert!(delivered);
    assert!(!input.join("report.csv").exists());
    assert!(input.join("notes.txt").exists());
}
