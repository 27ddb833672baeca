use async_trait::async_trait;
use domain::{CacheContent, SouthItem, TimeValue, TimeValueData, now_epoch_ms};
use fg_config::{GatewayConfig, NorthConnectorConfig, SouthConnectorConfig};
use fg_engine::{ConnectorFactory, Engine, EngineError, EngineRouter};
use fg_north::{NorthConnector, NorthError};
use fg_south::{ContentSink, SouthCapabilities, SouthConnector, SouthError, SouthSink};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const CONFIG: &str = r#"{
  "scan_modes": [
    { "id": "every-second", "name": "Every second", "cron": "* * * * * *" }
  ],
  "south": [
    {
      "id": "south-a",
      "name": "Plant A",
      "type": "counter",
      "items": [ { "id": "temp", "name": "Temperature", "scan_mode_id": "every-second" } ]
    },
    {
      "id": "south-broken",
      "name": "Broken",
      "type": "counter",
      "items": [ { "id": "x", "name": "X", "scan_mode_id": "missing-mode" } ]
    },
    {
      "id": "south-off",
      "name": "Disabled",
      "type": "counter",
      "enabled": false,
      "items": []
    }
  ],
  "north": [
    {
      "id": "north-all",
      "name": "All sources",
      "type": "recording",
      "caching": {
        "send_interval_ms": 100, "retry_interval_ms": 100, "retry_count": 0,
        "timeout_ms": 1000, "group_count": 1, "max_send_count": 10
      }
    },
    {
      "id": "north-other",
      "name": "Other sources",
      "type": "recording",
      "caching": {
        "send_interval_ms": 100, "retry_interval_ms": 100, "retry_count": 0,
        "timeout_ms": 1000, "group_count": 1, "max_send_count": 10
      },
      "subscriptions": { "sources": ["south-z"] }
    },
    {
      "id": "north-invalid",
      "name": "Invalid",
      "type": "recording",
      "caching": {
        "send_interval_ms": 100, "retry_interval_ms": 100, "retry_count": 0,
        "timeout_ms": 1000, "group_count": 10, "max_send_count": 5
      }
    },
    {
      "id": "north-unknown",
      "name": "Unknown",
      "type": "carrier-pigeon",
      "caching": {
        "send_interval_ms": 100, "retry_interval_ms": 100, "retry_count": 0,
        "timeout_ms": 1000, "group_count": 1, "max_send_count": 5
      }
    }
  ]
}"#;

struct CounterSouth;

#[async_trait]
impl SouthConnector for CounterSouth {
    fn capabilities(&self) -> SouthCapabilities {
        SouthCapabilities {
            last_point: true,
            ..Default::default()
        }
    }

    async fn last_point_query(
        &self,
        items: &[SouthItem],
        sink: &SouthSink,
    ) -> Result<(), SouthError> {
        let ts_ms = now_epoch_ms();
        let values = items
            .iter()
            .map(|item| TimeValue::new(item.id.clone(), ts_ms, TimeValueData::F64(21.5)))
            .collect();
        sink.add_values(values).await
    }
}

#[derive(Default)]
struct RecordingNorth {
    received: Mutex<Vec<TimeValue>>,
}

impl RecordingNorth {
    fn count(&self) -> usize {
        self.received.lock().expect("received").len()
    }
}

#[async_trait]
impl NorthConnector for RecordingNorth {
    async fn handle_content(&self, content: &CacheContent) -> Result<(), NorthError> {
        if let CacheContent::TimeValues { values } = content {
            self.received
                .lock()
                .expect("received")
                .extend(values.iter().cloned());
        }
        Ok(())
    }
}

#[derive(Default)]
struct TestFactory {
    norths: Mutex<HashMap<String, Arc<RecordingNorth>>>,
}

impl TestFactory {
    fn north(&self, id: &str) -> Arc<RecordingNorth> {
        self.norths
            .lock()
            .expect("norths")
            .get(id)
            .cloned()
            .expect("north created")
    }
}

impl ConnectorFactory for TestFactory {
    fn create_south(
        &self,
        config: &SouthConnectorConfig,
    ) -> Result<Arc<dyn SouthConnector>, EngineError> {
        match config.kind.as_str() {
            "counter" => Ok(Arc::new(CounterSouth)),
            other => Err(EngineError::UnknownType(other.to_string())),
        }
    }

    fn create_north(
        &self,
        config: &NorthConnectorConfig,
    ) -> Result<Arc<dyn NorthConnector>, EngineError> {
        match config.kind.as_str() {
            "recording" => {
                let north = Arc::new(RecordingNorth::default());
                self.norths
                    .lock()
                    .expect("norths")
                    .insert(config.id.clone(), north.clone());
                Ok(north)
            }
            other => Err(EngineError::UnknownType(other.to_string())),
        }
    }
}

fn engine(dir: &std::path::Path, config: &GatewayConfig, factory: Arc<TestFactory>) -> Engine {
    Engine::new(
        dir.to_path_buf(),
        Duration::from_secs(3600),
        config.scan_modes.clone(),
        factory,
    )
}

#[tokio::test]
async fn misconfigured_connectors_are_skipped() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = GatewayConfig::from_json(CONFIG).expect("parse config");
    let factory = Arc::new(TestFactory::default());
    let engine = engine(dir.path(), &config, factory);

    let report = engine.start(&config).await;
    assert_eq!(report.started_north, vec!["north-all", "north-other"]);
    assert_eq!(report.started_south, vec!["south-a"]);
    let failed: Vec<&str> = report.failed.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(failed, vec!["north-invalid", "north-unknown", "south-broken"]);
    assert!(report.failed[0].reason.contains("max_send_count"));

    assert!(engine.south("south-off").await.is_none());
    assert!(dir.path().join("north-north-all").join("cache.db").exists());
    engine.stop().await;
    assert!(engine.souths().await.is_empty());
    assert!(engine.norths().await.is_empty());
}

#[tokio::test]
async fn values_flow_from_south_to_subscribed_norths() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = GatewayConfig::from_json(CONFIG).expect("parse config");
    let factory = Arc::new(TestFactory::default());
    let engine = engine(dir.path(), &config, factory.clone());
    engine.start(&config).await;

    let all = factory.north("north-all");
    let other = factory.north("north-other");
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while all.count() < 2 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    engine.stop().await;

    assert!(all.count() >= 2, "received {}", all.count());
    assert_eq!(other.count(), 0);
    let received = all.received.lock().expect("received").clone();
    assert!(received.iter().all(|value| value.point_id == "temp"));
}

#[tokio::test]
async fn connectors_can_be_stopped_individually() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = GatewayConfig::from_json(CONFIG).expect("parse config");
    let factory = Arc::new(TestFactory::default());
    let engine = engine(dir.path(), &config, factory);
    engine.start(&config).await;

    engine.stop_south("south-a").await.expect("stop south");
    assert!(engine.south("south-a").await.is_none());
    assert!(matches!(
        engine.stop_south("south-a").await,
        Err(EngineError::NotFound(_))
    ));

    engine.stop_north("north-other").await.expect("stop north");
    assert!(engine.north("north-other").await.is_none());
    assert!(engine.north("north-all").await.is_some());

    let north = config
        .north
        .iter()
        .find(|north| north.id == "north-all")
        .expect("north config");
    assert!(matches!(
        engine.start_north(north).await,
        Err(EngineError::Duplicate(_))
    ));
    engine.stop().await;
}

#[tokio::test]
async fn router_without_subscribers_accepts_content() {
    let router = EngineRouter::new();
    router
        .add_values("south-a", vec![TimeValue::new("p", 1, TimeValueData::Bool(true))])
        .await
        .expect("route values");
    assert!(router.list().await.is_empty());
}

#[tokio::test]
async fn router_reports_content_no_subscribed_north_accepted() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = GatewayConfig::from_json(CONFIG).expect("parse config");
    let factory = Arc::new(TestFactory::default());
    let engine = engine(dir.path(), &config, factory);
    engine.start(&config).await;
    let router = engine.router();

    let missing = dir.path().join("missing.csv");
    let err = router
        .add_file("south-a", &missing)
        .await
        .expect_err("missing file");
    assert!(matches!(err, SouthError::Io(ref message) if message.contains("north-all")));
    let north = engine.north("north-all").await.expect("north-all");
    assert!(north.list_pending().await.iter().all(|entry| !entry.is_file()));
    let files = dir.path().join("north-north-all").join("files");
    assert_eq!(std::fs::read_dir(&files).expect("files").count(), 0);

    let present = dir.path().join("present.csv");
    std::fs::write(&present, b"1,2\n").expect("write");
    router
        .add_file("south-a", &present)
        .await
        .expect("route file");
    engine.stop().await;
}
