//! MQTT 适配：南向订阅、北向发布（rumqttc）。
//!
//! ```json
//! // south.settings / north.settings
//! { "host": "127.0.0.1", "port": 1883, "qos": 1 }
//!
//! // south item.settings
//! { "topic": "plant/+/temperature" }
//!
//! // north.settings 额外字段
//! { "topic": "gateway/values" }
//! ```

use crate::error::ProtocolError;
use crate::types::{MqttSettings, mqtt_options, parse_payload, parse_settings, qos_from_u8, topic_matches};
use async_trait::async_trait;
use domain::{CacheContent, SouthItem, TimeValue, now_epoch_ms};
use fg_north::{NorthConnector, NorthError};
use fg_south::{SouthCapabilities, SouthConnector, SouthError, SouthSink};
use rumqttc::{AsyncClient, Event, Packet};
use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Deserialize)]
struct MqttItemSettings {
    topic: String,
}

/// 已订阅的采集项及其主题过滤。
#[derive(Debug, Clone)]
struct Subscription {
    item_id: String,
    topic: String,
}

struct SouthSession {
    client: AsyncClient,
    task: JoinHandle<()>,
}

/// MQTT 南向连接器：订阅模式，收到报文即推送时序值。
pub struct MqttSouth {
    south_id: String,
    settings: MqttSettings,
    subscriptions: Arc<RwLock<Vec<Subscription>>>,
    session: Mutex<Option<SouthSession>>,
}

impl MqttSouth {
    pub fn from_settings(south_id: &str, settings: &serde_json::Value) -> Result<Self, ProtocolError> {
        Ok(Self {
            south_id: south_id.to_string(),
            settings: parse_settings(settings, "mqtt settings")?,
            subscriptions: Arc::new(RwLock::new(Vec::new())),
            session: Mutex::new(None),
        })
    }

    fn spawn_session(&self, sink: SouthSink) -> SouthSession {
        let options = mqtt_options(&self.settings, "south");
        let (client, mut eventloop) = AsyncClient::new(options, 10);
        let subscriptions = self.subscriptions.clone();
        let resubscribe = client.clone();
        let qos = qos_from_u8(self.settings.qos);
        let south_id = self.south_id.clone();
        let task = tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        // 重连后重新订阅
                        let topics: Vec<String> = subscriptions
                            .read()
                            .await
                            .iter()
                            .map(|sub| sub.topic.clone())
                            .collect();
                        for topic in topics {
                            if let Err(err) = resubscribe.subscribe(topic, qos).await {
                                warn!(target: "fg.protocol", south_id = %south_id, error = %err, "mqtt_subscribe_failed");
                            }
                        }
                        info!(target: "fg.protocol", south_id = %south_id, "mqtt_connected");
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let ts_ms = now_epoch_ms();
                        let value = parse_payload(&publish.payload);
                        let values: Vec<TimeValue> = subscriptions
                            .read()
                            .await
                            .iter()
                            .filter(|sub| topic_matches(&sub.topic, &publish.topic))
                            .map(|sub| TimeValue::new(sub.item_id.clone(), ts_ms, value.clone()))
                            .collect();
                        if values.is_empty() {
                            debug!(target: "fg.protocol", south_id = %south_id, topic = %publish.topic, "mqtt_topic_skipped");
                            continue;
                        }
                        if let Err(err) = sink.add_values(values).await {
                            warn!(target: "fg.protocol", south_id = %south_id, error = %err, "mqtt_values_rejected");
                        }
                    }
                    Ok(_) => {}
                    Err(err) => {
                        warn!(target: "fg.protocol", south_id = %south_id, error = %err, "mqtt_eventloop_error");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });
        SouthSession { client, task }
    }
}

#[async_trait]
impl SouthConnector for MqttSouth {
    fn capabilities(&self) -> SouthCapabilities {
        SouthCapabilities {
            subscription: true,
            ..Default::default()
        }
    }

    async fn disconnect(&self) -> Result<(), SouthError> {
        if let Some(session) = self.session.lock().await.take() {
            let _ = session.client.disconnect().await;
            session.task.abort();
        }
        self.subscriptions.write().await.clear();
        Ok(())
    }

    async fn subscribe(&self, items: &[SouthItem], sink: SouthSink) -> Result<(), SouthError> {
        let mut added = Vec::with_capacity(items.len());
        for item in items {
            let settings: MqttItemSettings = parse_settings(&item.settings, &item.id)?;
            added.push(Subscription {
                item_id: item.id.clone(),
                topic: settings.topic,
            });
        }
        self.subscriptions.write().await.extend(added.iter().cloned());

        let mut session = self.session.lock().await;
        match session.as_ref() {
            // 首次连接时由 ConnAck 统一订阅
            None => *session = Some(self.spawn_session(sink)),
            Some(existing) => {
                for sub in &added {
                    existing
                        .client
                        .subscribe(sub.topic.clone(), qos_from_u8(self.settings.qos))
                        .await
                        .map_err(|e| ProtocolError::Mqtt(e.to_string()))?;
                }
            }
        }
        info!(target: "fg.protocol", south_id = %self.south_id, items = added.len(), "mqtt_items_subscribed");
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct MqttNorthSettings {
    #[serde(flatten)]
    connection: MqttSettings,
    topic: String,
}

struct NorthSession {
    client: AsyncClient,
    task: JoinHandle<()>,
}

/// MQTT 北向连接器：时序值以 JSON 数组发布；文件内容原样发布。
pub struct MqttNorth {
    north_id: String,
    settings: MqttNorthSettings,
    connected: Arc<AtomicBool>,
    session: Mutex<Option<NorthSession>>,
}

impl MqttNorth {
    pub fn from_settings(north_id: &str, settings: &serde_json::Value) -> Result<Self, ProtocolError> {
        Ok(Self {
            north_id: north_id.to_string(),
            settings: parse_settings(settings, "mqtt settings")?,
            connected: Arc::new(AtomicBool::new(false)),
            session: Mutex::new(None),
        })
    }

    pub fn topic(&self) -> &str {
        &self.settings.topic
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// 发布载荷：时序值为 JSON 数组，文件为原始字节。
    pub async fn payload(content: &CacheContent) -> Result<Vec<u8>, ProtocolError> {
        match content {
            CacheContent::TimeValues { values } => serde_json::to_vec(values)
                .map_err(|e| ProtocolError::DataParse(e.to_string())),
            CacheContent::Raw { path } => tokio::fs::read(path)
                .await
                .map_err(|e| ProtocolError::DataParse(format!("{}: {}", path.display(), e))),
        }
    }
}

#[async_trait]
impl NorthConnector for MqttNorth {
    /// 启动事件循环并等待 ConnAck；超时返回传输错误，事件循环继续重连。
    async fn connect(&self) -> Result<(), NorthError> {
        let mut session = self.session.lock().await;
        if session.is_none() {
            let options = mqtt_options(&self.settings.connection, "north");
            let (client, mut eventloop) = AsyncClient::new(options, 10);
            let connected = self.connected.clone();
            let (ready_tx, _) = watch::channel(false);
            let ready = ready_tx.clone();
            let north_id = self.north_id.clone();
            let task = tokio::spawn(async move {
                loop {
                    match eventloop.poll().await {
                        Ok(Event::Incoming(Packet::ConnAck(_))) => {
                            connected.store(true, Ordering::SeqCst);
                            ready.send_replace(true);
                            info!(target: "fg.protocol", north_id = %north_id, "mqtt_connected");
                        }
                        Ok(_) => {}
                        Err(err) => {
                            connected.store(false, Ordering::SeqCst);
                            warn!(target: "fg.protocol", north_id = %north_id, error = %err, "mqtt_eventloop_error");
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                    }
                }
            });
            *session = Some(NorthSession { client, task });
            let mut ready_rx = ready_tx.subscribe();
            drop(session);
            let timeout = Duration::from_millis(self.settings.connection.connect_timeout_ms);
            let waited = tokio::time::timeout(timeout, ready_rx.wait_for(|ready| *ready)).await;
            if !matches!(waited, Ok(Ok(_))) {
                return Err(NorthError::Transport(format!(
                    "mqtt broker {}:{} not reachable",
                    self.settings.connection.host, self.settings.connection.port
                )));
            }
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), NorthError> {
        if let Some(session) = self.session.lock().await.take() {
            let _ = session.client.disconnect().await;
            session.task.abort();
        }
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn handle_content(&self, content: &CacheContent) -> Result<(), NorthError> {
        if !self.is_connected() {
            return Err(NorthError::Transport("mqtt not connected".to_string()));
        }
        let payload = Self::payload(content).await?;
        let session = self.session.lock().await;
        let Some(session) = session.as_ref() else {
            return Err(NorthError::Transport("mqtt session closed".to_string()));
        };
        session
            .client
            .publish(
                self.settings.topic.clone(),
                qos_from_u8(self.settings.connection.qos),
                false,
                payload,
            )
            .await
            .map_err(|e| NorthError::Transport(e.to_string()))?;
        debug!(target: "fg.protocol", north_id = %self.north_id, topic = %self.settings.topic, "mqtt_published");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::TimeValueData;

    #[test]
    fn north_settings_require_topic() {
        let json = serde_json::json!({"host": "localhost"});
        assert!(MqttNorth::from_settings("north-1", &json).is_err());
        let json = serde_json::json!({"host": "localhost", "topic": "gw/values", "qos": 1});
        let north = MqttNorth::from_settings("north-1", &json).expect("parse");
        assert_eq!(north.topic(), "gw/values");
        assert_eq!(north.settings.connection.port, 1883);
    }

    #[tokio::test]
    async fn publish_without_connection_is_a_transport_error() {
        let json = serde_json::json!({"host": "localhost", "topic": "gw/values"});
        let north = MqttNorth::from_settings("north-1", &json).expect("parse");
        let content = CacheContent::TimeValues {
            values: vec![TimeValue::new("p", 1, TimeValueData::I64(1))],
        };
        let err = north.handle_content(&content).await.expect_err("not connected");
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn values_payload_is_a_json_array() {
        let content = CacheContent::TimeValues {
            values: vec![TimeValue::new("p", 1, TimeValueData::F64(2.5))],
        };
        let payload = MqttNorth::payload(&content).await.expect("payload");
        let parsed: serde_json::Value = serde_json::from_slice(&payload).expect("json");
        assert_eq!(parsed[0]["pointId"], "p");
        assert_eq!(parsed[0]["value"], 2.5);
    }

    #[tokio::test]
    async fn south_items_need_a_topic() {
        let json = serde_json::json!({"host": "localhost"});
        let south = MqttSouth::from_settings("south-1", &json).expect("parse");
        assert!(south.capabilities().subscription);
        let item = SouthItem {
            id: "t".to_string(),
            name: "T".to_string(),
            scan_mode_id: domain::SUBSCRIPTION_SCAN_MODE.to_string(),
            enabled: true,
            settings: serde_json::Value::Null,
        };
        let sink = SouthSink::new(
            "south-1",
            Arc::new(NullSink),
            Arc::new(fg_telemetry::SouthMetrics::new()),
        );
        let err = south.subscribe(&[item], sink).await.expect_err("no topic");
        assert!(matches!(err, SouthError::Config(_)));
    }

    struct NullSink;

    #[async_trait]
    impl fg_south::ContentSink for NullSink {
        async fn add_values(&self, _source_id: &str, _values: Vec<TimeValue>) -> Result<(), SouthError> {
            Ok(())
        }

        async fn add_file(&self, _source_id: &str, _path: &std::path::Path) -> Result<(), SouthError> {
            Ok(())
        }
    }
}
