//! Best-effort mirroring of today's forecast to a paired companion device.
//!
//! The companion sees a four-field data map on [`COMPANION_PATH`]. Numbers
//! for temperatures travel as strings; readers accept either form.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use sunsync_core::CompanionConfig;

use crate::error::CompanionError;
use crate::types::WeatherRecord;

/// Topic path shared by the data item we publish and the inbound sync request
pub const COMPANION_PATH: &str = "/wearable";

pub const KEY_MAX_TEMP: &str = "max_temp";
pub const KEY_MIN_TEMP: &str = "min_temp";
pub const KEY_WEATHER_ID: &str = "weather_id";
pub const KEY_CURRENT_TIME: &str = "current_time";

pub type DataMap = Map<String, Value>;

/// Condensed view of the soonest forecast day
#[derive(Debug, Clone, PartialEq)]
pub struct CompanionMessage {
    pub min_temp: f64,
    pub max_temp: f64,
    pub weather_id: i32,
    pub sent_at: DateTime<Utc>,
}

impl CompanionMessage {
    pub fn from_record(record: &WeatherRecord, sent_at: DateTime<Utc>) -> Self {
        Self {
            min_temp: record.min_temp,
            max_temp: record.max_temp,
            weather_id: record.weather_condition_id,
            sent_at,
        }
    }

    pub fn to_data_map(&self) -> DataMap {
        let mut map = DataMap::new();
        map.insert(KEY_MAX_TEMP.into(), Value::String(self.max_temp.to_string()));
        map.insert(KEY_MIN_TEMP.into(), Value::String(self.min_temp.to_string()));
        map.insert(KEY_WEATHER_ID.into(), Value::from(self.weather_id));
        map.insert(
            KEY_CURRENT_TIME.into(),
            Value::from(self.sent_at.timestamp_millis()),
        );
        map
    }

    /// Decode a data map, accepting string-encoded numbers for every field.
    pub fn from_data_map(map: &DataMap) -> Result<Self, CompanionError> {
        let weather_id = i32::try_from(read_i64(map, KEY_WEATHER_ID)?)
            .map_err(|_| CompanionError::InvalidMessage(format!("{} out of range", KEY_WEATHER_ID)))?;
        let millis = read_i64(map, KEY_CURRENT_TIME)?;
        let sent_at = DateTime::from_timestamp_millis(millis).ok_or_else(|| {
            CompanionError::InvalidMessage(format!("{} out of range", KEY_CURRENT_TIME))
        })?;

        Ok(Self {
            min_temp: read_f64(map, KEY_MIN_TEMP)?,
            max_temp: read_f64(map, KEY_MAX_TEMP)?,
            weather_id,
            sent_at,
        })
    }
}

fn field<'a>(map: &'a DataMap, key: &str) -> Result<&'a Value, CompanionError> {
    map.get(key)
        .ok_or_else(|| CompanionError::InvalidMessage(format!("missing {}", key)))
}

fn read_f64(map: &DataMap, key: &str) -> Result<f64, CompanionError> {
    let value = field(map, key)?;
    let parsed = match value {
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };
    parsed.ok_or_else(|| CompanionError::InvalidMessage(format!("{} is not a number", key)))
}

fn read_i64(map: &DataMap, key: &str) -> Result<i64, CompanionError> {
    let value = field(map, key)?;
    let parsed = match value {
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Number(n) => n.as_i64(),
        _ => None,
    };
    parsed.ok_or_else(|| CompanionError::InvalidMessage(format!("{} is not an integer", key)))
}

/// Acknowledgement of a stored data item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataItemReceipt {
    pub uri: String,
}

/// Transport to the paired device.
#[async_trait]
pub trait CompanionChannel: Send + Sync {
    /// Establish a session with the peer.
    async fn connect(&self) -> Result<(), CompanionError>;

    /// Publish a data item under `path`.
    async fn put_data_item(&self, path: &str, item: DataMap)
        -> Result<DataItemReceipt, CompanionError>;
}

#[derive(Debug)]
pub enum MirrorOutcome {
    Delivered(DataItemReceipt),
    Failed(CompanionError),
}

impl MirrorOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered(_))
    }
}

/// Pushes [`CompanionMessage`]s; failures are logged once and returned, never raised.
pub struct CompanionMirror {
    channel: Arc<dyn CompanionChannel>,
    timeout: Duration,
}

impl CompanionMirror {
    pub fn new(channel: Arc<dyn CompanionChannel>, timeout: Duration) -> Self {
        Self { channel, timeout }
    }

    pub async fn push(&self, message: &CompanionMessage) -> MirrorOutcome {
        let outcome = match self.deliver(message).await {
            Ok(receipt) => MirrorOutcome::Delivered(receipt),
            Err(e) => MirrorOutcome::Failed(e),
        };

        match &outcome {
            MirrorOutcome::Delivered(receipt) => {
                tracing::info!("Data item set: {}", receipt.uri);
            }
            MirrorOutcome::Failed(e) if e.is_unavailable() => {
                tracing::info!("Companion unavailable, skipping mirror: {}", e);
            }
            MirrorOutcome::Failed(e) => {
                tracing::warn!("Companion mirror failed: {}", e);
            }
        }

        outcome
    }

    async fn deliver(&self, message: &CompanionMessage) -> Result<DataItemReceipt, CompanionError> {
        tokio::time::timeout(self.timeout, self.channel.connect())
            .await
            .map_err(|_| CompanionError::Timeout("handshake"))??;

        tokio::time::timeout(
            self.timeout,
            self.channel
                .put_data_item(COMPANION_PATH, message.to_data_map()),
        )
        .await
        .map_err(|_| CompanionError::Timeout("push"))?
    }
}

/// Companion reachable over HTTP at a configured base URL.
///
/// Handshake is `GET {peer}/ping`; publishing is `PUT {peer}{path}` with the
/// data map as a JSON object.
#[derive(Debug, Clone)]
pub struct HttpCompanionChannel {
    client: Arc<Client>,
    peer_url: Option<String>,
}

impl HttpCompanionChannel {
    pub fn new(config: &CompanionConfig) -> Result<Self, CompanionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CompanionError::Transport(e.to_string()))?;

        Ok(Self {
            client: Arc::new(client),
            peer_url: config
                .peer_url
                .as_deref()
                .map(|url| url.trim_end_matches('/').to_string()),
        })
    }

    fn peer(&self) -> Result<&str, CompanionError> {
        self.peer_url.as_deref().ok_or(CompanionError::NotPaired)
    }
}

#[async_trait]
impl CompanionChannel for HttpCompanionChannel {
    async fn connect(&self) -> Result<(), CompanionError> {
        let url = format!("{}/ping", self.peer()?);

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                CompanionError::Timeout("handshake")
            } else {
                CompanionError::HandshakeFailed(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            return Err(CompanionError::HandshakeFailed(format!(
                "peer answered {}",
                response.status()
            )));
        }

        tracing::debug!("Companion session established with {}", url);
        Ok(())
    }

    async fn put_data_item(
        &self,
        path: &str,
        item: DataMap,
    ) -> Result<DataItemReceipt, CompanionError> {
        let url = format!("{}{}", self.peer()?, path);

        let response = self
            .client
            .put(&url)
            .json(&item)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompanionError::Timeout("push")
                } else {
                    CompanionError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CompanionError::Rejected(format!("peer answered {}", status)));
        }

        let uri = response
            .json::<Value>()
            .await
            .ok()
            .and_then(|body| body.get("uri").and_then(Value::as_str).map(str::to_string))
            .unwrap_or(url);

        Ok(DataItemReceipt { uri })
    }
}
