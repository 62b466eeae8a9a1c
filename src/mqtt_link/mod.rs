//! MqttLink - broker connection and frame distribution
//!
//! ## Responsibilities
//!
//! - Owning the single broker connection and its event-loop task
//! - Reference-counted topic subscriptions shared by independent consumers
//! - Fanning raw frames out over a broadcast channel
//! - Publishing device commands with request ids
//! - Exposing link status for the connectivity indicator
//!
//! The link is constructed once at the composition root and injected into
//! consumers; its lifecycle is independent of any single consumer. Delivery
//! is a channel, not a callback: consumers pull frames at their own pace and
//! a slow consumer only loses its own backlog.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::error::Result;
use crate::ingest::topics;

/// Frame channel depth; a consumer that lags further than this loses the
/// oldest frames, never blocks the connection
const FRAME_CHANNEL_CAPACITY: usize = 256;

/// Broker connection settings
#[derive(Debug, Clone)]
pub struct MqttLinkConfig {
    pub host: String,
    pub port: u16,
    pub client_id: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive_secs: u64,
}

impl Default for MqttLinkConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: None,
            username: None,
            password: None,
            keep_alive_secs: 60,
        }
    }
}

/// Connection status, always queryable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// One raw frame as received from the broker
#[derive(Debug, Clone)]
pub struct Frame {
    pub topic: String,
    pub payload: Bytes,
}

/// Outbound device command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceCommand {
    pub command: String,
    pub device_id: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Wire shape published on the command topic
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CommandEnvelope {
    command: String,
    device_id: String,
    timestamp: DateTime<Utc>,
    payload: serde_json::Value,
    request_id: String,
}

/// Shared broker connection
pub struct MqttLink {
    client: AsyncClient,
    status: Arc<RwLock<LinkStatus>>,
    // Shared with the event loop, which replays the held topics after a
    // reconnect (the broker forgets them with a clean session)
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,
    frames_tx: broadcast::Sender<Frame>,
    running: Arc<RwLock<bool>>,
}

impl MqttLink {
    /// Build the client and spawn the event-loop task. The task keeps
    /// polling (and reconnecting) until [`shutdown`](Self::shutdown).
    pub fn connect(config: MqttLinkConfig) -> Arc<Self> {
        let client_id = config
            .client_id
            .clone()
            .unwrap_or_else(|| format!("gatewatch-{}", Uuid::new_v4()));

        let mut options = MqttOptions::new(client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            options.set_credentials(user, pass);
        }

        let (client, eventloop) = AsyncClient::new(options, 64);
        let (frames_tx, _) = broadcast::channel(FRAME_CHANNEL_CAPACITY);
        let status = Arc::new(RwLock::new(LinkStatus::Connecting));
        let subscriptions = Arc::new(RwLock::new(HashMap::new()));
        let running = Arc::new(RwLock::new(true));

        let link = Arc::new(Self {
            client: client.clone(),
            status: status.clone(),
            subscriptions: subscriptions.clone(),
            frames_tx: frames_tx.clone(),
            running: running.clone(),
        });

        tokio::spawn(Self::run_event_loop(
            eventloop,
            client,
            status,
            subscriptions,
            frames_tx,
            running,
        ));

        tracing::info!(
            host = %config.host,
            port = config.port,
            "MQTT link starting"
        );

        link
    }

    async fn run_event_loop(
        mut eventloop: rumqttc::EventLoop,
        client: AsyncClient,
        status: Arc<RwLock<LinkStatus>>,
        subscriptions: Arc<RwLock<HashMap<String, usize>>>,
        frames_tx: broadcast::Sender<Frame>,
        running: Arc<RwLock<bool>>,
    ) {
        while *running.read().await {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    *status.write().await = LinkStatus::Connected;
                    // The session is clean, so the broker dropped every
                    // subscription across the reconnect; replay them all
                    let topics: Vec<String> =
                        subscriptions.read().await.keys().cloned().collect();
                    for topic in &topics {
                        if let Err(e) = client.subscribe(topic, QoS::AtLeastOnce).await {
                            tracing::warn!(
                                topic = %topic,
                                error = %e,
                                "Subscription replay failed"
                            );
                        }
                    }
                    tracing::info!(subscriptions = topics.len(), "MQTT connected");
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let frame = Frame {
                        topic: publish.topic.clone(),
                        payload: publish.payload.clone(),
                    };
                    // No receivers is fine; frames are simply dropped
                    let _ = frames_tx.send(frame);
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    *status.write().await = LinkStatus::Disconnected;
                    tracing::warn!("MQTT broker sent disconnect");
                }
                Ok(_) => {}
                Err(e) => {
                    *status.write().await = LinkStatus::Error;
                    tracing::warn!(error = %e, "MQTT connection error, retrying");
                    // rumqttc reconnects on the next poll; pace the retries
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
        *status.write().await = LinkStatus::Disconnected;
        tracing::info!("MQTT event loop stopped");
    }

    /// Receiver for the raw frame stream
    pub fn frames(&self) -> broadcast::Receiver<Frame> {
        self.frames_tx.subscribe()
    }

    /// Current link status
    pub async fn status(&self) -> LinkStatus {
        *self.status.read().await
    }

    /// Subscribe to a topic. Subscriptions are reference-counted so
    /// independent consumers can share topics; only the first reference
    /// reaches the broker.
    pub async fn subscribe(&self, topic: &str) -> Result<()> {
        let mut subs = self.subscriptions.write().await;
        let count = subs.entry(topic.to_string()).or_insert(0);
        *count += 1;
        if *count == 1 {
            self.client.subscribe(topic, QoS::AtLeastOnce).await?;
            tracing::debug!(topic = %topic, "Subscribed");
        }
        Ok(())
    }

    /// Drop one reference to a topic; the broker unsubscribe happens when
    /// the last reference goes away
    pub async fn unsubscribe(&self, topic: &str) -> Result<()> {
        let mut subs = self.subscriptions.write().await;
        match subs.get_mut(topic) {
            Some(count) if *count > 1 => {
                *count -= 1;
            }
            Some(_) => {
                subs.remove(topic);
                self.client.unsubscribe(topic).await?;
                tracing::debug!(topic = %topic, "Unsubscribed");
            }
            None => {}
        }
        Ok(())
    }

    /// Publish a command to the device command topic, returning the
    /// generated request id for correlation with the response topic
    pub async fn publish_command(&self, command: DeviceCommand) -> Result<String> {
        let request_id = Uuid::new_v4().to_string();
        let envelope = CommandEnvelope {
            command: command.command,
            device_id: command.device_id,
            timestamp: Utc::now(),
            payload: command.payload,
            request_id: request_id.clone(),
        };
        let body = serde_json::to_vec(&envelope)?;

        self.client
            .publish(topics::TOPIC_COMMAND, QoS::AtLeastOnce, false, body)
            .await?;

        tracing::info!(
            command = %envelope.command,
            device_id = %envelope.device_id,
            request_id = %request_id,
            "Command published"
        );
        Ok(request_id)
    }

    /// Stop the event loop and disconnect
    pub async fn shutdown(&self) {
        *self.running.write().await = false;
        if let Err(e) = self.client.disconnect().await {
            tracing::debug!(error = %e, "Disconnect on shutdown failed");
        }
    }
}
