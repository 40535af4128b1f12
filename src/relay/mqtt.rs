//! MQTT transport behind the [`Publisher`](super::Publisher) trait.

use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS, Transport};

use super::{PublishError, Publisher};
use crate::config::MqttSettings;

/// Publishes must not block ingestion indefinitely.
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

/// QoS 0, no retain: at-most-once, matching the relay's best-effort
/// delivery contract.
pub struct MqttPublisher {
    client: AsyncClient,
}

impl MqttPublisher {
    /// Build the client and spawn the event-loop driver task. The
    /// event loop reconnects on its own; while the broker is down,
    /// publishes fail and their messages are lost.
    pub fn connect(settings: &MqttSettings) -> Self {
        let client_id = format!("linkpulse-{}", std::process::id());
        let mut options = MqttOptions::new(client_id, &settings.host, settings.port);
        options.set_keep_alive(Duration::from_secs(60));
        if let Some(username) = &settings.username {
            options.set_credentials(username, settings.password.as_deref().unwrap_or(""));
        }
        if settings.tls {
            options.set_transport(Transport::tls_with_default_config());
        }

        let (client, mut eventloop) = AsyncClient::new(options, 64);

        tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        tracing::info!("MQTT connected");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("MQTT connection error: {}; retrying", e);
                        tokio::time::sleep(Duration::from_secs(2)).await;
                    }
                }
            }
        });

        Self { client }
    }
}

#[async_trait]
impl Publisher for MqttPublisher {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), PublishError> {
        let send = self
            .client
            .publish(topic, QoS::AtMostOnce, false, payload.as_bytes().to_vec());
        match tokio::time::timeout(PUBLISH_TIMEOUT, send).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(PublishError::Transport(e.to_string())),
            Err(_) => Err(PublishError::Timeout(PUBLISH_TIMEOUT)),
        }
    }
}
