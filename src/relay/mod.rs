//! Republishing probe measurements to an external pub/sub bus.
//!
//! The relay owns its own [`Tailer`] over the log file, fully
//! independent of the summary cache's cursor: the two are consumed on
//! different schedules and fail independently.

mod mqtt;

pub use mqtt::*;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::record::ProbeRecord;
use crate::tail::{TailEvent, Tailer};

/// Publish error types.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("publish timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport error: {0}")]
    Transport(String),
}

/// Capability to publish one payload to one topic. Delivery is
/// fire-and-forget: failures are reported but never retried for the
/// same message.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), PublishError>;
}

/// Tails the log on a fixed interval and forwards each new line to a
/// [`Publisher`], raw and as a derived status record.
pub struct RecordRelay {
    log_path: PathBuf,
    topic_prefix: String,
    poll_interval: Duration,
    publisher: Arc<dyn Publisher>,
    stop: Arc<Mutex<Option<tokio::sync::broadcast::Sender<()>>>>,
}

impl RecordRelay {
    pub fn new<P: Into<PathBuf>>(
        log_path: P,
        topic_prefix: &str,
        poll_interval: Duration,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            log_path: log_path.into(),
            topic_prefix: topic_prefix.to_string(),
            poll_interval,
            publisher,
            stop: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the relay background task.
    pub fn start(&self) {
        let publisher = self.publisher.clone();
        let prefix = self.topic_prefix.clone();
        let path = self.log_path.clone();
        let poll_interval = self.poll_interval;
        let stop = self.stop.clone();

        tokio::spawn(async move {
            let (tx, _) = tokio::sync::broadcast::channel(1);
            {
                let mut stop_guard = stop.lock().await;
                *stop_guard = Some(tx.clone());
            }

            let mut rx = tx.subscribe();
            let mut tailer = Tailer::new(path);
            let mut interval = tokio::time::interval(poll_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = rx.recv() => break,
                    _ = interval.tick() => {
                        relay_once(&mut tailer, publisher.as_ref(), &prefix).await;
                    }
                }
            }
            tracing::info!("Relay stopped");
        });
    }

    /// Stop the relay. In-flight publishes are abandoned.
    pub async fn stop(&self) {
        let stop = self.stop.lock().await;
        if let Some(tx) = stop.as_ref() {
            let _ = tx.send(());
        }
    }
}

/// One poll cycle: consume new lines and publish them. The cursor
/// advances whether or not publishing succeeds, so a dead downstream
/// never blocks ingestion; it only loses messages while it is down.
async fn relay_once(tailer: &mut Tailer, publisher: &dyn Publisher, prefix: &str) {
    match tailer.poll() {
        Ok(TailEvent::Grown(lines)) => {
            for line in &lines {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                publish_line(publisher, prefix, line).await;
            }
        }
        Ok(TailEvent::Rotated) => {
            tracing::info!("Relay: log rotated, relaying the new file from the start");
        }
        Ok(TailEvent::Absent) | Ok(TailEvent::Unchanged) => {}
        Err(e) => {
            // Interval pacing is the backoff; the cursor did not move.
            tracing::warn!("Relay poll failed on {}: {}", tailer.path().display(), e);
        }
    }
}

/// Publish the raw line, then a derived status record when it parses.
async fn publish_line(publisher: &dyn Publisher, prefix: &str, line: &str) {
    let topic = format!("{prefix}/measurements");
    if let Err(e) = publisher.publish(&topic, line).await {
        tracing::warn!("Relay publish to {} failed: {}", topic, e);
    }

    let Some(record) = ProbeRecord::parse(line) else {
        return;
    };

    let internet_up = record.loss_pct.map(|loss| loss < 100.0);
    let status = json!({
        "timestamp": record.raw_field("timestamp"),
        "target": record.endpoint(),
        "loss_pct": record.raw_field("loss_pct"),
        "rtt_avg_ms": record.raw_field("rtt_avg_ms"),
        "internet_up": internet_up,
    });

    let topic = format!("{prefix}/status");
    if let Err(e) = publisher.publish(&topic, &status.to_string()).await {
        tracing::warn!("Relay publish to {} failed: {}", topic, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use std::path::Path;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingPublisher {
        messages: std::sync::Mutex<Vec<(String, String)>>,
    }

    impl RecordingPublisher {
        fn take(&self) -> Vec<(String, String)> {
            std::mem::take(&mut *self.messages.lock().unwrap())
        }
    }

    #[async_trait]
    impl Publisher for RecordingPublisher {
        async fn publish(&self, topic: &str, payload: &str) -> Result<(), PublishError> {
            self.messages
                .lock()
                .unwrap()
                .push((topic.to_string(), payload.to_string()));
            Ok(())
        }
    }

    struct FailingPublisher;

    #[async_trait]
    impl Publisher for FailingPublisher {
        async fn publish(&self, _topic: &str, _payload: &str) -> Result<(), PublishError> {
            Err(PublishError::Transport("broker down".to_string()))
        }
    }

    fn append(path: &Path, data: &str) {
        let mut f = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        f.write_all(data.as_bytes()).unwrap();
    }

    fn status_of(messages: &[(String, String)]) -> serde_json::Value {
        let payload = &messages
            .iter()
            .find(|(t, _)| t.ends_with("/status"))
            .expect("no status message")
            .1;
        serde_json::from_str(payload).unwrap()
    }

    #[tokio::test]
    async fn test_degraded_probe_is_up() {
        let publisher = RecordingPublisher::default();
        publish_line(
            &publisher,
            "connectivity",
            r#"{"timestamp":"2024-06-01T00:00:00Z","target":"GoogleDNS","loss_pct":45,"rtt_avg_ms":20.1}"#,
        )
        .await;

        let messages = publisher.take();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].0, "connectivity/measurements");

        let status = status_of(&messages);
        assert_eq!(status["internet_up"], true);
        assert_eq!(status["loss_pct"], 45);
        assert_eq!(status["target"], "GoogleDNS");
        assert_eq!(status["rtt_avg_ms"], 20.1);
    }

    #[tokio::test]
    async fn test_full_loss_is_down() {
        let publisher = RecordingPublisher::default();
        publish_line(
            &publisher,
            "connectivity",
            r#"{"timestamp":"2024-06-01T00:00:00Z","dst_host":"8.8.8.8","loss_pct":100}"#,
        )
        .await;

        let status = status_of(&publisher.take());
        assert_eq!(status["internet_up"], false);
        assert_eq!(status["target"], "8.8.8.8");
        assert!(status["rtt_avg_ms"].is_null());
    }

    #[tokio::test]
    async fn test_missing_loss_is_unknown() {
        let publisher = RecordingPublisher::default();
        publish_line(
            &publisher,
            "connectivity",
            r#"{"timestamp":"2024-06-01T00:00:00Z","target":"GoogleDNS"}"#,
        )
        .await;

        let status = status_of(&publisher.take());
        assert!(status["internet_up"].is_null());
        assert!(status["loss_pct"].is_null());
    }

    #[tokio::test]
    async fn test_malformed_line_publishes_raw_only() {
        let publisher = RecordingPublisher::default();
        publish_line(&publisher, "connectivity", "not-json").await;

        let messages = publisher.take();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, "connectivity/measurements");
        assert_eq!(messages[0].1, "not-json");
    }

    #[tokio::test]
    async fn test_cursor_advances_past_publish_failures() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("connectivity.log");
        append(&path, "{\"timestamp\":\"2024-06-01T00:00:00Z\",\"loss_pct\":0}\n");

        let mut tailer = Tailer::new(&path);
        relay_once(&mut tailer, &FailingPublisher, "connectivity").await;
        let offset = tailer.offset();
        assert!(offset > 0);

        // Nothing is replayed once the downstream recovers.
        let publisher = RecordingPublisher::default();
        relay_once(&mut tailer, &publisher, "connectivity").await;
        assert!(publisher.take().is_empty());
        assert_eq!(tailer.offset(), offset);
    }

    #[tokio::test]
    async fn test_background_relay_and_shutdown() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("connectivity.log");
        append(&path, "{\"timestamp\":\"2024-06-01T00:00:00Z\",\"loss_pct\":0}\n");

        let publisher = Arc::new(RecordingPublisher::default());
        let relay = RecordRelay::new(
            &path,
            "connectivity",
            Duration::from_millis(10),
            publisher.clone(),
        );
        relay.start();
        tokio::time::sleep(Duration::from_millis(100)).await;

        append(&path, "{\"timestamp\":\"2024-06-01T00:01:00Z\",\"loss_pct\":100}\n");
        tokio::time::sleep(Duration::from_millis(100)).await;

        relay.stop().await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let measurements: Vec<_> = publisher
            .take()
            .into_iter()
            .filter(|(t, _)| t.ends_with("/measurements"))
            .collect();
        assert_eq!(measurements.len(), 2);

        // Stopped: further appends are not relayed.
        append(&path, "{\"timestamp\":\"2024-06-01T00:02:00Z\",\"loss_pct\":0}\n");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(publisher.take().is_empty());
    }
}
