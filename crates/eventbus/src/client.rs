use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::topic::Topic;

/// Where each logical topic is bound on the external broker. Resolved once
/// at init from configuration/credentials, analogous to how
/// `apps/api/src/env.rs` resolves provider credentials once at startup.
#[derive(Debug, Clone, Default)]
pub struct TopicMap {
    urls: HashMap<&'static str, String>,
}

impl TopicMap {
    pub fn insert(mut self, topic: Topic, url: impl Into<String>) -> Self {
        self.urls.insert(topic.name(), url.into());
        self
    }

    fn url_for(&self, topic: Topic) -> Option<&str> {
        self.urls.get(topic.name()).map(String::as_str)
    }
}

/// Running counters for best-effort publish attempts, surfaced for
/// observability but never consulted to decide whether to raise an error
/// past the caller.
#[derive(Debug, Default)]
pub struct PublishMetrics {
    pub published: AtomicU64,
    pub failed: AtomicU64,
}

/// Process-wide client for publishing typed events to the external broker.
/// Publication is fire-and-forget: failures are logged and counted but
/// never propagated past `publish`, because the broker's own redelivery is
/// the system's only retry mechanism (see spec §4.2, §9).
#[derive(Clone)]
pub struct EventBusClient {
    http: reqwest::Client,
    topics: TopicMap,
    metrics: Arc<PublishMetrics>,
}

impl EventBusClient {
    /// Loads credentials/config and builds the underlying HTTP client.
    /// Call once at process start; there is no lazy per-request init.
    pub fn init(topics: TopicMap) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build event bus http client");

        Self {
            http,
            topics,
            metrics: Arc::new(PublishMetrics::default()),
        }
    }

    /// Same as publishing with an HTTP transport but entirely in-memory,
    /// for tests and for topics with no configured binding (a missing
    /// binding is logged and the publish is counted as failed, not
    /// raised — best-effort all the way down).
    pub fn metrics(&self) -> &PublishMetrics {
        &self.metrics
    }

    /// Publish `payload` under `topic`. Serializes to JSON, forwards to the
    /// broker, and returns whether the attempt succeeded. The caller is
    /// never expected to branch meaningfully on the result beyond logging —
    /// emission is best-effort.
    pub async fn publish(&self, topic: Topic, payload: &Value) -> bool {
        let Some(url) = self.topics.url_for(topic) else {
            tracing::warn!(topic = %topic, "event_bus_topic_unbound");
            self.metrics.failed.fetch_add(1, Ordering::Relaxed);
            return false;
        };

        match self.http.post(url).json(payload).send().await {
            Ok(resp) if resp.status().is_success() => {
                tracing::debug!(topic = %topic, "event_published");
                self.metrics.published.fetch_add(1, Ordering::Relaxed);
                true
            }
            Ok(resp) => {
                tracing::warn!(topic = %topic, status = %resp.status(), "event_publish_rejected");
                self.metrics.failed.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(e) => {
                tracing::warn!(topic = %topic, error = %e, "event_publish_failed");
                self.metrics.failed.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Flush any buffered state before shutdown. The HTTP transport has
    /// nothing to flush today; this exists so the process-wide lifecycle
    /// (init/teardown) is explicit rather than implicit, per spec §4.2.
    pub async fn teardown(&self) {
        tracing::info!(
            published = self.metrics.published.load(Ordering::Relaxed),
            failed = self.metrics.failed.load(Ordering::Relaxed),
            "event_bus_teardown"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_to_unbound_topic_is_counted_as_failed_not_raised() {
        let client = EventBusClient::init(TopicMap::default());
        let ok = client
            .publish(Topic::QuestionAnalysisReady, &serde_json::json!({}))
            .await;
        assert!(!ok);
        assert_eq!(client.metrics().failed.load(Ordering::Relaxed), 1);
    }
}
