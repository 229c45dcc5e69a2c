use std::pin::Pin;
use std::sync::Mutex;

use serde_json::Value;

use crate::client::EventBusClient;
use crate::topic::Topic;

pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Object-safe publish surface so orchestration components can depend on
/// "something that publishes events" without committing to the HTTP
/// transport — the production [`EventBusClient`] and the test-only
/// [`RecordingEventBus`] both implement it.
pub trait EventPublisher: Send + Sync {
    fn publish<'a>(&'a self, topic: Topic, payload: &'a Value) -> BoxFuture<'a, bool>;
}

impl EventPublisher for EventBusClient {
    fn publish<'a>(&'a self, topic: Topic, payload: &'a Value) -> BoxFuture<'a, bool> {
        Box::pin(async move { EventBusClient::publish(self, topic, payload).await })
    }
}

#[derive(Debug, Clone)]
pub struct RecordedEvent {
    pub topic: Topic,
    pub payload: Value,
}

/// In-memory stand-in for the broker, used by component tests that need to
/// assert "exactly one QUESTION_ANALYSIS_READY was emitted for this key"
/// without standing up an HTTP server.
#[derive(Default)]
pub struct RecordingEventBus {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, topic: Topic) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.topic.name() == topic.name())
            .count()
    }
}

impl EventPublisher for RecordingEventBus {
    fn publish<'a>(&'a self, topic: Topic, payload: &'a Value) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            self.events.lock().unwrap().push(RecordedEvent {
                topic,
                payload: payload.clone(),
            });
            true
        })
    }
}
