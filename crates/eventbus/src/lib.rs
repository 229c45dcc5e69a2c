mod client;
mod publisher;
mod topic;

pub use client::{EventBusClient, PublishMetrics, TopicMap};
pub use publisher::{BoxFuture, EventPublisher, RecordedEvent, RecordingEventBus};
pub use topic::Topic;
