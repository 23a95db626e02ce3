//! In-memory `EventBus`, used by tests and the CLI's offline path (spec §1
//! leaves a production EventBus external). Backed by `tokio::sync::broadcast`
//! — publishing from a single task (the orchestrator drives one execution
//! sequentially) preserves per-key ordering as spec §5 requires.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::OrchestratorError;
use crate::ports::{Event, EventBus, EventKind};

pub struct InMemoryEventBus {
    sender: broadcast::Sender<Event>,
}

impl InMemoryEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to every event; callers filter by `agent_id`/`execution_id`
    /// themselves (the spec's EventBus is keyed by both, but a single
    /// broadcast channel with client-side filtering is sufficient here).
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, kind: EventKind, agent_id: &str, execution_id: Uuid, payload: Value) -> Result<(), OrchestratorError> {
        let event = Event {
            topic: kind.topic(agent_id),
            agent_id: agent_id.to_string(),
            execution_id,
            payload,
            ts: Utc::now(),
        };
        tracing::debug!(topic = %event.topic, %execution_id, "publishing event");
        // A lagging/absent subscriber is not an orchestrator failure — the
        // teacher has no equivalent since it has no pub/sub at all; this
        // mirrors how `tokio::sync::broadcast::Sender::send` is meant to be
        // used (it only errors when there are zero receivers, which is the
        // normal case between tests/subscriptions).
        let _ = self.sender.send(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn events_are_observed_in_publish_order() {
        let bus = InMemoryEventBus::default();
        let mut rx = bus.subscribe();
        let execution_id = Uuid::new_v4();

        bus.publish(EventKind::ExecutionStarted, "agent-1", execution_id, json!({})).await.unwrap();
        bus.publish(EventKind::StepUpdate, "agent-1", execution_id, json!({"stepId": "a"})).await.unwrap();
        bus.publish(EventKind::ExecutionCompleted, "agent-1", execution_id, json!({})).await.unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        let third = rx.recv().await.unwrap();

        assert!(first.topic.ends_with("execution:started"));
        assert!(second.topic.ends_with("step:update"));
        assert!(third.topic.ends_with("execution:completed"));
    }
}
