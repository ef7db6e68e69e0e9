//! Progress events published while a job runs
//!
//! The job-status layer subscribes to follow a run without polling the
//! context. Publishing never blocks and never fails the pipeline.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

/// What happened
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    PlanCreated { phases: Vec<String> },
    PhaseStarted { index: usize, name: String, parallel: bool },
    AgentStarted { agent_id: String },
    AgentCompleted { agent_id: String },
    AgentFailed { agent_id: String, error: String },
    PhaseFinished { index: usize, name: String, completed: usize, failed: usize },
    ContextCompressed { rewritten: usize, token_estimate: usize },
    Replanned { phases: Vec<String> },
    Completed { phases_executed: usize },
    Failed { code: String, error: String },
}

/// Event emitted during a job run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineEvent {
    pub job_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

/// Broadcast channel shared by the orchestrator and executor of one job
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, job_id: &str, kind: EventKind) {
        // No subscribers is fine
        let _ = self.sender.send(PipelineEvent {
            job_id: job_id.to_string(),
            timestamp: Utc::now(),
            kind,
        });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish("job-1", EventKind::AgentStarted { agent_id: "a".into() });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.job_id, "job-1");
        assert_eq!(event.kind, EventKind::AgentStarted { agent_id: "a".into() });
    }

    #[test]
    fn test_publish_without_subscribers() {
        EventBus::new(0).publish("job-1", EventKind::Completed { phases_executed: 0 });
    }

    #[test]
    fn test_event_serializes_flat() {
        let event = PipelineEvent {
            job_id: "job-1".into(),
            timestamp: Utc::now(),
            kind: EventKind::AgentFailed {
                agent_id: "a".into(),
                error: "boom".into(),
            },
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "agent_failed");
        assert_eq!(value["agent_id"], "a");
        assert_eq!(value["job_id"], "job-1");
    }
}
