//! Mutation events (`created<Name>`, `updatedOne<Name>`, ...) and their publisher.

use crate::error::ResolverError;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResolverEvent {
    /// Event name, e.g. `createdTodoItem`.
    pub name: String,
    /// Id of the resolver that produced it.
    pub resolver: String,
    pub payload: Value,
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: ResolverEvent) -> Result<(), ResolverError>;
}

/// Fan-out over a tokio broadcast channel. Events published with no subscriber are dropped.
pub struct BroadcastPublisher {
    sender: broadcast::Sender<ResolverEvent>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        BroadcastPublisher { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ResolverEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EventPublisher for BroadcastPublisher {
    async fn publish(&self, event: ResolverEvent) -> Result<(), ResolverError> {
        if let Err(broadcast::error::SendError(event)) = self.sender.send(event) {
            tracing::debug!(event = %event.name, "no subscribers, event dropped");
        }
        Ok(())
    }
}
