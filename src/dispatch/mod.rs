//! Real-time dispatch of validated records.
//!
//! Records are wrapped in an [`Envelope`] and handed to an [`EventSink`].
//! The production sink is [`DispatchChannel`], a reconnecting WebSocket
//! publisher; tests substitute their own sinks.

pub mod backoff;
pub mod channel;
pub mod dedup;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TransportError;
use crate::records::{CallRecord, TaskRecord, Topic};

pub use channel::DispatchChannel;
pub use dedup::Deduplicator;

/// Wire frame: `{"event": "new-task", "event_id": "...", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: Topic,
    /// Stable across replays of the same frame.
    pub event_id: Uuid,
    pub data: serde_json::Value,
}

impl Envelope {
    pub fn call(call: &CallRecord) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event: Topic::NewCall,
            event_id: Uuid::new_v4(),
            data: serde_json::to_value(call)?,
        })
    }

    pub fn task(task: &TaskRecord) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event: Topic::NewTask,
            event_id: Uuid::new_v4(),
            data: serde_json::to_value(task)?,
        })
    }

    /// Key a consumer should deduplicate on: the task id for tasks, the
    /// event id for everything else.
    pub fn idempotency_key(&self) -> String {
        match (self.event, self.data.get("id")) {
            (Topic::NewTask, Some(id)) => id.to_string(),
            _ => self.event_id.to_string(),
        }
    }
}

/// How a publish was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The transport accepted the frame.
    Ack,
    /// Held in the offline backlog for replay on reconnect.
    QueuedOffline,
}

/// Connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Reconnect gave up; only an explicit `connect()` leaves this state.
    Failed,
}

/// Anything records can be published to.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Publish one frame. Must not wait for a reconnect.
    async fn publish(&self, envelope: Envelope) -> Result<PublishOutcome, TransportError>;
}
