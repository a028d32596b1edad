//! Core AgentMesh trait for actor-to-actor delivery

use async_trait::async_trait;
use omni_core::AgentId;

use crate::{error::MeshResult, message::Message};

/// Fire-and-forget transport between actors.
///
/// `send` only enqueues; it never waits for the recipient to process the
/// message. Delivery is FIFO per recipient and at-least-once: recipients
/// must tolerate duplicates, which share a [`MessageId`](omni_core::MessageId).
#[async_trait]
pub trait AgentMesh: Send + Sync {
    /// Enqueue a message on the recipient's mailbox
    ///
    /// # Errors
    ///
    /// Returns `MeshError::AgentNotFound` if no mailbox is registered for
    /// `to`, or `MeshError::MailboxClosed` if it was dropped.
    async fn send(&self, to: &AgentId, message: Message) -> MeshResult<()>;

    /// Check if an agent currently has an open mailbox
    async fn is_reachable(&self, agent_id: &AgentId) -> bool;

    /// List all agents with a registered mailbox
    async fn list_agents(&self) -> MeshResult<Vec<AgentId>>;

    /// Messages enqueued but not yet received, across all mailboxes
    async fn queue_depth(&self) -> MeshResult<usize>;
}
