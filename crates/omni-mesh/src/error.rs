//! Error types for mesh operations

use omni_core::AgentId;
use thiserror::Error;

/// Result type for mesh operations
pub type MeshResult<T> = Result<T, MeshError>;

/// Errors that can occur during mesh operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MeshError {
    /// No mailbox is registered for the agent
    #[error("Agent not found: {0}")]
    AgentNotFound(AgentId),

    /// A mailbox is already registered for the agent
    #[error("Agent already registered: {0}")]
    AlreadyRegistered(AgentId),

    /// The agent's mailbox was dropped
    #[error("Mailbox closed: {0}")]
    MailboxClosed(AgentId),

    /// Message serialization failed
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),
}

impl From<serde_json::Error> for MeshError {
    fn from(err: serde_json::Error) -> Self {
        MeshError::SerializationFailed(err.to_string())
    }
}
