//! Message envelope exchanged between actors.

use chrono::{DateTime, Utc};
use omni_core::{AgentId, CapabilityTag, MessageId, RequestId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Arbitrary key-value metadata attached to a message
pub type MessageMetadata = HashMap<String, String>;

/// What a message asks of, or reports to, its recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Orchestrator asks a specialist to perform a step
    Delegate,
    /// Outcome of delegated work, or of a whole request
    StatusUpdate,
    /// Conversational actor hands a user request to the orchestrator
    Escalate,
    /// Conversational actor asks the user to choose between options
    Clarify,
    /// Raw request from the user endpoint
    UserRequest,
    /// Answer to the user endpoint
    Reply,
    /// The sender's turn failed; carries the failure explanation
    Failure,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::Delegate => "delegate",
            MessageKind::StatusUpdate => "status_update",
            MessageKind::Escalate => "escalate",
            MessageKind::Clarify => "clarify",
            MessageKind::UserRequest => "user_request",
            MessageKind::Reply => "reply",
            MessageKind::Failure => "failure",
        };
        f.write_str(name)
    }
}

/// A fire-and-forget message between two actors.
///
/// `request_id` correlates every message belonging to one delegation or one
/// top-level request; `id` is unique per message and shared only by
/// redeliveries of the same message.
///
/// ```rust
/// use omni_core::{AgentId, CapabilityTag, RequestId};
/// use omni_mesh::{Message, MessageKind};
///
/// let orchestrator = AgentId::parse("orchestrator").unwrap();
/// let tasks = AgentId::parse("tasks").unwrap();
///
/// let delegate = Message::new(MessageKind::Delegate, orchestrator, tasks, RequestId::new())
///     .with_capability(CapabilityTag::parse("task-domain").unwrap())
///     .with_description("Add milk to the shopping list");
///
/// let reply = delegate.reply(MessageKind::StatusUpdate, "done");
/// assert_eq!(reply.request_id, delegate.request_id);
/// assert_eq!(reply.to.as_str(), "orchestrator");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub kind: MessageKind,
    pub from: AgentId,
    pub to: AgentId,
    pub request_id: RequestId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability_tag: Option<CapabilityTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub metadata: MessageMetadata,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(kind: MessageKind, from: AgentId, to: AgentId, request_id: RequestId) -> Self {
        Self {
            id: MessageId::new(),
            kind,
            from,
            to,
            request_id,
            capability_tag: None,
            description: None,
            body: String::new(),
            metadata: HashMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// A message back to the sender, within the same request.
    pub fn reply(&self, kind: MessageKind, body: impl Into<String>) -> Self {
        Message::new(kind, self.to.clone(), self.from.clone(), self.request_id)
            .with_body(body)
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_capability(mut self, tag: CapabilityTag) -> Self {
        self.capability_tag = Some(tag);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn get_metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Description if present, otherwise the body.
    pub fn text(&self) -> &str {
        self.description.as_deref().unwrap_or(&self.body)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
