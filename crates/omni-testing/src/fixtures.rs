//! Constructors that keep test setup short.
//!
//! These panic on invalid input: they are for tests only.

use omni_core::{
    AgentId, AgentRole, BlockLabel, BlockSpec, MemoryStore, RequestId, ToolCall,
};
use omni_mesh::{Message, MessageKind};
use serde_json::Value;

/// A tool call with a valid name.
pub fn call(name: &str, args: Value) -> ToolCall {
    ToolCall::new(name, args).unwrap_or_else(|e| panic!("invalid tool name '{name}': {e}"))
}

pub fn agent(id: &str) -> AgentId {
    AgentId::new_unchecked(id)
}

pub fn role(name: &str) -> AgentRole {
    AgentRole::new_unchecked(name)
}

pub fn label(name: &str) -> BlockLabel {
    BlockLabel::new_unchecked(name)
}

/// A message with a fresh request id whose text is `text`.
pub fn message(kind: MessageKind, from: &str, to: &str, text: &str) -> Message {
    Message::new(kind, agent(from), agent(to), RequestId::new())
        .with_description(text)
        .with_body(text)
}

/// A store holding one empty block owned by `owner`.
pub fn store_with_block(name: &str, owner: &str, size_limit: usize) -> MemoryStore {
    let store = MemoryStore::new();
    store
        .register(BlockSpec::new(label(name), size_limit).owned_by(role(owner)))
        .unwrap_or_else(|e| panic!("failed to register '{name}': {e}"));
    store
}
