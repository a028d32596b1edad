//! Tool trait, per-turn scratch state and the tool set an actor dispatches to.

use async_trait::async_trait;
use omni_core::{AgentId, AgentRole, ExecutionResult, FailureReason, MemoryStore, ToolCall, ToolName};
use omni_mesh::{AgentMesh, Message};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Metadata key carrying turn warnings on outgoing messages.
pub const WARNINGS_METADATA_KEY: &str = "warnings";

/// A mutation recorded during the turn and not yet written to a changelog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedChange {
    pub old: String,
    pub new: String,
}

/// Scratch state that lives for exactly one turn.
#[derive(Debug, Default)]
pub struct TurnScope {
    last_change: Option<RecordedChange>,
    warnings: Vec<String>,
    sent: Vec<Message>,
}

impl TurnScope {
    pub fn record_change(&mut self, old: impl Into<String>, new: impl Into<String>) {
        self.last_change = Some(RecordedChange {
            old: old.into(),
            new: new.into(),
        });
    }

    /// Consume the last recorded change.
    pub fn take_change(&mut self) -> Option<RecordedChange> {
        self.last_change.take()
    }

    pub fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Messages sent by tools during this turn.
    pub fn sent(&self) -> &[Message] {
        &self.sent
    }

    pub(crate) fn into_parts(self) -> (Vec<String>, Vec<Message>) {
        (self.warnings, self.sent)
    }
}

/// Everything a tool body may touch.
pub struct ToolContext<'a> {
    pub agent: &'a AgentId,
    pub role: &'a AgentRole,
    pub store: &'a MemoryStore,
    pub mesh: &'a dyn AgentMesh,
    pub inbound: &'a Message,
    pub scope: &'a mut TurnScope,
}

impl ToolContext<'_> {
    /// Send a message, attaching the turn's warnings.
    pub async fn send(&mut self, mut message: Message) -> Result<(), FailureReason> {
        if !self.scope.warnings.is_empty() {
            message = message.with_metadata(WARNINGS_METADATA_KEY, self.scope.warnings.join("\n"));
        }
        let to = message.to.clone();
        self.mesh
            .send(&to, message.clone())
            .await
            .map_err(|err| FailureReason::DispatchFailed {
                message: err.to_string(),
            })?;
        self.scope.sent.push(message);
        Ok(())
    }
}

/// A tool an actor can invoke.
///
/// Tools report problems through [`ExecutionResult::Failure`]; they never
/// panic and never advance the tool-rule state themselves.
#[async_trait]
pub trait AgentTool: Send + Sync {
    fn name(&self) -> &ToolName;

    async fn call(&self, call: &ToolCall, ctx: &mut ToolContext<'_>) -> ExecutionResult;
}

/// An actor's tools, looked up by name.
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: HashMap<ToolName, Arc<dyn AgentTool>>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool, replacing any tool with the same name.
    pub fn with_tool(mut self, tool: Arc<dyn AgentTool>) -> Self {
        self.tools.insert(tool.name().clone(), tool);
        self
    }

    pub fn get(&self, name: &ToolName) -> Option<&Arc<dyn AgentTool>> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &ToolName) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> Vec<ToolName> {
        let mut names: Vec<ToolName> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub async fn dispatch(&self, call: &ToolCall, ctx: &mut ToolContext<'_>) -> ExecutionResult {
        match self.tools.get(&call.name) {
            Some(tool) => {
                debug!(tool = %call.name, agent = %ctx.agent, "Dispatching tool call");
                tool.call(call, ctx).await
            }
            None => ExecutionResult::failed(FailureReason::NotFound {
                resource: format!("tool '{}'", call.name),
            }),
        }
    }
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSet")
            .field("tools", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omni_core::{AgentRole, RequestId};
    use omni_mesh::{LocalMesh, MessageKind};
    use serde_json::json;

    struct Noop(ToolName);

    #[async_trait]
    impl AgentTool for Noop {
        fn name(&self) -> &ToolName {
            &self.0
        }

        async fn call(&self, _call: &ToolCall, ctx: &mut ToolContext<'_>) -> ExecutionResult {
            ctx.scope.warn("noop ran");
            ExecutionResult::success("done")
        }
    }

    #[test]
    fn test_dispatch_by_name() {
        let tools = ToolSet::new()
            .with_tool(Arc::new(Noop(ToolName::new_unchecked("noop"))))
            .with_tool(Arc::new(Noop(ToolName::new_unchecked("other"))));
        assert_eq!(tools.len(), 2);
        assert_eq!(
            tools.names(),
            vec![ToolName::new_unchecked("noop"), ToolName::new_unchecked("other")]
        );

        let store = MemoryStore::new();
        let mesh = LocalMesh::new();
        let agent = AgentId::new_unchecked("worker");
        let role = AgentRole::new_unchecked("worker");
        let inbound = Message::new(MessageKind::Delegate, agent.clone(), agent.clone(), RequestId::new());
        let mut scope = TurnScope::default();
        let mut ctx = ToolContext {
            agent: &agent,
            role: &role,
            store: &store,
            mesh: &mesh,
            inbound: &inbound,
            scope: &mut scope,
        };

        let ok = tokio_test::block_on(tools.dispatch(&ToolCall::new("noop", json!({})).unwrap(), &mut ctx));
        assert_eq!(ok.success_output(), Some("done"));

        let missing = tokio_test::block_on(tools.dispatch(&ToolCall::new("ghost", json!({})).unwrap(), &mut ctx));
        assert!(matches!(missing.failure_reason(), Some(FailureReason::NotFound { .. })));
        assert_eq!(scope.warnings(), ["noop ran".to_string()]);
    }

    #[test]
    fn test_send_failure_is_reported() {
        let store = MemoryStore::new();
        let mesh = LocalMesh::new();
        let agent = AgentId::new_unchecked("worker");
        let role = AgentRole::new_unchecked("worker");
        let inbound = Message::new(MessageKind::Delegate, agent.clone(), agent.clone(), RequestId::new());
        let mut scope = TurnScope::default();
        let mut ctx = ToolContext {
            agent: &agent,
            role: &role,
            store: &store,
            mesh: &mesh,
            inbound: &inbound,
            scope: &mut scope,
        };

        let outgoing = inbound.reply(MessageKind::StatusUpdate, "hello");
        let result = tokio_test::block_on(ctx.send(outgoing));
        assert!(matches!(result, Err(FailureReason::DispatchFailed { .. })));
        assert!(scope.sent().is_empty());
    }
}
