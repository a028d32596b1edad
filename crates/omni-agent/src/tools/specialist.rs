//! Intake and reporting tools shared by the domain specialists.

use super::{HANDLE_ORCHESTRATOR_REQUEST, SEND_ORCHESTRATOR_MESSAGE, tool_name};
use crate::tool::{AgentTool, ToolContext};
use async_trait::async_trait;
use omni_core::{ExecutionResult, FailureReason, ToolCall, ToolName};
use omni_mesh::MessageKind;

/// Read the delegated directive out of the inbound message.
///
/// Only `Delegate` messages carry a directive; anything else is refused.
#[derive(Debug, Clone)]
pub struct HandleOrchestratorRequestTool {
    name: ToolName,
}

impl HandleOrchestratorRequestTool {
    pub fn new() -> Self {
        Self {
            name: tool_name(HANDLE_ORCHESTRATOR_REQUEST),
        }
    }
}

impl Default for HandleOrchestratorRequestTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentTool for HandleOrchestratorRequestTool {
    fn name(&self) -> &ToolName {
        &self.name
    }

    async fn call(&self, _call: &ToolCall, ctx: &mut ToolContext<'_>) -> ExecutionResult {
        if ctx.inbound.kind != MessageKind::Delegate {
            return ExecutionResult::failed(FailureReason::InvalidInput {
                message: format!("expected a delegation, got {}", ctx.inbound.kind),
            });
        }
        let directive = ctx.inbound.text();
        if directive.trim().is_empty() {
            return ExecutionResult::failed(FailureReason::InvalidInput {
                message: "delegated request has no description".to_string(),
            });
        }
        ExecutionResult::success(directive)
    }
}

/// Report back to the delegating actor under the same request id. Terminal.
///
/// Arguments `message` and optional `failed`, which turns the report into a
/// `Failure` so the orchestrator fails the step instead of completing it.
#[derive(Debug, Clone)]
pub struct SendOrchestratorMessageTool {
    name: ToolName,
}

impl SendOrchestratorMessageTool {
    pub fn new() -> Self {
        Self {
            name: tool_name(SEND_ORCHESTRATOR_MESSAGE),
        }
    }
}

impl Default for SendOrchestratorMessageTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentTool for SendOrchestratorMessageTool {
    fn name(&self) -> &ToolName {
        &self.name
    }

    async fn call(&self, call: &ToolCall, ctx: &mut ToolContext<'_>) -> ExecutionResult {
        let body = match call.str_arg("message") {
            Ok(body) => body,
            Err(reason) => return ExecutionResult::failed(reason),
        };
        let kind = if call.bool_arg("failed") {
            MessageKind::Failure
        } else {
            MessageKind::StatusUpdate
        };

        let report = ctx.inbound.reply(kind, body);
        match ctx.send(report).await {
            Ok(()) => ExecutionResult::success("sent"),
            Err(reason) => ExecutionResult::failed(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::TurnScope;
    use omni_core::{AgentId, AgentRole, CapabilityTag, MemoryStore, RequestId};
    use omni_mesh::{LocalMesh, Message};
    use serde_json::json;

    #[tokio::test]
    async fn test_report_correlates_with_delegation() {
        let mesh = LocalMesh::new();
        let mut orchestrator = mesh.register(AgentId::new_unchecked("orchestrator")).unwrap();
        let store = MemoryStore::new();
        let agent = AgentId::new_unchecked("tasks");
        let role = AgentRole::new_unchecked("tasks");
        let delegation = Message::new(
            MessageKind::Delegate,
            AgentId::new_unchecked("orchestrator"),
            agent.clone(),
            RequestId::new(),
        )
        .with_capability(CapabilityTag::new_unchecked("task-domain"))
        .with_description("Add milk");
        let mut scope = TurnScope::default();
        let mut ctx = ToolContext {
            agent: &agent,
            role: &role,
            store: &store,
            mesh: &mesh,
            inbound: &delegation,
            scope: &mut scope,
        };

        let handle = HandleOrchestratorRequestTool::new();
        let call = ToolCall::new(HANDLE_ORCHESTRATOR_REQUEST, json!({})).unwrap();
        assert_eq!(handle.call(&call, &mut ctx).await.success_output(), Some("Add milk"));

        let send = SendOrchestratorMessageTool::new();
        let call = ToolCall::new(SEND_ORCHESTRATOR_MESSAGE, json!({"message": "No such list", "failed": true})).unwrap();
        assert!(send.call(&call, &mut ctx).await.is_success());

        let report = orchestrator.try_recv().unwrap();
        assert_eq!(report.kind, MessageKind::Failure);
        assert_eq!(report.from, agent);
        assert_eq!(report.request_id, delegation.request_id);
        assert_eq!(report.body, "No such list");
    }

    #[tokio::test]
    async fn test_intake_refuses_non_delegations() {
        let mesh = LocalMesh::new();
        let store = MemoryStore::new();
        let agent = AgentId::new_unchecked("tasks");
        let role = AgentRole::new_unchecked("tasks");
        let failure = Message::new(
            MessageKind::Failure,
            AgentId::new_unchecked("orchestrator"),
            agent.clone(),
            RequestId::new(),
        )
        .with_body("Turn aborted after 4 rejected proposals");
        let mut scope = TurnScope::default();
        let mut ctx = ToolContext {
            agent: &agent,
            role: &role,
            store: &store,
            mesh: &mesh,
            inbound: &failure,
            scope: &mut scope,
        };

        let handle = HandleOrchestratorRequestTool::new();
        let call = ToolCall::new(HANDLE_ORCHESTRATOR_REQUEST, json!({})).unwrap();
        let result = handle.call(&call, &mut ctx).await;
        assert!(!result.is_success());
        assert!(matches!(
            result.failure_reason(),
            Some(FailureReason::InvalidInput { message }) if message.contains("got failure")
        ));
    }
}
