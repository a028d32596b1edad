//! Tools of the user-facing conversational actor.

use super::{
    CLARIFY_USER_REQUEST, ESCALATE_USER_REQUEST, HANDLE_ORCHESTRATOR_MESSAGE, SEND_MESSAGE,
    tool_name,
};
use crate::tool::{AgentTool, ToolContext};
use async_trait::async_trait;
use omni_core::{AgentId, ExecutionResult, FailureReason, ToolCall, ToolName};
use omni_mesh::{Message, MessageKind};

const MIN_OPTIONS: usize = 2;
const MAX_OPTIONS: usize = 4;

/// Forward a user request to the orchestrator as an `Escalate` message.
///
/// Argument `request`; defaults to the text of the inbound message.
#[derive(Debug, Clone)]
pub struct EscalateUserRequestTool {
    name: ToolName,
    orchestrator: AgentId,
}

impl EscalateUserRequestTool {
    pub fn new(orchestrator: AgentId) -> Self {
        Self {
            name: tool_name(ESCALATE_USER_REQUEST),
            orchestrator,
        }
    }
}

#[async_trait]
impl AgentTool for EscalateUserRequestTool {
    fn name(&self) -> &ToolName {
        &self.name
    }

    async fn call(&self, call: &ToolCall, ctx: &mut ToolContext<'_>) -> ExecutionResult {
        let request = call
            .opt_str_arg("request")
            .unwrap_or_else(|| ctx.inbound.text())
            .to_string();
        if request.trim().is_empty() {
            return ExecutionResult::failed(FailureReason::InvalidInput {
                message: "request must not be empty".to_string(),
            });
        }

        let message = Message::new(
            MessageKind::Escalate,
            ctx.agent.clone(),
            self.orchestrator.clone(),
            ctx.inbound.request_id,
        )
        .with_description(request.clone())
        .with_body(request);

        match ctx.send(message).await {
            Ok(()) => ExecutionResult::success(format!("Escalated to {}", self.orchestrator)),
            Err(reason) => ExecutionResult::failed(reason),
        }
    }
}

/// Format a clarification question with two to four options.
///
/// Arguments `question` and `options`. The formatted text is the tool output;
/// nothing is sent until `send_message` runs.
#[derive(Debug, Clone)]
pub struct ClarifyUserRequestTool {
    name: ToolName,
}

impl ClarifyUserRequestTool {
    pub fn new() -> Self {
        Self {
            name: tool_name(CLARIFY_USER_REQUEST),
        }
    }
}

impl Default for ClarifyUserRequestTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentTool for ClarifyUserRequestTool {
    fn name(&self) -> &ToolName {
        &self.name
    }

    async fn call(&self, call: &ToolCall, _ctx: &mut ToolContext<'_>) -> ExecutionResult {
        let question = match call.str_arg("question") {
            Ok(question) => question,
            Err(reason) => return ExecutionResult::failed(reason),
        };
        let options = match call.str_list_arg("options") {
            Ok(options) => options,
            Err(reason) => return ExecutionResult::failed(reason),
        };
        if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&options.len()) {
            return ExecutionResult::failed(FailureReason::InvalidInput {
                message: format!(
                    "expected {MIN_OPTIONS} to {MAX_OPTIONS} options, got {}",
                    options.len()
                ),
            });
        }

        let mut text = question.to_string();
        for (i, option) in options.iter().enumerate() {
            text.push_str(&format!("\n- Option {}: {}", i + 1, option));
        }
        ExecutionResult::success(text)
    }
}

/// Surface an orchestrator update so it can be relayed to the user.
#[derive(Debug, Clone)]
pub struct HandleOrchestratorMessageTool {
    name: ToolName,
}

impl HandleOrchestratorMessageTool {
    pub fn new() -> Self {
        Self {
            name: tool_name(HANDLE_ORCHESTRATOR_MESSAGE),
        }
    }
}

impl Default for HandleOrchestratorMessageTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentTool for HandleOrchestratorMessageTool {
    fn name(&self) -> &ToolName {
        &self.name
    }

    async fn call(&self, _call: &ToolCall, ctx: &mut ToolContext<'_>) -> ExecutionResult {
        let mut text = ctx.inbound.text().to_string();
        if let Some(warnings) = ctx.inbound.get_metadata(crate::tool::WARNINGS_METADATA_KEY) {
            text.push_str("\nWarnings: ");
            text.push_str(warnings);
        }
        ExecutionResult::success(text)
    }
}

/// Reply to the user endpoint. Terminal.
///
/// Arguments `message` and optional `clarify`; clarifications go out as
/// `Clarify`, everything else as `Reply`.
#[derive(Debug, Clone)]
pub struct SendMessageTool {
    name: ToolName,
    user: AgentId,
}

impl SendMessageTool {
    pub fn new(user: AgentId) -> Self {
        Self {
            name: tool_name(SEND_MESSAGE),
            user,
        }
    }
}

#[async_trait]
impl AgentTool for SendMessageTool {
    fn name(&self) -> &ToolName {
        &self.name
    }

    async fn call(&self, call: &ToolCall, ctx: &mut ToolContext<'_>) -> ExecutionResult {
        let body = match call.str_arg("message") {
            Ok(body) => body,
            Err(reason) => return ExecutionResult::failed(reason),
        };
        let kind = if call.bool_arg("clarify") {
            MessageKind::Clarify
        } else {
            MessageKind::Reply
        };

        let message = Message::new(kind, ctx.agent.clone(), self.user.clone(), ctx.inbound.request_id)
            .with_body(body);
        match ctx.send(message).await {
            Ok(()) => ExecutionResult::success("sent"),
            Err(reason) => ExecutionResult::failed(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::TurnScope;
    use omni_core::{AgentRole, MemoryStore, RequestId};
    use omni_mesh::LocalMesh;
    use serde_json::json;

    fn id(s: &str) -> AgentId {
        AgentId::new_unchecked(s)
    }

    #[tokio::test]
    async fn test_escalate_keeps_request_id() {
        let mesh = LocalMesh::new();
        let mut orchestrator = mesh.register(id("orchestrator")).unwrap();
        let store = MemoryStore::new();
        let role = AgentRole::new_unchecked("conversational");
        let request_id = RequestId::new();
        let inbound = Message::new(MessageKind::UserRequest, id("user"), id("conversational"), request_id)
            .with_body("Add milk to my list");
        let mut scope = TurnScope::default();
        let mut ctx = ToolContext {
            agent: &id("conversational"),
            role: &role,
            store: &store,
            mesh: &mesh,
            inbound: &inbound,
            scope: &mut scope,
        };

        let tool = EscalateUserRequestTool::new(id("orchestrator"));
        let call = ToolCall::new(ESCALATE_USER_REQUEST, json!({})).unwrap();
        assert!(tool.call(&call, &mut ctx).await.is_success());

        let escalated = orchestrator.try_recv().unwrap();
        assert_eq!(escalated.kind, MessageKind::Escalate);
        assert_eq!(escalated.request_id, request_id);
        assert_eq!(escalated.text(), "Add milk to my list");
        assert_eq!(scope.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_clarify_formats_options() {
        let mesh = LocalMesh::new();
        let store = MemoryStore::new();
        let role = AgentRole::new_unchecked("conversational");
        let inbound = Message::new(MessageKind::UserRequest, id("user"), id("conversational"), RequestId::new());
        let mut scope = TurnScope::default();
        let mut ctx = ToolContext {
            agent: &id("conversational"),
            role: &role,
            store: &store,
            mesh: &mesh,
            inbound: &inbound,
            scope: &mut scope,
        };
        let tool = ClarifyUserRequestTool::new();

        let call = ToolCall::new(
            CLARIFY_USER_REQUEST,
            json!({"question": "Which list?", "options": ["Groceries", "Errands"]}),
        )
        .unwrap();
        assert_eq!(
            tool.call(&call, &mut ctx).await.success_output(),
            Some("Which list?\n- Option 1: Groceries\n- Option 2: Errands")
        );

        let too_few = ToolCall::new(CLARIFY_USER_REQUEST, json!({"question": "?", "options": ["one"]})).unwrap();
        assert!(tool.call(&too_few, &mut ctx).await.is_failure());
    }

    #[tokio::test]
    async fn test_send_message_kinds() {
        let mesh = LocalMesh::new();
        let mut user = mesh.register(id("user")).unwrap();
        let store = MemoryStore::new();
        let role = AgentRole::new_unchecked("conversational");
        let inbound = Message::new(MessageKind::UserRequest, id("user"), id("conversational"), RequestId::new());
        let mut scope = TurnScope::default();
        scope.warn("Changelog 'tasks_changelog' is full");
        let mut ctx = ToolContext {
            agent: &id("conversational"),
            role: &role,
            store: &store,
            mesh: &mesh,
            inbound: &inbound,
            scope: &mut scope,
        };
        let tool = SendMessageTool::new(id("user"));

        let call = ToolCall::new(SEND_MESSAGE, json!({"message": "Which list?", "clarify": true})).unwrap();
        assert!(tool.call(&call, &mut ctx).await.is_success());

        let delivered = user.try_recv().unwrap();
        assert_eq!(delivered.kind, MessageKind::Clarify);
        assert_eq!(delivered.request_id, inbound.request_id);
        assert_eq!(
            delivered.get_metadata(crate::tool::WARNINGS_METADATA_KEY),
            Some("Changelog 'tasks_changelog' is full")
        );
    }
}
