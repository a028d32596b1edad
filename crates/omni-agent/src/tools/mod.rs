//! # Built-in Tools
//!
//! Tool bodies for the standard roster:
//!
//! - [`memory`]: validated edits of a domain block
//! - [`changelog`]: audit entries for the edit just made
//! - [`conversational`]: user-facing escalation, clarification and replies
//! - [`orchestrator`]: planning, delegation and progress tracking
//! - [`specialist`]: request intake and reporting for domain actors

pub mod changelog;
pub mod conversational;
pub mod memory;
pub mod orchestrator;
pub mod specialist;

pub use changelog::ChangelogTool;
pub use conversational::{
    ClarifyUserRequestTool, EscalateUserRequestTool, HandleOrchestratorMessageTool,
    SendMessageTool,
};
pub use memory::MemoryEditTool;
pub use orchestrator::{
    CreatePlanTool, DelegateRequestTool, EvaluateProgressTool, OrchestratorState,
    OriginFailureRoute, RecordAgentReportTool, SendStatusUpdateTool, SharedOrchestratorState,
};
pub use specialist::{HandleOrchestratorRequestTool, SendOrchestratorMessageTool};

use omni_core::ToolName;

/// Conversational tool names
pub const ESCALATE_USER_REQUEST: &str = "escalate_user_request";
pub const CLARIFY_USER_REQUEST: &str = "clarify_user_request";
pub const HANDLE_ORCHESTRATOR_MESSAGE: &str = "handle_orchestrator_message";
pub const SEND_MESSAGE: &str = "send_message";

/// Orchestrator tool names
pub const CREATE_ORCHESTRATOR_PLAN: &str = "create_orchestrator_plan";
pub const DELEGATE_AGENT_REQUEST: &str = "delegate_agent_request";
pub const UPDATE_REQUESTS_CHANGELOG: &str = "update_requests_changelog";
pub const EVALUATE_PROGRESS: &str = "evaluate_progress";
pub const RECORD_AGENT_REPORT: &str = "record_agent_report";
pub const SEND_STATUS_UPDATE: &str = "send_status_update";

/// Specialist tool names shared by every domain
pub const HANDLE_ORCHESTRATOR_REQUEST: &str = "handle_orchestrator_request";
pub const SEND_ORCHESTRATOR_MESSAGE: &str = "send_orchestrator_message";

/// Build a [`ToolName`] from one of the constants above.
pub fn tool_name(name: &str) -> ToolName {
    ToolName::new_unchecked(name)
}
