//! # Omni
//!
//! Coordination core for a multi-actor task-delegation system. Independent
//! actors talk through fire-and-forget messages, edit shared labeled memory
//! through validated replace-all writes, and call their tools in an order
//! enforced by a per-actor tool-rule graph.
//!
//! ## Core Components
//!
//! - **[MemoryStore]**: size-limited, role-guarded text blocks
//! - **[ToolRuleGraph]** and **[TurnGuard]**: the per-turn sequencing guard
//! - **[ChangelogRecorder]**: append-only audit entries inside memory blocks
//! - **[PlanManager]**: the orchestrator's single active plan
//! - **[DelegationRouter]**: capability tag to actor, without waiting for replies
//! - **[AgentRuntime]**: one guarded turn per inbound message
//!
//! ## Quick Start
//!
//! ```rust
//! use omni::{AccessMode, AgentRole, BlockLabel, BlockSpec, MemoryStore};
//!
//! let store = MemoryStore::new();
//! let label = BlockLabel::parse("user_tasks").unwrap();
//! let tasks = AgentRole::parse("tasks").unwrap();
//! store
//!     .register(BlockSpec::new(label.clone(), 8000).owned_by(tasks.clone()))
//!     .unwrap();
//!
//! store.write(&label, &tasks, "", "- Buy milk").unwrap();
//! store.write(&label, &tasks, "- Buy milk", "- Buy milk\n- Call Bob").unwrap();
//! assert_eq!(store.read(&label, &tasks).unwrap(), "- Buy milk\n- Call Bob");
//! assert_eq!(store.visible_blocks(&tasks)[0].mode, AccessMode::ReadWrite);
//! ```
//!
//! ## Architecture
//!
//! `omni-core` holds the deterministic pieces and performs no I/O,
//! `omni-mesh` moves messages between mailboxes, and `omni-agent` runs the
//! actors. The policy oracle that picks tools is injected, so every turn can
//! be replayed with a scripted oracle.

// ============================================================================
// Module aliases for namespaced access
// ============================================================================

pub use omni_agent as agent;
pub use omni_core as core;
pub use omni_mesh as mesh;

// ============================================================================
// Core re-exports
// ============================================================================

pub use omni_core::{
    AccessMode, AgentId, AgentRole, BlockLabel, BlockSpec, BlockView, CapabilityTag,
    ChangelogEntry, ChangelogRecorder, ExecutionResult, FailureReason, GraphError, MemoryError,
    MemoryStore, MessageId, Plan, PlanError, PlanManager, PlanStep, Progress, RequestId,
    RuleViolation, StepId, StepRequest, StepStatus, ToolCall, ToolName, ToolRule, ToolRuleGraph,
    TurnGuard, TurnState,
};

pub use omni_mesh::{AgentMesh, LocalMesh, Mailbox, MeshError, Message, MessageKind};

pub use omni_agent::{
    AgentRuntime, AgentTool, ConfigError, DelegationError, DelegationRouter, DispatchResult,
    Domain, LogFormat, OmniSystem, OracleError, PolicyOracle, Proposal, RuntimeConfig,
    SystemError, ToolContext, ToolSet, TurnContext, TurnFailure, TurnOutcome, TurnReport,
    init_tracing,
};

/// Everything needed to assemble and drive actors.
pub mod prelude {
    pub use omni_agent::{
        AgentRuntime, AgentTool, OmniSystem, PolicyOracle, Proposal, RuntimeConfig, ToolContext,
        ToolSet, TurnContext,
    };
    pub use omni_core::{
        AgentId, AgentRole, BlockLabel, BlockSpec, ExecutionResult, FailureReason, MemoryStore,
        ToolCall, ToolName, ToolRule, ToolRuleGraph,
    };
    pub use omni_mesh::{AgentMesh, LocalMesh, Message, MessageKind};
}
