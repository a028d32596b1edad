//! # Omni Core
//!
//! Deterministic building blocks of the Omni actor system:
//!
//! - [`memory`]: label-addressed, size-limited memory blocks with role-based
//!   access and substring replace-all edits
//! - [`rules`]: per-actor tool-rule graphs and the per-turn guard
//! - [`changelog`]: append-only audit entries stored in memory blocks
//! - [`plan`]: the orchestrator's single active plan
//! - [`tool`]: tool calls and structured execution results
//!
//! Nothing in this crate performs I/O or waits on other actors; the async
//! pieces live in `omni-mesh` and `omni-agent`.

pub mod changelog;
pub mod error;
pub mod identifiers;
pub mod memory;
pub mod plan;
pub mod rules;
pub mod tool;
pub mod validation;

pub use changelog::{ChangelogEntry, ChangelogRecorder};
pub use error::{GraphError, MemoryError, MemoryOperation, PlanError, RuleViolation};
pub use identifiers::{AgentId, AgentRole, BlockLabel, CapabilityTag, MessageId, RequestId, ToolName};
pub use memory::{AccessMode, BlockSpec, BlockView, MemoryStore};
pub use plan::{Plan, PlanManager, PlanStep, Progress, StepId, StepRequest, StepStatus};
pub use rules::{ToolRule, ToolRuleGraph, TurnGuard, TurnState};
pub use tool::{ExecutionResult, FailureReason, ToolCall};
