//! Error types for the Omni core.
//!
//! - [`MemoryError`]: memory store failures (`AccessDenied`, `UnknownLabel`,
//!   `ContentNotFound`, `SizeLimitExceeded`)
//! - [`RuleViolation`]: per-turn tool-rule rejections (`PolicyViolation`,
//!   `TurnAlreadyTerminated`, `UnmappedOutcome`)
//! - [`GraphError`]: invalid tool-rule graphs, reported at construction
//! - [`PlanError`]: plan manager failures

mod memory;
mod rules;

pub use memory::{MemoryError, MemoryOperation};
pub use rules::{GraphError, RuleViolation};

use thiserror::Error;

/// Errors produced by the [`PlanManager`](crate::plan::PlanManager).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// A plan must contain at least one step.
    #[error("Plan for '{0}' has no steps")]
    NoSteps(String),

    /// No plan is currently active.
    #[error("No active plan")]
    NoActivePlan,

    /// The step id is not part of the active plan.
    #[error("Step {0} is not part of the active plan")]
    UnknownStep(u32),

    /// Mirroring the plan into its memory block failed.
    #[error(transparent)]
    Memory(#[from] MemoryError),
}
