//! Tool-rule engine: per-actor transition graphs and the per-turn guard.
//!
//! Every actor owns one immutable [`ToolRuleGraph`]. Each turn gets a fresh
//! [`TurnGuard`] that validates the oracle's proposals against it:
//!
//! - **Constrain**: only the listed children may follow
//! - **Terminal**: the turn ends; further proposals are rejected
//! - **Conditional**: the tool's output selects the next tool, with an
//!   optional default
//!
//! Rejections are [`RuleViolation`](crate::error::RuleViolation)s, handed back
//! to the oracle rather than crashing the actor.

mod graph;
mod guard;
mod rule;

pub use graph::{ToolRuleGraph, ToolRuleGraphBuilder};
pub use guard::{TurnGuard, TurnState};
pub use rule::ToolRule;
