//! Tool-rule errors: per-turn rejections and graph construction failures.

use thiserror::Error;

use crate::identifiers::ToolName;

/// Why the guard refused a proposed tool call.
///
/// Rejections are recoverable: they are handed back to the policy oracle,
/// which may propose something else within the same turn.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleViolation {
    /// The proposed tool is not permitted in the current state.
    #[error("Tool '{proposed}' is not permitted here; expected one of [{}]", join(.permitted))]
    PolicyViolation {
        proposed: ToolName,
        permitted: Vec<ToolName>,
    },

    /// A terminal tool already ran in this turn.
    #[error("Turn already terminated by '{terminal}'; '{proposed}' cannot run")]
    TurnAlreadyTerminated {
        terminal: ToolName,
        proposed: ToolName,
    },

    /// A conditional tool produced an outcome with no mapping and no default.
    #[error("Outcome '{outcome}' of '{tool}' has no mapped next tool")]
    UnmappedOutcome { tool: ToolName, outcome: String },
}

/// Structural defects found while building a [`ToolRuleGraph`](crate::rules::ToolRuleGraph).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// A rule, child, mapping target or entry tool is not in the allowed set.
    #[error("Tool '{0}' is referenced by a rule but not allowed")]
    UnknownTool(ToolName),

    /// Two rules were registered for the same tool.
    #[error("Tool '{0}' has more than one rule")]
    DuplicateRule(ToolName),

    /// A constrain rule lists no children.
    #[error("Constrain rule for '{0}' has no children")]
    EmptyConstraint(ToolName),

    /// The graph has no terminal tool at all.
    #[error("Tool graph has no terminal tool")]
    NoTerminal,

    /// No terminal tool can be reached from the named state.
    #[error("No terminal tool is reachable after '{0}'")]
    TerminalUnreachable(String),
}

fn join(tools: &[ToolName]) -> String {
    tools
        .iter()
        .map(ToolName::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
