use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ToolRule, ToolRuleGraph};
use crate::error::RuleViolation;
use crate::identifiers::ToolName;

/// Where a turn stands with respect to its tool-rule graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TurnState {
    /// Nothing has executed yet.
    Start,
    /// The last tool had no rule; any allowed tool may follow.
    Free,
    /// The last tool restricted what may follow.
    Constrained {
        after: ToolName,
        permitted: Vec<ToolName>,
    },
    /// A conditional tool produced an outcome with no mapping and no default.
    Unmapped { tool: ToolName, outcome: String },
    /// A terminal tool ran; the turn is over.
    Terminated { by: ToolName },
}

/// Per-turn validator layered around tool execution.
///
/// [`validate_next`](Self::validate_next) is pure. Only
/// [`advance`](Self::advance), called after a tool body succeeded, moves the
/// state; a failed body leaves the guard where it was.
#[derive(Debug, Clone)]
pub struct TurnGuard<'g> {
    graph: &'g ToolRuleGraph,
    state: TurnState,
}

impl<'g> TurnGuard<'g> {
    pub fn new(graph: &'g ToolRuleGraph) -> Self {
        Self {
            graph,
            state: TurnState::Start,
        }
    }

    pub fn state(&self) -> &TurnState {
        &self.state
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self.state, TurnState::Terminated { .. })
    }

    /// True when ending the turn now would skip a required continuation.
    pub fn has_pending_continuation(&self) -> bool {
        matches!(
            self.state,
            TurnState::Constrained { .. } | TurnState::Unmapped { .. }
        )
    }

    /// Tools that may be proposed next.
    pub fn permitted(&self) -> Vec<ToolName> {
        match &self.state {
            TurnState::Start => self.graph.entry_tools(),
            TurnState::Free => self.graph.allowed_tools().iter().cloned().collect(),
            TurnState::Constrained { permitted, .. } => permitted.clone(),
            TurnState::Unmapped { .. } | TurnState::Terminated { .. } => Vec::new(),
        }
    }

    /// Check whether `proposed` may run now.
    pub fn validate_next(&self, proposed: &ToolName) -> Result<(), RuleViolation> {
        match &self.state {
            TurnState::Terminated { by } => Err(RuleViolation::TurnAlreadyTerminated {
                terminal: by.clone(),
                proposed: proposed.clone(),
            }),
            TurnState::Unmapped { tool, outcome } => Err(RuleViolation::UnmappedOutcome {
                tool: tool.clone(),
                outcome: outcome.clone(),
            }),
            _ => {
                let permitted = self.permitted();
                if self.graph.is_allowed(proposed) && permitted.contains(proposed) {
                    Ok(())
                } else {
                    Err(RuleViolation::PolicyViolation {
                        proposed: proposed.clone(),
                        permitted,
                    })
                }
            }
        }
    }

    /// Record that `tool` executed successfully with `output`.
    ///
    /// Conditional rules match the trimmed output against their mapping.
    pub fn advance(&mut self, tool: &ToolName, output: &str) -> &TurnState {
        self.state = match self.graph.rule(tool) {
            None => TurnState::Free,
            Some(ToolRule::Constrain { children }) => TurnState::Constrained {
                after: tool.clone(),
                permitted: children.clone(),
            },
            Some(ToolRule::Terminal) => TurnState::Terminated { by: tool.clone() },
            Some(ToolRule::Conditional { mapping, default }) => {
                let outcome = output.trim();
                match mapping.get(outcome).or(default.as_ref()) {
                    Some(next) => TurnState::Constrained {
                        after: tool.clone(),
                        permitted: vec![next.clone()],
                    },
                    None => TurnState::Unmapped {
                        tool: tool.clone(),
                        outcome: outcome.to_string(),
                    },
                }
            }
        };
        debug!(%tool, state = ?self.state, "Tool rule state advanced");
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    fn t(name: &str) -> ToolName {
        ToolName::new_unchecked(name)
    }

    /// `{A -> {B, C}, B -> exit}` with `D` allowed but unconstrained.
    #[fixture]
    fn graph() -> ToolRuleGraph {
        ToolRuleGraph::builder()
            .allow([t("a"), t("b"), t("c"), t("d"), t("exit")])
            .rule(t("a"), ToolRule::constrain([t("b"), t("c")]))
            .rule(t("b"), ToolRule::constrain([t("exit")]))
            .rule(t("exit"), ToolRule::terminal())
            .build()
            .unwrap()
    }

    #[rstest]
    fn test_unlisted_child_is_a_policy_violation(graph: ToolRuleGraph) {
        let mut guard = graph.guard();
        guard.validate_next(&t("a")).unwrap();
        guard.advance(&t("a"), "ok");

        let err = guard.validate_next(&t("d")).unwrap_err();
        assert_eq!(
            err,
            RuleViolation::PolicyViolation {
                proposed: t("d"),
                permitted: vec![t("b"), t("c")],
            }
        );
        assert!(guard.has_pending_continuation());
    }

    #[rstest]
    fn test_path_to_exit_terminates(graph: ToolRuleGraph) {
        let mut guard = graph.guard();
        for tool in ["a", "b", "exit"] {
            guard.validate_next(&t(tool)).unwrap();
            guard.advance(&t(tool), "");
        }
        assert!(guard.is_terminated());

        for tool in ["a", "b", "c", "d", "exit"] {
            assert!(matches!(
                guard.validate_next(&t(tool)),
                Err(RuleViolation::TurnAlreadyTerminated { .. })
            ));
        }
    }

    #[rstest]
    #[case::entry_any("d", true)]
    #[case::not_allowed("zzz", false)]
    fn test_start_state_allows_every_allowed_tool(
        graph: ToolRuleGraph,
        #[case] tool: &str,
        #[case] ok: bool,
    ) {
        assert_eq!(graph.guard().validate_next(&t(tool)).is_ok(), ok);
    }

    #[rstest]
    fn test_unruled_tool_leaves_turn_free(graph: ToolRuleGraph) {
        let mut guard = graph.guard();
        guard.advance(&t("c"), "");
        assert_eq!(guard.state(), &TurnState::Free);
        assert!(guard.validate_next(&t("d")).is_ok());
        assert!(!guard.has_pending_continuation());
    }

    fn conditional_graph(default: Option<ToolName>) -> ToolRuleGraph {
        ToolRuleGraph::builder()
            .allow([t("evaluate"), t("report"), t("delegate")])
            .entry([t("evaluate")])
            .rule(
                t("evaluate"),
                ToolRule::conditional([("complete", t("report"))], default),
            )
            .rule(t("delegate"), ToolRule::constrain([t("evaluate")]))
            .rule(t("report"), ToolRule::terminal())
            .build()
            .unwrap()
    }

    #[rstest]
    #[case::mapped(" complete\n", "report")]
    #[case::fallback("pending", "delegate")]
    fn test_conditional_routes_on_output(#[case] output: &str, #[case] next: &str) {
        let graph = conditional_graph(Some(t("delegate")));
        let mut guard = graph.guard();
        guard.advance(&t("evaluate"), output);
        assert_eq!(guard.permitted(), vec![t(next)]);
    }

    #[test]
    fn test_conditional_without_default_is_unmapped() {
        let graph = conditional_graph(None);
        let mut guard = graph.guard();
        guard.advance(&t("evaluate"), "pending");

        assert_eq!(
            guard.validate_next(&t("report")).unwrap_err(),
            RuleViolation::UnmappedOutcome {
                tool: t("evaluate"),
                outcome: "pending".into(),
            }
        );
    }

    #[test]
    fn test_entry_constraint_applies_at_start() {
        let graph = conditional_graph(Some(t("delegate")));
        let guard = graph.guard();
        assert!(guard.validate_next(&t("evaluate")).is_ok());
        assert!(matches!(
            guard.validate_next(&t("report")),
            Err(RuleViolation::PolicyViolation { .. })
        ));
    }
}
