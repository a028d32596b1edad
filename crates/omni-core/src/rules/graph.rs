use std::collections::{BTreeMap, BTreeSet};

use super::ToolRule;
use super::guard::TurnGuard;
use crate::error::GraphError;
use crate::identifiers::ToolName;

/// An actor's fixed tool-transition graph.
///
/// Built once through [`ToolRuleGraph::builder`] and immutable afterwards.
/// Construction rejects graphs with dangling references, duplicate rules,
/// empty constraints, or any state from which no terminal tool can be
/// reached.
///
/// ```rust
/// use omni_core::identifiers::ToolName;
/// use omni_core::rules::{ToolRule, ToolRuleGraph};
///
/// let name = |s: &str| ToolName::parse(s).unwrap();
/// let graph = ToolRuleGraph::builder()
///     .allow([name("update_user_tasks"), name("update_tasks_changelog"), name("send_orchestrator_message")])
///     .rule(name("update_user_tasks"), ToolRule::constrain([name("update_tasks_changelog")]))
///     .rule(name("update_tasks_changelog"), ToolRule::constrain([name("send_orchestrator_message")]))
///     .rule(name("send_orchestrator_message"), ToolRule::terminal())
///     .build()
///     .unwrap();
///
/// assert_eq!(graph.terminal_tools().len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRuleGraph {
    allowed: BTreeSet<ToolName>,
    entry: Option<BTreeSet<ToolName>>,
    rules: BTreeMap<ToolName, ToolRule>,
}

impl ToolRuleGraph {
    pub fn builder() -> ToolRuleGraphBuilder {
        ToolRuleGraphBuilder::default()
    }

    /// Start a fresh per-turn guard over this graph.
    pub fn guard(&self) -> TurnGuard<'_> {
        TurnGuard::new(self)
    }

    pub fn allowed_tools(&self) -> &BTreeSet<ToolName> {
        &self.allowed
    }

    pub fn is_allowed(&self, tool: &ToolName) -> bool {
        self.allowed.contains(tool)
    }

    /// Tools that may open a turn: the entry constraint, or every allowed tool.
    pub fn entry_tools(&self) -> Vec<ToolName> {
        self.entry
            .as_ref()
            .unwrap_or(&self.allowed)
            .iter()
            .cloned()
            .collect()
    }

    pub fn rule(&self, tool: &ToolName) -> Option<&ToolRule> {
        self.rules.get(tool)
    }

    pub fn terminal_tools(&self) -> Vec<&ToolName> {
        self.rules
            .iter()
            .filter(|(_, rule)| rule.is_terminal())
            .map(|(tool, _)| tool)
            .collect()
    }

    fn successors(&self, tool: &ToolName) -> Vec<&ToolName> {
        match self.rules.get(tool) {
            Some(rule) => rule.targets(),
            None => self.allowed.iter().collect(),
        }
    }

    fn validate(&self) -> Result<(), GraphError> {
        let known = |tool: &ToolName| {
            if self.allowed.contains(tool) {
                Ok(())
            } else {
                Err(GraphError::UnknownTool(tool.clone()))
            }
        };

        for tool in self.entry.iter().flatten() {
            known(tool)?;
        }
        for (tool, rule) in &self.rules {
            known(tool)?;
            if matches!(rule, ToolRule::Constrain { children } if children.is_empty()) {
                return Err(GraphError::EmptyConstraint(tool.clone()));
            }
            for target in rule.targets() {
                known(target)?;
            }
        }

        let mut can_finish: BTreeSet<&ToolName> = self.terminal_tools().into_iter().collect();
        if can_finish.is_empty() {
            return Err(GraphError::NoTerminal);
        }

        loop {
            let before = can_finish.len();
            for tool in &self.allowed {
                if !can_finish.contains(tool)
                    && self
                        .successors(tool)
                        .into_iter()
                        .any(|next| can_finish.contains(next))
                {
                    can_finish.insert(tool);
                }
            }
            if can_finish.len() == before {
                break;
            }
        }

        if let Some(stuck) = self.allowed.iter().find(|tool| !can_finish.contains(tool)) {
            return Err(GraphError::TerminalUnreachable(stuck.to_string()));
        }
        if !self
            .entry_tools()
            .iter()
            .any(|tool| can_finish.contains(tool))
        {
            return Err(GraphError::TerminalUnreachable("turn start".to_string()));
        }
        Ok(())
    }
}

/// Builder for [`ToolRuleGraph`].
#[derive(Debug, Default)]
pub struct ToolRuleGraphBuilder {
    allowed: BTreeSet<ToolName>,
    entry: Option<BTreeSet<ToolName>>,
    rules: Vec<(ToolName, ToolRule)>,
}

impl ToolRuleGraphBuilder {
    /// Add tools to the allowed set.
    pub fn allow(mut self, tools: impl IntoIterator<Item = ToolName>) -> Self {
        self.allowed.extend(tools);
        self
    }

    /// Restrict which tools may open a turn.
    pub fn entry(mut self, tools: impl IntoIterator<Item = ToolName>) -> Self {
        self.entry
            .get_or_insert_with(BTreeSet::new)
            .extend(tools);
        self
    }

    pub fn rule(mut self, tool: ToolName, rule: ToolRule) -> Self {
        self.rules.push((tool, rule));
        self
    }

    pub fn build(self) -> Result<ToolRuleGraph, GraphError> {
        let mut rules = BTreeMap::new();
        for (tool, rule) in self.rules {
            if rules.contains_key(&tool) {
                return Err(GraphError::DuplicateRule(tool));
            }
            rules.insert(tool, rule);
        }

        let graph = ToolRuleGraph {
            allowed: self.allowed,
            entry: self.entry,
            rules,
        };
        graph.validate()?;
        Ok(graph)
    }
}
