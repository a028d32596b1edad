use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::identifiers::ToolName;

/// Transition taken after a tool executes successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolRule {
    /// Only `children` may be proposed next.
    Constrain { children: Vec<ToolName> },

    /// The turn ends; nothing may follow.
    Terminal,

    /// The tool's output picks the next tool; unmatched outputs fall back to
    /// `default`, or leave the turn stuck when there is none.
    Conditional {
        mapping: BTreeMap<String, ToolName>,
        default: Option<ToolName>,
    },
}

impl ToolRule {
    pub fn constrain(children: impl IntoIterator<Item = ToolName>) -> Self {
        ToolRule::Constrain {
            children: children.into_iter().collect(),
        }
    }

    pub fn terminal() -> Self {
        ToolRule::Terminal
    }

    pub fn conditional<K: Into<String>>(
        mapping: impl IntoIterator<Item = (K, ToolName)>,
        default: Option<ToolName>,
    ) -> Self {
        ToolRule::Conditional {
            mapping: mapping
                .into_iter()
                .map(|(outcome, tool)| (outcome.into(), tool))
                .collect(),
            default,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ToolRule::Terminal)
    }

    /// Every tool this rule can lead to.
    pub fn targets(&self) -> Vec<&ToolName> {
        match self {
            ToolRule::Constrain { children } => children.iter().collect(),
            ToolRule::Terminal => Vec::new(),
            ToolRule::Conditional { mapping, default } => {
                mapping.values().chain(default.iter()).collect()
            }
        }
    }
}
