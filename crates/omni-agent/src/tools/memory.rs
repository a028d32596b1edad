//! Validated edits of a single memory block.

use crate::tool::{AgentTool, ToolContext};
use async_trait::async_trait;
use omni_core::{BlockLabel, ExecutionResult, FailureReason, ToolCall, ToolName};
use tracing::warn;

/// Replace-all edit of one block, e.g. `update_user_tasks`.
///
/// Arguments: `old_str` (may be empty for an empty block) and `new_str`.
/// A successful edit is remembered for the changelog tool of the same turn.
#[derive(Debug, Clone)]
pub struct MemoryEditTool {
    name: ToolName,
    label: BlockLabel,
}

impl MemoryEditTool {
    pub fn new(name: ToolName, label: BlockLabel) -> Self {
        Self { name, label }
    }

    pub fn label(&self) -> &BlockLabel {
        &self.label
    }
}

#[async_trait]
impl AgentTool for MemoryEditTool {
    fn name(&self) -> &ToolName {
        &self.name
    }

    async fn call(&self, call: &ToolCall, ctx: &mut ToolContext<'_>) -> ExecutionResult {
        let (old, new) = match (call.str_arg("old_str"), call.str_arg("new_str")) {
            (Ok(old), Ok(new)) => (old, new),
            (Err(reason), _) | (_, Err(reason)) => return ExecutionResult::failed(reason),
        };

        match ctx.store.write(&self.label, ctx.role, old, new) {
            Ok(()) => {
                ctx.scope.record_change(old, new);
                ExecutionResult::success(format!("Updated {}", self.label))
            }
            Err(err) => {
                warn!(label = %self.label, agent = %ctx.agent, error = %err, "Memory edit rejected");
                ExecutionResult::failed(FailureReason::from(err))
            }
        }
    }
}
