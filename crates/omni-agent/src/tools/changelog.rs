//! Changelog tool: records the edit made earlier in the same turn.

use crate::tool::{AgentTool, ToolContext};
use async_trait::async_trait;
use omni_core::{
    BlockLabel, ChangelogRecorder, ExecutionResult, FailureReason, MemoryError, ToolCall, ToolName,
};
use tracing::warn;

/// Appends one entry for the turn's last recorded change.
///
/// Optional argument `note`. Overflowing the changelog block does not roll
/// back the edit; the tool succeeds and leaves a warning on the turn, which
/// travels with the next outgoing message.
#[derive(Debug, Clone)]
pub struct ChangelogTool {
    name: ToolName,
    label: BlockLabel,
}

impl ChangelogTool {
    pub fn new(name: ToolName, label: BlockLabel) -> Self {
        Self { name, label }
    }
}

#[async_trait]
impl AgentTool for ChangelogTool {
    fn name(&self) -> &ToolName {
        &self.name
    }

    async fn call(&self, call: &ToolCall, ctx: &mut ToolContext<'_>) -> ExecutionResult {
        let Some(change) = ctx.scope.take_change() else {
            return ExecutionResult::failed(FailureReason::InvalidInput {
                message: "no memory change to record in this turn".to_string(),
            });
        };
        let note = call.opt_str_arg("note").unwrap_or_default();

        match ChangelogRecorder::new(ctx.store).append(
            &self.label,
            ctx.role,
            ctx.agent,
            &change.old,
            &change.new,
            note,
        ) {
            Ok(_) => ExecutionResult::success(format!("Recorded change in {}", self.label)),
            Err(MemoryError::SizeLimitExceeded { limit, .. }) => {
                warn!(label = %self.label, limit, "Changelog full; entry dropped");
                ctx.scope.warn(format!(
                    "Changelog '{}' is full ({limit} characters); the change was applied but not recorded",
                    self.label
                ));
                ExecutionResult::success(format!("Change applied; {} is full", self.label))
            }
            Err(err) => ExecutionResult::failed(FailureReason::from(err)),
        }
    }
}
