//! Memory store errors.
//!
//! Every variant leaves the addressed block unchanged: a failed `write`,
//! `append` or `reset` has no partial effect.

use thiserror::Error;

use crate::identifiers::{AgentRole, BlockLabel};

/// Errors returned by [`MemoryStore`](crate::memory::MemoryStore) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// The role has no registered access to the block, or only read access
    /// for a mutating operation.
    #[error("Role '{role}' may not {operation} block '{label}'")]
    AccessDenied {
        label: BlockLabel,
        role: AgentRole,
        operation: MemoryOperation,
    },

    /// No block is registered under the label.
    #[error("Unknown memory block '{label}'")]
    UnknownLabel { label: BlockLabel },

    /// The expected prior text does not occur verbatim in the block.
    #[error("Old content not found in memory block '{label}'")]
    ContentNotFound { label: BlockLabel },

    /// The candidate value would exceed the block's size limit.
    #[error("Memory block '{label}' would grow to {attempted} characters (limit {limit})")]
    SizeLimitExceeded {
        label: BlockLabel,
        limit: usize,
        attempted: usize,
    },

    /// A block with the same label has already been registered.
    #[error("Memory block '{label}' is already registered")]
    DuplicateLabel { label: BlockLabel },
}

impl MemoryError {
    /// Label of the block the failed operation addressed.
    pub fn label(&self) -> &BlockLabel {
        match self {
            MemoryError::AccessDenied { label, .. }
            | MemoryError::UnknownLabel { label }
            | MemoryError::ContentNotFound { label }
            | MemoryError::SizeLimitExceeded { label, .. }
            | MemoryError::DuplicateLabel { label } => label,
        }
    }
}

/// Operation kinds used in access errors and log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryOperation {
    Read,
    Write,
    Append,
    Replace,
    Reset,
}

impl MemoryOperation {
    /// Whether the operation mutates the block.
    pub fn is_mutation(self) -> bool {
        !matches!(self, MemoryOperation::Read)
    }
}

impl std::fmt::Display for MemoryOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MemoryOperation::Read => "read",
            MemoryOperation::Write => "write",
            MemoryOperation::Append => "append to",
            MemoryOperation::Replace => "replace",
            MemoryOperation::Reset => "reset",
        };
        f.write_str(name)
    }
}
