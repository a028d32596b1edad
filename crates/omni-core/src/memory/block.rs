//! Memory block data model: label, value, size limit and access table.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{MemoryError, MemoryOperation};
use crate::identifiers::{AgentRole, BlockLabel};

/// How a role may use a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    ReadWrite,
    ReadOnly,
}

impl AccessMode {
    pub fn can_write(self) -> bool {
        matches!(self, AccessMode::ReadWrite)
    }
}

/// Role-to-mode mapping attached to a block.
///
/// Roles absent from the table have no access at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTable(BTreeMap<AgentRole, AccessMode>);

impl AccessTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant `mode` to `role`, replacing any earlier grant.
    pub fn grant(&mut self, role: AgentRole, mode: AccessMode) {
        self.0.insert(role, mode);
    }

    /// Mode registered for `role`, if any.
    pub fn mode(&self, role: &AgentRole) -> Option<AccessMode> {
        self.0.get(role).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A label-addressed, size-limited text container.
///
/// Invariant: `value` never holds more than `size_limit` characters. All
/// mutation goes through [`MemoryStore`](super::MemoryStore), which rejects
/// any candidate value that would break it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryBlock {
    label: BlockLabel,
    value: String,
    size_limit: usize,
    access: AccessTable,
}

impl MemoryBlock {
    pub fn label(&self) -> &BlockLabel {
        &self.label
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn size_limit(&self) -> usize {
        self.size_limit
    }

    pub fn access(&self) -> &AccessTable {
        &self.access
    }

    /// Current length in characters.
    pub fn len(&self) -> usize {
        self.value.chars().count()
    }

    pub(crate) fn authorize(
        &self,
        role: &AgentRole,
        operation: MemoryOperation,
    ) -> Result<AccessMode, MemoryError> {
        let denied = || MemoryError::AccessDenied {
            label: self.label.clone(),
            role: role.clone(),
            operation,
        };

        let mode = self.access.mode(role).ok_or_else(denied)?;
        if operation.is_mutation() && !mode.can_write() {
            return Err(denied());
        }
        Ok(mode)
    }

    /// Commit `candidate` if it fits, otherwise leave the block untouched.
    pub(crate) fn commit(&mut self, candidate: String) -> Result<(), MemoryError> {
        let attempted = candidate.chars().count();
        if attempted > self.size_limit {
            return Err(MemoryError::SizeLimitExceeded {
                label: self.label.clone(),
                limit: self.size_limit,
                attempted,
            });
        }
        self.value = candidate;
        Ok(())
    }

    pub(crate) fn view(&self, mode: AccessMode) -> BlockView {
        BlockView {
            label: self.label.clone(),
            value: self.value.clone(),
            size_limit: self.size_limit,
            mode,
        }
    }
}

/// Registration request for a block, built once at actor-set initialization.
///
/// ```rust
/// use omni_core::identifiers::{AgentRole, BlockLabel};
/// use omni_core::memory::BlockSpec;
///
/// let spec = BlockSpec::new(BlockLabel::parse("user_tasks").unwrap(), 8000)
///     .owned_by(AgentRole::parse("tasks").unwrap())
///     .readable_by(AgentRole::parse("conversational").unwrap());
/// assert_eq!(spec.size_limit(), 8000);
/// ```
#[derive(Debug, Clone)]
pub struct BlockSpec {
    label: BlockLabel,
    value: String,
    size_limit: usize,
    access: AccessTable,
}

impl BlockSpec {
    pub fn new(label: BlockLabel, size_limit: usize) -> Self {
        Self {
            label,
            value: String::new(),
            size_limit,
            access: AccessTable::new(),
        }
    }

    /// Initial value; must fit within the size limit.
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    /// The single writer role.
    pub fn owned_by(mut self, role: AgentRole) -> Self {
        self.access.grant(role, AccessMode::ReadWrite);
        self
    }

    /// An additional co-equal writer for shared blocks.
    pub fn co_writer(mut self, role: AgentRole) -> Self {
        self.access.grant(role, AccessMode::ReadWrite);
        self
    }

    /// A read-only consumer.
    pub fn readable_by(mut self, role: AgentRole) -> Self {
        self.access.grant(role, AccessMode::ReadOnly);
        self
    }

    pub fn label(&self) -> &BlockLabel {
        &self.label
    }

    pub fn size_limit(&self) -> usize {
        self.size_limit
    }

    pub(crate) fn into_block(self) -> Result<MemoryBlock, MemoryError> {
        let mut block = MemoryBlock {
            label: self.label,
            value: String::new(),
            size_limit: self.size_limit,
            access: self.access,
        };
        block.commit(self.value)?;
        Ok(block)
    }
}

/// Read-only snapshot of a block as seen by one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockView {
    pub label: BlockLabel,
    pub value: String,
    pub size_limit: usize,
    pub mode: AccessMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(name: &str) -> AgentRole {
        AgentRole::new_unchecked(name)
    }

    #[test]
    fn test_spec_rejects_oversized_initial_value() {
        let spec = BlockSpec::new(BlockLabel::new_unchecked("notes"), 3).with_value("four");
        assert!(matches!(
            spec.into_block(),
            Err(MemoryError::SizeLimitExceeded {
                limit: 3,
                attempted: 4,
                ..
            })
        ));
    }

    #[test]
    fn test_authorize_distinguishes_read_and_write() {
        let block = BlockSpec::new(BlockLabel::new_unchecked("user_tasks"), 100)
            .owned_by(role("tasks"))
            .readable_by(role("conversational"))
            .into_block()
            .unwrap();

        assert!(block.authorize(&role("tasks"), MemoryOperation::Write).is_ok());
        assert!(
            block
                .authorize(&role("conversational"), MemoryOperation::Read)
                .is_ok()
        );
        assert!(
            block
                .authorize(&role("conversational"), MemoryOperation::Write)
                .is_err()
        );
        assert!(
            block
                .authorize(&role("stranger"), MemoryOperation::Read)
                .is_err()
        );
        assert_eq!(block.access().mode(&role("tasks")), Some(AccessMode::ReadWrite));
    }

    #[test]
    fn test_length_counts_characters() {
        let block = BlockSpec::new(BlockLabel::new_unchecked("emoji"), 2)
            .with_value("🎉✓")
            .into_block()
            .unwrap();
        assert_eq!(block.len(), 2);
    }
}
