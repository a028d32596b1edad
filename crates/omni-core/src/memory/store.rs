use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, warn};

use super::block::{BlockSpec, BlockView, MemoryBlock};
use crate::error::{MemoryError, MemoryOperation};
use crate::identifiers::{AgentRole, BlockLabel};

/// Shared, label-addressed store for every memory block in an actor set.
///
/// One `MemoryStore` owns all labels and their access tables and is injected
/// into every actor (usually behind an `Arc`); no actor keeps a private copy.
///
/// Mutations on the same label are serialized: each operation runs while
/// holding the label's exclusive map guard, so the match-then-replace of
/// [`write`](Self::write) is atomic and two writers cannot both match stale
/// content.
///
/// # Example
///
/// ```rust
/// use omni_core::identifiers::{AgentRole, BlockLabel};
/// use omni_core::memory::{BlockSpec, MemoryStore};
///
/// let tasks = AgentRole::parse("tasks").unwrap();
/// let label = BlockLabel::parse("user_tasks").unwrap();
///
/// let store = MemoryStore::new();
/// store
///     .register(BlockSpec::new(label.clone(), 8000).owned_by(tasks.clone()))
///     .unwrap();
///
/// store.write(&label, &tasks, "", "- Buy milk").unwrap();
/// assert_eq!(store.read(&label, &tasks).unwrap(), "- Buy milk");
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    blocks: DashMap<BlockLabel, MemoryBlock>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a block. Labels are unique and blocks are never removed.
    pub fn register(&self, spec: BlockSpec) -> Result<(), MemoryError> {
        match self.blocks.entry(spec.label().clone()) {
            Entry::Occupied(occupied) => Err(MemoryError::DuplicateLabel {
                label: occupied.key().clone(),
            }),
            Entry::Vacant(vacant) => {
                let block = spec.into_block()?;
                debug!(
                    label = %block.label(),
                    size_limit = block.size_limit(),
                    "Registered memory block"
                );
                vacant.insert(block);
                Ok(())
            }
        }
    }

    /// Read the current value of a block.
    pub fn read(&self, label: &BlockLabel, role: &AgentRole) -> Result<String, MemoryError> {
        let block = self
            .blocks
            .get(label)
            .ok_or_else(|| MemoryError::UnknownLabel {
                label: label.clone(),
            })?;
        block.authorize(role, MemoryOperation::Read)?;
        Ok(block.value().value().to_string())
    }

    /// Replace every occurrence of `old` with `new`.
    ///
    /// Fails with `ContentNotFound` when `old` does not occur verbatim
    /// (case-sensitive, no fuzzy matching) and with `SizeLimitExceeded` when
    /// the result would not fit. On any failure the block is unchanged.
    pub fn write(
        &self,
        label: &BlockLabel,
        role: &AgentRole,
        old: &str,
        new: &str,
    ) -> Result<(), MemoryError> {
        self.mutate(label, role, MemoryOperation::Write, |block| {
            if !block.value().contains(old) {
                return Err(MemoryError::ContentNotFound {
                    label: label.clone(),
                });
            }
            let occurrences = block.value().matches(old).count();
            let candidate = block.value().replace(old, new);
            block.commit(candidate)?;
            debug!(%label, %role, occurrences, len = block.len(), "Replaced memory block content");
            Ok(())
        })
    }

    /// Append `text` to the end of a block without any substring matching.
    pub fn append(
        &self,
        label: &BlockLabel,
        role: &AgentRole,
        text: &str,
    ) -> Result<(), MemoryError> {
        self.mutate(label, role, MemoryOperation::Append, |block| {
            let mut candidate = String::with_capacity(block.value().len() + text.len());
            candidate.push_str(block.value());
            candidate.push_str(text);
            block.commit(candidate)?;
            debug!(%label, %role, appended = text.chars().count(), "Appended to memory block");
            Ok(())
        })
    }

    /// Swap the whole value of a block in one step.
    ///
    /// Either `value` fits and becomes the block's value, or the block is
    /// left untouched.
    pub fn replace(
        &self,
        label: &BlockLabel,
        role: &AgentRole,
        value: &str,
    ) -> Result<(), MemoryError> {
        self.mutate(label, role, MemoryOperation::Replace, |block| {
            block.commit(value.to_string())?;
            debug!(%label, %role, len = block.len(), "Replaced memory block value");
            Ok(())
        })
    }

    /// Clear a block to the empty string. Always succeeds when authorized.
    pub fn reset(&self, label: &BlockLabel, role: &AgentRole) -> Result<(), MemoryError> {
        self.mutate(label, role, MemoryOperation::Reset, |block| {
            block.commit(String::new())?;
            debug!(%label, %role, "Reset memory block");
            Ok(())
        })
    }

    /// Snapshots of every block `role` may read, ordered by label.
    pub fn visible_blocks(&self, role: &AgentRole) -> Vec<BlockView> {
        let mut views: Vec<BlockView> = self
            .blocks
            .iter()
            .filter_map(|entry| {
                let block = entry.value();
                block.access().mode(role).map(|mode| block.view(mode))
            })
            .collect();
        views.sort_by(|a, b| a.label.cmp(&b.label));
        views
    }

    /// Size limit of a block, if registered.
    pub fn size_limit(&self, label: &BlockLabel) -> Option<usize> {
        self.blocks.get(label).map(|block| block.size_limit())
    }

    /// All registered labels, ordered.
    pub fn labels(&self) -> Vec<BlockLabel> {
        let mut labels: Vec<BlockLabel> = self.blocks.iter().map(|e| e.key().clone()).collect();
        labels.sort();
        labels
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    fn mutate<F>(
        &self,
        label: &BlockLabel,
        role: &AgentRole,
        operation: MemoryOperation,
        apply: F,
    ) -> Result<(), MemoryError>
    where
        F: FnOnce(&mut MemoryBlock) -> Result<(), MemoryError>,
    {
        let mut block = self
            .blocks
            .get_mut(label)
            .ok_or_else(|| MemoryError::UnknownLabel {
                label: label.clone(),
            })?;

        let result = block
            .authorize(role, operation)
            .and_then(|_| apply(&mut *block));

        if let Err(err) = &result {
            warn!(%label, %role, %operation, error = %err, "Memory mutation rejected");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::AccessMode;

    fn role(name: &str) -> AgentRole {
        AgentRole::new_unchecked(name)
    }

    fn label(name: &str) -> BlockLabel {
        BlockLabel::new_unchecked(name)
    }

    fn store_with_tasks(limit: usize) -> MemoryStore {
        let store = MemoryStore::new();
        store
            .register(
                BlockSpec::new(label("user_tasks"), limit)
                    .owned_by(role("tasks"))
                    .readable_by(role("conversational")),
            )
            .unwrap();
        store
    }

    #[test]
    fn test_task_list_scenario() {
        let store = store_with_tasks(8000);
        let (l, r) = (label("user_tasks"), role("tasks"));

        store.write(&l, &r, "", "- Buy milk").unwrap();
        assert_eq!(store.read(&l, &r).unwrap(), "- Buy milk");

        store
            .write(&l, &r, "- Buy milk", "- Buy milk\n- Call Bob")
            .unwrap();
        assert_eq!(store.read(&l, &r).unwrap(), "- Buy milk\n- Call Bob");

        let err = store.write(&l, &r, "- Buy eggs", "x").unwrap_err();
        assert_eq!(err, MemoryError::ContentNotFound { label: l.clone() });
        assert_eq!(store.read(&l, &r).unwrap(), "- Buy milk\n- Call Bob");
    }

    #[test]
    fn test_write_replaces_every_occurrence() {
        let store = store_with_tasks(100);
        let (l, r) = (label("user_tasks"), role("tasks"));

        store.append(&l, &r, "todo; todo; done").unwrap();
        store.write(&l, &r, "todo", "done").unwrap();
        assert_eq!(store.read(&l, &r).unwrap(), "done; done; done");
    }

    #[test]
    fn test_write_is_case_sensitive() {
        let store = store_with_tasks(100);
        let (l, r) = (label("user_tasks"), role("tasks"));

        store.append(&l, &r, "Buy Milk").unwrap();
        assert!(matches!(
            store.write(&l, &r, "buy milk", "x"),
            Err(MemoryError::ContentNotFound { .. })
        ));
    }

    #[test]
    fn test_size_limit_leaves_block_unchanged() {
        let store = store_with_tasks(10);
        let (l, r) = (label("user_tasks"), role("tasks"));

        store.write(&l, &r, "", "0123456789").unwrap();
        let err = store.write(&l, &r, "9", "9!").unwrap_err();
        assert_eq!(
            err,
            MemoryError::SizeLimitExceeded {
                label: l.clone(),
                limit: 10,
                attempted: 11
            }
        );
        assert_eq!(store.read(&l, &r).unwrap(), "0123456789");

        assert!(store.append(&l, &r, "x").is_err());
        assert_eq!(store.read(&l, &r).unwrap(), "0123456789");
    }

    #[test]
    fn test_replace_swaps_whole_value_or_nothing() {
        let store = store_with_tasks(10);
        let (l, r) = (label("user_tasks"), role("tasks"));

        store.append(&l, &r, "old plan").unwrap();
        store.replace(&l, &r, "new plan").unwrap();
        assert_eq!(store.read(&l, &r).unwrap(), "new plan");

        assert!(matches!(
            store.replace(&l, &r, "a much longer plan"),
            Err(MemoryError::SizeLimitExceeded { attempted: 18, .. })
        ));
        assert_eq!(store.read(&l, &r).unwrap(), "new plan");
        assert!(matches!(
            store.replace(&l, &role("conversational"), ""),
            Err(MemoryError::AccessDenied {
                operation: MemoryOperation::Replace,
                ..
            })
        ));
    }

    #[test]
    fn test_read_only_role_cannot_mutate() {
        let store = store_with_tasks(100);
        let l = label("user_tasks");
        let reader = role("conversational");

        assert_eq!(store.read(&l, &reader).unwrap(), "");
        for result in [
            store.write(&l, &reader, "", "x"),
            store.append(&l, &reader, "x"),
            store.reset(&l, &reader),
        ] {
            assert!(matches!(result, Err(MemoryError::AccessDenied { .. })));
        }
    }

    #[test]
    fn test_unregistered_role_and_unknown_label() {
        let store = store_with_tasks(100);

        assert!(matches!(
            store.read(&label("user_tasks"), &role("projects")),
            Err(MemoryError::AccessDenied {
                operation: MemoryOperation::Read,
                ..
            })
        ));
        assert!(matches!(
            store.read(&label("missing"), &role("tasks")),
            Err(MemoryError::UnknownLabel { .. })
        ));
        assert!(matches!(
            store.write(&label("missing"), &role("tasks"), "", "x"),
            Err(MemoryError::UnknownLabel { .. })
        ));
    }

    #[test]
    fn test_reset_always_succeeds_when_authorized() {
        let store = store_with_tasks(100);
        let (l, r) = (label("user_tasks"), role("tasks"));

        store.reset(&l, &r).unwrap();
        store.append(&l, &r, "content").unwrap();
        store.reset(&l, &r).unwrap();
        assert_eq!(store.read(&l, &r).unwrap(), "");
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let store = store_with_tasks(100);
        let err = store
            .register(BlockSpec::new(label("user_tasks"), 5))
            .unwrap_err();
        assert!(matches!(err, MemoryError::DuplicateLabel { .. }));
        assert_eq!(store.size_limit(&label("user_tasks")), Some(100));
    }

    #[test]
    fn test_visible_blocks_respect_access_table() {
        let store = store_with_tasks(100);
        store
            .register(BlockSpec::new(label("tasks_changelog"), 50).owned_by(role("tasks")))
            .unwrap();

        let owner_view = store.visible_blocks(&role("tasks"));
        assert_eq!(owner_view.len(), 2);
        assert_eq!(owner_view[0].label.as_str(), "tasks_changelog");

        let reader_view = store.visible_blocks(&role("conversational"));
        assert_eq!(reader_view.len(), 1);
        assert_eq!(reader_view[0].mode, AccessMode::ReadOnly);

        assert!(store.visible_blocks(&role("nobody")).is_empty());
    }

    #[test]
    fn test_co_writers_share_a_block() {
        let store = MemoryStore::new();
        store
            .register(
                BlockSpec::new(label("shared"), 100)
                    .owned_by(role("tasks"))
                    .co_writer(role("projects")),
            )
            .unwrap();

        store.append(&label("shared"), &role("tasks"), "a").unwrap();
        store.append(&label("shared"), &role("projects"), "b").unwrap();
        assert_eq!(store.read(&label("shared"), &role("tasks")).unwrap(), "ab");
    }

    #[test]
    fn test_concurrent_writers_never_lose_updates() {
        let store = MemoryStore::new();
        let l = label("counter");
        store
            .register(
                BlockSpec::new(l.clone(), 64)
                    .with_value("count=000000")
                    .owned_by(role("a"))
                    .co_writer(role("b")),
            )
            .unwrap();

        const PER_WRITER: usize = 200;
        std::thread::scope(|scope| {
            for writer in ["a", "b"] {
                let store = &store;
                let l = l.clone();
                scope.spawn(move || {
                    let r = role(writer);
                    let mut done = 0;
                    while done < PER_WRITER {
                        let current = store.read(&l, &r).unwrap();
                        let n: usize = current["count=".len()..].parse().unwrap();
                        match store.write(&l, &r, &current, &format!("count={:06}", n + 1)) {
                            Ok(()) => done += 1,
                            Err(MemoryError::ContentNotFound { .. }) => continue,
                            Err(other) => panic!("unexpected error: {other}"),
                        }
                    }
                });
            }
        });

        assert_eq!(
            store.read(&l, &role("a")).unwrap(),
            format!("count={:06}", 2 * PER_WRITER)
        );
    }
}
