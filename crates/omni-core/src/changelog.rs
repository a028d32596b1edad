//! Append-only audit trail stored inside a memory block.
//!
//! Each [`ChangelogEntry`] renders to one line:
//!
//! ```text
//! [2025-01-01T09:00:00.000Z] tasks-agent: "- Buy milk" -> "- Buy milk\n- Call Bob" (added call)
//! ```
//!
//! Snippets are JSON-quoted so multi-line edits stay on a single line and
//! the log can be parsed back for audits.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::error::MemoryError;
use crate::identifiers::{AgentId, AgentRole, BlockLabel};
use crate::memory::MemoryStore;

/// One recorded mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangelogEntry {
    pub timestamp: DateTime<Utc>,
    pub actor: AgentId,
    pub old: String,
    pub new: String,
    pub note: String,
}

/// A changelog line that does not follow the entry format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Malformed changelog line: {reason}")]
pub struct ChangelogParseError {
    reason: String,
}

impl ChangelogParseError {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl ChangelogEntry {
    pub fn new(
        actor: AgentId,
        old: impl Into<String>,
        new: impl Into<String>,
        note: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            actor,
            old: old.into(),
            new: new.into(),
            note: note.into(),
        }
    }

    /// Render as a single line terminated by `\n`.
    pub fn render(&self) -> String {
        let note = self.note.replace(['\n', '\r'], " ");
        format!(
            "[{}] {}: {} -> {} ({})\n",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.actor,
            quote(&self.old),
            quote(&self.new),
            note.trim()
        )
    }

    /// Parse one rendered line (with or without its trailing newline).
    pub fn parse(line: &str) -> Result<Self, ChangelogParseError> {
        let line = line.trim_end_matches('\n');
        let rest = line
            .strip_prefix('[')
            .ok_or_else(|| ChangelogParseError::new("missing timestamp"))?;
        let (timestamp, rest) = rest
            .split_once("] ")
            .ok_or_else(|| ChangelogParseError::new("unterminated timestamp"))?;
        let timestamp = DateTime::parse_from_rfc3339(timestamp)
            .map_err(|e| ChangelogParseError::new(format!("bad timestamp: {e}")))?
            .with_timezone(&Utc);

        let (actor, rest) = rest
            .split_once(": ")
            .ok_or_else(|| ChangelogParseError::new("missing actor"))?;
        let actor =
            AgentId::parse(actor).map_err(|e| ChangelogParseError::new(format!("bad actor: {e}")))?;

        let (old, rest) = unquote(rest)?;
        let rest = rest
            .strip_prefix(" -> ")
            .ok_or_else(|| ChangelogParseError::new("missing arrow"))?;
        let (new, rest) = unquote(rest)?;
        let note = rest
            .strip_prefix(" (")
            .and_then(|r| r.strip_suffix(')'))
            .ok_or_else(|| ChangelogParseError::new("missing note"))?;

        Ok(Self {
            timestamp,
            actor,
            old,
            new,
            note: note.to_string(),
        })
    }
}

fn quote(snippet: &str) -> String {
    serde_json::Value::String(snippet.to_string()).to_string()
}

fn unquote(input: &str) -> Result<(String, &str), ChangelogParseError> {
    let mut stream = serde_json::Deserializer::from_str(input).into_iter::<String>();
    match stream.next() {
        Some(Ok(value)) => Ok((value, &input[stream.byte_offset()..])),
        _ => Err(ChangelogParseError::new("bad snippet")),
    }
}

/// Writes changelog entries through the store's append primitive.
///
/// Entries are never rewritten or reordered. Ordering relative to the
/// domain mutation they describe is enforced by the tool-rule graph, not
/// here.
#[derive(Debug, Clone, Copy)]
pub struct ChangelogRecorder<'s> {
    store: &'s MemoryStore,
}

impl<'s> ChangelogRecorder<'s> {
    pub fn new(store: &'s MemoryStore) -> Self {
        Self { store }
    }

    /// Format and append one entry stamped now.
    pub fn append(
        &self,
        label: &BlockLabel,
        role: &AgentRole,
        actor: &AgentId,
        old: &str,
        new: &str,
        note: &str,
    ) -> Result<ChangelogEntry, MemoryError> {
        let entry = ChangelogEntry::new(actor.clone(), old, new, note);
        self.append_entry(label, role, &entry)?;
        Ok(entry)
    }

    pub fn append_entry(
        &self,
        label: &BlockLabel,
        role: &AgentRole,
        entry: &ChangelogEntry,
    ) -> Result<(), MemoryError> {
        match self.store.append(label, role, &entry.render()) {
            Ok(()) => {
                info!(%label, actor = %entry.actor, note = %entry.note, "Changelog entry recorded");
                Ok(())
            }
            Err(err) => {
                warn!(%label, actor = %entry.actor, error = %err, "Changelog entry not recorded");
                Err(err)
            }
        }
    }

    /// Parse every entry of a changelog block, in recorded order.
    pub fn entries(
        &self,
        label: &BlockLabel,
        role: &AgentRole,
    ) -> Result<Vec<Result<ChangelogEntry, ChangelogParseError>>, MemoryError> {
        let value = self.store.read(label, role)?;
        Ok(value.lines().map(ChangelogEntry::parse).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::BlockSpec;
    use chrono::TimeZone;

    fn setup(limit: usize) -> (MemoryStore, BlockLabel, AgentRole, AgentId) {
        let store = MemoryStore::new();
        let label = BlockLabel::new_unchecked("tasks_changelog");
        let role = AgentRole::new_unchecked("tasks");
        store
            .register(BlockSpec::new(label.clone(), limit).owned_by(role.clone()))
            .unwrap();
        (store, label, role, AgentId::new_unchecked("tasks-agent"))
    }

    #[test]
    fn test_render_format() {
        let entry = ChangelogEntry {
            timestamp: Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap(),
            actor: AgentId::new_unchecked("tasks-agent"),
            old: "- Buy milk".into(),
            new: "- Buy milk\n- Call Bob".into(),
            note: "added call".into(),
        };
        assert_eq!(
            entry.render(),
            "[2025-01-01T09:00:00.000Z] tasks-agent: \"- Buy milk\" -> \"- Buy milk\\n- Call Bob\" (added call)\n"
        );
        assert_eq!(ChangelogEntry::parse(&entry.render()).unwrap(), entry);
    }

    #[test]
    fn test_parse_keeps_tricky_snippets() {
        let mut entry = ChangelogEntry::new(
            AgentId::new_unchecked("a"),
            "say \"hi\" -> (now)",
            "",
            "note (with parens)",
        );
        entry.timestamp = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(ChangelogEntry::parse(&entry.render()).unwrap(), entry);
        assert!(ChangelogEntry::parse("not an entry").is_err());
    }

    #[test]
    fn test_entries_accumulate_in_order() {
        let (store, label, role, actor) = setup(8000);
        let recorder = ChangelogRecorder::new(&store);

        recorder.append(&label, &role, &actor, "", "- Buy milk", "first").unwrap();
        recorder
            .append(&label, &role, &actor, "- Buy milk", "", "second")
            .unwrap();

        let entries: Vec<_> = recorder
            .entries(&label, &role)
            .unwrap()
            .into_iter()
            .map(Result::unwrap)
            .collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].note, "first");
        assert_eq!(entries[1].old, "- Buy milk");
    }

    #[test]
    fn test_overflow_leaves_log_untouched() {
        let (store, label, role, actor) = setup(80);
        let recorder = ChangelogRecorder::new(&store);

        recorder.append(&label, &role, &actor, "", "x", "ok").unwrap();
        let before = store.read(&label, &role).unwrap();

        let err = recorder
            .append(&label, &role, &actor, "", &"y".repeat(100), "too big")
            .unwrap_err();
        assert!(matches!(err, MemoryError::SizeLimitExceeded { .. }));
        assert_eq!(store.read(&label, &role).unwrap(), before);
    }
}
