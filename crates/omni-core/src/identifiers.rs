//! Validated identifier types shared by every Omni crate
//!
//! Each identifier is a distinct newtype so that a [`BlockLabel`] can never be
//! passed where an [`AgentRole`] is expected. All of them are created through
//! `parse()`, which applies [`IdentifierRules`](crate::validation::IdentifierRules),
//! and serialize as plain strings.
//!
//! ```rust
//! use omni_core::identifiers::{AgentId, BlockLabel, ToolName};
//!
//! let agent = AgentId::parse("tasks-agent").unwrap();
//! let label = BlockLabel::parse("user_tasks").unwrap();
//! let tool = ToolName::parse("update_user_tasks").unwrap();
//!
//! assert!(AgentId::parse("").is_err());
//! assert!(ToolName::parse("tool.with.dots").is_err());
//! assert_eq!(label.as_str(), "user_tasks");
//! # let _ = (agent, tool);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::validation::{IdentifierRules, ValidationError};

macro_rules! validated_identifier {
    ($(#[$meta:meta])* $name:ident, $rules:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Parse and validate the identifier from a string
            pub fn parse(id: impl AsRef<str>) -> Result<Self, ValidationError> {
                $rules.validate(id.as_ref()).map(Self)
            }

            /// Get the identifier as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Create the identifier without validation (constants and tests only)
            #[doc(hidden)]
            pub fn new_unchecked(id: impl Into<String>) -> Self {
                Self(id.into())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::parse(s)
            }
        }
    };
}

validated_identifier!(
    /// Unique identifier of one actor instance; also the mailbox address.
    AgentId,
    IdentifierRules::IDENTIFIER
);

validated_identifier!(
    /// Role an actor plays (e.g. `orchestrator`, `tasks`).
    ///
    /// Memory access tables are keyed by role, not by actor id.
    AgentRole,
    IdentifierRules::IDENTIFIER
);

validated_identifier!(
    /// Unique key of a memory block.
    BlockLabel,
    IdentifierRules::IDENTIFIER
);

validated_identifier!(
    /// Name of a tool an actor may invoke.
    ToolName,
    IdentifierRules::TOOL_NAME
);

validated_identifier!(
    /// Abstract capability a delegation targets (e.g. `task-domain`).
    CapabilityTag,
    IdentifierRules::IDENTIFIER
);

/// Error for identifiers that must be UUIDs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid {kind} format (expected UUID): '{value}'")]
pub struct UuidFormatError {
    kind: &'static str,
    value: String,
}

macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random identifier (UUID v4)
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Parse and validate the identifier from a UUID string
            pub fn parse(id: impl AsRef<str>) -> Result<Self, UuidFormatError> {
                let s = id.as_ref();
                Uuid::parse_str(s).map(Self).map_err(|_| UuidFormatError {
                    kind: stringify!($name),
                    value: s.to_string(),
                })
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = UuidFormatError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

uuid_identifier!(
    /// Correlates a delegation with the replies it eventually produces.
    RequestId
);

uuid_identifier!(
    /// Unique identifier of one delivered message; duplicates share it.
    MessageId
);
