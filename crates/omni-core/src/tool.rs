//! Tool call and execution result types shared by the guard and the runtime.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::MemoryError;
use crate::identifiers::ToolName;
use crate::validation::ValidationError;

/// A request to invoke a named tool with structured arguments.
///
/// `ToolCall` is what the policy oracle proposes. The tool-rule guard only
/// looks at `name`; the tool body parses `args` itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: ToolName,
    #[serde(default)]
    pub args: Value,
}

impl ToolCall {
    /// Create a call from a tool name string, validating the name.
    ///
    /// ```rust
    /// use omni_core::tool::ToolCall;
    /// use serde_json::json;
    ///
    /// let call = ToolCall::new("update_user_tasks", json!({"old_str": "", "new_str": "- Buy milk"}))
    ///     .unwrap();
    /// assert_eq!(call.str_arg("new_str").unwrap(), "- Buy milk");
    /// assert!(ToolCall::new("bad name", json!({})).is_err());
    /// ```
    pub fn new(name: &str, args: Value) -> Result<Self, ValidationError> {
        Ok(Self {
            name: ToolName::parse(name)?,
            args,
        })
    }

    /// Create a call from an already validated name.
    pub fn from_validated(name: ToolName, args: Value) -> Self {
        Self { name, args }
    }

    /// Required string argument.
    pub fn str_arg(&self, key: &str) -> Result<&str, FailureReason> {
        self.args
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| FailureReason::InvalidInput {
                message: format!("missing string argument '{key}'"),
            })
    }

    /// Optional string argument; `null` counts as absent.
    pub fn opt_str_arg(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(Value::as_str)
    }

    /// Optional boolean argument, `false` when absent.
    pub fn bool_arg(&self, key: &str) -> bool {
        self.args.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Required list of strings.
    pub fn str_list_arg(&self, key: &str) -> Result<Vec<String>, FailureReason> {
        let invalid = || FailureReason::InvalidInput {
            message: format!("argument '{key}' must be a list of strings"),
        };
        self.args
            .get(key)
            .and_then(Value::as_array)
            .ok_or_else(invalid)?
            .iter()
            .map(|item| item.as_str().map(str::to_string).ok_or_else(invalid))
            .collect()
    }
}

/// Categorized failure reasons for tool execution.
///
/// Reasons are returned to the policy oracle as structured data, so every
/// variant serializes with a `type` tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailureReason {
    /// Missing or malformed arguments
    InvalidInput { message: String },
    /// The caller's role may not perform the operation
    AccessDenied { message: String },
    /// A named resource (block label, agent) does not exist
    NotFound { resource: String },
    /// The expected prior text is no longer in the block
    ContentNotFound { label: String },
    /// The result would exceed the block's size limit
    SizeLimitExceeded {
        label: String,
        limit: usize,
        attempted: usize,
    },
    /// No actor is registered for the capability tag
    UnknownCapability { capability: String },
    /// The transport refused the outgoing message
    DispatchFailed { message: String },
    /// Unexpected state inside the tool
    InternalError { message: String },
}

impl FailureReason {
    /// Human-readable error message
    pub fn message(&self) -> String {
        match self {
            FailureReason::InvalidInput { message } => format!("Invalid input: {}", message),
            FailureReason::AccessDenied { message } => format!("Access denied: {}", message),
            FailureReason::NotFound { resource } => format!("Not found: {}", resource),
            FailureReason::ContentNotFound { label } => {
                format!("Content not found in memory block '{}'", label)
            }
            FailureReason::SizeLimitExceeded {
                label,
                limit,
                attempted,
            } => format!(
                "Memory block '{}' would hold {} characters, limit is {}",
                label, attempted, limit
            ),
            FailureReason::UnknownCapability { capability } => {
                format!("Unknown capability: {}", capability)
            }
            FailureReason::DispatchFailed { message } => format!("Dispatch failed: {}", message),
            FailureReason::InternalError { message } => format!("Internal error: {}", message),
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl From<MemoryError> for FailureReason {
    fn from(err: MemoryError) -> Self {
        match err {
            MemoryError::AccessDenied { .. } => FailureReason::AccessDenied {
                message: err.to_string(),
            },
            MemoryError::UnknownLabel { label } => FailureReason::NotFound {
                resource: format!("memory block '{}'", label),
            },
            MemoryError::ContentNotFound { label } => FailureReason::ContentNotFound {
                label: label.to_string(),
            },
            MemoryError::SizeLimitExceeded {
                label,
                limit,
                attempted,
            } => FailureReason::SizeLimitExceeded {
                label: label.to_string(),
                limit,
                attempted,
            },
            MemoryError::DuplicateLabel { .. } => FailureReason::InternalError {
                message: err.to_string(),
            },
        }
    }
}

/// The result of executing a tool.
///
/// Either successful output or a structured failure; a failed body never
/// advances the actor's tool-rule state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionResult {
    Success { output: String },
    Failure { reason: FailureReason },
}

impl ExecutionResult {
    pub fn success(output: impl Into<String>) -> Self {
        ExecutionResult::Success {
            output: output.into(),
        }
    }

    pub fn failed(reason: FailureReason) -> Self {
        ExecutionResult::Failure { reason }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ExecutionResult::Failure { .. })
    }

    /// Output for success, error message for failure.
    pub fn output(&self) -> String {
        match self {
            ExecutionResult::Success { output } => output.clone(),
            ExecutionResult::Failure { reason } => reason.message(),
        }
    }

    pub fn success_output(&self) -> Option<&str> {
        match self {
            ExecutionResult::Success { output } => Some(output),
            ExecutionResult::Failure { .. } => None,
        }
    }

    pub fn failure_reason(&self) -> Option<&FailureReason> {
        match self {
            ExecutionResult::Success { .. } => None,
            ExecutionResult::Failure { reason } => Some(reason),
        }
    }
}

impl From<Result<String, FailureReason>> for ExecutionResult {
    fn from(result: Result<String, FailureReason>) -> Self {
        match result {
            Ok(output) => ExecutionResult::Success { output },
            Err(reason) => ExecutionResult::Failure { reason },
        }
    }
}
