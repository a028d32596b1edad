//! The policy oracle seam: whatever decides which tool to call next.
//!
//! The runtime never trusts a proposal; every [`Proposal::Call`] is checked
//! by the actor's tool-rule guard before it runs. This keeps the guard
//! testable with scripted oracles while production plugs in a model.

use async_trait::async_trait;
use omni_core::{AgentId, AgentRole, BlockView, ExecutionResult, RuleViolation, ToolCall, ToolName};
use omni_mesh::Message;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use thiserror::Error;

/// What the oracle sees when asked for the next step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnContext {
    pub agent: AgentId,
    pub role: AgentRole,
    /// The message that started this turn
    pub inbound: Message,
    /// Snapshots of every memory block the role may read
    pub memory: Vec<BlockView>,
    /// Everything proposed so far in this turn, in order
    pub history: Vec<TurnEvent>,
    /// Tools the guard would accept right now
    pub permitted: Vec<ToolName>,
}

impl TurnContext {
    /// Result of the most recently executed tool.
    pub fn last_result(&self) -> Option<&ExecutionResult> {
        self.history.iter().rev().find_map(|event| match event {
            TurnEvent::Executed { result, .. } => Some(result),
            TurnEvent::Rejected { .. } => None,
        })
    }

    /// The rejection of the previous proposal, if it was rejected.
    pub fn last_rejection(&self) -> Option<&RuleViolation> {
        match self.history.last() {
            Some(TurnEvent::Rejected { violation, .. }) => Some(violation),
            _ => None,
        }
    }

    pub fn block(&self, label: &str) -> Option<&BlockView> {
        self.memory.iter().find(|view| view.label.as_str() == label)
    }
}

/// One entry of a turn's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TurnEvent {
    Executed {
        call: ToolCall,
        result: ExecutionResult,
    },
    Rejected {
        call: ToolCall,
        violation: RuleViolation,
    },
}

/// The oracle's answer.
#[derive(Debug, Clone, PartialEq)]
pub enum Proposal {
    Call(ToolCall),
    /// End the turn without another tool call.
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    /// The decision source could not be reached or answered with an error
    #[error("Policy oracle unavailable: {0}")]
    Unavailable(String),

    /// The answer could not be turned into a proposal
    #[error("Invalid proposal: {0}")]
    InvalidProposal(String),

    /// A scripted oracle ran out of proposals
    #[error("Policy oracle has no further proposals")]
    Exhausted,
}

/// Chooses the next tool call for a turn.
#[async_trait]
pub trait PolicyOracle: Send + Sync {
    async fn propose_next_tool(&self, context: &TurnContext) -> Result<Proposal, OracleError>;
}

/// Oracle backed by a closure.
///
/// ```rust
/// use omni_agent::oracle::{FnOracle, Proposal};
///
/// let oracle = FnOracle::new(|_ctx| Ok(Proposal::Done));
/// # let _ = oracle;
/// ```
pub struct FnOracle<F> {
    decide: Mutex<F>,
}

impl<F> FnOracle<F>
where
    F: FnMut(&TurnContext) -> Result<Proposal, OracleError> + Send,
{
    pub fn new(decide: F) -> Self {
        Self {
            decide: Mutex::new(decide),
        }
    }
}

#[async_trait]
impl<F> PolicyOracle for FnOracle<F>
where
    F: FnMut(&TurnContext) -> Result<Proposal, OracleError> + Send,
{
    async fn propose_next_tool(&self, context: &TurnContext) -> Result<Proposal, OracleError> {
        let mut decide = self
            .decide
            .lock()
            .map_err(|_| OracleError::Unavailable("oracle state poisoned".to_string()))?;
        (decide)(context)
    }
}
