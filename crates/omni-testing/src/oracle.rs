//! Scripted policy oracle.

use async_trait::async_trait;
use omni_agent::oracle::{OracleError, PolicyOracle, Proposal, TurnContext};
use omni_core::ToolCall;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Oracle that answers from a FIFO script.
///
/// Each answer pops the next proposal; an empty script yields
/// [`OracleError::Exhausted`]. Every context it is asked about is kept for
/// later inspection.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    script: Mutex<VecDeque<Proposal>>,
    contexts: Mutex<Vec<TurnContext>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Oracle that replays `proposals` in order.
    pub fn from_proposals(proposals: impl IntoIterator<Item = Proposal>) -> Self {
        Self {
            script: Mutex::new(proposals.into_iter().collect()),
            contexts: Mutex::new(Vec::new()),
        }
    }

    /// Append a tool call to the script.
    pub fn then_call(self, call: ToolCall) -> Self {
        self.push(Proposal::Call(call));
        self
    }

    /// Append a `Done` to the script.
    pub fn then_done(self) -> Self {
        self.push(Proposal::Done);
        self
    }

    /// Append one proposal; usable while the oracle is shared.
    pub fn push(&self, proposal: Proposal) {
        lock(&self.script).push_back(proposal);
    }

    /// Append several calls at once.
    pub fn extend_calls(&self, calls: impl IntoIterator<Item = ToolCall>) {
        lock(&self.script).extend(calls.into_iter().map(Proposal::Call));
    }

    /// Proposals not yet consumed.
    pub fn remaining(&self) -> usize {
        lock(&self.script).len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Contexts seen so far, in the order they were asked about.
    pub fn contexts(&self) -> Vec<TurnContext> {
        lock(&self.contexts).clone()
    }

    /// Number of times the oracle was consulted.
    pub fn consultations(&self) -> usize {
        lock(&self.contexts).len()
    }
}

#[async_trait]
impl PolicyOracle for ScriptedOracle {
    async fn propose_next_tool(&self, context: &TurnContext) -> Result<Proposal, OracleError> {
        lock(&self.contexts).push(context.clone());
        let next = lock(&self.script).pop_front();
        debug!(agent = %context.agent, proposal = ?next, "Scripted proposal");
        next.ok_or(OracleError::Exhausted)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{call, message};
    use omni_core::{AgentId, AgentRole};
    use omni_mesh::MessageKind;
    use serde_json::json;

    fn context() -> TurnContext {
        TurnContext {
            agent: AgentId::new_unchecked("tasks"),
            role: AgentRole::new_unchecked("tasks"),
            inbound: message(MessageKind::Delegate, "orchestrator", "tasks", "Add milk"),
            memory: Vec::new(),
            history: Vec::new(),
            permitted: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_replays_in_order_then_exhausts() {
        let oracle = ScriptedOracle::new()
            .then_call(call("a", json!({})))
            .then_done();

        assert!(matches!(
            oracle.propose_next_tool(&context()).await,
            Ok(Proposal::Call(ref c)) if c.name.as_str() == "a"
        ));
        assert_eq!(oracle.propose_next_tool(&context()).await, Ok(Proposal::Done));
        assert_eq!(
            oracle.propose_next_tool(&context()).await,
            Err(OracleError::Exhausted)
        );
        assert_eq!(oracle.consultations(), 3);
        assert!(oracle.is_exhausted());
    }
}
