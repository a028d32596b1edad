//! # Actor Runtime
//!
//! Drives one turn per inbound message: the policy oracle proposes, the
//! tool-rule guard validates, the tool runs, the guard advances. A turn ends
//! at a terminal tool, when the oracle is done, or with a [`TurnFailure`]
//! that is reported to the sender of the inbound message, or to whoever a
//! [`FailureRoute`] names instead.

use crate::config::RuntimeConfig;
use crate::oracle::{OracleError, PolicyOracle, Proposal, TurnContext, TurnEvent};
use crate::tool::{ToolContext, ToolSet, TurnScope};
use async_trait::async_trait;
use omni_core::{
    AgentId, AgentRole, MemoryStore, MessageId, RequestId, RuleViolation, ToolName, ToolRuleGraph,
    TurnState,
};
use omni_mesh::{AgentMesh, Mailbox, Message, MessageKind};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Errors raised while assembling a runtime
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("Agent '{agent}' allows tool '{tool}' but has no implementation for it")]
    MissingTool { agent: AgentId, tool: ToolName },
}

/// Why a turn was escalated instead of completing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TurnFailure {
    #[error("Turn aborted after {count} rejected proposals (last: {last})")]
    TooManyViolations { count: usize, last: RuleViolation },

    #[error("Turn exceeded {limit} proposals without reaching a terminal tool")]
    StepLimitExceeded { limit: usize },

    #[error("Turn ended while the tool rules still required a continuation ({state:?})")]
    Abandoned { state: TurnState },

    #[error(transparent)]
    Oracle(#[from] OracleError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// A terminal tool ran
    Completed { terminal: ToolName },
    /// The oracle finished without a terminal tool and nothing was pending
    Ended,
    Failed(TurnFailure),
}

impl TurnOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, TurnOutcome::Failed(_))
    }
}

/// Everything that happened in one turn.
#[derive(Debug, Clone)]
pub struct TurnReport {
    pub request_id: RequestId,
    pub inbound_id: MessageId,
    pub outcome: TurnOutcome,
    pub events: Vec<TurnEvent>,
    pub rejections: Vec<RuleViolation>,
    pub warnings: Vec<String>,
    /// Messages sent during the turn, including any failure report
    pub sent: Vec<Message>,
}

impl TurnReport {
    /// Names of the tools that ran, in order, whether or not they succeeded.
    pub fn executed_tools(&self) -> Vec<&ToolName> {
        self.events
            .iter()
            .filter_map(|event| match event {
                TurnEvent::Executed { call, .. } => Some(&call.name),
                TurnEvent::Rejected { .. } => None,
            })
            .collect()
    }
}

/// Counters returned when a runtime's mailbox closes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub turns: usize,
    pub duplicates: usize,
    pub failures: usize,
}

/// Picks the recipient of a failure report.
///
/// Returning `None` reports to the sender of the inbound message.
#[async_trait]
pub trait FailureRoute: std::fmt::Debug + Send + Sync {
    async fn recipient(&self, inbound: &Message) -> Option<(AgentId, RequestId)>;
}

/// One actor: identity, rule graph, tools and the oracle choosing between them.
pub struct AgentRuntime {
    id: AgentId,
    role: AgentRole,
    graph: ToolRuleGraph,
    tools: ToolSet,
    oracle: Arc<dyn PolicyOracle>,
    store: Arc<MemoryStore>,
    mesh: Arc<dyn AgentMesh>,
    config: RuntimeConfig,
    failure_route: Option<Arc<dyn FailureRoute>>,
    seen_order: VecDeque<MessageId>,
    seen: HashSet<MessageId>,
}

impl AgentRuntime {
    /// Assemble a runtime, checking that every allowed tool is implemented.
    pub fn new(
        id: AgentId,
        role: AgentRole,
        graph: ToolRuleGraph,
        tools: ToolSet,
        oracle: Arc<dyn PolicyOracle>,
        store: Arc<MemoryStore>,
        mesh: Arc<dyn AgentMesh>,
        config: RuntimeConfig,
    ) -> Result<Self, RuntimeError> {
        if let Some(tool) = graph.allowed_tools().iter().find(|tool| !tools.contains(tool)) {
            return Err(RuntimeError::MissingTool {
                agent: id,
                tool: tool.clone(),
            });
        }

        Ok(Self {
            id,
            role,
            graph,
            tools,
            oracle,
            store,
            mesh,
            config,
            failure_route: None,
            seen_order: VecDeque::new(),
            seen: HashSet::new(),
        })
    }

    /// Send failure reports where `route` says instead of to the sender.
    pub fn with_failure_route(mut self, route: Arc<dyn FailureRoute>) -> Self {
        self.failure_route = Some(route);
        self
    }

    pub fn id(&self) -> &AgentId {
        &self.id
    }

    pub fn role(&self) -> &AgentRole {
        &self.role
    }

    pub fn graph(&self) -> &ToolRuleGraph {
        &self.graph
    }

    /// Run a turn unless the message was already handled recently.
    pub async fn handle(&mut self, message: Message) -> Option<TurnReport> {
        if !self.remember(message.id) {
            debug!(agent = %self.id, message_id = %message.id, "Dropping duplicate delivery");
            return None;
        }
        Some(self.run_turn(message).await)
    }

    /// Process the mailbox in FIFO order until it closes.
    pub async fn run(mut self, mut mailbox: Mailbox) -> RunSummary {
        let mut summary = RunSummary::default();
        info!(agent = %self.id, role = %self.role, "Actor started");
        while let Some(message) = mailbox.recv().await {
            match self.handle(message).await {
                Some(report) => {
                    summary.turns += 1;
                    if report.outcome.is_failure() {
                        summary.failures += 1;
                    }
                }
                None => summary.duplicates += 1,
            }
        }
        info!(
            agent = %self.id,
            turns = summary.turns,
            failures = summary.failures,
            "Actor stopped"
        );
        summary
    }

    /// Drive one turn for `inbound`.
    pub async fn run_turn(&self, inbound: Message) -> TurnReport {
        info!(
            agent = %self.id,
            kind = %inbound.kind,
            from = %inbound.from,
            request_id = %inbound.request_id,
            "Turn started"
        );

        let mut guard = self.graph.guard();
        let mut scope = TurnScope::default();
        let mut events: Vec<TurnEvent> = Vec::new();
        let mut rejections: Vec<RuleViolation> = Vec::new();
        let mut proposals = 0usize;

        let outcome = loop {
            if proposals >= self.config.max_turn_steps {
                break TurnOutcome::Failed(TurnFailure::StepLimitExceeded {
                    limit: self.config.max_turn_steps,
                });
            }
            proposals += 1;

            let context = TurnContext {
                agent: self.id.clone(),
                role: self.role.clone(),
                inbound: inbound.clone(),
                memory: self.store.visible_blocks(&self.role),
                history: events.clone(),
                permitted: guard.permitted(),
            };
            let call = match self.oracle.propose_next_tool(&context).await {
                Ok(Proposal::Call(call)) => call,
                Ok(Proposal::Done) if guard.has_pending_continuation() => {
                    break TurnOutcome::Failed(TurnFailure::Abandoned {
                        state: guard.state().clone(),
                    });
                }
                Ok(Proposal::Done) => break TurnOutcome::Ended,
                Err(err) => break TurnOutcome::Failed(TurnFailure::Oracle(err)),
            };

            if let Err(violation) = guard.validate_next(&call.name) {
                warn!(agent = %self.id, tool = %call.name, %violation, "Tool proposal rejected");
                rejections.push(violation.clone());
                events.push(TurnEvent::Rejected {
                    call,
                    violation: violation.clone(),
                });
                if rejections.len() > self.config.max_rule_violations {
                    break TurnOutcome::Failed(TurnFailure::TooManyViolations {
                        count: rejections.len(),
                        last: violation,
                    });
                }
                continue;
            }

            let result = {
                let mut ctx = ToolContext {
                    agent: &self.id,
                    role: &self.role,
                    store: &self.store,
                    mesh: self.mesh.as_ref(),
                    inbound: &inbound,
                    scope: &mut scope,
                };
                self.tools.dispatch(&call, &mut ctx).await
            };

            match result.success_output() {
                Some(output) => {
                    let state = guard.advance(&call.name, output);
                    debug!(agent = %self.id, tool = %call.name, ?state, "Tool executed");
                }
                None => {
                    debug!(agent = %self.id, tool = %call.name, reason = %result.output(), "Tool failed");
                }
            }
            events.push(TurnEvent::Executed { call, result });

            if let TurnState::Terminated { by } = guard.state() {
                break TurnOutcome::Completed {
                    terminal: by.clone(),
                };
            }
        };

        let (warnings, mut sent) = scope.into_parts();
        if let TurnOutcome::Failed(failure) = &outcome {
            error!(
                agent = %self.id,
                request_id = %inbound.request_id,
                %failure,
                "Turn failed"
            );
            if let Some(report) = self.report_failure(&inbound, failure).await {
                sent.push(report);
            }
        } else {
            info!(agent = %self.id, request_id = %inbound.request_id, ?outcome, "Turn finished");
        }

        TurnReport {
            request_id: inbound.request_id,
            inbound_id: inbound.id,
            outcome,
            events,
            rejections,
            warnings,
            sent,
        }
    }

    async fn report_failure(&self, inbound: &Message, failure: &TurnFailure) -> Option<Message> {
        // Failures are never answered with failures
        if inbound.kind == MessageKind::Failure {
            return None;
        }
        let routed = match &self.failure_route {
            Some(route) => route.recipient(inbound).await,
            None => None,
        };
        let (to, request_id) = routed.unwrap_or_else(|| (inbound.from.clone(), inbound.request_id));
        if to == self.id {
            return None;
        }

        let report = Message::new(MessageKind::Failure, self.id.clone(), to.clone(), request_id)
            .with_body(failure.to_string());
        match self.mesh.send(&to, report.clone()).await {
            Ok(()) => Some(report),
            Err(err) => {
                error!(agent = %self.id, %to, error = %err, "Failure report not delivered");
                None
            }
        }
    }

    /// Returns false if the id is already in the window.
    fn remember(&mut self, id: MessageId) -> bool {
        if !self.seen.insert(id) {
            return false;
        }
        self.seen_order.push_back(id);
        while self.seen_order.len() > self.config.dedup_window {
            if let Some(oldest) = self.seen_order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        true
    }
}

impl std::fmt::Debug for AgentRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRuntime")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("tools", &self.tools)
            .field("config", &self.config)
            .field("failure_route", &self.failure_route)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::FnOracle;
    use crate::tool::AgentTool;
    use crate::tools::{MemoryEditTool, tool_name};
    use async_trait::async_trait;
    use omni_core::{BlockLabel, BlockSpec, ExecutionResult, ToolCall, ToolRule};
    use omni_mesh::LocalMesh;
    use serde_json::json;

    /// Echoes its `output` argument, defaulting to "ok".
    struct EchoTool(ToolName);

    #[async_trait]
    impl AgentTool for EchoTool {
        fn name(&self) -> &ToolName {
            &self.0
        }

        async fn call(&self, call: &ToolCall, _ctx: &mut ToolContext<'_>) -> ExecutionResult {
            ExecutionResult::success(call.opt_str_arg("output").unwrap_or("ok"))
        }
    }

    fn t(name: &str) -> ToolName {
        tool_name(name)
    }

    fn call(name: &str) -> ToolCall {
        ToolCall::new(name, json!({})).unwrap()
    }

    /// `a -> {b, c}`, `b -> {exit}`, `exit` terminal
    fn graph() -> ToolRuleGraph {
        ToolRuleGraph::builder()
            .allow([t("a"), t("b"), t("c"), t("d"), t("exit")])
            .rule(t("a"), ToolRule::constrain([t("b"), t("c")]))
            .rule(t("b"), ToolRule::constrain([t("exit")]))
            .rule(t("exit"), ToolRule::terminal())
            .build()
            .unwrap()
    }

    fn tools() -> ToolSet {
        ["a", "b", "c", "d", "exit"]
            .into_iter()
            .fold(ToolSet::new(), |set, name| set.with_tool(Arc::new(EchoTool(t(name)))))
    }

    fn scripted(script: Vec<Proposal>) -> Arc<dyn PolicyOracle> {
        let mut script = VecDeque::from(script);
        Arc::new(FnOracle::new(move |_ctx: &TurnContext| {
            script.pop_front().ok_or(OracleError::Exhausted)
        }))
    }

    fn runtime(oracle: Arc<dyn PolicyOracle>, mesh: Arc<LocalMesh>, config: RuntimeConfig) -> AgentRuntime {
        AgentRuntime::new(
            AgentId::new_unchecked("worker"),
            AgentRole::new_unchecked("worker"),
            graph(),
            tools(),
            oracle,
            Arc::new(MemoryStore::new()),
            mesh,
            config,
        )
        .unwrap()
    }

    fn inbound() -> Message {
        Message::new(
            MessageKind::Delegate,
            AgentId::new_unchecked("boss"),
            AgentId::new_unchecked("worker"),
            RequestId::new(),
        )
        .with_description("do it")
    }

    #[tokio::test]
    async fn test_turn_runs_to_terminal() {
        let oracle = scripted(vec![
            Proposal::Call(call("a")),
            Proposal::Call(call("d")),
            Proposal::Call(call("b")),
            Proposal::Call(call("exit")),
        ]);
        let rt = runtime(oracle, Arc::new(LocalMesh::new()), RuntimeConfig::default());

        let report = rt.run_turn(inbound()).await;
        assert_eq!(report.outcome, TurnOutcome::Completed { terminal: t("exit") });
        assert_eq!(report.executed_tools(), vec![&t("a"), &t("b"), &t("exit")]);
        assert_eq!(report.rejections.len(), 1);
        assert!(matches!(
            report.rejections[0],
            RuleViolation::PolicyViolation { ref proposed, .. } if *proposed == t("d")
        ));
    }

    #[tokio::test]
    async fn test_oracle_sees_rejections_and_permitted_tools() {
        let mut step = 0;
        let oracle = Arc::new(FnOracle::new(move |ctx: &TurnContext| {
            step += 1;
            match step {
                1 => Ok(Proposal::Call(call("a"))),
                2 => {
                    assert_eq!(ctx.permitted, vec![t("b"), t("c")]);
                    Ok(Proposal::Call(call("exit")))
                }
                3 => {
                    assert!(ctx.last_rejection().is_some());
                    Ok(Proposal::Call(call("b")))
                }
                _ => Ok(Proposal::Call(call("exit"))),
            }
        }));
        let rt = runtime(oracle, Arc::new(LocalMesh::new()), RuntimeConfig::default());
        let report = rt.run_turn(inbound()).await;
        assert_eq!(report.outcome, TurnOutcome::Completed { terminal: t("exit") });
    }

    #[tokio::test]
    async fn test_repeated_violations_fail_the_turn() {
        let mesh = Arc::new(LocalMesh::new());
        let mut boss = mesh.register(AgentId::new_unchecked("boss")).unwrap();
        let oracle = Arc::new(FnOracle::new(|ctx: &TurnContext| {
            if ctx.history.is_empty() {
                Ok(Proposal::Call(call("a")))
            } else {
                Ok(Proposal::Call(call("d")))
            }
        }));
        let config = RuntimeConfig::builder().max_rule_violations(2).build().unwrap();
        let rt = runtime(oracle, mesh, config);

        let message = inbound();
        let report = rt.run_turn(message.clone()).await;
        assert!(matches!(
            report.outcome,
            TurnOutcome::Failed(TurnFailure::TooManyViolations { count: 3, .. })
        ));

        let failure = boss.try_recv().unwrap();
        assert_eq!(failure.kind, MessageKind::Failure);
        assert_eq!(failure.request_id, message.request_id);
        assert_eq!(report.sent.len(), 1);
    }

    #[tokio::test]
    async fn test_failure_inbound_is_not_answered() {
        let mesh = Arc::new(LocalMesh::new());
        let mut boss = mesh.register(AgentId::new_unchecked("boss")).unwrap();
        let rt = runtime(scripted(vec![]), mesh, RuntimeConfig::default());

        let failure = inbound().reply(MessageKind::Failure, "boom");
        let failure = Message {
            from: AgentId::new_unchecked("boss"),
            to: AgentId::new_unchecked("worker"),
            ..failure
        };
        let report = rt.run_turn(failure).await;
        assert!(matches!(
            report.outcome,
            TurnOutcome::Failed(TurnFailure::Oracle(OracleError::Exhausted))
        ));
        assert!(report.sent.is_empty());
        assert!(boss.try_recv().is_none());
    }

    #[derive(Debug)]
    struct FixedRoute(AgentId, RequestId);

    #[async_trait]
    impl FailureRoute for FixedRoute {
        async fn recipient(&self, _inbound: &Message) -> Option<(AgentId, RequestId)> {
            Some((self.0.clone(), self.1))
        }
    }

    #[tokio::test]
    async fn test_failure_route_overrides_sender() {
        let mesh = Arc::new(LocalMesh::new());
        let mut boss = mesh.register(AgentId::new_unchecked("boss")).unwrap();
        let mut origin = mesh.register(AgentId::new_unchecked("front")).unwrap();
        let origin_request = RequestId::new();
        let rt = runtime(scripted(vec![]), mesh.clone(), RuntimeConfig::default()).with_failure_route(
            Arc::new(FixedRoute(AgentId::new_unchecked("front"), origin_request)),
        );

        let report = rt.run_turn(inbound()).await;
        assert!(report.outcome.is_failure());
        let failure = origin.try_recv().unwrap();
        assert_eq!(failure.kind, MessageKind::Failure);
        assert_eq!(failure.from.as_str(), "worker");
        assert_eq!(failure.request_id, origin_request);
        assert!(boss.try_recv().is_none());

        // A route pointing back at the actor itself reports nowhere
        let rt = runtime(scripted(vec![]), mesh, RuntimeConfig::default()).with_failure_route(
            Arc::new(FixedRoute(AgentId::new_unchecked("worker"), origin_request)),
        );
        assert!(rt.run_turn(inbound()).await.sent.is_empty());
        assert!(boss.try_recv().is_none());
        assert!(origin.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_step_limit_and_abandoned_turns() {
        let looping = Arc::new(FnOracle::new(|_ctx: &TurnContext| Ok(Proposal::Call(call("d")))));
        let config = RuntimeConfig::builder().max_turn_steps(5).build().unwrap();
        let rt = runtime(looping, Arc::new(LocalMesh::new()), config);
        assert_eq!(
            rt.run_turn(inbound()).await.outcome,
            TurnOutcome::Failed(TurnFailure::StepLimitExceeded { limit: 5 })
        );

        let quitter = scripted(vec![Proposal::Call(call("a")), Proposal::Done]);
        let rt = runtime(quitter, Arc::new(LocalMesh::new()), RuntimeConfig::default());
        assert!(matches!(
            rt.run_turn(inbound()).await.outcome,
            TurnOutcome::Failed(TurnFailure::Abandoned { .. })
        ));

        let idle = scripted(vec![Proposal::Done]);
        let rt = runtime(idle, Arc::new(LocalMesh::new()), RuntimeConfig::default());
        assert_eq!(rt.run_turn(inbound()).await.outcome, TurnOutcome::Ended);

        let broken = scripted(vec![]);
        let rt = runtime(broken, Arc::new(LocalMesh::new()), RuntimeConfig::default());
        assert_eq!(
            rt.run_turn(inbound()).await.outcome,
            TurnOutcome::Failed(TurnFailure::Oracle(OracleError::Exhausted))
        );
    }

    #[tokio::test]
    async fn test_failed_tool_does_not_advance() {
        let store = Arc::new(MemoryStore::new());
        let label = BlockLabel::new_unchecked("notes");
        let role = AgentRole::new_unchecked("worker");
        store
            .register(BlockSpec::new(label.clone(), 100).owned_by(role.clone()))
            .unwrap();
        let graph = ToolRuleGraph::builder()
            .allow([t("edit"), t("exit")])
            .entry([t("edit")])
            .rule(t("edit"), ToolRule::constrain([t("exit")]))
            .rule(t("exit"), ToolRule::terminal())
            .build()
            .unwrap();
        let tools = ToolSet::new()
            .with_tool(Arc::new(MemoryEditTool::new(t("edit"), label.clone())))
            .with_tool(Arc::new(EchoTool(t("exit"))));
        let oracle = scripted(vec![
            Proposal::Call(ToolCall::new("edit", json!({"old_str": "missing", "new_str": "x"})).unwrap()),
            Proposal::Call(call("exit")),
            Proposal::Call(ToolCall::new("edit", json!({"old_str": "", "new_str": "x"})).unwrap()),
            Proposal::Call(call("exit")),
        ]);
        let rt = AgentRuntime::new(
            AgentId::new_unchecked("worker"),
            role.clone(),
            graph,
            tools,
            oracle,
            store.clone(),
            Arc::new(LocalMesh::new()),
            RuntimeConfig::default(),
        )
        .unwrap();

        let report = rt.run_turn(inbound()).await;
        assert_eq!(report.outcome, TurnOutcome::Completed { terminal: t("exit") });
        // The failed edit left the guard at the entry, so the first exit was rejected
        assert_eq!(report.rejections.len(), 1);
        assert_eq!(store.read(&label, &role).unwrap(), "x");
    }

    #[tokio::test]
    async fn test_duplicates_are_dropped() {
        let oracle = Arc::new(FnOracle::new(|ctx: &TurnContext| {
            if ctx.history.is_empty() {
                Ok(Proposal::Call(call("exit")))
            } else {
                Ok(Proposal::Done)
            }
        }));
        let config = RuntimeConfig::builder().dedup_window(2).build().unwrap();
        let mut rt = runtime(oracle, Arc::new(LocalMesh::new()), config);

        let first = inbound();
        assert!(rt.handle(first.clone()).await.is_some());
        assert!(rt.handle(first.clone()).await.is_none());

        // Falls out of the window after two newer messages
        rt.handle(inbound()).await;
        rt.handle(inbound()).await;
        assert!(rt.handle(first).await.is_some());
    }

    #[test]
    fn test_missing_tool_is_rejected() {
        let result = AgentRuntime::new(
            AgentId::new_unchecked("worker"),
            AgentRole::new_unchecked("worker"),
            graph(),
            ToolSet::new().with_tool(Arc::new(EchoTool(t("a")))),
            scripted(vec![]),
            Arc::new(MemoryStore::new()),
            Arc::new(LocalMesh::new()),
            RuntimeConfig::default(),
        );
        assert!(matches!(result, Err(RuntimeError::MissingTool { .. })));
    }
}
