//! Orchestrator tools: planning, delegation and progress tracking.
//!
//! All tools of one orchestrator share an [`OrchestratorState`] holding the
//! active plan and the sender awaiting its outcome.

use super::{
    CREATE_ORCHESTRATOR_PLAN, DELEGATE_AGENT_REQUEST, EVALUATE_PROGRESS, RECORD_AGENT_REPORT,
    SEND_STATUS_UPDATE, tool_name,
};
use crate::router::{DelegationError, DelegationRouter};
use crate::runtime::FailureRoute;
use crate::tool::{AgentTool, ToolContext};
use async_trait::async_trait;
use omni_core::{
    AgentId, CapabilityTag, ExecutionResult, FailureReason, PlanError, PlanManager, Progress,
    RequestId, StepId, StepRequest, StepStatus, ToolCall, ToolName,
};
use omni_mesh::{Message, MessageKind};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Outputs of `evaluate_progress`, matched by the orchestrator's conditional rule.
pub const PROGRESS_PENDING: &str = "pending";
pub const PROGRESS_DISPATCHED: &str = "dispatched";
pub const PROGRESS_COMPLETE: &str = "complete";

/// Plan plus the actor and request that started it.
#[derive(Debug)]
pub struct OrchestratorState {
    pub plans: PlanManager,
    pub origin: Option<(AgentId, RequestId)>,
}

impl OrchestratorState {
    pub fn new(plans: PlanManager) -> Self {
        Self {
            plans,
            origin: None,
        }
    }

    pub fn shared(plans: PlanManager) -> SharedOrchestratorState {
        Arc::new(Mutex::new(Self::new(plans)))
    }
}

pub type SharedOrchestratorState = Arc<Mutex<OrchestratorState>>;

fn plan_failure(err: PlanError) -> FailureReason {
    match err {
        PlanError::NoActivePlan => FailureReason::NotFound {
            resource: "active plan".to_string(),
        },
        PlanError::UnknownStep(id) => FailureReason::NotFound {
            resource: format!("plan step {id}"),
        },
        PlanError::NoSteps(_) => FailureReason::InvalidInput {
            message: err.to_string(),
        },
        PlanError::Memory(err) => FailureReason::from(err),
    }
}

#[derive(Debug, Deserialize)]
struct StepArg {
    capability: String,
    description: String,
}

/// Replace the active plan.
///
/// Arguments: `request` (defaults to the inbound text) and `steps`, a list of
/// `{capability, description}` objects.
#[derive(Debug, Clone)]
pub struct CreatePlanTool {
    name: ToolName,
    state: SharedOrchestratorState,
}

impl CreatePlanTool {
    pub fn new(state: SharedOrchestratorState) -> Self {
        Self {
            name: tool_name(CREATE_ORCHESTRATOR_PLAN),
            state,
        }
    }
}

#[async_trait]
impl AgentTool for CreatePlanTool {
    fn name(&self) -> &ToolName {
        &self.name
    }

    async fn call(&self, call: &ToolCall, ctx: &mut ToolContext<'_>) -> ExecutionResult {
        let request = call
            .opt_str_arg("request")
            .unwrap_or_else(|| ctx.inbound.text())
            .to_string();
        let raw_steps = call.args.get("steps").cloned().unwrap_or_default();
        let parsed: Vec<StepArg> = match serde_json::from_value(raw_steps) {
            Ok(steps) => steps,
            Err(err) => {
                return ExecutionResult::failed(FailureReason::InvalidInput {
                    message: format!("invalid steps: {err}"),
                });
            }
        };
        let mut steps = Vec::with_capacity(parsed.len());
        for step in parsed {
            match CapabilityTag::parse(&step.capability) {
                Ok(tag) => steps.push(StepRequest::new(tag, step.description)),
                Err(err) => {
                    return ExecutionResult::failed(FailureReason::InvalidInput {
                        message: format!("invalid capability '{}': {err}", step.capability),
                    });
                }
            }
        }

        let mut state = self.state.lock().await;
        match state.plans.create_plan(&request, steps) {
            Ok(plan) => {
                let rendered = plan.render();
                state.origin = Some((ctx.inbound.from.clone(), ctx.inbound.request_id));
                ExecutionResult::success(rendered)
            }
            Err(err) => ExecutionResult::failed(plan_failure(err)),
        }
    }
}

/// Delegate a plan step to the actor serving its capability.
///
/// Optional arguments `step` (defaults to the first pending step) and
/// `description` (defaults to the step's description). An unknown capability
/// fails the step, not the tool: the outcome is recorded in the plan and the
/// turn moves on to the changelog.
#[derive(Debug, Clone)]
pub struct DelegateRequestTool {
    name: ToolName,
    state: SharedOrchestratorState,
    router: Arc<DelegationRouter>,
}

impl DelegateRequestTool {
    pub fn new(state: SharedOrchestratorState, router: Arc<DelegationRouter>) -> Self {
        Self {
            name: tool_name(DELEGATE_AGENT_REQUEST),
            state,
            router,
        }
    }
}

#[async_trait]
impl AgentTool for DelegateRequestTool {
    fn name(&self) -> &ToolName {
        &self.name
    }

    async fn call(&self, call: &ToolCall, ctx: &mut ToolContext<'_>) -> ExecutionResult {
        let mut state = self.state.lock().await;
        let Some(plan) = state.plans.plan() else {
            return ExecutionResult::failed(plan_failure(PlanError::NoActivePlan));
        };

        let requested = call
            .args
            .get("step")
            .and_then(serde_json::Value::as_u64)
            .and_then(|id| u32::try_from(id).ok())
            .map(StepId::new);
        let step = match requested {
            Some(id) => plan.step(id),
            None => plan
                .steps
                .iter()
                .find(|step| step.status == StepStatus::Pending),
        };
        let Some(step) = step else {
            return ExecutionResult::failed(FailureReason::InvalidInput {
                message: "no pending plan step to delegate".to_string(),
            });
        };
        if step.status != StepStatus::Pending {
            return ExecutionResult::failed(FailureReason::InvalidInput {
                message: format!("step {} is already {}", step.id, step.status),
            });
        }
        let step_id = step.id;
        let capability = step.capability.clone();
        let description = call
            .opt_str_arg("description")
            .unwrap_or(step.description.as_str())
            .to_string();

        if self.router.resolve(&capability).is_some() {
            if let Err(err) = state.plans.check_dispatch(step_id) {
                return ExecutionResult::failed(plan_failure(err));
            }
        }

        match self.router.delegate(ctx.agent, &capability, &description).await {
            Ok(receipt) => {
                // The delegation is out; a plan that no longer mirrors is only reported
                if let Err(err) = state.plans.record_dispatch(step_id, receipt.request_id) {
                    warn!(step = %step_id, error = %err, "Delegated step could not be recorded in the plan");
                    ctx.scope.warn(format!(
                        "Step {step_id} was delegated but the plan could not record it: {err}"
                    ));
                }
                let summary = format!("step {step_id} -> {}: {description}", receipt.target);
                ctx.scope.record_change("", summary.clone());
                ExecutionResult::success(summary)
            }
            Err(DelegationError::UnknownCapability(tag)) => {
                let reason = FailureReason::UnknownCapability {
                    capability: tag.to_string(),
                };
                if let Err(err) = state.plans.fail_step(step_id, &reason.message()) {
                    return ExecutionResult::failed(plan_failure(err));
                }
                let summary = format!("step {step_id} failed: {reason}");
                ctx.scope.record_change("", summary.clone());
                ExecutionResult::success(summary)
            }
            Err(DelegationError::Dispatch(err)) => {
                ExecutionResult::failed(FailureReason::DispatchFailed {
                    message: err.to_string(),
                })
            }
        }
    }
}

/// Report the plan's progress as `pending`, `dispatched` or `complete`.
#[derive(Debug, Clone)]
pub struct EvaluateProgressTool {
    name: ToolName,
    state: SharedOrchestratorState,
}

impl EvaluateProgressTool {
    pub fn new(state: SharedOrchestratorState) -> Self {
        Self {
            name: tool_name(EVALUATE_PROGRESS),
            state,
        }
    }
}

#[async_trait]
impl AgentTool for EvaluateProgressTool {
    fn name(&self) -> &ToolName {
        &self.name
    }

    async fn call(&self, _call: &ToolCall, _ctx: &mut ToolContext<'_>) -> ExecutionResult {
        let mut state = self.state.lock().await;
        match state.plans.evaluate_progress() {
            Ok(Progress::NextStep { .. }) => ExecutionResult::success(PROGRESS_PENDING),
            Ok(Progress::Awaiting { .. }) => ExecutionResult::success(PROGRESS_DISPATCHED),
            Ok(Progress::Complete { .. }) => ExecutionResult::success(PROGRESS_COMPLETE),
            Err(err) => ExecutionResult::failed(plan_failure(err)),
        }
    }
}

/// Resolve the plan step answered by the inbound report.
///
/// A `Failure` message fails the step; any other report completes it.
/// Reports matching no step are acknowledged and ignored.
#[derive(Debug, Clone)]
pub struct RecordAgentReportTool {
    name: ToolName,
    state: SharedOrchestratorState,
}

impl RecordAgentReportTool {
    pub fn new(state: SharedOrchestratorState) -> Self {
        Self {
            name: tool_name(RECORD_AGENT_REPORT),
            state,
        }
    }
}

#[async_trait]
impl AgentTool for RecordAgentReportTool {
    fn name(&self) -> &ToolName {
        &self.name
    }

    async fn call(&self, _call: &ToolCall, ctx: &mut ToolContext<'_>) -> ExecutionResult {
        let mut state = self.state.lock().await;
        let request_id = ctx.inbound.request_id;
        let failed = ctx.inbound.kind == MessageKind::Failure;
        let resolved = if failed {
            state.plans.record_failure(request_id, ctx.inbound.text())
        } else {
            state.plans.record_completion(request_id)
        };

        match resolved {
            Ok(Some(step)) if failed => ExecutionResult::success(format!("step {step} failed")),
            Ok(Some(step)) => ExecutionResult::success(format!("step {step} done")),
            Ok(None) => {
                warn!(%request_id, from = %ctx.inbound.from, "Ignoring report for unknown request");
                ExecutionResult::success("report ignored: no matching step")
            }
            Err(err) => ExecutionResult::failed(plan_failure(err)),
        }
    }
}

/// Tell whoever started the plan how it is going. Terminal.
///
/// Argument `message`. The update goes to the plan's origin with the
/// origin's request id, or back to the inbound sender when no plan exists.
#[derive(Debug, Clone)]
pub struct SendStatusUpdateTool {
    name: ToolName,
    state: SharedOrchestratorState,
}

impl SendStatusUpdateTool {
    pub fn new(state: SharedOrchestratorState) -> Self {
        Self {
            name: tool_name(SEND_STATUS_UPDATE),
            state,
        }
    }
}

#[async_trait]
impl AgentTool for SendStatusUpdateTool {
    fn name(&self) -> &ToolName {
        &self.name
    }

    async fn call(&self, call: &ToolCall, ctx: &mut ToolContext<'_>) -> ExecutionResult {
        let body = match call.str_arg("message") {
            Ok(body) => body.to_string(),
            Err(reason) => return ExecutionResult::failed(reason),
        };
        let (to, request_id) = self
            .state
            .lock()
            .await
            .origin
            .clone()
            .unwrap_or_else(|| (ctx.inbound.from.clone(), ctx.inbound.request_id));

        let message = Message::new(MessageKind::StatusUpdate, ctx.agent.clone(), to.clone(), request_id)
            .with_body(body);
        match ctx.send(message).await {
            Ok(()) => {
                info!(%to, %request_id, "Status update sent");
                ExecutionResult::success("sent")
            }
            Err(reason) => ExecutionResult::failed(reason),
        }
    }
}

/// Sends orchestrator turn failures to the plan's origin.
///
/// An escalation that fails is answered to its own sender; any other failed
/// turn (a specialist report, say) concerns the plan, so its origin hears it.
#[derive(Debug, Clone)]
pub struct OriginFailureRoute {
    state: SharedOrchestratorState,
}

impl OriginFailureRoute {
    pub fn new(state: SharedOrchestratorState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl FailureRoute for OriginFailureRoute {
    async fn recipient(&self, inbound: &Message) -> Option<(AgentId, RequestId)> {
        if inbound.kind == MessageKind::Escalate {
            return None;
        }
        self.state.lock().await.origin.clone()
    }
}
