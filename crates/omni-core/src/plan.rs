//! The orchestrator's single active plan.
//!
//! A plan is the original request plus an ordered list of steps, each aimed
//! at one capability. Steps move `Pending -> Delegated -> Done | Failed` and
//! never back. Replies are correlated by [`RequestId`], so completions may
//! arrive in any order and more than once.
//!
//! The rendered plan is mirrored into the orchestrator's plan block after
//! every change so other turns (and the oracle) see the same state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{MemoryError, PlanError};
use crate::identifiers::{AgentRole, BlockLabel, CapabilityTag, RequestId};
use crate::memory::MemoryStore;

/// 1-based position of a step within its plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(u32);

impl StepId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Delegated { request_id: RequestId },
    Done,
    Failed { reason: String },
}

impl StepStatus {
    /// Done or Failed.
    pub fn is_resolved(&self) -> bool {
        matches!(self, StepStatus::Done | StepStatus::Failed { .. })
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "pending"),
            StepStatus::Delegated { request_id } => write!(f, "delegated {}", request_id),
            StepStatus::Done => write!(f, "done"),
            StepStatus::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}

/// A step as supplied when creating a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRequest {
    pub capability: CapabilityTag,
    pub description: String,
}

impl StepRequest {
    pub fn new(capability: CapabilityTag, description: impl Into<String>) -> Self {
        Self {
            capability,
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: StepId,
    pub capability: CapabilityTag,
    pub description: String,
    pub status: StepStatus,
    /// Request id of the delegation, kept after the step resolves so late
    /// duplicates still correlate.
    pub request_id: Option<RequestId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Active,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub original_request: String,
    pub steps: Vec<PlanStep>,
    pub status: PlanStatus,
}

impl Plan {
    /// Text mirrored into the plan block.
    pub fn render(&self) -> String {
        let mut out = format!(
            "Original Request: {}\n\nOrchestrator Plan:\n",
            self.original_request
        );
        for step in &self.steps {
            out.push_str(&format!(
                "{}. [{}] {} ({})\n",
                step.id, step.capability, step.description, step.status
            ));
        }
        let status = match self.status {
            PlanStatus::Active => "active",
            PlanStatus::Complete => "complete",
        };
        out.push_str(&format!("\nStatus: {}\n", status));
        out
    }

    pub fn step(&self, id: StepId) -> Option<&PlanStep> {
        self.steps.iter().find(|step| step.id == id)
    }

    fn step_mut(&mut self, id: StepId) -> Option<&mut PlanStep> {
        self.steps.iter_mut().find(|step| step.id == id)
    }

    fn step_for_request_mut(&mut self, request_id: RequestId) -> Option<&mut PlanStep> {
        self.steps
            .iter_mut()
            .find(|step| step.request_id == Some(request_id))
    }
}

/// Result of evaluating the active plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "progress", rename_all = "snake_case")]
pub enum Progress {
    /// The first step not yet delegated.
    NextStep { step: PlanStep },
    /// Every step is delegated; these are still unresolved.
    Awaiting { steps: Vec<StepId> },
    /// Every step is done or failed.
    Complete { failed: Vec<StepId> },
}

/// Maintains at most one active plan and mirrors it into memory.
#[derive(Debug)]
pub struct PlanManager {
    store: Arc<MemoryStore>,
    label: BlockLabel,
    role: AgentRole,
    plan: Option<Plan>,
}

impl PlanManager {
    pub fn new(store: Arc<MemoryStore>, label: BlockLabel, role: AgentRole) -> Self {
        Self {
            store,
            label,
            role,
            plan: None,
        }
    }

    pub fn plan(&self) -> Option<&Plan> {
        self.plan.as_ref()
    }

    pub fn label(&self) -> &BlockLabel {
        &self.label
    }

    /// Replace any existing plan with a fresh one.
    ///
    /// Steps of the previous plan are discarded even if still in flight. If
    /// the new plan does not fit its block, the previous plan and block are
    /// left as they were.
    pub fn create_plan(
        &mut self,
        original_request: &str,
        steps: Vec<StepRequest>,
    ) -> Result<&Plan, PlanError> {
        if steps.is_empty() {
            return Err(PlanError::NoSteps(original_request.to_string()));
        }

        let plan = Plan {
            original_request: original_request.to_string(),
            steps: steps
                .into_iter()
                .zip(1..)
                .map(|(request, id)| PlanStep {
                    id: StepId(id),
                    capability: request.capability,
                    description: request.description,
                    status: StepStatus::Pending,
                    request_id: None,
                })
                .collect(),
            status: PlanStatus::Active,
        };
        self.store.replace(&self.label, &self.role, &plan.render())?;

        if let Some(previous) = &self.plan {
            let in_flight = previous
                .steps
                .iter()
                .filter(|step| !step.status.is_resolved())
                .count();
            if previous.status == PlanStatus::Active && in_flight > 0 {
                warn!(
                    in_flight,
                    original_request = %previous.original_request,
                    "Discarding active plan with unresolved steps"
                );
            }
        }
        info!(steps = plan.steps.len(), "Created orchestrator plan");
        Ok(&*self.plan.insert(plan))
    }

    /// Check that delegating `step` would still fit the plan block.
    ///
    /// Call before sending the delegation so an oversized plan fails without
    /// side effects.
    pub fn check_dispatch(&self, step: StepId) -> Result<(), PlanError> {
        let plan = self.plan.as_ref().ok_or(PlanError::NoActivePlan)?;
        let mut candidate = plan.clone();
        let entry = candidate
            .step_mut(step)
            .ok_or(PlanError::UnknownStep(step.0))?;
        if entry.status != StepStatus::Pending {
            return Ok(());
        }
        // Request ids render at a fixed width
        let placeholder = RequestId::new();
        entry.status = StepStatus::Delegated {
            request_id: placeholder,
        };
        entry.request_id = Some(placeholder);
        self.check_fits(&candidate.render())
    }

    /// Mark a pending step as delegated under `request_id`.
    pub fn record_dispatch(&mut self, step: StepId, request_id: RequestId) -> Result<(), PlanError> {
        let mut candidate = self.plan.clone().ok_or(PlanError::NoActivePlan)?;
        let entry = candidate
            .step_mut(step)
            .ok_or(PlanError::UnknownStep(step.0))?;
        if entry.status != StepStatus::Pending {
            debug!(%step, status = %entry.status, "Dispatch ignored for non-pending step");
            return Ok(());
        }
        entry.status = StepStatus::Delegated { request_id };
        entry.request_id = Some(request_id);
        self.commit(candidate)
    }

    /// Mark the step delegated under `request_id` as done.
    ///
    /// Returns the step id, or `None` when the id belongs to no step of the
    /// active plan (for example, a reply to a discarded plan). Repeated
    /// completions are no-ops.
    pub fn record_completion(&mut self, request_id: RequestId) -> Result<Option<StepId>, PlanError> {
        self.resolve_request(request_id, StepStatus::Done)
    }

    /// Mark the step delegated under `request_id` as failed.
    pub fn record_failure(
        &mut self,
        request_id: RequestId,
        reason: &str,
    ) -> Result<Option<StepId>, PlanError> {
        self.resolve_request(
            request_id,
            StepStatus::Failed {
                reason: reason.to_string(),
            },
        )
    }

    /// Mark a step failed before it was ever delegated.
    pub fn fail_step(&mut self, step: StepId, reason: &str) -> Result<(), PlanError> {
        let mut candidate = self.plan.clone().ok_or(PlanError::NoActivePlan)?;
        let entry = candidate
            .step_mut(step)
            .ok_or(PlanError::UnknownStep(step.0))?;
        if entry.status.is_resolved() {
            return Ok(());
        }
        warn!(%step, reason, "Plan step failed");
        entry.status = StepStatus::Failed {
            reason: reason.to_string(),
        };
        self.commit(candidate)
    }

    /// Next undelegated step, the steps still awaited, or completion.
    ///
    /// On completion the plan is marked complete and its block is cleared.
    pub fn evaluate_progress(&mut self) -> Result<Progress, PlanError> {
        let plan = self.plan.as_ref().ok_or(PlanError::NoActivePlan)?;

        if let Some(step) = plan
            .steps
            .iter()
            .find(|step| step.status == StepStatus::Pending)
        {
            return Ok(Progress::NextStep { step: step.clone() });
        }

        let awaiting: Vec<StepId> = plan
            .steps
            .iter()
            .filter(|step| !step.status.is_resolved())
            .map(|step| step.id)
            .collect();
        if !awaiting.is_empty() {
            return Ok(Progress::Awaiting { steps: awaiting });
        }

        let failed: Vec<StepId> = plan
            .steps
            .iter()
            .filter(|step| matches!(step.status, StepStatus::Failed { .. }))
            .map(|step| step.id)
            .collect();
        if plan.status == PlanStatus::Active {
            self.store.reset(&self.label, &self.role)?;
            if let Some(plan) = self.plan.as_mut() {
                plan.status = PlanStatus::Complete;
            }
            info!(failed = failed.len(), "Orchestrator plan complete");
        }
        Ok(Progress::Complete { failed })
    }

    fn resolve_request(
        &mut self,
        request_id: RequestId,
        status: StepStatus,
    ) -> Result<Option<StepId>, PlanError> {
        let mut candidate = self.plan.clone().ok_or(PlanError::NoActivePlan)?;
        let Some(entry) = candidate.step_for_request_mut(request_id) else {
            warn!(%request_id, "Reply does not match any step of the active plan");
            return Ok(None);
        };
        let id = entry.id;
        if entry.status.is_resolved() {
            debug!(step = %id, %request_id, "Duplicate reply ignored");
            return Ok(Some(id));
        }
        debug!(step = %id, %request_id, status = %status, "Plan step resolved");
        entry.status = status;
        self.commit(candidate)?;
        Ok(Some(id))
    }

    /// Mirror `candidate` into the block, then adopt it.
    ///
    /// A completed plan is no longer mirrored; its block stays cleared.
    fn commit(&mut self, candidate: Plan) -> Result<(), PlanError> {
        if candidate.status == PlanStatus::Active {
            self.store
                .replace(&self.label, &self.role, &candidate.render())?;
        }
        self.plan = Some(candidate);
        Ok(())
    }

    fn check_fits(&self, rendered: &str) -> Result<(), PlanError> {
        let Some(limit) = self.store.size_limit(&self.label) else {
            return Err(MemoryError::UnknownLabel {
                label: self.label.clone(),
            }
            .into());
        };
        let attempted = rendered.chars().count();
        if attempted > limit {
            return Err(MemoryError::SizeLimitExceeded {
                label: self.label.clone(),
                limit,
                attempted,
            }
            .into());
        }
        Ok(())
    }
}
