//! The standard actor set: a conversational front end, an orchestrator and
//! four domain specialists, with their memory blocks, tool-rule graphs,
//! tools and capability routes.

use crate::config::RuntimeConfig;
use crate::router::DelegationRouter;
use crate::runtime::FailureRoute;
use crate::tool::ToolSet;
use crate::tools::{
    self, ChangelogTool, ClarifyUserRequestTool, CreatePlanTool, DelegateRequestTool,
    EscalateUserRequestTool, EvaluateProgressTool, HandleOrchestratorMessageTool,
    HandleOrchestratorRequestTool, MemoryEditTool, OrchestratorState, OriginFailureRoute,
    RecordAgentReportTool, SendMessageTool, SendOrchestratorMessageTool, SendStatusUpdateTool,
    tool_name,
};
use omni_core::{
    AgentId, AgentRole, BlockLabel, BlockSpec, CapabilityTag, GraphError, MemoryError,
    MemoryStore, PlanManager, ToolName, ToolRule, ToolRuleGraph,
};
use omni_mesh::AgentMesh;
use std::fmt;
use std::sync::Arc;

/// Mailbox of the human on the other side of the conversational actor.
pub const USER_ENDPOINT: &str = "user";
pub const CONVERSATIONAL: &str = "conversational";
pub const ORCHESTRATOR: &str = "orchestrator";

pub const PLAN_BLOCK: &str = "orchestrator_plan";
pub const REQUESTS_CHANGELOG: &str = "requests_changelog";
pub const REQUESTS_CHANGELOG_TOOL: &str = "update_requests_changelog";

/// Domains served by specialist actors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Domain {
    Tasks,
    Projects,
    Reminders,
    Preferences,
}

impl Domain {
    pub const ALL: [Domain; 4] = [
        Domain::Tasks,
        Domain::Projects,
        Domain::Reminders,
        Domain::Preferences,
    ];

    /// Plural name; doubles as the actor id and role.
    pub fn name(self) -> &'static str {
        match self {
            Domain::Tasks => "tasks",
            Domain::Projects => "projects",
            Domain::Reminders => "reminders",
            Domain::Preferences => "preferences",
        }
    }

    pub fn capability_name(self) -> &'static str {
        match self {
            Domain::Tasks => "task-domain",
            Domain::Projects => "project-domain",
            Domain::Reminders => "reminder-domain",
            Domain::Preferences => "preference-domain",
        }
    }

    pub fn agent_id(self) -> AgentId {
        AgentId::new_unchecked(self.name())
    }

    pub fn role(self) -> AgentRole {
        AgentRole::new_unchecked(self.name())
    }

    pub fn capability(self) -> CapabilityTag {
        CapabilityTag::new_unchecked(self.capability_name())
    }

    /// `user_<domain>`
    pub fn block_label(self) -> BlockLabel {
        BlockLabel::new_unchecked(format!("user_{}", self.name()))
    }

    /// `<domain>_changelog`
    pub fn changelog_label(self) -> BlockLabel {
        BlockLabel::new_unchecked(format!("{}_changelog", self.name()))
    }

    /// `update_user_<domain>`
    pub fn update_tool(self) -> ToolName {
        ToolName::new_unchecked(format!("update_user_{}", self.name()))
    }

    /// `update_<domain>_changelog`
    pub fn changelog_tool(self) -> ToolName {
        ToolName::new_unchecked(format!("update_{}_changelog", self.name()))
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub fn user_endpoint() -> AgentId {
    AgentId::new_unchecked(USER_ENDPOINT)
}

pub fn conversational_id() -> AgentId {
    AgentId::new_unchecked(CONVERSATIONAL)
}

pub fn orchestrator_id() -> AgentId {
    AgentId::new_unchecked(ORCHESTRATOR)
}

fn role(name: &str) -> AgentRole {
    AgentRole::new_unchecked(name)
}

/// Every standard block with its size limit and access table.
pub fn block_specs(config: &RuntimeConfig) -> Vec<BlockSpec> {
    let orchestrator = role(ORCHESTRATOR);
    let conversational = role(CONVERSATIONAL);

    let mut specs = vec![
        BlockSpec::new(BlockLabel::new_unchecked(PLAN_BLOCK), config.plan_block_limit)
            .owned_by(orchestrator.clone()),
        BlockSpec::new(
            BlockLabel::new_unchecked(REQUESTS_CHANGELOG),
            config.plan_block_limit,
        )
        .owned_by(orchestrator.clone()),
    ];

    for domain in Domain::ALL {
        let mut block = BlockSpec::new(domain.block_label(), config.domain_block_limit)
            .owned_by(domain.role())
            .readable_by(conversational.clone());
        match domain {
            Domain::Projects => block = block.readable_by(Domain::Tasks.role()),
            Domain::Preferences => block = block.readable_by(orchestrator.clone()),
            Domain::Tasks | Domain::Reminders => {}
        }
        specs.push(block);
        specs.push(
            BlockSpec::new(domain.changelog_label(), config.domain_block_limit)
                .owned_by(domain.role()),
        );
    }
    specs
}

/// Register every standard block in `store`.
pub fn register_blocks(store: &MemoryStore, config: &RuntimeConfig) -> Result<(), MemoryError> {
    block_specs(config)
        .into_iter()
        .try_for_each(|spec| store.register(spec))
}

pub fn conversational_graph() -> Result<ToolRuleGraph, GraphError> {
    let send = tool_name(tools::SEND_MESSAGE);
    let front = [
        tools::ESCALATE_USER_REQUEST,
        tools::CLARIFY_USER_REQUEST,
        tools::HANDLE_ORCHESTRATOR_MESSAGE,
    ];

    let mut builder = ToolRuleGraph::builder()
        .allow(front.iter().map(|name| tool_name(name)))
        .allow([send.clone()])
        .rule(send.clone(), ToolRule::terminal());
    for name in front {
        builder = builder.rule(tool_name(name), ToolRule::constrain([send.clone()]));
    }
    builder.build()
}

pub fn orchestrator_graph() -> Result<ToolRuleGraph, GraphError> {
    let create = tool_name(tools::CREATE_ORCHESTRATOR_PLAN);
    let delegate = tool_name(tools::DELEGATE_AGENT_REQUEST);
    let changelog = tool_name(REQUESTS_CHANGELOG_TOOL);
    let evaluate = tool_name(tools::EVALUATE_PROGRESS);
    let record = tool_name(tools::RECORD_AGENT_REPORT);
    let send = tool_name(tools::SEND_STATUS_UPDATE);

    ToolRuleGraph::builder()
        .allow([
            create.clone(),
            delegate.clone(),
            changelog.clone(),
            evaluate.clone(),
            record.clone(),
            send.clone(),
        ])
        .entry([create.clone(), record.clone()])
        .rule(create, ToolRule::constrain([delegate.clone()]))
        .rule(delegate.clone(), ToolRule::constrain([changelog.clone()]))
        .rule(changelog, ToolRule::constrain([evaluate.clone()]))
        .rule(
            evaluate.clone(),
            ToolRule::conditional(
                [
                    (tools::orchestrator::PROGRESS_COMPLETE, send.clone()),
                    (tools::orchestrator::PROGRESS_DISPATCHED, send.clone()),
                ],
                Some(delegate),
            ),
        )
        .rule(record, ToolRule::constrain([evaluate]))
        .rule(send, ToolRule::terminal())
        .build()
}

pub fn specialist_graph(domain: Domain) -> Result<ToolRuleGraph, GraphError> {
    let handle = tool_name(tools::HANDLE_ORCHESTRATOR_REQUEST);
    let update = domain.update_tool();
    let changelog = domain.changelog_tool();
    let send = tool_name(tools::SEND_ORCHESTRATOR_MESSAGE);

    ToolRuleGraph::builder()
        .allow([handle.clone(), update.clone(), changelog.clone(), send.clone()])
        .entry([handle.clone()])
        .rule(handle, ToolRule::constrain([update.clone(), send.clone()]))
        .rule(update, ToolRule::constrain([changelog.clone()]))
        .rule(changelog, ToolRule::constrain([send.clone()]))
        .rule(send, ToolRule::terminal())
        .build()
}

pub fn conversational_tools() -> ToolSet {
    ToolSet::new()
        .with_tool(Arc::new(EscalateUserRequestTool::new(orchestrator_id())))
        .with_tool(Arc::new(ClarifyUserRequestTool::new()))
        .with_tool(Arc::new(HandleOrchestratorMessageTool::new()))
        .with_tool(Arc::new(SendMessageTool::new(user_endpoint())))
}

pub fn orchestrator_tools(
    state: crate::tools::SharedOrchestratorState,
    router: Arc<DelegationRouter>,
) -> ToolSet {
    ToolSet::new()
        .with_tool(Arc::new(CreatePlanTool::new(state.clone())))
        .with_tool(Arc::new(DelegateRequestTool::new(state.clone(), router)))
        .with_tool(Arc::new(ChangelogTool::new(
            tool_name(REQUESTS_CHANGELOG_TOOL),
            BlockLabel::new_unchecked(REQUESTS_CHANGELOG),
        )))
        .with_tool(Arc::new(EvaluateProgressTool::new(state.clone())))
        .with_tool(Arc::new(RecordAgentReportTool::new(state.clone())))
        .with_tool(Arc::new(SendStatusUpdateTool::new(state)))
}

pub fn specialist_tools(domain: Domain) -> ToolSet {
    ToolSet::new()
        .with_tool(Arc::new(HandleOrchestratorRequestTool::new()))
        .with_tool(Arc::new(MemoryEditTool::new(
            domain.update_tool(),
            domain.block_label(),
        )))
        .with_tool(Arc::new(ChangelogTool::new(
            domain.changelog_tool(),
            domain.changelog_label(),
        )))
        .with_tool(Arc::new(SendOrchestratorMessageTool::new()))
}

/// Capability routes for the standard roster.
pub fn router(mesh: Arc<dyn AgentMesh>) -> DelegationRouter {
    Domain::ALL.into_iter().fold(
        DelegationRouter::new(mesh).route(
            CapabilityTag::new_unchecked(CONVERSATIONAL),
            conversational_id(),
        ),
        |router, domain| router.route(domain.capability(), domain.agent_id()),
    )
}

/// Identity, graph and tools of one actor, ready to be given an oracle.
#[derive(Debug)]
pub struct AgentBlueprint {
    pub id: AgentId,
    pub role: AgentRole,
    pub graph: ToolRuleGraph,
    pub tools: ToolSet,
    /// Where failed turns are reported; the inbound sender when `None`
    pub failure_route: Option<Arc<dyn FailureRoute>>,
}

/// Blueprints for every standard actor.
///
/// The orchestrator's plan lives in `store`, so its blocks must already be
/// registered.
pub fn blueprints(
    store: Arc<MemoryStore>,
    mesh: Arc<dyn AgentMesh>,
) -> Result<Vec<AgentBlueprint>, GraphError> {
    let orchestrator = role(ORCHESTRATOR);
    let plans = PlanManager::new(
        store,
        BlockLabel::new_unchecked(PLAN_BLOCK),
        orchestrator.clone(),
    );
    let state = OrchestratorState::shared(plans);

    let mut blueprints = vec![
        AgentBlueprint {
            id: conversational_id(),
            role: role(CONVERSATIONAL),
            graph: conversational_graph()?,
            tools: conversational_tools(),
            failure_route: None,
        },
        AgentBlueprint {
            id: orchestrator_id(),
            role: orchestrator,
            graph: orchestrator_graph()?,
            tools: orchestrator_tools(state.clone(), Arc::new(router(mesh))),
            failure_route: Some(Arc::new(OriginFailureRoute::new(state))),
        },
    ];
    for domain in Domain::ALL {
        blueprints.push(AgentBlueprint {
            id: domain.agent_id(),
            role: domain.role(),
            graph: specialist_graph(domain)?,
            tools: specialist_tools(domain),
            failure_route: None,
        });
    }
    Ok(blueprints)
}
