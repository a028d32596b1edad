//! # Omni Agent
//!
//! The actor runtime of the Omni system and everything it plugs together:
//!
//! - [`oracle`]: the [`PolicyOracle`] seam that proposes tool calls
//! - [`tool`] and [`tools`]: the tool trait and the built-in tools
//! - [`router`]: capability-based, fire-and-forget delegation
//! - [`runtime`]: one guarded turn per inbound message
//! - [`roster`] and [`system`]: the standard actor set on a local mesh
//! - [`config`] and [`telemetry`]: environment configuration and logging
//!
//! ## Example
//!
//! ```rust,no_run
//! use omni_agent::{OmniSystem, RuntimeConfig};
//! use omni_agent::oracle::{FnOracle, PolicyOracle, Proposal};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut system = OmniSystem::launch(RuntimeConfig::from_env()?, |_role| {
//!     Arc::new(FnOracle::new(|_ctx| Ok(Proposal::Done))) as Arc<dyn PolicyOracle>
//! })?;
//! system.submit("Add milk to my shopping list").await?;
//! let _reply = system.next_user_message().await;
//! system.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod oracle;
pub mod roster;
pub mod router;
pub mod runtime;
pub mod system;
pub mod telemetry;
pub mod tool;
pub mod tools;

pub use config::{ConfigError, RuntimeConfig, RuntimeConfigBuilder};
pub use oracle::{FnOracle, OracleError, PolicyOracle, Proposal, TurnContext, TurnEvent};
pub use roster::{AgentBlueprint, Domain};
pub use router::{DelegationError, DelegationRouter, DispatchResult};
pub use runtime::{
    AgentRuntime, FailureRoute, RunSummary, RuntimeError, TurnFailure, TurnOutcome, TurnReport,
};
pub use system::{OmniSystem, SystemError};
pub use telemetry::{LogFormat, init_tracing};
pub use tool::{AgentTool, ToolContext, ToolSet, TurnScope};
