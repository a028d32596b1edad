//! # Omni Testing
//!
//! Utilities for exercising Omni actors without a live decision source.
//!
//! - [`ScriptedOracle`]: replays a fixed list of proposals and records what
//!   each proposal was based on
//! - [`fixtures`]: small constructors for calls, stores and messages
//!
//! ## Usage
//!
//! ```rust
//! use omni_testing::{ScriptedOracle, fixtures::call};
//! use serde_json::json;
//!
//! let oracle = ScriptedOracle::new()
//!     .then_call(call("handle_orchestrator_request", json!({})))
//!     .then_call(call("send_orchestrator_message", json!({"message": "done"})));
//! assert_eq!(oracle.remaining(), 2);
//! ```

pub mod fixtures;
pub mod oracle;

pub use oracle::ScriptedOracle;
