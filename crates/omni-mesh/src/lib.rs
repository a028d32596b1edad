//! # Omni Mesh
//!
//! Fire-and-forget messaging between Omni actors.
//!
//! - [`Message`]: the envelope, correlated across actors by `request_id`
//! - [`AgentMesh`]: the transport seam (`send` never waits for a reply)
//! - [`LocalMesh`]: in-process mailboxes over tokio channels, FIFO per agent

pub mod error;
pub mod local;
pub mod mesh;
pub mod message;

pub use error::{MeshError, MeshResult};
pub use local::{LocalMesh, Mailbox};
pub use mesh::AgentMesh;
pub use message::{Message, MessageKind, MessageMetadata};
pub use omni_core::{MessageId, RequestId};
