//! Capability-based delegation.
//!
//! The router maps an abstract [`CapabilityTag`] to the actor that serves it
//! and enqueues a `Delegate` message on that actor's mailbox. It never waits
//! for the outcome; replies come back later as separate messages carrying
//! the same [`RequestId`].

use omni_core::{AgentId, CapabilityTag, MessageId, RequestId};
use omni_mesh::{AgentMesh, MeshError, Message, MessageKind};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DelegationError {
    /// No actor serves the capability; nothing was sent
    #[error("Unknown capability: {0}")]
    UnknownCapability(CapabilityTag),

    /// The transport refused the message
    #[error("Dispatch failed: {0}")]
    Dispatch(#[from] MeshError),
}

/// Receipt for a dispatched delegation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchResult {
    pub request_id: RequestId,
    pub message_id: MessageId,
    pub target: AgentId,
}

/// Static routing table from capability to actor.
pub struct DelegationRouter {
    routes: HashMap<CapabilityTag, AgentId>,
    mesh: Arc<dyn AgentMesh>,
}

impl DelegationRouter {
    pub fn new(mesh: Arc<dyn AgentMesh>) -> Self {
        Self {
            routes: HashMap::new(),
            mesh,
        }
    }

    /// Register the actor serving `tag`.
    pub fn route(mut self, tag: CapabilityTag, target: AgentId) -> Self {
        self.routes.insert(tag, target);
        self
    }

    pub fn resolve(&self, tag: &CapabilityTag) -> Option<&AgentId> {
        self.routes.get(tag)
    }

    pub fn capabilities(&self) -> Vec<&CapabilityTag> {
        let mut tags: Vec<&CapabilityTag> = self.routes.keys().collect();
        tags.sort();
        tags
    }

    /// Enqueue a `Delegate` message for the actor serving `tag`.
    ///
    /// Returns as soon as the message is enqueued.
    pub async fn delegate(
        &self,
        from: &AgentId,
        tag: &CapabilityTag,
        description: &str,
    ) -> Result<DispatchResult, DelegationError> {
        let Some(target) = self.routes.get(tag) else {
            warn!(%from, capability = %tag, "Delegation to unknown capability");
            return Err(DelegationError::UnknownCapability(tag.clone()));
        };

        let request_id = RequestId::new();
        let message = Message::new(MessageKind::Delegate, from.clone(), target.clone(), request_id)
            .with_capability(tag.clone())
            .with_description(description);
        let message_id = message.id;

        self.mesh.send(target, message).await?;
        info!(%from, %target, capability = %tag, %request_id, "Delegated request");

        Ok(DispatchResult {
            request_id,
            message_id,
            target: target.clone(),
        })
    }
}

impl std::fmt::Debug for DelegationRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegationRouter")
            .field("routes", &self.routes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omni_mesh::LocalMesh;

    fn tag(s: &str) -> CapabilityTag {
        CapabilityTag::new_unchecked(s)
    }

    fn agent(s: &str) -> AgentId {
        AgentId::new_unchecked(s)
    }

    #[tokio::test]
    async fn test_delegate_enqueues_without_waiting() {
        let mesh = Arc::new(LocalMesh::new());
        let mut mailbox = mesh.register(agent("tasks")).unwrap();
        let router = DelegationRouter::new(mesh.clone()).route(tag("task-domain"), agent("tasks"));

        let receipt = router
            .delegate(&agent("orchestrator"), &tag("task-domain"), "Add milk")
            .await
            .unwrap();
        assert_eq!(receipt.target, agent("tasks"));

        let delivered = mailbox.recv().await.unwrap();
        assert_eq!(delivered.kind, MessageKind::Delegate);
        assert_eq!(delivered.request_id, receipt.request_id);
        assert_eq!(delivered.id, receipt.message_id);
        assert_eq!(delivered.description.as_deref(), Some("Add milk"));
        assert_eq!(delivered.capability_tag, Some(tag("task-domain")));
    }

    #[tokio::test]
    async fn test_unknown_capability_sends_nothing() {
        let mesh = Arc::new(LocalMesh::new());
        let mut mailbox = mesh.register(agent("tasks")).unwrap();
        let router = DelegationRouter::new(mesh.clone()).route(tag("task-domain"), agent("tasks"));

        let err = router
            .delegate(&agent("orchestrator"), &tag("weather-domain"), "Forecast")
            .await
            .unwrap_err();
        assert_eq!(err, DelegationError::UnknownCapability(tag("weather-domain")));
        assert!(mailbox.try_recv().is_none());
        assert_eq!(mesh.queue_depth().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_transport_errors_surface() {
        let mesh = Arc::new(LocalMesh::new());
        let router = DelegationRouter::new(mesh).route(tag("task-domain"), agent("tasks"));

        assert!(matches!(
            router
                .delegate(&agent("orchestrator"), &tag("task-domain"), "x")
                .await,
            Err(DelegationError::Dispatch(MeshError::AgentNotFound(_)))
        ));
    }
}
