//! # Omni System
//!
//! Wires the standard roster onto an in-process mesh: registers the memory
//! blocks, builds one [`AgentRuntime`] per actor and spawns each on its own
//! task. The caller plays the user endpoint.

use crate::config::RuntimeConfig;
use crate::oracle::PolicyOracle;
use crate::roster::{self, AgentBlueprint};
use crate::runtime::{AgentRuntime, RunSummary, RuntimeError};
use omni_core::{AgentId, AgentRole, GraphError, MemoryError, MemoryStore, RequestId};
use omni_mesh::{AgentMesh, LocalMesh, Mailbox, MeshError, Message, MessageKind};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum SystemError {
    #[error("Failed to register memory blocks: {0}")]
    Memory(#[from] MemoryError),

    #[error("Invalid tool-rule graph: {0}")]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("Mesh error: {0}")]
    Mesh(#[from] MeshError),
}

/// A running actor set.
pub struct OmniSystem {
    store: Arc<MemoryStore>,
    mesh: Arc<LocalMesh>,
    user: AgentId,
    inbox: Mailbox,
    actors: Vec<(AgentId, JoinHandle<RunSummary>)>,
}

impl OmniSystem {
    /// Launch the standard roster. Must be called inside a Tokio runtime.
    ///
    /// `oracles` supplies the policy oracle for each role.
    pub fn launch<F>(config: RuntimeConfig, oracles: F) -> Result<Self, SystemError>
    where
        F: Fn(&AgentRole) -> Arc<dyn PolicyOracle>,
    {
        let store = Arc::new(MemoryStore::new());
        roster::register_blocks(&store, &config)?;

        let mesh = Arc::new(LocalMesh::new());
        let user = roster::user_endpoint();
        let inbox = mesh.register(user.clone())?;

        let mut actors = Vec::new();
        for AgentBlueprint {
            id,
            role,
            graph,
            tools,
            failure_route,
        } in roster::blueprints(store.clone(), mesh.clone())?
        {
            let mailbox = mesh.register(id.clone())?;
            let oracle = oracles(&role);
            let mut runtime = AgentRuntime::new(
                id.clone(),
                role,
                graph,
                tools,
                oracle,
                store.clone(),
                mesh.clone(),
                config,
            )?;
            if let Some(route) = failure_route {
                runtime = runtime.with_failure_route(route);
            }
            actors.push((id, tokio::spawn(runtime.run(mailbox))));
        }
        info!(actors = actors.len(), "Omni system launched");

        Ok(Self {
            store,
            mesh,
            user,
            inbox,
            actors,
        })
    }

    /// Send a user request to the conversational actor.
    pub async fn submit(&self, text: &str) -> Result<RequestId, SystemError> {
        let request_id = RequestId::new();
        let message = Message::new(
            MessageKind::UserRequest,
            self.user.clone(),
            roster::conversational_id(),
            request_id,
        )
        .with_body(text);
        self.send(message).await?;
        Ok(request_id)
    }

    /// Deliver an arbitrary message, for example a redelivery.
    pub async fn send(&self, message: Message) -> Result<(), SystemError> {
        let to = message.to.clone();
        self.mesh.send(&to, message).await?;
        Ok(())
    }

    /// Next message addressed to the user endpoint.
    pub async fn next_user_message(&mut self) -> Option<Message> {
        self.inbox.recv().await
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    pub fn mesh(&self) -> &Arc<LocalMesh> {
        &self.mesh
    }

    /// Close every mailbox and wait for the actors to drain and stop.
    pub async fn shutdown(self) -> Vec<(AgentId, RunSummary)> {
        for (id, _) in &self.actors {
            self.mesh.deregister(id);
        }
        self.mesh.deregister(&self.user);

        let (ids, handles): (Vec<AgentId>, Vec<JoinHandle<RunSummary>>) =
            self.actors.into_iter().unzip();
        let results = futures::future::join_all(handles).await;

        ids.into_iter()
            .zip(results)
            .filter_map(|(id, result)| match result {
                Ok(summary) => Some((id, summary)),
                Err(err) => {
                    error!(agent = %id, error = %err, "Actor task failed");
                    None
                }
            })
            .collect()
    }
}

impl std::fmt::Debug for OmniSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OmniSystem")
            .field("actors", &self.actors.iter().map(|(id, _)| id).collect::<Vec<_>>())
            .field("blocks", &self.store.len())
            .finish()
    }
}
