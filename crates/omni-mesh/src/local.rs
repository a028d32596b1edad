//! In-process mesh: one unbounded tokio channel per registered agent.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use omni_core::AgentId;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{MeshError, MeshResult};
use crate::mesh::AgentMesh;
use crate::message::Message;

#[derive(Debug, Clone)]
struct MailboxHandle {
    sender: mpsc::UnboundedSender<Message>,
    depth: Arc<AtomicUsize>,
}

/// Receiving half of an agent's mailbox.
///
/// Messages come out in the order they were sent to this agent. Dropping the
/// mailbox makes later sends fail with `MailboxClosed`.
#[derive(Debug)]
pub struct Mailbox {
    agent: AgentId,
    receiver: mpsc::UnboundedReceiver<Message>,
    depth: Arc<AtomicUsize>,
}

impl Mailbox {
    pub fn agent(&self) -> &AgentId {
        &self.agent
    }

    /// Wait for the next message; `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<Message> {
        let message = self.receiver.recv().await?;
        self.depth.fetch_sub(1, Ordering::AcqRel);
        Some(message)
    }

    /// Next message if one is already queued.
    pub fn try_recv(&mut self) -> Option<Message> {
        let message = self.receiver.try_recv().ok()?;
        self.depth.fetch_sub(1, Ordering::AcqRel);
        Some(message)
    }

    /// Messages waiting in this mailbox.
    pub fn len(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Mesh for actors living in one process.
///
/// ```rust
/// use omni_core::{AgentId, RequestId};
/// use omni_mesh::{AgentMesh, LocalMesh, Message, MessageKind};
///
/// # tokio_test::block_on(async {
/// let mesh = LocalMesh::new();
/// let tasks = AgentId::parse("tasks").unwrap();
/// let mut mailbox = mesh.register(tasks.clone()).unwrap();
///
/// let msg = Message::new(
///     MessageKind::Delegate,
///     AgentId::parse("orchestrator").unwrap(),
///     tasks.clone(),
///     RequestId::new(),
/// );
/// mesh.send(&tasks, msg.clone()).await.unwrap();
/// assert_eq!(mailbox.recv().await.unwrap().id, msg.id);
/// # });
/// ```
#[derive(Debug, Default)]
pub struct LocalMesh {
    mailboxes: DashMap<AgentId, MailboxHandle>,
}

impl LocalMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a mailbox for `agent`.
    ///
    /// A closed mailbox may be re-registered; an open one may not.
    pub fn register(&self, agent: AgentId) -> MeshResult<Mailbox> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let depth = Arc::new(AtomicUsize::new(0));
        let handle = MailboxHandle {
            sender,
            depth: Arc::clone(&depth),
        };

        match self.mailboxes.entry(agent.clone()) {
            Entry::Occupied(mut occupied) => {
                if !occupied.get().sender.is_closed() {
                    return Err(MeshError::AlreadyRegistered(agent));
                }
                occupied.insert(handle);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(handle);
            }
        }

        debug!(%agent, "Registered mailbox");
        Ok(Mailbox {
            agent,
            receiver,
            depth,
        })
    }

    /// Remove an agent's mailbox; queued messages stay with the receiver.
    pub fn deregister(&self, agent: &AgentId) -> bool {
        self.mailboxes.remove(agent).is_some()
    }
}

#[async_trait]
impl AgentMesh for LocalMesh {
    async fn send(&self, to: &AgentId, message: Message) -> MeshResult<()> {
        let handle = self
            .mailboxes
            .get(to)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| MeshError::AgentNotFound(to.clone()))?;

        let (id, kind) = (message.id, message.kind);
        handle.depth.fetch_add(1, Ordering::AcqRel);
        if handle.sender.send(message).is_err() {
            handle.depth.fetch_sub(1, Ordering::AcqRel);
            warn!(%to, %id, %kind, "Mailbox closed, message dropped");
            return Err(MeshError::MailboxClosed(to.clone()));
        }
        debug!(%to, %id, %kind, "Message enqueued");
        Ok(())
    }

    async fn is_reachable(&self, agent_id: &AgentId) -> bool {
        self.mailboxes
            .get(agent_id)
            .is_some_and(|entry| !entry.sender.is_closed())
    }

    async fn list_agents(&self) -> MeshResult<Vec<AgentId>> {
        let mut agents: Vec<AgentId> = self.mailboxes.iter().map(|e| e.key().clone()).collect();
        agents.sort();
        Ok(agents)
    }

    async fn queue_depth(&self) -> MeshResult<usize> {
        Ok(self
            .mailboxes
            .iter()
            .map(|entry| entry.depth.load(Ordering::Acquire))
            .sum())
    }
}
