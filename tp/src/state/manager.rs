//! StateManager - actor that owns the session store
//!
//! One task owns the store; callers send commands over `mpsc` and await the
//! reply on a `oneshot`.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::domain::SessionId;
use crate::session::SessionRecord;

use super::messages::{StateCommand, StateError, StateResponse};
use super::store::{InMemorySessionStore, SessionStore};

/// Handle to send commands to the StateManager
#[derive(Debug, Clone)]
pub struct StateManager {
    tx: mpsc::Sender<StateCommand>,
}

impl StateManager {
    /// Spawn an actor over the given store
    pub fn spawn<S: SessionStore>(store: S) -> Self {
        debug!("StateManager::spawn: called");
        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(actor_loop(store, rx));
        info!("StateManager spawned");
        Self { tx }
    }

    /// Spawn an actor over an empty in-memory store
    pub fn in_memory() -> Self {
        Self::spawn(InMemorySessionStore::new())
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<StateResponse<T>>) -> StateCommand) -> StateResponse<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)?
    }

    /// Store a new session record
    pub async fn create(&self, record: SessionRecord) -> StateResponse<SessionRecord> {
        debug!(id = %record.id(), "create: called");
        self.request(|reply| StateCommand::Create { record, reply }).await
    }

    /// Get a session record by ID
    pub async fn get(&self, id: &SessionId) -> StateResponse<Option<SessionRecord>> {
        debug!(%id, "get: called");
        let id = id.clone();
        self.request(|reply| StateCommand::Get { id, reply }).await
    }

    /// Get a session record by ID, returning error if not found
    pub async fn get_required(&self, id: &SessionId) -> StateResponse<SessionRecord> {
        debug!(%id, "get_required: called");
        self.get(id).await?.ok_or_else(|| StateError::NotFound(id.to_string()))
    }

    /// Replace a session record, returning it with its new revision
    pub async fn update(&self, record: SessionRecord) -> StateResponse<SessionRecord> {
        debug!(id = %record.id(), revision = record.revision, "update: called");
        self.request(|reply| StateCommand::Update { record, reply }).await
    }

    pub async fn delete(&self, id: &SessionId) -> StateResponse<()> {
        debug!(%id, "delete: called");
        let id = id.clone();
        self.request(|reply| StateCommand::Delete { id, reply }).await
    }

    /// List every stored session, oldest first
    pub async fn list(&self) -> StateResponse<Vec<SessionRecord>> {
        debug!("list: called");
        self.request(|reply| StateCommand::List { reply }).await
    }

    /// Stop the actor
    pub async fn shutdown(&self) -> StateResponse<()> {
        debug!("shutdown: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(StateCommand::Shutdown { reply: reply_tx })
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)
    }
}

async fn actor_loop<S: SessionStore>(mut store: S, mut rx: mpsc::Receiver<StateCommand>) {
    debug!("actor_loop: called");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            StateCommand::Create { record, reply } => {
                debug!(id = %record.id(), "actor_loop: Create command");
                let _ = reply.send(store.create(record));
            }

            StateCommand::Get { id, reply } => {
                debug!(%id, "actor_loop: Get command");
                let _ = reply.send(store.get(&id));
            }

            StateCommand::Update { record, reply } => {
                debug!(id = %record.id(), "actor_loop: Update command");
                let _ = reply.send(store.update(record));
            }

            StateCommand::Delete { id, reply } => {
                debug!(%id, "actor_loop: Delete command");
                let _ = reply.send(store.delete(&id));
            }

            StateCommand::List { reply } => {
                debug!("actor_loop: List command");
                let _ = reply.send(store.list());
            }

            StateCommand::Shutdown { reply } => {
                info!("StateManager shutting down");
                let _ = reply.send(());
                break;
            }
        }
    }

    debug!("StateManager actor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::session::PlanningSession;
    use crate::session::tests::complete_draft;

    fn record() -> SessionRecord {
        SessionRecord::new(PlanningSession::new(complete_draft(), 5))
    }

    #[tokio::test]
    async fn test_state_manager_crud() {
        let manager = StateManager::in_memory();

        let created = manager.create(record()).await.unwrap();
        let id = created.id().clone();

        let fetched = manager.get_required(&id).await.unwrap();
        assert_eq!(fetched.revision, 1);

        let updated = manager.update(fetched).await.unwrap();
        assert_eq!(updated.revision, 2);

        assert_eq!(manager.list().await.unwrap().len(), 1);

        manager.delete(&id).await.unwrap();
        assert!(manager.get(&id).await.unwrap().is_none());

        manager.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_state_manager_stale_update() {
        let manager = StateManager::in_memory();
        let created = manager.create(record()).await.unwrap();
        manager.update(created.clone()).await.unwrap();

        let err = manager.update(created).await.unwrap_err();
        assert!(matches!(err, StateError::Conflict { .. }));

        manager.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_state_manager_get_required_missing() {
        let manager = StateManager::in_memory();
        let err = manager.get_required(&SessionId::from("missing")).await.unwrap_err();
        assert_eq!(err, StateError::NotFound("missing".to_string()));
        manager.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_commands_after_shutdown_fail() {
        let manager = StateManager::in_memory();
        manager.shutdown().await.unwrap();
        // Let the actor drop its receiver
        tokio::task::yield_now().await;
        let err = manager.list().await.unwrap_err();
        assert_eq!(err, StateError::ChannelError);
    }
}
