//! Handle for talking to a session actor.
//!
//! `SessionHandle` wraps the actor's command sender and the receiving side of
//! its view channel. It is cheap to clone. Reads never touch the actor; every
//! mutation goes through the actor's queue.

use pairline_core::{SessionError, SessionId, SessionState};
use tokio::sync::{mpsc, oneshot, watch};

use crate::actor::SessionCommand;
use crate::record::SessionView;

/// Cloneable handle to one session.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    id: SessionId,
    tx: mpsc::Sender<SessionCommand>,
    view: watch::Receiver<SessionView>,
}

impl SessionHandle {
    pub(crate) fn new(
        id: SessionId,
        tx: mpsc::Sender<SessionCommand>,
        view: watch::Receiver<SessionView>,
    ) -> Self {
        Self { id, tx, view }
    }

    /// Session id.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Latest published snapshot.
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.view.borrow().state
    }

    /// Receiver notified after every transition.
    pub fn watch(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    /// Whether the actor is still running.
    pub fn is_alive(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Send `body` to an already-normalized address.
    pub async fn send_message(&self, address: String, body: String) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::SendMessage {
            address,
            body,
            reply,
        })
        .await
    }

    /// Log out and tear down. On success the actor has stopped.
    pub async fn logout(&self) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::Logout { reply }).await
    }

    /// Destroy the client without logging out and stop the actor.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::Shutdown { reply }).await
    }

    async fn request(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<(), SessionError>>) -> SessionCommand,
    ) -> Result<(), SessionError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| self.gone())?;
        response.await.map_err(|_| self.gone())?
    }

    fn gone(&self) -> SessionError {
        if self.state().is_terminal() {
            SessionError::NotFound(self.id.clone())
        } else {
            SessionError::Unavailable(self.id.clone())
        }
    }

    /// Handle whose actor is already gone, for registry tests.
    #[cfg(test)]
    pub(crate) fn detached(id: &str) -> Self {
        use crate::record::SessionRecord;

        let (tx, _) = mpsc::channel(1);
        let record = SessionRecord::new(SessionId::from(id), format!("/auth/session-{id}").into());
        let (_, view) = watch::channel(record.view());
        Self::new(SessionId::from(id), tx, view)
    }
}
