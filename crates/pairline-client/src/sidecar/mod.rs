//! Messaging client backed by a sidecar process.
//!
//! One child process per session speaks [`protocol`] over stdin/stdout.
//! A background task owns the pipes: it writes queued commands, matches
//! `result` lines to pending requests, and forwards pushed events to the
//! session's event channel. When the child's stdout closes every pending
//! request fails with [`ClientError::Closed`].

pub mod protocol;

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use pairline_core::SessionId;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::client::{ClientEvent, ClientFactory, MessagingClient, SpawnedClient};
use crate::errors::ClientError;

use self::protocol::{SidecarCommand, SidecarMessage};

type Reply = oneshot::Sender<Result<(), ClientError>>;

struct Request {
    command: SidecarCommand,
    reply: Reply,
}

/// Command handle to a running sidecar.
pub struct SidecarClient {
    session_id: SessionId,
    requests: mpsc::Sender<Request>,
    next_id: AtomicU64,
}

impl SidecarClient {
    /// Attach to an already-connected sidecar.
    ///
    /// Returns the client, its event receiver, and the I/O task. Dropping the
    /// client ends the I/O task once queued commands are written.
    ///
    /// Events pass through an unbounded relay so a full event channel never
    /// stalls the reader that delivers `result` lines.
    pub fn attach<R, W>(
        session_id: SessionId,
        reader: R,
        writer: W,
        event_buffer: usize,
    ) -> (Self, mpsc::Receiver<ClientEvent>, JoinHandle<()>)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (request_tx, request_rx) = mpsc::channel(32);
        let (relay_tx, relay_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(event_buffer.max(1));
        let _ = tokio::spawn(relay_events(session_id.clone(), relay_rx, event_tx));
        let task = tokio::spawn(run_io(
            session_id.clone(),
            reader,
            writer,
            request_rx,
            relay_tx,
        ));
        let client = Self {
            session_id,
            requests: request_tx,
            next_id: AtomicU64::new(1),
        };
        (client, event_rx, task)
    }

    async fn call(&self, build: impl FnOnce(u64) -> SidecarCommand) -> Result<(), ClientError> {
        let command = build(self.next_id.fetch_add(1, Ordering::Relaxed));
        debug!(session_id = %self.session_id, command = command.kind(), id = command.id(), "sidecar request");
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Request { command, reply })
            .await
            .map_err(|_| ClientError::Closed)?;
        response.await.map_err(|_| ClientError::Closed)?
    }
}

#[async_trait]
impl MessagingClient for SidecarClient {
    async fn initialize(&self) -> Result<(), ClientError> {
        self.call(|id| SidecarCommand::Initialize { id }).await
    }

    async fn send_message(&self, address: &str, body: &str) -> Result<(), ClientError> {
        self.call(|id| SidecarCommand::SendMessage {
            id,
            to: address.to_string(),
            body: body.to_string(),
        })
        .await
    }

    async fn logout(&self) -> Result<(), ClientError> {
        self.call(|id| SidecarCommand::Logout { id }).await
    }

    async fn destroy(&self) -> Result<(), ClientError> {
        match self.call(|id| SidecarCommand::Destroy { id }).await {
            // exited before acknowledging: already gone
            Err(ClientError::Closed) => Ok(()),
            other => other,
        }
    }
}

/// Pump commands to the sidecar and lines back from it until either side closes.
async fn run_io<R, W>(
    session_id: SessionId,
    reader: R,
    mut writer: W,
    mut requests: mpsc::Receiver<Request>,
    events: mpsc::UnboundedSender<ClientEvent>,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut pending: HashMap<u64, Reply> = HashMap::new();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<SidecarMessage>(&line) {
                            Ok(SidecarMessage::Result { id, ok, error }) => {
                                let Some(reply) = pending.remove(&id) else {
                                    warn!(%session_id, id, "result for unknown request");
                                    continue;
                                };
                                let outcome = if ok {
                                    Ok(())
                                } else {
                                    Err(ClientError::Rejected(
                                        error.unwrap_or_else(|| "unspecified failure".to_string()),
                                    ))
                                };
                                let _ = reply.send(outcome);
                            }
                            Ok(message) => {
                                if let Some(event) = message.into_event() {
                                    if events.send(event).is_err() {
                                        debug!(%session_id, "event relay closed");
                                    }
                                }
                            }
                            Err(e) => {
                                warn!(%session_id, line = %line, error = %e, "failed to parse sidecar line");
                            }
                        }
                    }
                    Ok(None) => {
                        debug!(%session_id, "sidecar stdout closed");
                        break;
                    }
                    Err(e) => {
                        error!(%session_id, error = %e, "error reading sidecar stdout");
                        break;
                    }
                }
            }

            request = requests.recv() => {
                let Some(Request { command, reply }) = request else {
                    debug!(%session_id, "command channel closed");
                    break;
                };
                let id = command.id();
                match write_line(&mut writer, &command).await {
                    Ok(()) => {
                        let _ = pending.insert(id, reply);
                    }
                    Err(e) => {
                        error!(%session_id, error = %e, "failed to write to sidecar stdin");
                        let _ = reply.send(Err(e));
                        break;
                    }
                }
            }
        }
    }

    if !pending.is_empty() {
        debug!(%session_id, pending = pending.len(), "failing pending sidecar requests");
    }
}

/// Move events from the relay into the bounded per-session channel, in order.
async fn relay_events(
    session_id: SessionId,
    mut relay: mpsc::UnboundedReceiver<ClientEvent>,
    events: mpsc::Sender<ClientEvent>,
) {
    while let Some(event) = relay.recv().await {
        if events.send(event).await.is_err() {
            debug!(%session_id, "event receiver dropped");
            return;
        }
    }
}

async fn write_line<W: AsyncWrite + Unpin>(
    writer: &mut W,
    command: &SidecarCommand,
) -> Result<(), ClientError> {
    let mut line =
        serde_json::to_string(command).map_err(|e| ClientError::Protocol(e.to_string()))?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Spawns one sidecar process per session.
///
/// The child is started as `command [args...] --session <id> --auth-dir <path>`.
#[derive(Clone, Debug)]
pub struct SidecarClientFactory {
    command: String,
    args: Vec<String>,
    event_buffer: usize,
}

impl SidecarClientFactory {
    /// Create a factory for `command` with extra leading `args`.
    pub fn new(command: impl Into<String>, args: Vec<String>, event_buffer: usize) -> Self {
        Self {
            command: command.into(),
            args,
            event_buffer,
        }
    }

    fn build_command(&self, session_id: &SessionId, auth_location: &Path) -> Command {
        let mut cmd = Command::new(&self.command);
        let _ = cmd
            .args(&self.args)
            .arg("--session")
            .arg(session_id.as_str())
            .arg("--auth-dir")
            .arg(auth_location)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl ClientFactory for SidecarClientFactory {
    async fn spawn(
        &self,
        session_id: &SessionId,
        auth_location: &Path,
    ) -> Result<SpawnedClient, ClientError> {
        let mut child = self
            .build_command(session_id, auth_location)
            .spawn()
            .map_err(ClientError::Spawn)?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ClientError::Protocol("sidecar stdin not piped".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ClientError::Protocol("sidecar stdout not piped".into()))?;

        info!(%session_id, command = %self.command, pid = ?child.id(), "sidecar spawned");

        let (client, events, io_task) =
            SidecarClient::attach(session_id.clone(), stdout, stdin, self.event_buffer);

        let sid = session_id.clone();
        let _ = tokio::spawn(async move {
            let _ = io_task.await;
            let _ = child.start_kill();
            match child.wait().await {
                Ok(status) => info!(session_id = %sid, %status, "sidecar exited"),
                Err(e) => warn!(session_id = %sid, error = %e, "error waiting for sidecar"),
            }
        });

        Ok(SpawnedClient {
            client: Arc::new(client),
            events,
        })
    }
}
