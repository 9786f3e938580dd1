use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use parley_types::events::{SocketCommand, SocketEvent};

use crate::error::ClientError;
use crate::transport::Transport;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// What subscribers observe: transport lifecycle transitions plus relayed
/// server events. Connection state comes from these alone; there is no
/// background poll reconciling a local flag against the socket.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    Connected,
    Disconnected,
    Event(SocketEvent),
}

/// Owns one user's socket connection. Constructed on login, torn down on
/// logout, and handed to consumers explicitly; there is no ambient global
/// socket. Reconnects with backoff, re-running `setup` and rejoining the
/// last-viewed chat room each time, since the server keeps no session
/// state across a disconnect.
pub struct SocketManager {
    cmd_tx: mpsc::UnboundedSender<SocketCommand>,
    updates_tx: broadcast::Sender<SessionUpdate>,
    active_chat: Arc<Mutex<Option<String>>>,
    task: JoinHandle<()>,
}

impl SocketManager {
    /// Start the connection loop. `dial` is invoked for the initial
    /// connection and every reconnect attempt.
    pub fn start<F, Fut, T>(user_id: impl Into<String>, dial: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ClientError>> + Send + 'static,
        T: Transport + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (updates_tx, _) = broadcast::channel(256);
        let active_chat = Arc::new(Mutex::new(None));

        let task = tokio::spawn(run_loop(
            user_id.into(),
            dial,
            cmd_rx,
            updates_tx.clone(),
            active_chat.clone(),
        ));

        Self {
            cmd_tx,
            updates_tx,
            active_chat,
            task,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.updates_tx.subscribe()
    }

    /// Record the chat being viewed and join its room. The recorded id is
    /// what gets rejoined after a reconnect.
    pub fn open_chat(&self, chat_id: &str) -> Result<(), ClientError> {
        *self
            .active_chat
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(chat_id.to_string());
        self.send(SocketCommand::JoinChat(chat_id.to_string()))
    }

    /// Queue a command for the connection loop. Commands queued while
    /// offline are flushed once the next connection is set up.
    pub fn send(&self, cmd: SocketCommand) -> Result<(), ClientError> {
        self.cmd_tx.send(cmd).map_err(|_| ClientError::NotConnected)
    }

    /// Tear down on logout.
    pub fn shutdown(self) {
        self.task.abort();
    }
}

async fn run_loop<F, Fut, T>(
    user_id: String,
    mut dial: F,
    mut cmd_rx: mpsc::UnboundedReceiver<SocketCommand>,
    updates_tx: broadcast::Sender<SessionUpdate>,
    active_chat: Arc<Mutex<Option<String>>>,
) where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, ClientError>> + Send,
    T: Transport + 'static,
{
    let mut backoff = INITIAL_BACKOFF;

    loop {
        match dial().await {
            Ok(mut transport) => {
                backoff = INITIAL_BACKOFF;
                if transport
                    .send(&SocketCommand::Setup {
                        id: user_id.clone(),
                    })
                    .await
                    .is_err()
                {
                    warn!("setup send failed, retrying");
                } else if run_session(
                    &mut transport,
                    &mut cmd_rx,
                    &updates_tx,
                    &active_chat,
                )
                .await
                .is_none()
                {
                    // Manager dropped; stop reconnecting.
                    return;
                }
                let _ = updates_tx.send(SessionUpdate::Disconnected);
                info!("socket disconnected, reconnecting in {:?}", backoff);
            }
            Err(e) => {
                warn!("connect failed: {}, retrying in {:?}", e, backoff);
            }
        }

        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}

/// Pump one live connection. Returns `Some(())` when the transport went
/// away (reconnect), `None` when the command channel closed (shutdown).
async fn run_session<T: Transport>(
    transport: &mut T,
    cmd_rx: &mut mpsc::UnboundedReceiver<SocketCommand>,
    updates_tx: &broadcast::Sender<SessionUpdate>,
    active_chat: &Arc<Mutex<Option<String>>>,
) -> Option<()> {
    loop {
        tokio::select! {
            event = transport.recv() => {
                let Some(event) = event else { return Some(()) };
                match event {
                    SocketEvent::Connected => {
                        debug!("setup acknowledged");
                        let _ = updates_tx.send(SessionUpdate::Connected);
                        // Membership is rebuilt from scratch server-side;
                        // rejoin whatever chat the user has open.
                        let rejoin = active_chat
                            .lock()
                            .unwrap_or_else(|e| e.into_inner())
                            .clone();
                        if let Some(chat_id) = rejoin {
                            if transport.send(&SocketCommand::JoinChat(chat_id)).await.is_err() {
                                return Some(());
                            }
                        }
                    }
                    other => {
                        let _ = updates_tx.send(SessionUpdate::Event(other));
                    }
                }
            }
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { return None };
                if transport.send(&cmd).await.is_err() {
                    return Some(());
                }
            }
        }
    }
}
