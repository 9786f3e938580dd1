use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::warn;

use parley_types::events::{SocketCommand, SocketEvent};

use crate::error::ClientError;

/// One live socket connection. Kept as a seam so tests drive the manager
/// with in-memory channels instead of a network.
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, cmd: &SocketCommand) -> Result<(), ClientError>;

    /// Next server event; `None` once the connection is gone. Frames that
    /// fail to parse are logged and skipped.
    async fn recv(&mut self) -> Option<SocketEvent>;
}

/// WebSocket transport over tokio-tungstenite.
pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsTransport {
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let (stream, _) = connect_async(url)
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(Self { stream })
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, cmd: &SocketCommand) -> Result<(), ClientError> {
        let text = serde_json::to_string(cmd).map_err(|e| ClientError::Transport(e.to_string()))?;
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))
    }

    async fn recv(&mut self) -> Option<SocketEvent> {
        while let Some(frame) = self.stream.next().await {
            match frame {
                Ok(Message::Text(text)) => match serde_json::from_str::<SocketEvent>(&text) {
                    Ok(event) => return Some(event),
                    Err(e) => {
                        warn!("unparseable event: {} -- raw: {}", e, log_snippet(&text));
                    }
                },
                Ok(Message::Close(_)) | Err(_) => return None,
                // Pings are answered by tungstenite internally.
                Ok(_) => {}
            }
        }
        None
    }
}

/// Truncate an unparseable frame for logging without slicing inside a
/// multi-byte character.
fn log_snippet(text: &str) -> &str {
    let mut end = text.len().min(200);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
