use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn};

use parley_types::events::SocketCommand;

use crate::relay::Relay;

/// Default heartbeat interval: the server pings every 15 seconds and drops
/// the connection after 2 consecutive missed pongs (~30s).
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Handle a single socket connection: register the session, pump registry
/// events to the wire, and feed inbound commands to the relay. Membership
/// is torn down on disconnect; the client rebuilds it from scratch on
/// reconnect by re-running `setup` and rejoining its open chat.
pub async fn handle_connection(socket: WebSocket, relay: Relay, heartbeat_interval: Duration) {
    let (mut sender, mut receiver) = socket.split();

    let (session, mut event_rx) = relay.registry().connect().await;
    info!("session {} connected", session);

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward registry events to the client, interleaved with heartbeat.
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(heartbeat_interval);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                event = event_rx.recv() => {
                    let Some(event) = event else { break };
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("failed to encode event: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from the client.
    let relay_recv = relay.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<SocketCommand>(&text) {
                    Ok(cmd) => relay_recv.handle_command(session, cmd).await,
                    Err(e) => {
                        warn!(
                            "session {} bad command: {} -- raw: {}",
                            session,
                            e,
                            log_snippet(&text)
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    relay.registry().leave_all(session).await;
    info!("session {} disconnected", session);
}

/// Truncate an unparseable frame for logging. The cut must land on a char
/// boundary or the slice itself would panic the recv task.
fn log_snippet(text: &str) -> &str {
    let mut end = text.len().min(200);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_snippet_respects_char_boundaries() {
        // 300 bytes of 3-byte arrows: byte 200 falls mid-character.
        let junk = "\u{2192}".repeat(100);
        let snippet = log_snippet(&junk);
        assert_eq!(snippet.len(), 198);
        assert!(junk.starts_with(snippet));

        assert_eq!(log_snippet("short"), "short");
        let ascii = "x".repeat(300);
        assert_eq!(log_snippet(&ascii).len(), 200);
    }
}
