//! End-to-end relay test over a real WebSocket: two clients connect to an
//! in-process server, one sends a persisted message, the other receives
//! the fan-out.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use parley_gateway::connection;
use parley_gateway::directory::StaticDirectory;
use parley_gateway::registry::Registry;
use parley_gateway::relay::Relay;
use parley_types::events::{SocketCommand, SocketEvent};
use parley_types::models::{ChatSummary, MessageEnvelope, UserSummary};

#[derive(Clone)]
struct TestState {
    relay: Relay,
}

async fn ws_upgrade(State(state): State<TestState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, state.relay, Duration::from_secs(15))
    })
}

async fn spawn_server() -> String {
    let relay = Relay::new(Registry::new(), Arc::new(StaticDirectory::new()));
    let app = Router::new()
        .route("/ws", get(ws_upgrade))
        .with_state(TestState { relay });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("ws://{addr}/ws")
}

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn send(client: &mut Client, cmd: &SocketCommand) {
    let text = serde_json::to_string(cmd).expect("encode");
    client.send(Message::Text(text.into())).await.expect("send");
}

async fn next_event(client: &mut Client) -> SocketEvent {
    let frame = timeout(Duration::from_secs(2), async {
        while let Some(frame) = client.next().await {
            if let Ok(Message::Text(text)) = frame {
                return serde_json::from_str::<SocketEvent>(&text).expect("decode");
            }
        }
        panic!("connection closed before an event arrived");
    });
    frame.await.expect("timed out waiting for event")
}

async fn connect_as(url: &str, user_id: &str) -> Client {
    let (mut client, _) = connect_async(url).await.expect("connect");
    send(
        &mut client,
        &SocketCommand::Setup {
            id: user_id.into(),
        },
    )
    .await;
    assert_eq!(next_event(&mut client).await, SocketEvent::Connected);
    client
}

fn user(id: &str) -> UserSummary {
    UserSummary {
        id: id.into(),
        name: id.to_uppercase(),
        email: format!("{id}@example.com"),
        photo: None,
    }
}

fn envelope(content: &str) -> MessageEnvelope {
    MessageEnvelope {
        id: "64f0a1".into(),
        content: content.into(),
        sender: user("a"),
        chat: ChatSummary {
            id: "c1".into(),
            name: None,
            is_group: false,
            users: vec![user("a"), user("b")],
        },
        client_key: Some("k1".into()),
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn message_fans_out_between_live_connections() {
    let url = spawn_server().await;
    let mut alice = connect_as(&url, "a").await;
    let mut bob = connect_as(&url, "b").await;

    let env = envelope("hi over the wire");
    send(&mut alice, &SocketCommand::NewMessage(env.clone())).await;

    match next_event(&mut bob).await {
        SocketEvent::MessageReceived(received) => {
            assert_eq!(received.id, env.id);
            assert_eq!(received.content, env.content);
            assert_eq!(received.client_key, env.client_key);
        }
        other => panic!("expected message received, got {other:?}"),
    }
}

#[tokio::test]
async fn typing_relays_to_chat_room_members() {
    let url = spawn_server().await;
    let mut alice = connect_as(&url, "a").await;
    let mut bob = connect_as(&url, "b").await;

    send(&mut bob, &SocketCommand::JoinChat("c1".into())).await;
    // Give the join a moment to land before the typing event races it.
    tokio::time::sleep(Duration::from_millis(50)).await;

    send(
        &mut alice,
        &SocketCommand::Typing {
            chat_id: "c1".into(),
            user_id: "a".into(),
            user_name: "Ana".into(),
        },
    )
    .await;

    assert_eq!(
        next_event(&mut bob).await,
        SocketEvent::Typing {
            chat_id: "c1".into(),
            user_id: "a".into(),
            user_name: "Ana".into(),
        }
    );
}

#[tokio::test]
async fn oversized_multibyte_bad_frame_does_not_kill_the_session() {
    // The warn path formats a truncated copy of the bad frame, so a
    // subscriber must be installed for this to exercise the truncation.
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let url = spawn_server().await;
    let mut alice = connect_as(&url, "a").await;
    let mut bob = connect_as(&url, "b").await;

    // 300 bytes of 3-byte characters: a fixed 200-byte cut would land
    // mid-character.
    let junk = "\u{2192}".repeat(100);
    alice
        .send(Message::Text(junk.into()))
        .await
        .expect("send");

    let env = envelope("survived the junk");
    send(&mut alice, &SocketCommand::NewMessage(env)).await;

    match next_event(&mut bob).await {
        SocketEvent::MessageReceived(received) => {
            assert_eq!(received.content, "survived the junk");
        }
        other => panic!("expected message received, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_frames_do_not_kill_the_session() {
    let url = spawn_server().await;
    let mut alice = connect_as(&url, "a").await;
    let mut bob = connect_as(&url, "b").await;

    alice
        .send(Message::Text("{\"event\": \"not a thing\"}".to_string().into()))
        .await
        .expect("send");

    // The session survives and still relays after the bad frame.
    let env = envelope("still alive");
    send(&mut alice, &SocketCommand::NewMessage(env)).await;

    match next_event(&mut bob).await {
        SocketEvent::MessageReceived(received) => {
            assert_eq!(received.content, "still alive");
        }
        other => panic!("expected message received, got {other:?}"),
    }
}
