use tracing::warn;

use parley_types::events::SocketCommand;
use parley_types::models::{ChatSummary, MessageEnvelope, UserSummary};

use crate::cache::ChatThread;
use crate::error::ClientError;
use crate::manager::SocketManager;
use crate::rest::MessageApi;

/// Send a message end to end: optimistic insert for zero perceived
/// latency, REST create, in-place confirmation, then the socket emit that
/// triggers server fan-out. `new message` is only ever emitted after the
/// create succeeded; on failure the optimistic entry is rolled back.
pub async fn send_message(
    api: &dyn MessageApi,
    manager: &SocketManager,
    thread: &mut ChatThread,
    chat: ChatSummary,
    sender: UserSummary,
    content: &str,
) -> Result<MessageEnvelope, ClientError> {
    let chat_id = chat.id.clone();
    let handle = thread.push_optimistic(content, sender, chat);

    match api.send_message(&chat_id, content, &handle.client_key).await {
        Ok(envelope) => {
            thread.confirm(&handle.client_key, envelope.clone());
            if let Err(e) = manager.send(SocketCommand::NewMessage(envelope.clone())) {
                // Peers recover via REST pagination; the message is durable.
                warn!("fan-out emit failed: {}", e);
            }
            Ok(envelope)
        }
        Err(e) => {
            thread.rollback(&handle.client_key);
            Err(e)
        }
    }
}

/// Fetch the next older history page, honoring the thread's in-flight and
/// end-of-history gates. Returns false when the fetch was suppressed.
pub async fn load_older(
    api: &dyn MessageApi,
    thread: &mut ChatThread,
    chat_id: &str,
    page_size: usize,
) -> Result<bool, ClientError> {
    let Some(page) = thread.begin_fetch() else {
        return Ok(false);
    };
    match api.fetch_messages(chat_id, page, page_size).await {
        Ok(messages) => {
            thread.complete_fetch(messages);
            Ok(true)
        }
        Err(e) => {
            thread.abort_fetch();
            Err(e)
        }
    }
}
