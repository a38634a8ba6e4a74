//! Streaming chat channel.
//!
//! A turn runs in two phases. `begin_turn` validates the request and durably
//! appends the user message before anything is sent upstream. `Turn::into_stream`
//! then drives the upstream reply lazily: each non-empty fragment becomes a
//! `Delta` record, and once the reply is complete it is appended as a single
//! assistant message and a final `Done` record is emitted.
//!
//! When the upstream fails or stalls, one `Error` record is emitted instead
//! of `Done` and nothing is persisted for the assistant. Dropping the stream
//! (client disconnect) stops the upstream read and likewise persists nothing.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use interview_wire::{ConversationHistory, SendMessageRequest, StreamRecord};

use crate::errors::AppError;
use crate::interviews::prompts::interviewer_system_prompt;
use crate::llm_client::CompletionClient;
use crate::models::conversation::{ChatMessage, MessageRole};
use crate::state::AppState;
use crate::storage::Storage;

const UPSTREAM_FAILURE: &str = "The interviewer is unavailable right now. Please try again.";
const PERSIST_FAILURE: &str = "The reply could not be saved. Please try again.";

/// Stored messages of a conversation owned by `user_id`, in append order.
pub async fn conversation_history(
    storage: &dyn Storage,
    user_id: Uuid,
    conversation_id: Uuid,
) -> Result<ConversationHistory, AppError> {
    storage
        .get_conversation(user_id, conversation_id)
        .await?
        .ok_or_else(|| conversation_not_found(conversation_id))?;

    let messages = storage
        .list_messages(conversation_id)
        .await?
        .into_iter()
        .map(ChatMessage::from)
        .collect();
    Ok(ConversationHistory { messages })
}

/// A user turn whose message is already persisted and whose reply has not
/// been requested yet.
pub struct Turn {
    storage: Arc<dyn Storage>,
    completion: Arc<dyn CompletionClient>,
    conversation_id: Uuid,
    system: String,
    transcript: Vec<ChatMessage>,
    upstream_timeout: Duration,
}

pub async fn begin_turn(
    state: &AppState,
    user_id: Uuid,
    conversation_id: Uuid,
    req: &SendMessageRequest,
) -> Result<Turn, AppError> {
    if req.content.trim().is_empty() {
        return Err(AppError::validation("content", "content must not be empty"));
    }

    let storage = &state.storage;
    storage
        .get_conversation(user_id, conversation_id)
        .await?
        .ok_or_else(|| conversation_not_found(conversation_id))?;

    storage
        .append_message(conversation_id, MessageRole::User, &req.composed_content())
        .await?;

    let transcript: Vec<ChatMessage> = storage
        .list_messages(conversation_id)
        .await?
        .into_iter()
        .map(ChatMessage::from)
        .collect();

    let interview = storage.find_interview_by_conversation(conversation_id).await?;
    let system = interviewer_system_prompt(interview.as_ref());

    debug!(
        "Turn opened on conversation {} ({} messages in transcript)",
        conversation_id,
        transcript.len()
    );

    Ok(Turn {
        storage: Arc::clone(&state.storage),
        completion: Arc::clone(&state.completion),
        conversation_id,
        system,
        transcript,
        upstream_timeout: state.config.upstream_timeout,
    })
}

impl Turn {
    /// Records for the client, in emission order. Ends with exactly one
    /// `Done` on success or one `Error` on failure.
    pub fn into_stream(self) -> impl Stream<Item = StreamRecord> + Send + 'static {
        let Turn {
            storage,
            completion,
            conversation_id,
            system,
            transcript,
            upstream_timeout,
        } = self;

        async_stream::stream! {
            let mut reply = String::new();
            let mut failed = false;

            match timeout(upstream_timeout, completion.stream_reply(&system, &transcript)).await {
                Ok(Ok(mut deltas)) => loop {
                    match timeout(upstream_timeout, deltas.next()).await {
                        Ok(Some(Ok(text))) => {
                            if text.is_empty() {
                                continue;
                            }
                            reply.push_str(&text);
                            yield StreamRecord::Delta(text);
                        }
                        Ok(Some(Err(e))) => {
                            warn!("Upstream stream failed on conversation {conversation_id}: {e}");
                            failed = true;
                            break;
                        }
                        Ok(None) => break,
                        Err(_) => {
                            warn!(
                                "Upstream stalled for {}s on conversation {conversation_id}",
                                upstream_timeout.as_secs()
                            );
                            failed = true;
                            break;
                        }
                    }
                },
                Ok(Err(e)) => {
                    warn!("Upstream refused reply on conversation {conversation_id}: {e}");
                    failed = true;
                }
                Err(_) => {
                    warn!("Upstream did not answer in time on conversation {conversation_id}");
                    failed = true;
                }
            }

            if failed {
                yield StreamRecord::Error(UPSTREAM_FAILURE.to_string());
            } else if reply.is_empty() {
                warn!("Upstream produced an empty reply on conversation {conversation_id}");
                yield StreamRecord::Error(UPSTREAM_FAILURE.to_string());
            } else {
                match storage
                    .append_message(conversation_id, MessageRole::Assistant, &reply)
                    .await
                {
                    Ok(message) => {
                        info!(
                            "Assistant reply {} persisted on conversation {conversation_id} ({} chars)",
                            message.id,
                            reply.chars().count()
                        );
                        yield StreamRecord::Done;
                    }
                    Err(e) => {
                        error!("Failed to persist reply on conversation {conversation_id}: {e}");
                        yield StreamRecord::Error(PERSIST_FAILURE.to_string());
                    }
                }
            }
        }
    }
}

fn conversation_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Conversation {id} not found"))
}
