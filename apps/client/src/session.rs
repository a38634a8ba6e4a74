//! Stream consumer for one conversation.
//!
//! A turn appends the user message optimistically, then reads event-stream
//! records as they arrive. Each delta grows `partial`; the terminal `done`
//! record moves the accumulated text into the transcript as one assistant
//! message. A turn that is aborted, fails, or closes without `done` leaves
//! no assistant message behind. A turn the server rejects outright also
//! drops the optimistic user message.

use std::sync::{Mutex, PoisonError};

use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use interview_wire::{ChatMessage, SendMessageRequest, StreamRecord};

use crate::error::ClientError;
use crate::transport::ChatTransport;

/// Observable state of a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub conversation_id: Option<Uuid>,
    /// Messages in conversation order.
    pub transcript: Vec<ChatMessage>,
    /// Text of the assistant reply streamed so far in the current turn.
    pub partial: String,
    pub streaming: bool,
    /// Why the most recent turn failed, if it did.
    pub last_error: Option<ClientError>,
}

pub struct ChatSession<T> {
    transport: T,
    state: watch::Sender<SessionSnapshot>,
    in_flight: Mutex<Option<CancellationToken>>,
}

/// Clears the in-flight slot when a turn ends, including when the `send`
/// future itself is dropped.
struct TurnGuard<'a> {
    slot: &'a Mutex<Option<CancellationToken>>,
    state: &'a watch::Sender<SessionSnapshot>,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.state.send_if_modified(|s| {
            let was_streaming = s.streaming;
            s.streaming = false;
            s.partial.clear();
            was_streaming
        });
    }
}

impl<T: ChatTransport> ChatSession<T> {
    pub fn new(transport: T) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Self {
            transport,
            state,
            in_flight: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    /// Loads the stored history of `conversation_id` and makes it the
    /// session's transcript.
    pub async fn attach(&self, conversation_id: Uuid) -> Result<(), ClientError> {
        if self.is_busy() {
            return Err(ClientError::Busy);
        }

        let history = self.transport.fetch_history(conversation_id).await?;
        debug!(
            "Attached to conversation {conversation_id} ({} messages)",
            history.messages.len()
        );

        self.state.send_modify(|s| {
            s.conversation_id = Some(conversation_id);
            s.transcript = history.messages;
            s.partial.clear();
            s.last_error = None;
        });
        Ok(())
    }

    pub async fn send(&self, text: &str) -> Result<String, ClientError> {
        self.send_request(SendMessageRequest::text(text)).await
    }

    /// Runs one turn and returns the assistant reply.
    pub async fn send_request(&self, req: SendMessageRequest) -> Result<String, ClientError> {
        let conversation_id = self
            .state
            .borrow()
            .conversation_id
            .ok_or(ClientError::Detached)?;

        let cancel = {
            let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.is_some() {
                return Err(ClientError::Busy);
            }
            let token = CancellationToken::new();
            *slot = Some(token.clone());
            token
        };
        let _guard = TurnGuard {
            slot: &self.in_flight,
            state: &self.state,
        };

        self.state.send_modify(|s| {
            s.transcript.push(ChatMessage::user(req.composed_content()));
            s.partial.clear();
            s.streaming = true;
            s.last_error = None;
        });

        let outcome = self.read_turn(conversation_id, &req, &cancel).await;

        self.state.send_modify(|s| {
            s.streaming = false;
            s.partial.clear();
            match &outcome {
                Ok(reply) => s.transcript.push(ChatMessage::assistant(reply.clone())),
                Err(e) => {
                    // A rejected turn was never stored server-side.
                    if matches!(e, ClientError::Rejected { .. }) {
                        s.transcript.pop();
                    }
                    s.last_error = Some(e.clone());
                }
            }
        });
        outcome
    }

    /// Cancels the in-flight turn, if any. Returns whether one was running.
    pub fn abort(&self) -> bool {
        match self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    fn is_busy(&self) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    async fn read_turn(
        &self,
        conversation_id: Uuid,
        req: &SendMessageRequest,
        cancel: &CancellationToken,
    ) -> Result<String, ClientError> {
        let body = tokio::select! {
            _ = cancel.cancelled() => return Err(ClientError::Aborted),
            opened = self.transport.open_stream(conversation_id, req) => opened?,
        };
        let mut events = Box::pin(body.eventsource());
        let mut reply = String::new();

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Turn on conversation {conversation_id} aborted");
                    return Err(ClientError::Aborted);
                }
                next = events.next() => next,
            };

            let event = match next {
                Some(Ok(event)) => event,
                Some(Err(e)) => return Err(ClientError::Transport(e.to_string())),
                None => return Err(ClientError::ClosedWithoutDone),
            };
            if event.data.is_empty() {
                continue;
            }

            match StreamRecord::from_payload(&event.data) {
                Ok(StreamRecord::Delta(text)) => {
                    reply.push_str(&text);
                    self.state.send_modify(|s| s.partial.push_str(&text));
                }
                Ok(StreamRecord::Done) => return Ok(reply),
                Ok(StreamRecord::Error(message)) => return Err(ClientError::Upstream(message)),
                Err(e) => warn!("Skipping malformed stream record {:?}: {e}", event.data),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ByteStream;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures_util::stream;
    use interview_wire::ConversationHistory;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Replays a fixed history and a fixed reply body split into chunks.
    struct ScriptedTransport {
        history: Vec<ChatMessage>,
        chunks: Vec<&'static str>,
        hang: bool,
        reject: Option<ClientError>,
        opened: AtomicUsize,
    }

    impl ScriptedTransport {
        fn new(chunks: Vec<&'static str>) -> Self {
            Self {
                history: Vec::new(),
                chunks,
                hang: false,
                reject: None,
                opened: AtomicUsize::new(0),
            }
        }

        fn hanging(mut self) -> Self {
            self.hang = true;
            self
        }

        fn rejecting(mut self, err: ClientError) -> Self {
            self.reject = Some(err);
            self
        }

        fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
            self.history = history;
            self
        }
    }

    #[async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn fetch_history(
            &self,
            _conversation_id: Uuid,
        ) -> Result<ConversationHistory, ClientError> {
            Ok(ConversationHistory {
                messages: self.history.clone(),
            })
        }

        async fn open_stream(
            &self,
            _conversation_id: Uuid,
            _req: &SendMessageRequest,
        ) -> Result<ByteStream, ClientError> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = &self.reject {
                return Err(err.clone());
            }
            let chunks = stream::iter(
                self.chunks
                    .clone()
                    .into_iter()
                    .map(|c| Ok(Bytes::from_static(c.as_bytes()))),
            );
            if self.hang {
                Ok(Box::pin(chunks.chain(stream::pending())))
            } else {
                Ok(Box::pin(chunks))
            }
        }
    }

    async fn attached(transport: ScriptedTransport) -> ChatSession<ScriptedTransport> {
        let session = ChatSession::new(transport);
        session.attach(Uuid::new_v4()).await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_attach_replaces_transcript() {
        let history = vec![
            ChatMessage::user("Hello"),
            ChatMessage::assistant("Hi! Tell me about yourself."),
        ];
        let session = attached(ScriptedTransport::new(vec![]).with_history(history.clone())).await;

        let snapshot = session.snapshot();
        assert_eq!(snapshot.transcript, history);
        assert!(snapshot.conversation_id.is_some());
        assert!(!snapshot.streaming);
    }

    #[tokio::test]
    async fn test_records_split_across_chunks_are_reassembled() {
        let session = attached(ScriptedTransport::new(vec![
            "data: {\"cont",
            "ent\":\"Hi\"}\n",
            "\ndata: {\"content\":\" the",
            "re\"}\n\ndata: {\"do",
            "ne\":true}\n\n",
        ]))
        .await;

        let reply = session.send("Hello").await.unwrap();

        assert_eq!(reply, "Hi there");
        let snapshot = session.snapshot();
        assert_eq!(
            snapshot.transcript,
            vec![ChatMessage::user("Hello"), ChatMessage::assistant("Hi there")]
        );
        assert!(snapshot.partial.is_empty());
        assert!(!snapshot.streaming);
        assert!(snapshot.last_error.is_none());
    }

    #[tokio::test]
    async fn test_malformed_record_is_skipped() {
        let session = attached(ScriptedTransport::new(vec![
            "data: {\"content\":\"Tell me \"}\n\n",
            "data: not json at all\n\n",
            "data: {\"content\":\"about yourself.\"}\n\n",
            "data: {\"done\":true}\n\n",
        ]))
        .await;

        let reply = session.send("Hello").await.unwrap();

        assert_eq!(reply, "Tell me about yourself.");
        assert_eq!(session.snapshot().transcript.len(), 2);
    }

    #[tokio::test]
    async fn test_close_without_done_fails_turn() {
        let session = attached(ScriptedTransport::new(vec![
            "data: {\"content\":\"Half an ans\"}\n\n",
        ]))
        .await;

        let err = session.send("Hello").await.unwrap_err();

        assert_eq!(err, ClientError::ClosedWithoutDone);
        let snapshot = session.snapshot();
        assert_eq!(snapshot.transcript, vec![ChatMessage::user("Hello")]);
        assert!(snapshot.partial.is_empty());
        assert_eq!(snapshot.last_error, Some(ClientError::ClosedWithoutDone));
    }

    #[tokio::test]
    async fn test_error_record_is_upstream_failure() {
        let session = attached(ScriptedTransport::new(vec![
            "data: {\"content\":\"Hi\"}\n\n",
            "data: {\"error\":\"The interviewer is unavailable\"}\n\n",
        ]))
        .await;

        let err = session.send("Hello").await.unwrap_err();

        assert_eq!(
            err,
            ClientError::Upstream("The interviewer is unavailable".to_string())
        );
        assert_eq!(session.snapshot().transcript.len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_turn_drops_optimistic_message() {
        let rejection = ClientError::Rejected {
            status: 404,
            message: "Conversation not found".to_string(),
        };
        let history = vec![ChatMessage::user("Hi"), ChatMessage::assistant("Hello!")];
        let session = attached(
            ScriptedTransport::new(vec![])
                .with_history(history.clone())
                .rejecting(rejection.clone()),
        )
        .await;

        let err = session.send("Anyone there?").await.unwrap_err();

        assert_eq!(err, rejection);
        let snapshot = session.snapshot();
        assert_eq!(snapshot.transcript, history);
        assert_eq!(snapshot.last_error, Some(rejection));
        assert!(!snapshot.streaming);
    }

    #[tokio::test]
    async fn test_abort_discards_partial_reply() {
        let session = Arc::new(
            attached(ScriptedTransport::new(vec!["data: {\"content\":\"Let me\"}\n\n"]).hanging())
                .await,
        );
        let mut updates = session.subscribe();

        let turn = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.send("Hello").await }
        });

        updates
            .wait_for(|s| s.partial == "Let me")
            .await
            .unwrap();
        assert!(session.snapshot().streaming);
        assert_eq!(session.send("Again").await, Err(ClientError::Busy));

        assert!(session.abort());
        assert_eq!(turn.await.unwrap(), Err(ClientError::Aborted));

        let snapshot = session.snapshot();
        assert_eq!(snapshot.transcript, vec![ChatMessage::user("Hello")]);
        assert!(snapshot.partial.is_empty());
        assert!(!snapshot.streaming);
        assert!(!session.abort());
    }

    #[tokio::test]
    async fn test_send_before_attach_is_detached() {
        let transport = ScriptedTransport::new(vec!["data: {\"done\":true}\n\n"]);
        let session = ChatSession::new(transport);

        assert_eq!(session.send("Hello").await, Err(ClientError::Detached));
        assert_eq!(session.transport.opened.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_each_turn_appends_exactly_one_reply() {
        let session = attached(ScriptedTransport::new(vec![
            "data: {\"content\":\"ok\"}\n\ndata: {\"done\":true}\n\n",
        ]))
        .await;

        session.send("one").await.unwrap();
        session.send("two").await.unwrap();

        let contents: Vec<String> = session
            .snapshot()
            .transcript
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["one", "ok", "two", "ok"]);
    }
}
