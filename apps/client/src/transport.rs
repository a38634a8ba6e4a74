use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::{header, Client, Response};
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use interview_wire::{ConversationHistory, SendMessageRequest};

use crate::error::ClientError;

/// Raw body of a streamed reply, in transport-sized chunks. Chunk
/// boundaries carry no meaning.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ClientError>> + Send + 'static>>;

#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn fetch_history(&self, conversation_id: Uuid)
        -> Result<ConversationHistory, ClientError>;

    /// Sends one user turn and returns the event-stream body. Dropping the
    /// stream closes the connection.
    async fn open_stream(
        &self,
        conversation_id: Uuid,
        req: &SendMessageRequest,
    ) -> Result<ByteStream, ClientError>;
}

/// `ChatTransport` over HTTP with a bearer session token.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    token: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, ClientError> {
        Ok(Self {
            client: Client::builder().build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn conversation_url(&self, conversation_id: Uuid) -> String {
        format!("{}/api/conversations/{conversation_id}", self.base_url)
    }
}

async fn rejected(response: Response) -> ClientError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|e| e.message)
        .unwrap_or(body);
    ClientError::Rejected { status, message }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn fetch_history(
        &self,
        conversation_id: Uuid,
    ) -> Result<ConversationHistory, ClientError> {
        let response = self
            .client
            .get(self.conversation_url(conversation_id))
            .bearer_auth(&self.token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejected(response).await);
        }
        Ok(response.json().await?)
    }

    async fn open_stream(
        &self,
        conversation_id: Uuid,
        req: &SendMessageRequest,
    ) -> Result<ByteStream, ClientError> {
        let response = self
            .client
            .post(format!("{}/messages", self.conversation_url(conversation_id)))
            .bearer_auth(&self.token)
            .header(header::ACCEPT, "text/event-stream")
            .json(req)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejected(response).await);
        }

        debug!("Reply stream opened for conversation {conversation_id}");
        Ok(Box::pin(
            response.bytes_stream().map(|chunk| chunk.map_err(ClientError::from)),
        ))
    }
}
