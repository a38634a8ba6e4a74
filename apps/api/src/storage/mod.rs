//! Persistence gateway. Every read that takes a `user_id` is scoped to that
//! owner; records belonging to someone else are reported as absent.
//!
//! `AppState` holds an `Arc<dyn Storage>`: `PgStorage` in production, the
//! in-memory store in tests.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::conversation::{Conversation, Message, MessageRole};
use crate::models::interview::{Feedback, Interview, NewInterview};
use crate::models::resume::{NewResume, Resume, ResumeAnalysis};

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub use postgres::PgStorage;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored value could not be mapped back into the domain model.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Row vanished: {0}")]
    Missing(String),
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Resolves a hashed bearer token to its user, ignoring expired sessions.
    async fn user_for_session(&self, token_hash: &str) -> Result<Option<Uuid>, StorageError>;

    async fn create_conversation(
        &self,
        user_id: Uuid,
        title: &str,
    ) -> Result<Conversation, StorageError>;

    async fn get_conversation(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Conversation>, StorageError>;

    /// Appends one message at the end of the conversation.
    async fn append_message(
        &self,
        conversation_id: Uuid,
        role: MessageRole,
        content: &str,
    ) -> Result<Message, StorageError>;

    /// All messages in append order.
    async fn list_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>, StorageError>;

    async fn create_interview(&self, new: NewInterview) -> Result<Interview, StorageError>;

    /// Newest first.
    async fn list_interviews(&self, user_id: Uuid) -> Result<Vec<Interview>, StorageError>;

    async fn get_interview(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Interview>, StorageError>;

    async fn find_interview_by_conversation(
        &self,
        conversation_id: Uuid,
    ) -> Result<Option<Interview>, StorageError>;

    /// Sets status, score and feedback in a single write.
    async fn mark_interview_completed(
        &self,
        id: Uuid,
        score: u8,
        feedback: &Feedback,
    ) -> Result<Interview, StorageError>;

    async fn create_resume(&self, new: NewResume) -> Result<Resume, StorageError>;

    /// Newest first.
    async fn list_resumes(&self, user_id: Uuid) -> Result<Vec<Resume>, StorageError>;

    async fn get_resume(&self, user_id: Uuid, id: Uuid) -> Result<Option<Resume>, StorageError>;

    async fn update_resume_analysis(
        &self,
        id: Uuid,
        analysis: &ResumeAnalysis,
    ) -> Result<Resume, StorageError>;
}
