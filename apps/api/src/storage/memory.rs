//! In-memory `Storage` used by tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::conversation::{Conversation, Message, MessageRole};
use crate::models::interview::{Feedback, Interview, InterviewStatus, NewInterview};
use crate::models::resume::{NewResume, Resume, ResumeAnalysis};
use crate::storage::{Storage, StorageError};

#[derive(Default)]
struct Tables {
    sessions: HashMap<String, Uuid>,
    conversations: Vec<Conversation>,
    messages: Vec<Message>,
    interviews: Vec<Interview>,
    resumes: Vec<Resume>,
}

#[derive(Default)]
pub struct MemoryStorage {
    tables: Mutex<Tables>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_session(&self, token_hash: &str, user_id: Uuid) {
        self.tables
            .lock()
            .await
            .sessions
            .insert(token_hash.to_string(), user_id);
    }

    /// Links an interview to a different conversation (or none).
    pub async fn set_interview_conversation(&self, id: Uuid, conversation_id: Option<Uuid>) {
        let mut tables = self.tables.lock().await;
        if let Some(interview) = tables.interviews.iter_mut().find(|i| i.id == id) {
            interview.conversation_id = conversation_id;
        }
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn user_for_session(&self, token_hash: &str) -> Result<Option<Uuid>, StorageError> {
        Ok(self.tables.lock().await.sessions.get(token_hash).copied())
    }

    async fn create_conversation(
        &self,
        user_id: Uuid,
        title: &str,
    ) -> Result<Conversation, StorageError> {
        let conversation = Conversation {
            id: Uuid::new_v4(),
            user_id,
            title: title.to_string(),
            created_at: Utc::now(),
        };
        self.tables
            .lock()
            .await
            .conversations
            .push(conversation.clone());
        Ok(conversation)
    }

    async fn get_conversation(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Conversation>, StorageError> {
        Ok(self
            .tables
            .lock()
            .await
            .conversations
            .iter()
            .find(|c| c.id == id && c.user_id == user_id)
            .cloned())
    }

    async fn append_message(
        &self,
        conversation_id: Uuid,
        role: MessageRole,
        content: &str,
    ) -> Result<Message, StorageError> {
        let message = Message {
            id: Uuid::new_v4(),
            conversation_id,
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        self.tables.lock().await.messages.push(message.clone());
        Ok(message)
    }

    async fn list_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>, StorageError> {
        Ok(self
            .tables
            .lock()
            .await
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect())
    }

    async fn create_interview(&self, new: NewInterview) -> Result<Interview, StorageError> {
        let interview = Interview {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            role: new.role,
            interview_type: new.interview_type,
            status: InterviewStatus::InProgress,
            conversation_id: new.conversation_id,
            score: None,
            feedback: None,
            created_at: Utc::now(),
        };
        self.tables.lock().await.interviews.push(interview.clone());
        Ok(interview)
    }

    async fn list_interviews(&self, user_id: Uuid) -> Result<Vec<Interview>, StorageError> {
        Ok(self
            .tables
            .lock()
            .await
            .interviews
            .iter()
            .rev()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_interview(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Interview>, StorageError> {
        Ok(self
            .tables
            .lock()
            .await
            .interviews
            .iter()
            .find(|i| i.id == id && i.user_id == user_id)
            .cloned())
    }

    async fn find_interview_by_conversation(
        &self,
        conversation_id: Uuid,
    ) -> Result<Option<Interview>, StorageError> {
        Ok(self
            .tables
            .lock()
            .await
            .interviews
            .iter()
            .find(|i| i.conversation_id == Some(conversation_id))
            .cloned())
    }

    async fn mark_interview_completed(
        &self,
        id: Uuid,
        score: u8,
        feedback: &Feedback,
    ) -> Result<Interview, StorageError> {
        let mut tables = self.tables.lock().await;
        let interview = tables
            .interviews
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| StorageError::Missing(format!("interview {id}")))?;
        interview.status = InterviewStatus::Completed;
        interview.score = Some(i32::from(score));
        interview.feedback = Some(feedback.clone());
        Ok(interview.clone())
    }

    async fn create_resume(&self, new: NewResume) -> Result<Resume, StorageError> {
        let resume = Resume {
            id: new.id,
            user_id: new.user_id,
            file_name: new.file_name,
            content: new.content,
            skills: None,
            score: None,
            feedback: None,
            archive_key: new.archive_key,
            created_at: Utc::now(),
        };
        self.tables.lock().await.resumes.push(resume.clone());
        Ok(resume)
    }

    async fn list_resumes(&self, user_id: Uuid) -> Result<Vec<Resume>, StorageError> {
        Ok(self
            .tables
            .lock()
            .await
            .resumes
            .iter()
            .rev()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_resume(&self, user_id: Uuid, id: Uuid) -> Result<Option<Resume>, StorageError> {
        Ok(self
            .tables
            .lock()
            .await
            .resumes
            .iter()
            .find(|r| r.id == id && r.user_id == user_id)
            .cloned())
    }

    async fn update_resume_analysis(
        &self,
        id: Uuid,
        analysis: &ResumeAnalysis,
    ) -> Result<Resume, StorageError> {
        let mut tables = self.tables.lock().await;
        let resume = tables
            .resumes
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StorageError::Missing(format!("resume {id}")))?;
        resume.skills = Some(analysis.skills.clone());
        resume.score = analysis.score.map(i32::from);
        resume.feedback = analysis.feedback.clone();
        Ok(resume.clone())
    }
}
