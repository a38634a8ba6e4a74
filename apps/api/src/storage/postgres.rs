use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::models::conversation::{Conversation, Message, MessageRole};
use crate::models::interview::{Feedback, Interview, NewInterview};
use crate::models::resume::{NewResume, Resume, ResumeAnalysis, ResumeFeedback};
use crate::storage::{Storage, StorageError};

/// PostgreSQL-backed persistence gateway.
#[derive(Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct MessageRow {
    id: Uuid,
    conversation_id: Uuid,
    role: String,
    content: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for Message {
    type Error = StorageError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        let role: MessageRole = row
            .role
            .parse()
            .map_err(|e: interview_wire::UnknownRole| StorageError::Corrupt(e.to_string()))?;
        Ok(Message {
            id: row.id,
            conversation_id: row.conversation_id,
            role,
            content: row.content,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ConversationRow {
    id: Uuid,
    user_id: Uuid,
    title: String,
    created_at: DateTime<Utc>,
}

impl From<ConversationRow> for Conversation {
    fn from(row: ConversationRow) -> Self {
        Conversation {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct InterviewRow {
    id: Uuid,
    user_id: Uuid,
    role: String,
    interview_type: String,
    status: String,
    conversation_id: Option<Uuid>,
    score: Option<i32>,
    feedback: Option<Json<Feedback>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<InterviewRow> for Interview {
    type Error = StorageError;

    fn try_from(row: InterviewRow) -> Result<Self, Self::Error> {
        Ok(Interview {
            id: row.id,
            user_id: row.user_id,
            role: row.role,
            interview_type: row.interview_type.parse().map_err(StorageError::Corrupt)?,
            status: row.status.parse().map_err(StorageError::Corrupt)?,
            conversation_id: row.conversation_id,
            score: row.score,
            feedback: row.feedback.map(|Json(f)| f),
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ResumeRow {
    id: Uuid,
    user_id: Uuid,
    file_name: String,
    content: String,
    skills: Option<Json<Vec<String>>>,
    score: Option<i32>,
    feedback: Option<Json<ResumeFeedback>>,
    archive_key: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<ResumeRow> for Resume {
    fn from(row: ResumeRow) -> Self {
        Resume {
            id: row.id,
            user_id: row.user_id,
            file_name: row.file_name,
            content: row.content,
            skills: row.skills.map(|Json(s)| s),
            score: row.score,
            feedback: row.feedback.map(|Json(f)| f),
            archive_key: row.archive_key,
            created_at: row.created_at,
        }
    }
}

fn interviews(rows: Vec<InterviewRow>) -> Result<Vec<Interview>, StorageError> {
    rows.into_iter().map(Interview::try_from).collect()
}

#[async_trait]
impl Storage for PgStorage {
    async fn user_for_session(&self, token_hash: &str) -> Result<Option<Uuid>, StorageError> {
        Ok(sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM user_sessions WHERE token_hash = $1 AND expires_at > now()",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn create_conversation(
        &self,
        user_id: Uuid,
        title: &str,
    ) -> Result<Conversation, StorageError> {
        let row = sqlx::query_as::<_, ConversationRow>(
            "INSERT INTO conversations (id, user_id, title) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(title)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn get_conversation(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Conversation>, StorageError> {
        let row = sqlx::query_as::<_, ConversationRow>(
            "SELECT * FROM conversations WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Conversation::from))
    }

    async fn append_message(
        &self,
        conversation_id: Uuid,
        role: MessageRole,
        content: &str,
    ) -> Result<Message, StorageError> {
        // Append-only: messages are never updated or reordered.
        sqlx::query_as::<_, MessageRow>(
            r#"
            INSERT INTO messages (id, conversation_id, role, content)
            VALUES ($1, $2, $3, $4)
            RETURNING id, conversation_id, role, content, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(conversation_id)
        .bind(role.as_str())
        .bind(content)
        .fetch_one(&self.pool)
        .await?
        .try_into()
    }

    async fn list_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>, StorageError> {
        sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, conversation_id, role, content, created_at
            FROM messages
            WHERE conversation_id = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Message::try_from)
        .collect()
    }

    async fn create_interview(&self, new: NewInterview) -> Result<Interview, StorageError> {
        sqlx::query_as::<_, InterviewRow>(
            r#"
            INSERT INTO interviews (id, user_id, role, interview_type, status, conversation_id)
            VALUES ($1, $2, $3, $4, 'in_progress', $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.user_id)
        .bind(&new.role)
        .bind(new.interview_type.as_str())
        .bind(new.conversation_id)
        .fetch_one(&self.pool)
        .await?
        .try_into()
    }

    async fn list_interviews(&self, user_id: Uuid) -> Result<Vec<Interview>, StorageError> {
        interviews(
            sqlx::query_as::<_, InterviewRow>(
                "SELECT * FROM interviews WHERE user_id = $1 ORDER BY created_at DESC",
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?,
        )
    }

    async fn get_interview(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Interview>, StorageError> {
        sqlx::query_as::<_, InterviewRow>(
            "SELECT * FROM interviews WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Interview::try_from)
        .transpose()
    }

    async fn find_interview_by_conversation(
        &self,
        conversation_id: Uuid,
    ) -> Result<Option<Interview>, StorageError> {
        sqlx::query_as::<_, InterviewRow>("SELECT * FROM interviews WHERE conversation_id = $1")
            .bind(conversation_id)
            .fetch_optional(&self.pool)
            .await?
            .map(Interview::try_from)
            .transpose()
    }

    async fn mark_interview_completed(
        &self,
        id: Uuid,
        score: u8,
        feedback: &Feedback,
    ) -> Result<Interview, StorageError> {
        sqlx::query_as::<_, InterviewRow>(
            r#"
            UPDATE interviews
            SET status = 'completed', score = $2, feedback = $3
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(i32::from(score))
        .bind(Json(feedback))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StorageError::Missing(format!("interview {id}")))?
        .try_into()
    }

    async fn create_resume(&self, new: NewResume) -> Result<Resume, StorageError> {
        let row = sqlx::query_as::<_, ResumeRow>(
            r#"
            INSERT INTO resumes (id, user_id, file_name, content, archive_key)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(new.id)
        .bind(new.user_id)
        .bind(&new.file_name)
        .bind(&new.content)
        .bind(&new.archive_key)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn list_resumes(&self, user_id: Uuid) -> Result<Vec<Resume>, StorageError> {
        let rows = sqlx::query_as::<_, ResumeRow>(
            "SELECT * FROM resumes WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Resume::from).collect())
    }

    async fn get_resume(&self, user_id: Uuid, id: Uuid) -> Result<Option<Resume>, StorageError> {
        let row = sqlx::query_as::<_, ResumeRow>(
            "SELECT * FROM resumes WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Resume::from))
    }

    async fn update_resume_analysis(
        &self,
        id: Uuid,
        analysis: &ResumeAnalysis,
    ) -> Result<Resume, StorageError> {
        let row = sqlx::query_as::<_, ResumeRow>(
            r#"
            UPDATE resumes
            SET skills = $2, score = $3, feedback = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(Json(&analysis.skills))
        .bind(analysis.score.map(i32::from))
        .bind(analysis.feedback.as_ref().map(Json))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StorageError::Missing(format!("resume {id}")))?;
        Ok(row.into())
    }
}
