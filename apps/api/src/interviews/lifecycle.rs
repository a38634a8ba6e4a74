//! Interview lifecycle: `in_progress` -> `completed`.
//!
//! `create_interview` opens the session together with its conversation.
//! `complete_interview` scores the transcript with one structured completion
//! call and writes status, score and feedback in a single storage write.
//! Completing again re-runs the analysis and overwrites the previous result.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::interviews::prompts::{ANALYSIS_PERSONA, ANALYSIS_PROMPT_TEMPLATE};
use crate::llm_client::prompts::{fill, json_system};
use crate::llm_client::CompletionClient;
use crate::models::interview::{
    clamp_percent, null_as_default, Feedback, Interview, InterviewStatus, InterviewType,
    NewInterview,
};
use crate::storage::Storage;

/// Body of `POST /api/interviews`. Fields are loosely typed so validation
/// can name the offending field.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateInterviewRequest {
    pub role: String,
    #[serde(rename = "type")]
    pub interview_type: String,
    pub status: Option<String>,
}

struct ValidInterview {
    role: String,
    interview_type: InterviewType,
}

fn validate(req: &CreateInterviewRequest) -> Result<ValidInterview, AppError> {
    let role = req.role.trim();
    if role.is_empty() {
        return Err(AppError::validation("role", "role is required"));
    }

    let interview_type = req
        .interview_type
        .parse::<InterviewType>()
        .map_err(|msg| AppError::validation("type", msg))?;

    if let Some(status) = req.status.as_deref() {
        if status != InterviewStatus::InProgress.as_str() {
            return Err(AppError::validation(
                "status",
                "a new interview must start as in_progress",
            ));
        }
    }

    Ok(ValidInterview {
        role: role.to_string(),
        interview_type,
    })
}

pub async fn create_interview(
    storage: &dyn Storage,
    user_id: Uuid,
    req: &CreateInterviewRequest,
) -> Result<Interview, AppError> {
    let valid = validate(req)?;

    let title = format!("Interview: {} ({})", valid.role, valid.interview_type);
    let conversation = storage.create_conversation(user_id, &title).await?;

    let interview = storage
        .create_interview(NewInterview {
            user_id,
            role: valid.role,
            interview_type: valid.interview_type,
            conversation_id: Some(conversation.id),
        })
        .await?;

    info!(
        "Interview {} created for user {} (conversation {})",
        interview.id, user_id, conversation.id
    );
    Ok(interview)
}

/// Structured reply expected from the analysis call.
#[derive(Debug, Deserialize)]
struct AnalysisReply {
    score: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    feedback: Feedback,
}

pub async fn complete_interview(
    storage: &dyn Storage,
    completion: &dyn CompletionClient,
    guard: &CompletionGuard,
    user_id: Uuid,
    interview_id: Uuid,
) -> Result<Interview, AppError> {
    let interview = storage
        .get_interview(user_id, interview_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Interview {interview_id} not found")))?;

    let conversation_id = interview
        .conversation_id
        .ok_or_else(|| AppError::Precondition("no conversation linked".to_string()))?;

    let _permit = guard.try_acquire(interview_id).ok_or_else(|| {
        AppError::Precondition("completion already in progress".to_string())
    })?;

    if interview.status == InterviewStatus::Completed {
        info!("Re-completing interview {interview_id}; previous score will be replaced");
    }

    let messages = storage.list_messages(conversation_id).await?;
    let transcript = messages
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n");

    let prompt = fill(
        ANALYSIS_PROMPT_TEMPLATE,
        &[
            ("role", interview.role.as_str()),
            ("interview_type", interview.interview_type.as_str()),
            ("transcript", transcript.as_str()),
        ],
    );
    let raw = completion
        .complete_json(&prompt, &json_system(ANALYSIS_PERSONA))
        .await?;

    let reply: AnalysisReply = serde_json::from_value(raw).map_err(|e| {
        warn!("Analysis for interview {interview_id} did not match the schema: {e}");
        AppError::Upstream(format!("malformed analysis: {e}"))
    })?;
    let score = clamp_percent(reply.score);

    let completed = storage
        .mark_interview_completed(interview_id, score, &reply.feedback)
        .await?;

    info!("Interview {interview_id} completed with score {score}");
    Ok(completed)
}

/// Tracks interviews whose completion is running in this process.
#[derive(Debug, Clone, Default)]
pub struct CompletionGuard {
    running: Arc<Mutex<HashSet<Uuid>>>,
}

/// Held for the duration of one completion; releases the id on drop.
#[derive(Debug)]
pub struct CompletionPermit {
    running: Arc<Mutex<HashSet<Uuid>>>,
    id: Uuid,
}

impl CompletionGuard {
    /// `None` when a completion for `id` is already running.
    pub fn try_acquire(&self, id: Uuid) -> Option<CompletionPermit> {
        let inserted = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id);
        inserted.then(|| CompletionPermit {
            running: Arc::clone(&self.running),
            id,
        })
    }
}

impl Drop for CompletionPermit {
    fn drop(&mut self) {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::scripted::ScriptedCompletion;
    use crate::models::conversation::MessageRole;
    use crate::storage::memory::MemoryStorage;
    use serde_json::json;

    fn request(role: &str, interview_type: &str) -> CreateInterviewRequest {
        CreateInterviewRequest {
            role: role.to_string(),
            interview_type: interview_type.to_string(),
            status: None,
        }
    }

    fn analysis(score: f64) -> serde_json::Value {
        json!({
            "score": score,
            "feedback": {
                "strengths": ["Clear communication"],
                "weaknesses": ["Skipped edge cases"],
                "tips": ["Think aloud"],
                "roadmap": ["Practice dynamic programming"]
            }
        })
    }

    fn field_of(err: AppError) -> Option<String> {
        match err {
            AppError::Validation { field, .. } => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_links_titled_conversation() {
        let storage = MemoryStorage::new();
        let user = Uuid::new_v4();

        let interview = create_interview(&storage, user, &request("SDE", "Technical"))
            .await
            .unwrap();

        assert_eq!(interview.status, InterviewStatus::InProgress);
        assert!(interview.score.is_none());
        let conversation_id = interview.conversation_id.unwrap();
        let conversation = storage
            .get_conversation(user, conversation_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(conversation.title, "Interview: SDE (Technical)");
    }

    #[tokio::test]
    async fn test_create_validation_names_field() {
        let storage = MemoryStorage::new();
        let user = Uuid::new_v4();

        let err = create_interview(&storage, user, &request("   ", "Technical"))
            .await
            .unwrap_err();
        assert_eq!(field_of(err).as_deref(), Some("role"));

        let err = create_interview(&storage, user, &request("SDE", "Trivia"))
            .await
            .unwrap_err();
        assert_eq!(field_of(err).as_deref(), Some("type"));

        let mut completed = request("SDE", "Behavioral");
        completed.status = Some("completed".to_string());
        let err = create_interview(&storage, user, &completed).await.unwrap_err();
        assert_eq!(field_of(err).as_deref(), Some("status"));

        assert!(storage.list_interviews(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_complete_scores_transcript_once() {
        let storage = MemoryStorage::new();
        let completion = ScriptedCompletion::replying(&[]).with_analysis(Ok(analysis(78.4)));
        let guard = CompletionGuard::default();
        let user = Uuid::new_v4();

        let interview = create_interview(&storage, user, &request("SDE", "Technical"))
            .await
            .unwrap();
        let conversation_id = interview.conversation_id.unwrap();
        storage
            .append_message(conversation_id, MessageRole::User, "Hello")
            .await
            .unwrap();
        storage
            .append_message(conversation_id, MessageRole::Assistant, "Hi! Tell me about yourself.")
            .await
            .unwrap();

        let completed = complete_interview(&storage, &completion, &guard, user, interview.id)
            .await
            .unwrap();

        assert_eq!(completion.json_calls(), 1);
        assert_eq!(completed.status, InterviewStatus::Completed);
        assert_eq!(completed.score, Some(78));
        let feedback = completed.feedback.unwrap();
        assert_eq!(feedback.strengths, vec!["Clear communication"]);
        assert_eq!(feedback.roadmap, vec!["Practice dynamic programming"]);
    }

    #[tokio::test]
    async fn test_complete_without_conversation_is_precondition() {
        let storage = MemoryStorage::new();
        let completion = ScriptedCompletion::replying(&[]).with_analysis(Ok(analysis(50.0)));
        let guard = CompletionGuard::default();
        let user = Uuid::new_v4();

        let interview = create_interview(&storage, user, &request("SDE", "Technical"))
            .await
            .unwrap();
        storage.set_interview_conversation(interview.id, None).await;

        let err = complete_interview(&storage, &completion, &guard, user, interview.id)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Precondition(msg) if msg == "no conversation linked"));
        assert_eq!(completion.json_calls(), 0);
        let stored = storage.get_interview(user, interview.id).await.unwrap().unwrap();
        assert_eq!(stored.status, InterviewStatus::InProgress);
    }

    #[tokio::test]
    async fn test_complete_other_users_interview_is_not_found() {
        let storage = MemoryStorage::new();
        let completion = ScriptedCompletion::replying(&[]);
        let guard = CompletionGuard::default();
        let owner = Uuid::new_v4();

        let interview = create_interview(&storage, owner, &request("SDE", "Technical"))
            .await
            .unwrap();

        let err = complete_interview(&storage, &completion, &guard, Uuid::new_v4(), interview.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_recomplete_overwrites_score_and_feedback() {
        let storage = MemoryStorage::new();
        let completion = ScriptedCompletion::replying(&[])
            .with_analysis(Ok(analysis(40.0)))
            .with_analysis(Ok(json!({"score": 91, "feedback": {"strengths": ["Much better"]}})));
        let guard = CompletionGuard::default();
        let user = Uuid::new_v4();

        let interview = create_interview(&storage, user, &request("SDE", "Behavioral"))
            .await
            .unwrap();

        let first = complete_interview(&storage, &completion, &guard, user, interview.id)
            .await
            .unwrap();
        let second = complete_interview(&storage, &completion, &guard, user, interview.id)
            .await
            .unwrap();

        assert_eq!(first.score, Some(40));
        assert_eq!(second.score, Some(91));
        let feedback = second.feedback.unwrap();
        assert_eq!(feedback.strengths, vec!["Much better"]);
        assert!(feedback.tips.is_empty());
        assert_eq!(completion.json_calls(), 2);
    }

    #[tokio::test]
    async fn test_upstream_failure_leaves_interview_in_progress() {
        let storage = MemoryStorage::new();
        let completion = ScriptedCompletion::replying(&[]).with_analysis(Err("overloaded"));
        let guard = CompletionGuard::default();
        let user = Uuid::new_v4();

        let interview = create_interview(&storage, user, &request("SDE", "Technical"))
            .await
            .unwrap();

        let err = complete_interview(&storage, &completion, &guard, user, interview.id)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Upstream(_)));
        let stored = storage.get_interview(user, interview.id).await.unwrap().unwrap();
        assert_eq!(stored.status, InterviewStatus::InProgress);
        assert!(stored.score.is_none());
    }

    #[tokio::test]
    async fn test_complete_accepts_partial_question_analysis() {
        let storage = MemoryStorage::new();
        let completion = ScriptedCompletion::replying(&[]).with_analysis(Ok(json!({
            "score": 55,
            "feedback": {
                "strengths": ["Friendly"],
                "questionAnalysis": [
                    {"question": "Two sum"},
                    {"question": "LRU cache", "performance": null}
                ],
                "languageFluency": null
            }
        })));
        let guard = CompletionGuard::default();
        let user = Uuid::new_v4();

        let interview = create_interview(&storage, user, &request("SDE", "Technical"))
            .await
            .unwrap();

        let completed = complete_interview(&storage, &completion, &guard, user, interview.id)
            .await
            .unwrap();

        assert_eq!(completed.status, InterviewStatus::Completed);
        assert_eq!(completed.score, Some(55));
        let feedback = completed.feedback.unwrap();
        let questions = feedback.question_analysis.unwrap();
        assert_eq!(questions.len(), 2);
        assert!(questions.iter().all(|q| q.performance.is_none()));
        assert!(feedback.language_fluency.is_none());
        assert!(feedback.weaknesses.is_empty());
    }

    #[tokio::test]
    async fn test_analysis_without_score_is_upstream_error() {
        let storage = MemoryStorage::new();
        let completion = ScriptedCompletion::replying(&[])
            .with_analysis(Ok(json!({"feedback": {"strengths": []}})));
        let guard = CompletionGuard::default();
        let user = Uuid::new_v4();

        let interview = create_interview(&storage, user, &request("SDE", "Technical"))
            .await
            .unwrap();

        let err = complete_interview(&storage, &completion, &guard, user, interview.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)));
    }

    #[tokio::test]
    async fn test_concurrent_completion_is_rejected() {
        let storage = MemoryStorage::new();
        let completion = ScriptedCompletion::replying(&[]).with_analysis(Ok(analysis(60.0)));
        let guard = CompletionGuard::default();
        let user = Uuid::new_v4();

        let interview = create_interview(&storage, user, &request("SDE", "Technical"))
            .await
            .unwrap();

        let held = guard.try_acquire(interview.id).unwrap();
        let err = complete_interview(&storage, &completion, &guard, user, interview.id)
            .await
            .unwrap_err();
        assert!(
            matches!(err, AppError::Precondition(msg) if msg == "completion already in progress")
        );
        assert_eq!(completion.json_calls(), 0);

        drop(held);
        let completed = complete_interview(&storage, &completion, &guard, user, interview.id)
            .await
            .unwrap();
        assert_eq!(completed.score, Some(60));
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let guard = CompletionGuard::default();
        let id = Uuid::new_v4();

        let permit = guard.try_acquire(id);
        assert!(permit.is_some());
        assert!(guard.try_acquire(id).is_none());
        assert!(guard.try_acquire(Uuid::new_v4()).is_some());

        drop(permit);
        assert!(guard.try_acquire(id).is_some());
    }
}
