use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::interview::null_as_default;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resume {
    pub id: Uuid,
    pub user_id: Uuid,
    pub file_name: String,
    /// Extracted text, capped at `Config::resume_max_chars`.
    pub content: String,
    pub skills: Option<Vec<String>>,
    pub score: Option<i32>,
    pub feedback: Option<ResumeFeedback>,
    /// Object-storage key of the original upload, when archiving is enabled.
    pub archive_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewResume {
    pub id: Uuid,
    pub user_id: Uuid,
    pub file_name: String,
    pub content: String,
    pub archive_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResumeFeedback {
    #[serde(deserialize_with = "null_as_default")]
    pub strengths: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub weaknesses: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub summary: String,
}

/// Result of the structured resume analysis, written onto the resume row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResumeAnalysis {
    pub skills: Vec<String>,
    pub score: Option<u8>,
    pub feedback: Option<ResumeFeedback>,
}
