use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterviewType {
    Technical,
    Behavioral,
    #[serde(rename = "System-Design", alias = "System Design")]
    SystemDesign,
}

impl InterviewType {
    pub const ALL: [InterviewType; 3] = [
        InterviewType::Technical,
        InterviewType::Behavioral,
        InterviewType::SystemDesign,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InterviewType::Technical => "Technical",
            InterviewType::Behavioral => "Behavioral",
            InterviewType::SystemDesign => "System-Design",
        }
    }
}

impl fmt::Display for InterviewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterviewType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Technical" => Ok(InterviewType::Technical),
            "Behavioral" => Ok(InterviewType::Behavioral),
            "System-Design" | "System Design" => Ok(InterviewType::SystemDesign),
            other => {
                let allowed: Vec<&str> = InterviewType::ALL.iter().map(|t| t.as_str()).collect();
                Err(format!(
                    "type must be one of {} (got '{other}')",
                    allowed.join(", ")
                ))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewStatus {
    InProgress,
    /// Terminal.
    Completed,
}

impl InterviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterviewStatus::InProgress => "in_progress",
            InterviewStatus::Completed => "completed",
        }
    }
}

impl FromStr for InterviewStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(InterviewStatus::InProgress),
            "completed" => Ok(InterviewStatus::Completed),
            other => Err(format!("unknown interview status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interview {
    pub id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    #[serde(rename = "type")]
    pub interview_type: InterviewType,
    pub status: InterviewStatus,
    pub conversation_id: Option<Uuid>,
    /// 0–100, present iff `status == Completed`.
    pub score: Option<i32>,
    pub feedback: Option<Feedback>,
    pub created_at: DateTime<Utc>,
}

/// Fields for a new interview row. Status always starts at `in_progress`.
#[derive(Debug, Clone)]
pub struct NewInterview {
    pub user_id: Uuid,
    pub role: String,
    pub interview_type: InterviewType,
    pub conversation_id: Option<Uuid>,
}

/// Structured end-of-session report.
///
/// Every field tolerates absence or `null` in upstream JSON; missing lists
/// come back empty. Serialized in camelCase; snake_case keys are accepted
/// on input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Feedback {
    #[serde(deserialize_with = "null_as_default")]
    pub strengths: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub weaknesses: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub tips: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub roadmap: Vec<String>,
    #[serde(
        alias = "question_analysis",
        deserialize_with = "question_scores",
        skip_serializing_if = "Option::is_none"
    )]
    pub question_analysis: Option<Vec<QuestionScore>>,
    #[serde(
        alias = "language_fluency",
        deserialize_with = "loose_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub language_fluency: Option<String>,
    #[serde(deserialize_with = "loose_text", skip_serializing_if = "Option::is_none")]
    pub attitude: Option<String>,
}

/// One question of the session. `performance` is `None` when the analysis
/// gave no usable number.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestionScore {
    #[serde(deserialize_with = "null_as_default")]
    pub question: String,
    #[serde(deserialize_with = "optional_percent")]
    pub performance: Option<u8>,
}

/// Treats an explicit JSON `null` like a missing field.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts a number or a numeric string and clamps it into 0–100.
/// Anything else reads as `None`.
fn optional_percent<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(raw.map(clamp_percent))
}

/// Keeps the entries that look like question scores and drops the rest.
fn question_scores<'de, D>(deserializer: D) -> Result<Option<Vec<QuestionScore>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Array(entries) = Value::deserialize(deserializer)? else {
        return Ok(None);
    };
    Ok(Some(
        entries
            .into_iter()
            .filter_map(|entry| serde_json::from_value(entry).ok())
            .collect(),
    ))
}

/// Strings pass through; other scalars are rendered as text.
fn loose_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

pub fn clamp_percent(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, 100.0) as u8
}
