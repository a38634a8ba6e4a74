// Prompts for the interviewer persona and the end-of-session analysis.

use crate::models::interview::{Interview, InterviewType};

/// Persona used when scoring a finished session.
pub const ANALYSIS_PERSONA: &str = "You are a senior hiring manager reviewing the \
    transcript of a mock interview. Judge the candidate's answers only; ignore the \
    interviewer's turns except as context.";

/// Analysis prompt template. Replace: {role}, {interview_type}, {transcript}
pub const ANALYSIS_PROMPT_TEMPLATE: &str = r#"Evaluate this {interview_type} mock interview for the role of {role}.

Return a JSON object with this EXACT schema:
{
  "score": 72,
  "feedback": {
    "strengths": ["Explained trade-offs of the chosen data structure"],
    "weaknesses": ["Did not test edge cases"],
    "tips": ["State complexity before writing code"],
    "roadmap": ["Practice graph traversal problems"],
    "questionAnalysis": [
      {"question": "Design an LRU cache", "performance": 65}
    ],
    "languageFluency": "Clear and concise",
    "attitude": "Calm and collaborative"
  }
}

Rules:
- "score" is an integer from 0 to 100 for the whole session.
- Every "performance" is an integer from 0 to 100.
- Lists may be empty but must be present.
- If the candidate barely answered, say so in weaknesses and score low.

TRANSCRIPT:
{transcript}"#;

/// System prompt for the live interviewer.
pub fn interviewer_system_prompt(interview: Option<&Interview>) -> String {
    let Some(interview) = interview else {
        return "You are a friendly interview coach. Answer the candidate's questions \
            about interviewing and keep replies short."
            .to_string();
    };

    let focus = match interview.interview_type {
        InterviewType::Technical => {
            "Ask coding and computer-science questions one at a time. When the candidate \
            submits code, review correctness, complexity and style before moving on."
        }
        InterviewType::Behavioral => {
            "Ask behavioral questions one at a time and probe for concrete situations, \
            actions and results."
        }
        InterviewType::SystemDesign => {
            "Pose one system design problem, then drive the discussion through \
            requirements, high-level design, data model and scaling."
        }
    };

    format!(
        "You are an experienced interviewer running a {kind} interview for the role of \
        {role}. {focus} Keep each reply under 150 words, never answer your own questions, \
        and do not reveal a score during the session.",
        kind = interview.interview_type,
        role = interview.role,
    )
}
