use serde::Deserialize;
use tracing::{info, warn};

use crate::llm_client::prompts::{fill, json_system};
use crate::llm_client::CompletionClient;
use crate::models::interview::{clamp_percent, null_as_default};
use crate::models::resume::{ResumeAnalysis, ResumeFeedback};
use crate::resumes::prompts::{RESUME_ANALYSIS_PROMPT_TEMPLATE, RESUME_PERSONA};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResumeReply {
    #[serde(deserialize_with = "null_as_default")]
    skills: Vec<String>,
    score: Option<f64>,
    feedback: Option<ResumeFeedback>,
}

/// Runs the structured resume review. Never fails: an upstream error or a
/// reply that does not match the schema yields an empty analysis.
pub async fn analyze_resume(completion: &dyn CompletionClient, content: &str) -> ResumeAnalysis {
    if content.trim().is_empty() {
        return ResumeAnalysis::default();
    }

    let prompt = fill(RESUME_ANALYSIS_PROMPT_TEMPLATE, &[("resume_text", content)]);
    let raw = match completion
        .complete_json(&prompt, &json_system(RESUME_PERSONA))
        .await
    {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Resume analysis failed, storing default result: {e}");
            return ResumeAnalysis::default();
        }
    };

    let reply: ResumeReply = match serde_json::from_value(raw) {
        Ok(reply) => reply,
        Err(e) => {
            warn!("Resume analysis did not match the schema, storing default result: {e}");
            return ResumeAnalysis::default();
        }
    };

    let mut skills: Vec<String> = Vec::with_capacity(reply.skills.len());
    for skill in reply.skills {
        let skill = skill.trim();
        if !skill.is_empty() && !skills.iter().any(|s| s.eq_ignore_ascii_case(skill)) {
            skills.push(skill.to_string());
        }
    }

    let analysis = ResumeAnalysis {
        skills,
        score: reply.score.map(clamp_percent),
        feedback: reply.feedback,
    };
    info!(
        "Resume analysed: {} skills, score {:?}",
        analysis.skills.len(),
        analysis.score
    );
    analysis
}
