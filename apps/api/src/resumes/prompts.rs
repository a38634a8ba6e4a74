// Prompts for the structured resume review.

pub const RESUME_PERSONA: &str = "You are a technical recruiter screening resumes for \
    software engineering roles.";

/// Resume analysis prompt template. Replace: {resume_text}
pub const RESUME_ANALYSIS_PROMPT_TEMPLATE: &str = r#"Review the resume below.

Return a JSON object with this EXACT schema:
{
  "skills": ["Rust", "PostgreSQL", "Distributed systems"],
  "score": 74,
  "feedback": {
    "strengths": ["Quantified impact on most bullets"],
    "weaknesses": ["No links to projects"],
    "summary": "Solid backend profile; tighten the project section."
  }
}

Rules:
- "skills" lists concrete technologies and competencies that appear in the text.
- "score" is an integer from 0 to 100 for overall quality.
- Do NOT invent skills that are not in the resume.

RESUME:
{resume_text}"#;
