pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::chat::handlers as chat;
use crate::interviews::handlers as interviews;
use crate::resumes::handlers as resumes;
use crate::state::AppState;

/// Upper bound for a resume upload body.
const RESUME_UPLOAD_LIMIT: usize = 10 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Chat
        .route(
            "/api/conversations/:id",
            get(chat::handle_get_conversation),
        )
        .route(
            "/api/conversations/:id/messages",
            post(chat::handle_send_message),
        )
        // Interviews
        .route(
            "/api/interviews",
            get(interviews::handle_list_interviews).post(interviews::handle_create_interview),
        )
        .route("/api/interviews/:id", get(interviews::handle_get_interview))
        .route(
            "/api/interviews/:id/complete",
            post(interviews::handle_complete_interview),
        )
        // Resumes
        .route(
            "/api/resumes",
            get(resumes::handle_list_resumes).post(resumes::handle_upload_resume),
        )
        .route("/api/resumes/:id/parse", post(resumes::handle_parse_resume))
        .layer(DefaultBodyLimit::max(RESUME_UPLOAD_LIMIT))
        .with_state(state)
}
