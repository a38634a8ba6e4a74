use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::{AppError, AppJson};
use crate::interviews::lifecycle::{complete_interview, create_interview, CreateInterviewRequest};
use crate::models::interview::Interview;
use crate::state::AppState;

/// GET /api/interviews
pub async fn handle_list_interviews(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<Interview>>, AppError> {
    Ok(Json(state.storage.list_interviews(user.id).await?))
}

/// GET /api/interviews/:id
pub async fn handle_get_interview(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Interview>, AppError> {
    state
        .storage
        .get_interview(user.id, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Interview {id} not found")))
}

/// POST /api/interviews
pub async fn handle_create_interview(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(req): AppJson<CreateInterviewRequest>,
) -> Result<(StatusCode, Json<Interview>), AppError> {
    let interview = create_interview(state.storage.as_ref(), user.id, &req).await?;
    Ok((StatusCode::CREATED, Json(interview)))
}

/// POST /api/interviews/:id/complete
pub async fn handle_complete_interview(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Interview>, AppError> {
    let interview = complete_interview(
        state.storage.as_ref(),
        state.completion.as_ref(),
        &state.completion_guard,
        user.id,
        id,
    )
    .await?;
    Ok(Json(interview))
}
