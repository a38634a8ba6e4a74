use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures_util::{Stream, StreamExt};
use uuid::Uuid;

use interview_wire::{ConversationHistory, SendMessageRequest};

use crate::auth::AuthUser;
use crate::chat::channel::{begin_turn, conversation_history};
use crate::errors::{AppError, AppJson};
use crate::state::AppState;

/// GET /api/conversations/:id
pub async fn handle_get_conversation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ConversationHistory>, AppError> {
    Ok(Json(
        conversation_history(state.storage.as_ref(), user.id, id).await?,
    ))
}

/// POST /api/conversations/:id/messages
///
/// Validation and ownership errors are returned as ordinary JSON responses;
/// once the user message is stored the reply is streamed as SSE records.
pub async fn handle_send_message(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    AppJson(req): AppJson<SendMessageRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let turn = begin_turn(&state, user.id, id, &req).await?;

    let events = turn
        .into_stream()
        .map(|record| Ok::<_, Infallible>(Event::default().data(record.to_payload())));

    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}
