use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::resume::{NewResume, Resume};
use crate::resumes::analysis::analyze_resume;
use crate::resumes::archive::archive_key;
use crate::resumes::extract::extract_resume_text;
use crate::state::AppState;

struct Upload {
    file_name: String,
    content_type: Option<String>,
    data: Bytes,
}

async fn read_upload(multipart: &mut Multipart) -> Result<Option<Upload>, AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .file_name()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or("resume")
            .to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await?;
        return Ok(Some(Upload {
            file_name,
            content_type,
            data,
        }));
    }
    Ok(None)
}

/// POST /api/resumes
pub async fn handle_upload_resume(
    State(state): State<AppState>,
    user: AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Resume>), AppError> {
    let upload = read_upload(&mut multipart)
        .await?
        .filter(|u| !u.data.is_empty())
        .ok_or_else(|| AppError::validation("file", "No file uploaded"))?;

    let resume_id = Uuid::new_v4();
    let content = extract_resume_text(
        &upload.file_name,
        upload.content_type.as_deref(),
        upload.data.clone(),
        state.config.resume_max_chars,
    )
    .await;

    let archive_key = match &state.archive {
        Some(archive) => {
            let key = archive_key(user.id, resume_id, &upload.file_name);
            let content_type = upload
                .content_type
                .as_deref()
                .unwrap_or("application/octet-stream");
            match archive.put(&key, upload.data, content_type).await {
                Ok(()) => Some(key),
                Err(e) => {
                    warn!("Resume {resume_id} stored without archive copy: {e}");
                    None
                }
            }
        }
        None => None,
    };

    let resume = state
        .storage
        .create_resume(NewResume {
            id: resume_id,
            user_id: user.id,
            file_name: upload.file_name,
            content,
            archive_key,
        })
        .await?;
    info!("Resume {} uploaded by user {}", resume.id, user.id);

    let analysis = analyze_resume(state.completion.as_ref(), &resume.content).await;
    let resume = state
        .storage
        .update_resume_analysis(resume.id, &analysis)
        .await?;

    Ok((StatusCode::CREATED, Json(resume)))
}

/// GET /api/resumes
pub async fn handle_list_resumes(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<Resume>>, AppError> {
    Ok(Json(state.storage.list_resumes(user.id).await?))
}

/// POST /api/resumes/:id/parse
pub async fn handle_parse_resume(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Resume>, AppError> {
    let resume = state
        .storage
        .get_resume(user.id, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))?;

    let analysis = analyze_resume(state.completion.as_ref(), &resume.content).await;
    let resume = state.storage.update_resume_analysis(resume.id, &analysis).await?;
    Ok(Json(resume))
}
