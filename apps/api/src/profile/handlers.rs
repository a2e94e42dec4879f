use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::profile::UserProfileRow;
use crate::profile::{repository, ProfileInput};
use crate::state::AppState;
use crate::storage;

pub const MAX_RESUME_BYTES: usize = 10 * 1024 * 1024;

#[derive(Serialize)]
pub struct ResumeUploadResponse {
    pub s3_key: String,
    pub characters: usize,
    pub documents_indexed: Option<usize>,
}

#[derive(Serialize)]
pub struct IndexResponse {
    pub documents_indexed: usize,
}

/// POST /api/v1/profile
pub async fn handle_create_profile(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<ProfileInput>,
) -> Result<(StatusCode, Json<UserProfileRow>), AppError> {
    input.validate().map_err(AppError::Validation)?;

    if repository::find_by_user(&state.db, user.user_id).await?.is_some() {
        return Err(AppError::Validation("Profile already exists".to_string()));
    }
    let profile = repository::insert(&state.db, user.user_id, &input).await?;
    info!("Created profile for user {}", user.user_id);

    state.context.reindex_logged(&state.db, user.user_id).await;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// GET /api/v1/profile
pub async fn handle_get_profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<UserProfileRow>, AppError> {
    repository::find_by_user(&state.db, user.user_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))
}

/// PUT /api/v1/profile
pub async fn handle_update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<ProfileInput>,
) -> Result<Json<UserProfileRow>, AppError> {
    input.validate().map_err(AppError::Validation)?;

    let profile = repository::update(&state.db, user.user_id, &input)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

    state.context.reindex_logged(&state.db, user.user_id).await;
    Ok(Json(profile))
}

/// POST /api/v1/profile/resume
/// Multipart upload with a `file` field holding a PDF.
pub async fn handle_upload_resume(
    State(state): State<AppState>,
    user: AuthUser,
    mut multipart: Multipart,
) -> Result<Json<ResumeUploadResponse>, AppError> {
    let mut pdf: Option<Vec<u8>> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed upload: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Malformed upload: {e}")))?;
        pdf = Some(bytes.to_vec());
    }

    let pdf = pdf.ok_or_else(|| AppError::Validation("Missing 'file' field".to_string()))?;
    if pdf.len() > MAX_RESUME_BYTES {
        return Err(AppError::Validation("Resume exceeds 10 MB".to_string()));
    }
    if !pdf.starts_with(b"%PDF") {
        return Err(AppError::Validation("Resume must be a PDF".to_string()));
    }

    let text = extract_pdf_text(pdf.clone()).await?;

    let s3_key = storage::resume_key(user.user_id, Utc::now());
    storage::put_object(
        &state.s3,
        &state.config.s3_bucket,
        &s3_key,
        pdf,
        "application/pdf",
    )
    .await?;

    repository::set_resume_text(&state.db, user.user_id, &text).await?;
    info!(
        "Stored {} characters of resume text for user {}",
        text.chars().count(),
        user.user_id
    );

    let documents_indexed = match state.context.index(&state.db, user.user_id).await {
        Ok(count) => Some(count),
        Err(e) => {
            warn!("Context re-index failed for user {}: {e:#}", user.user_id);
            None
        }
    };

    Ok(Json(ResumeUploadResponse {
        s3_key,
        characters: text.chars().count(),
        documents_indexed,
    }))
}

/// POST /api/v1/profile/index
pub async fn handle_reindex(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<IndexResponse>, AppError> {
    let documents_indexed = state
        .context
        .index(&state.db, user.user_id)
        .await
        .map_err(|e| AppError::ServiceUnavailable(format!("Context indexing failed: {e}")))?;
    Ok(Json(IndexResponse { documents_indexed }))
}

/// Text extraction is CPU-bound; it runs on the blocking pool.
async fn extract_pdf_text(pdf: Vec<u8>) -> Result<String, AppError> {
    let extracted = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&pdf))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("PDF extraction task failed: {e}")))?
        .map_err(|e| AppError::Validation(format!("Could not read PDF: {e}")))?;

    let text = extracted.trim().to_string();
    if text.is_empty() {
        return Err(AppError::Validation(
            "No text could be extracted from the PDF".to_string(),
        ));
    }
    Ok(text)
}
