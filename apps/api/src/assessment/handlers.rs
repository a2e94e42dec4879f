use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::assessment::engine::AssessmentReport;
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::interview::repository;
use crate::state::AppState;

/// POST /api/v1/interview/sessions/:id/assess
/// Re-running replaces the previously stored scores and feedback.
pub async fn handle_assess(
    State(state): State<AppState>,
    user: AuthUser,
    Path(session_id): Path<Uuid>,
) -> Result<Json<AssessmentReport>, AppError> {
    let session = repository::get_owned(&state.db, session_id, user.user_id).await?;
    let report = state.assessor.assess(&state.db, &session).await?;
    Ok(Json(report))
}
