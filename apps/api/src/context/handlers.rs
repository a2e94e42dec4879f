use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::context::store::ContextSnippet;
use crate::errors::AppError;
use crate::state::AppState;

const MAX_K: usize = 20;

#[derive(Deserialize)]
pub struct ContextQuery {
    pub query: Option<String>,
    pub k: Option<usize>,
}

#[derive(Serialize)]
pub struct ContextPreviewResponse {
    pub user_id: Uuid,
    pub summary: String,
    pub snippets: Vec<ContextSnippet>,
}

/// GET /api/v1/context
/// Shows what the interviewer would retrieve for the caller.
pub async fn handle_get_context(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<ContextQuery>,
) -> Result<Json<ContextPreviewResponse>, AppError> {
    let k = params.k.unwrap_or_else(|| state.context.top_k());
    if k == 0 || k > MAX_K {
        return Err(AppError::Validation(format!(
            "k must be between 1 and {MAX_K}"
        )));
    }

    let snippets = state
        .context
        .retrieve(user.user_id, params.query.as_deref(), k)
        .await;
    let summary = state.context.user_summary(user.user_id).await;

    Ok(Json(ContextPreviewResponse {
        user_id: user.user_id,
        summary,
        snippets,
    }))
}
