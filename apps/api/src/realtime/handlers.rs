use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::interview::repository as sessions_repo;
use crate::realtime::{room_token, sanitize_room_name, TOKEN_TTL_HOURS};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct RoomTokenRequest {
    /// Binds the room to this session and records it on the session.
    pub session_id: Option<Uuid>,
    pub room_name: Option<String>,
    pub participant_name: Option<String>,
}

#[derive(Serialize)]
pub struct RoomTokenResponse {
    pub token: String,
    pub url: String,
    pub room: String,
    pub identity: String,
    pub expires_in: i64,
}

/// POST /api/v1/realtime/token
pub async fn handle_room_token(
    State(state): State<AppState>,
    user: AuthUser,
    body: Option<Json<RoomTokenRequest>>,
) -> Result<Json<RoomTokenResponse>, AppError> {
    let livekit = state.config.livekit.as_ref().ok_or_else(|| {
        AppError::ServiceUnavailable("Realtime rooms are not configured".to_string())
    })?;
    let req = body.map(|Json(req)| req).unwrap_or_default();

    let room = match (&req.room_name, req.session_id) {
        (Some(raw), _) => sanitize_room_name(raw)
            .ok_or_else(|| AppError::Validation("Invalid room name".to_string()))?,
        (None, Some(session_id)) => format!("interview-{session_id}"),
        (None, None) => format!("interview-{}", user.user_id),
    };

    if let Some(session_id) = req.session_id {
        let session = sessions_repo::get_owned(&state.db, session_id, user.user_id).await?;
        if session.lifecycle().map_or(true, |s| s.is_terminal()) {
            return Err(AppError::Validation(format!(
                "Session is {}; its room is closed",
                session.status
            )));
        }
        sessions_repo::set_room(&state.db, session_id, &room).await?;
    }

    let identity = user.user_id.to_string();
    let display_name = req
        .participant_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(&identity)
        .to_string();

    let token = room_token(livekit, &room, &identity, &display_name)?;
    info!("Issued room token for user {} in room {room}", user.user_id);

    Ok(Json(RoomTokenResponse {
        token,
        url: livekit.url.clone(),
        room,
        identity,
        expires_in: TOKEN_TTL_HOURS * 3600,
    }))
}
