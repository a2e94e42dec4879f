//! Access tokens for the realtime voice room the client joins during an interview.
//!
//! Tokens are HS256 JWTs in the LiveKit format: the API key is the issuer, the
//! participant identity is the subject, and a `video` grant names the room.

pub mod handlers;

use anyhow::anyhow;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::config::LiveKitConfig;
use crate::errors::AppError;

pub const TOKEN_TTL_HOURS: i64 = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoGrant {
    pub room: String,
    pub room_join: bool,
    pub can_publish: bool,
    pub can_subscribe: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomClaims {
    pub iss: String,
    pub sub: String,
    pub name: String,
    pub nbf: i64,
    pub exp: i64,
    pub video: VideoGrant,
}

pub fn room_token(
    livekit: &LiveKitConfig,
    room: &str,
    identity: &str,
    display_name: &str,
) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = RoomClaims {
        iss: livekit.api_key.clone(),
        sub: identity.to_string(),
        name: display_name.to_string(),
        nbf: now.timestamp(),
        exp: (now + Duration::hours(TOKEN_TTL_HOURS)).timestamp(),
        video: VideoGrant {
            room: room.to_string(),
            room_join: true,
            can_publish: true,
            can_subscribe: true,
        },
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(livekit.api_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow!("room token signing failed: {e}")))
}

/// Room names are restricted to characters every room server accepts.
pub fn sanitize_room_name(raw: &str) -> Option<String> {
    let name: String = raw
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .take(64)
        .collect();
    (!name.is_empty()).then_some(name)
}
