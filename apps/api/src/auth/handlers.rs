use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::{hash_password, issue_access_token, users, verify_password, AuthUser};
use crate::errors::AppError;
use crate::models::user::User;
use crate::state::AppState;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: User,
}

fn normalize_email(raw: &str) -> Result<String, AppError> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(AppError::Validation("A valid email is required".to_string())),
    }
}

fn token_response(state: &AppState, user: User) -> Result<TokenResponse, AppError> {
    let ttl = state.config.access_token_ttl_minutes;
    Ok(TokenResponse {
        access_token: issue_access_token(&state.config.jwt_secret, user.id, ttl)?,
        token_type: "bearer",
        expires_in: ttl * 60,
        user,
    })
}

/// POST /api/v1/auth/register
pub async fn handle_register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<TokenResponse>), AppError> {
    let email = normalize_email(&req.email)?;
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    let name = req.name.as_deref().map(str::trim).filter(|n| !n.is_empty());

    let password_hash = hash_password(&req.password).await?;
    let user = users::create(&state.db, &email, name, &password_hash).await?;
    info!("Registered user {}", user.id);

    Ok((StatusCode::CREATED, Json(token_response(&state, user)?)))
}

/// POST /api/v1/auth/login
pub async fn handle_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let email = normalize_email(&req.email)?;
    let user = users::find_by_email(&state.db, &email).await?;
    let verified = match &user {
        Some(u) => verify_password(&req.password, &u.password_hash).await,
        None => false,
    };
    let user = user.filter(|_| verified).ok_or_else(|| {
        warn!("Failed login attempt");
        AppError::Unauthorized
    })?;

    if !user.is_active {
        return Err(AppError::Forbidden);
    }

    Ok(Json(token_response(&state, user)?))
}

/// GET /api/v1/auth/me
pub async fn handle_me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<User>, AppError> {
    let user = users::find_by_id(&state.db, user.user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;
    Ok(Json(user))
}
