//! Fixed-window request limits per client and route family, counted in Redis.
//!
//! Counting failures (Redis down, slow) let the request through.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::AUTHORIZATION, HeaderMap, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::warn;

use crate::auth::{bearer_token, decode_access_token};
use crate::errors::AppError;
use crate::state::AppState;

pub const WINDOW_SECS: u64 = 60;
const REDIS_TIMEOUT: Duration = Duration::from_millis(250);

const SESSION_CREATE_LIMIT: u32 = 10;
const MESSAGE_LIMIT: u32 = 30;
const LOGIN_LIMIT: u32 = 5;
const REGISTER_LIMIT: u32 = 3;

/// Which counter a request increments and its per-window limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteLimit {
    pub family: &'static str,
    pub limit: u32,
}

/// `None` for routes that are never limited.
pub fn classify(method: &Method, path: &str, default_limit: u32) -> Option<RouteLimit> {
    let path = path.trim_end_matches('/');
    if path == "/health" {
        return None;
    }

    let (family, limit) = match (method, path) {
        (&Method::POST, "/api/v1/interview/sessions") => ("session_create", SESSION_CREATE_LIMIT),
        (&Method::POST, p)
            if p.starts_with("/api/v1/interview/sessions/") && p.ends_with("/message") =>
        {
            ("message", MESSAGE_LIMIT)
        }
        (&Method::POST, "/api/v1/auth/login") => ("login", LOGIN_LIMIT),
        (&Method::POST, "/api/v1/auth/register") => ("register", REGISTER_LIMIT),
        _ => ("default", default_limit),
    };
    Some(RouteLimit { family, limit })
}

/// Authenticated user, else the first forwarded address, else the peer address.
pub fn client_id(headers: &HeaderMap, peer: Option<SocketAddr>, jwt_secret: &str) -> String {
    let user = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .and_then(|token| decode_access_token(jwt_secret, token).ok());
    if let Some(claims) = user {
        return format!("user:{}", claims.sub);
    }

    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = forwarded {
        return format!("ip:{ip}");
    }

    match peer {
        Some(addr) => format!("ip:{}", addr.ip()),
        None => "ip:unknown".to_string(),
    }
}

pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(route) = classify(
        request.method(),
        request.uri().path(),
        state.config.rate_limit_per_minute,
    ) else {
        return next.run(request).await;
    };

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_id(request.headers(), peer, &state.config.jwt_secret);

    let now = Utc::now().timestamp().max(0) as u64;
    let window = now / WINDOW_SECS;
    let key = format!("ratelimit:{}:{client}:{window}", route.family);

    let exceeded = match count_hit(&state.redis, &key).await {
        Some(count) => count > u64::from(route.limit),
        None => false,
    };

    let mut response = if exceeded {
        warn!("Rate limit hit for {client} on {}", route.family);
        AppError::RateLimited {
            retry_after_secs: WINDOW_SECS - now % WINDOW_SECS,
        }
        .into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", HeaderValue::from(route.limit));
    headers.insert("x-ratelimit-window", HeaderValue::from(WINDOW_SECS));
    response
}

/// INCR + EXPIRE in one round trip. `None` if Redis could not be reached in time.
async fn count_hit(redis: &redis::Client, key: &str) -> Option<u64> {
    let attempt = async {
        let mut conn = redis.get_multiplexed_async_connection().await?;
        let (count,): (u64,) = redis::pipe()
            .atomic()
            .cmd("INCR")
            .arg(key)
            .cmd("EXPIRE")
            .arg(key)
            .arg(WINDOW_SECS)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok::<_, redis::RedisError>(count)
    };

    match tokio::time::timeout(REDIS_TIMEOUT, attempt).await {
        Ok(Ok(count)) => Some(count),
        Ok(Err(e)) => {
            warn!("Rate limit counter unavailable, allowing request: {e}");
            None
        }
        Err(_) => {
            warn!("Rate limit counter timed out, allowing request");
            None
        }
    }
}
