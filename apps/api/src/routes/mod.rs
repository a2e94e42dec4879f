pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};

use crate::assessment::handlers as assessment;
use crate::auth::handlers as auth;
use crate::context::handlers as context;
use crate::interview::handlers as interview;
use crate::profile::handlers as profile;
use crate::rate_limit::rate_limit;
use crate::realtime::handlers as realtime;
use crate::state::AppState;

/// Multipart framing on top of the PDF itself.
const RESUME_BODY_LIMIT: usize = profile::MAX_RESUME_BYTES + 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Auth
        .route("/api/v1/auth/register", post(auth::handle_register))
        .route("/api/v1/auth/login", post(auth::handle_login))
        .route("/api/v1/auth/me", get(auth::handle_me))
        // Profile
        .route(
            "/api/v1/profile",
            post(profile::handle_create_profile)
                .get(profile::handle_get_profile)
                .put(profile::handle_update_profile),
        )
        .route(
            "/api/v1/profile/resume",
            post(profile::handle_upload_resume).layer(DefaultBodyLimit::max(RESUME_BODY_LIMIT)),
        )
        .route("/api/v1/profile/index", post(profile::handle_reindex))
        // Context preview
        .route("/api/v1/context", get(context::handle_get_context))
        // Interview sessions
        .route(
            "/api/v1/interview/sessions",
            post(interview::handle_create_session).get(interview::handle_list_sessions),
        )
        .route(
            "/api/v1/interview/sessions/:id",
            get(interview::handle_get_session),
        )
        .route(
            "/api/v1/interview/sessions/:id/message",
            post(interview::handle_send_message),
        )
        .route(
            "/api/v1/interview/sessions/:id/status",
            post(interview::handle_update_status),
        )
        .route(
            "/api/v1/interview/sessions/:id/complete",
            post(interview::handle_complete_session),
        )
        .route(
            "/api/v1/interview/sessions/:id/assess",
            post(assessment::handle_assess),
        )
        .route(
            "/api/v1/interview/sessions/:id/audio-upload-url",
            post(interview::handle_audio_upload_url),
        )
        // Realtime rooms
        .route("/api/v1/realtime/token", post(realtime::handle_room_token))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
    };
    use serde_json::Value;
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::auth::issue_access_token;
    use crate::llm_client::testing::ScriptedModel;

    fn app() -> (Router, String) {
        let state = AppState::for_tests(Arc::new(ScriptedModel::failing()));
        let token = issue_access_token(&state.config.jwt_secret, Uuid::new_v4(), 5).unwrap();
        (build_router(state), token)
    }

    fn json_request(method: &str, uri: &str, token: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_is_open() {
        let (app, _) = app();
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("x-ratelimit-limit").is_none());
        let body = body_json(response).await;
        assert_eq!(body["service"], "interview-api");
    }

    #[tokio::test]
    async fn test_protected_routes_require_token() {
        let (app, _) = app();
        let response = app
            .oneshot(json_request("GET", "/api/v1/auth/me", None, ""))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()["x-ratelimit-limit"], "60");
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_garbage_token_is_rejected() {
        let (app, _) = app();
        let response = app
            .oneshot(json_request(
                "GET",
                "/api/v1/interview/sessions",
                Some("not-a-jwt"),
                "",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_session_creation_validates_before_side_effects() {
        let (app, token) = app();
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/interview/sessions",
                Some(&token),
                r#"{"title": "  ", "interview_type": "behavioral"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()["x-ratelimit-limit"], "10");

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/v1/interview/sessions",
                Some(&token),
                r#"{"title": "Loop prep", "interview_type": "karaoke"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected() {
        let (app, token) = app();
        let uri = format!("/api/v1/interview/sessions/{}/message", Uuid::new_v4());
        let response = app
            .oneshot(json_request("POST", &uri, Some(&token), r#"{"content": "   "}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()["x-ratelimit-limit"], "30");
    }

    #[tokio::test]
    async fn test_context_preview_bounds_k() {
        let (app, token) = app();
        let response = app
            .oneshot(json_request("GET", "/api/v1/context?k=0", Some(&token), ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_room_token_unavailable_without_configuration() {
        let (app, token) = app();
        let response = app
            .oneshot(json_request("POST", "/api/v1/realtime/token", Some(&token), "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
