mod assessment;
mod auth;
mod config;
mod context;
mod db;
mod errors;
mod interview;
mod llm_client;
mod models;
mod profile;
mod rate_limit;
mod realtime;
mod routes;
mod state;
mod storage;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use axum::http::HeaderName;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::context::store::PgContextStore;
use crate::context::ContextProvider;
use crate::db::create_pool;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Interview API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL (runs migrations)
    let db = create_pool(&config.database_url).await?;

    // Initialize Redis
    let redis = redis::Client::open(config.redis_url.clone())?;
    info!("Redis client initialized");

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized");

    // Initialize LLM client
    let llm = LlmClient::new(
        config.anthropic_api_key.clone(),
        Duration::from_secs(config.llm_timeout_secs),
        config.llm_max_retries,
    )?;
    info!(
        "LLM client initialized (model: {}, retries: {})",
        llm_client::MODEL,
        config.llm_max_retries
    );

    // Context corpus lives next to the rest of the data in Postgres
    let context = ContextProvider::new(
        Arc::new(PgContextStore::new(db.clone())),
        config.context_top_k,
        config.context_history_sessions,
    );

    info!(
        "Interviews ask {} questions; scores use {} weighting",
        config.max_questions, config.score_weighting
    );
    if config.livekit.is_none() {
        info!("LiveKit not configured; realtime token endpoint will answer 503");
    }

    let state = AppState::new(db, redis, s3, Arc::new(llm), context, config.clone());

    let request_id = HeaderName::from_static("x-request-id");
    let app = build_router(state)
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the web client's domain is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "interview-static",
    );

    let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    // MinIO serves buckets by path, not subdomain
    let s3_config = aws_sdk_s3::config::Builder::from(&shared)
        .force_path_style(true)
        .build();
    aws_sdk_s3::Client::from_conf(s3_config)
}
