use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;
use redis::Client as RedisClient;
use sqlx::PgPool;

use crate::assessment::AssessmentEngine;
use crate::config::Config;
use crate::context::ContextProvider;
use crate::interview::InterviewWorkflow;
use crate::llm_client::LanguageModel;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Rate-limit counters.
    pub redis: RedisClient,
    pub s3: S3Client,
    pub context: ContextProvider,
    pub workflow: Arc<InterviewWorkflow>,
    pub assessor: Arc<AssessmentEngine>,
    pub config: Config,
}

impl AppState {
    /// Wires the engines around one model client and one context provider.
    pub fn new(
        db: PgPool,
        redis: RedisClient,
        s3: S3Client,
        llm: Arc<dyn LanguageModel>,
        context: ContextProvider,
        config: Config,
    ) -> Self {
        let workflow = InterviewWorkflow::new(context.clone(), llm.clone(), config.max_questions);
        let assessor = AssessmentEngine::new(llm, config.score_weighting);
        Self {
            db,
            redis,
            s3,
            context,
            workflow: Arc::new(workflow),
            assessor: Arc::new(assessor),
            config,
        }
    }
}

#[cfg(test)]
impl AppState {
    /// State whose database pool never connects until used and whose S3
    /// client points at a local endpoint; enough for auth and validation paths.
    pub fn for_tests(llm: Arc<dyn LanguageModel>) -> Self {
        use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
        use sqlx::postgres::PgPoolOptions;

        use crate::context::store::InMemoryContextStore;

        let config = Config::for_tests();
        let db = PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .expect("lazy pool from a valid url");
        let redis = RedisClient::open(config.redis_url.clone()).expect("valid redis url");
        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(Credentials::new("test", "test", None, None, "tests"))
            .endpoint_url(config.s3_endpoint.clone())
            .force_path_style(true)
            .build();
        let context = ContextProvider::new(
            Arc::new(InMemoryContextStore::new()),
            config.context_top_k,
            config.context_history_sessions,
        );

        Self::new(
            db,
            redis,
            S3Client::from_conf(s3_config),
            llm,
            context,
            config,
        )
    }
}
