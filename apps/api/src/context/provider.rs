use std::sync::Arc;

use anyhow::{anyhow, Result};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::users;
use crate::context::chunking::TextSplitter;
use crate::context::prompts;
use crate::context::store::{ContextDocument, ContextSnippet, ContextStore, SnippetCategory};
use crate::interview::repository as sessions_repo;
use crate::llm_client::prompts::fill;
use crate::models::profile::UserProfileRow;
use crate::models::session::{InterviewSessionRow, InterviewType};
use crate::models::user::User;
use crate::profile::repository as profile_repo;

/// Personalization for the interviewer, backed by a per-user `ContextStore`.
#[derive(Clone)]
pub struct ContextProvider {
    store: Arc<dyn ContextStore>,
    splitter: TextSplitter,
    top_k: usize,
    history_sessions: i64,
}

impl ContextProvider {
    pub fn new(store: Arc<dyn ContextStore>, top_k: usize, history_sessions: i64) -> Self {
        Self {
            store,
            splitter: TextSplitter::default(),
            top_k,
            history_sessions,
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Up to `k` snippets for `user_id`, best first. Store failures yield an empty list.
    pub async fn retrieve(
        &self,
        user_id: Uuid,
        query: Option<&str>,
        k: usize,
    ) -> Vec<ContextSnippet> {
        match self.try_retrieve(user_id, query, k).await {
            Ok(snippets) => snippets,
            Err(e) => {
                warn!("Context retrieval failed for user {user_id}: {e:#}");
                Vec::new()
            }
        }
    }

    async fn try_retrieve(
        &self,
        user_id: Uuid,
        query: Option<&str>,
        k: usize,
    ) -> Result<Vec<ContextSnippet>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let query = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .unwrap_or(prompts::DEFAULT_QUERY);

        let mut snippets = self.store.similarity_search(user_id, query, k).await?;
        snippets.truncate(k);
        Ok(snippets)
    }

    /// The interviewer's persona block. Never empty: a retrieval outage yields
    /// the generic prompt, an empty corpus yields the persona without background.
    pub async fn build_personalized_prompt(
        &self,
        user_id: Uuid,
        interview_type: InterviewType,
    ) -> String {
        let label = interview_type.label();
        let query = fill(prompts::PERSONALIZATION_QUERY, &[("interview_type", &label)]);

        match self.try_retrieve(user_id, Some(&query), self.top_k).await {
            Ok(snippets) => {
                let user_context = if snippets.is_empty() {
                    prompts::NO_CONTEXT.to_string()
                } else {
                    snippets
                        .iter()
                        .map(|s| s.content.as_str())
                        .collect::<Vec<_>>()
                        .join("\n\n")
                };
                fill(
                    prompts::PERSONALIZED_INTERVIEWER,
                    &[("interview_type", &label), ("user_context", &user_context)],
                )
            }
            Err(e) => {
                warn!("Falling back to generic interviewer prompt for user {user_id}: {e:#}");
                generic_prompt(interview_type)
            }
        }
    }

    /// A short description of the candidate from their basic info and profile snippets.
    pub async fn user_summary(&self, user_id: Uuid) -> String {
        let snippets = self.retrieve(user_id, None, 3).await;
        if snippets.is_empty() {
            return prompts::NEW_CANDIDATE_SUMMARY.to_string();
        }

        let first_of = |category: SnippetCategory| {
            snippets
                .iter()
                .find(|s| s.category == category)
                .map(|s| s.content.as_str())
        };
        let parts: Vec<&str> = [
            first_of(SnippetCategory::BasicInfo),
            first_of(SnippetCategory::Profile),
        ]
        .into_iter()
        .flatten()
        .collect();

        if parts.is_empty() {
            prompts::SPARSE_CANDIDATE_SUMMARY.to_string()
        } else {
            parts.join("\n")
        }
    }

    /// Rebuilds the user's corpus from profile, resume and recent completed sessions.
    ///
    /// Delete-then-insert: if the insert fails the user may briefly have no corpus.
    pub async fn index(&self, pool: &PgPool, user_id: Uuid) -> Result<usize> {
        let user = users::find_by_id(pool, user_id)
            .await?
            .ok_or_else(|| anyhow!("user {user_id} not found"))?;
        let profile = profile_repo::find_by_user(pool, user_id).await?;
        let sessions =
            sessions_repo::recent_completed_sessions(pool, user_id, self.history_sessions).await?;

        let documents = build_documents(&user, profile.as_ref(), &sessions, &self.splitter);
        let written = self.store.replace_user_documents(user_id, &documents).await?;

        info!(
            "Indexed {written} context documents for user {user_id} ({} past sessions)",
            sessions.len()
        );
        Ok(written)
    }

    /// `index` for request paths where a stale corpus is acceptable.
    pub async fn reindex_logged(&self, pool: &PgPool, user_id: Uuid) {
        if let Err(e) = self.index(pool, user_id).await {
            warn!("Context re-index failed for user {user_id}: {e:#}");
        }
    }
}

pub fn generic_prompt(interview_type: InterviewType) -> String {
    fill(
        prompts::GENERIC_INTERVIEWER,
        &[("interview_type", &interview_type.label())],
    )
}

/// The user's corpus. Empty when there is neither a profile nor any past session.
pub fn build_documents(
    user: &User,
    profile: Option<&UserProfileRow>,
    sessions: &[InterviewSessionRow],
    splitter: &TextSplitter,
) -> Vec<ContextDocument> {
    if profile.is_none() && sessions.is_empty() {
        return Vec::new();
    }

    let mut documents = vec![ContextDocument::new(
        SnippetCategory::BasicInfo,
        format!(
            "User: {}\nEmail: {}\nAccount created: {}",
            user.name.as_deref().unwrap_or(&user.email),
            user.email,
            user.created_at.format("%Y-%m-%d")
        ),
    )];

    if let Some(profile) = profile {
        let summary = profile.to_context_string();
        if !summary.is_empty() {
            documents.push(ContextDocument::new(SnippetCategory::Profile, summary));
        }

        if let Some(resume) = profile.resume_text.as_deref() {
            for (i, chunk) in splitter.split(resume).into_iter().enumerate() {
                documents.push(ContextDocument {
                    category: SnippetCategory::ResumeChunk,
                    content: chunk,
                    chunk_index: i32::try_from(i).ok(),
                    source_session_id: None,
                });
            }
        }
    }

    for session in sessions {
        documents.push(ContextDocument {
            category: SnippetCategory::SessionHistory,
            content: session_summary(session),
            chunk_index: None,
            source_session_id: Some(session.id),
        });
    }

    documents
}

fn session_summary(session: &InterviewSessionRow) -> String {
    let mut lines = vec![
        format!("Interview Session: {}", session.title),
        format!("Type: {}", session.kind().label()),
        format!("Date: {}", session.created_at.format("%Y-%m-%d")),
    ];
    if let Some(score) = session.overall_score {
        lines.push(format!("Overall Score: {score}/100"));
    }
    if let Some(feedback) = session.detailed_feedback.as_deref().filter(|f| !f.is_empty()) {
        lines.push(format!("Feedback: {feedback}"));
    }
    if !session.strengths.is_empty() {
        lines.push(format!("Strengths: {}", session.strengths.join(", ")));
    }
    if !session.improvements.is_empty() {
        lines.push(format!(
            "Areas for Improvement: {}",
            session.improvements.join(", ")
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::context::store::InMemoryContextStore;
    use crate::models::profile::profile_fixture;
    use crate::models::session::session_fixture;

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "sam@example.com".to_string(),
            name: Some("Sam".to_string()),
            password_hash: String::new(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn provider(store: Arc<InMemoryContextStore>) -> ContextProvider {
        ContextProvider::new(store, 5, 10)
    }

    #[tokio::test]
    async fn test_unknown_user_gets_empty_context_and_usable_prompt() {
        let provider = provider(Arc::new(InMemoryContextStore::new()));
        let user_id = Uuid::new_v4();

        assert!(provider.retrieve(user_id, None, 5).await.is_empty());

        let prompt = provider
            .build_personalized_prompt(user_id, InterviewType::General)
            .await;
        assert!(!prompt.is_empty());
        assert!(prompt.contains(prompts::NO_CONTEXT));
        assert!(prompt.contains("general"));
    }

    #[tokio::test]
    async fn test_store_outage_is_absorbed() {
        let store = Arc::new(InMemoryContextStore::new());
        store.go_offline();
        let provider = provider(store);
        let user_id = Uuid::new_v4();

        assert!(provider
            .retrieve(user_id, Some("anything"), 5)
            .await
            .is_empty());
        assert_eq!(
            provider
                .build_personalized_prompt(user_id, InterviewType::SystemDesign)
                .await,
            generic_prompt(InterviewType::SystemDesign)
        );
        assert_eq!(
            provider.user_summary(user_id).await,
            prompts::NEW_CANDIDATE_SUMMARY
        );
    }

    #[tokio::test]
    async fn test_prompt_carries_indexed_background() {
        let store = Arc::new(InMemoryContextStore::new());
        let provider = provider(store.clone());
        let user = user();
        let mut profile = profile_fixture(user.id);
        profile.current_role = Some("Data Engineer".to_string());
        profile.target_role = Some("Behavioral-heavy lead".to_string());

        let docs = build_documents(&user, Some(&profile), &[], &TextSplitter::default());
        store.replace_user_documents(user.id, &docs).await.unwrap();

        let prompt = provider
            .build_personalized_prompt(user.id, InterviewType::Behavioral)
            .await;
        assert!(prompt.contains("Currently working as Data Engineer"));
        assert!(!prompt.contains(prompts::NO_CONTEXT));

        let summary = provider.user_summary(user.id).await;
        assert!(summary.contains("Email: sam@example.com"));
    }

    #[tokio::test]
    async fn test_retrieve_respects_k() {
        let store = Arc::new(InMemoryContextStore::new());
        let provider = provider(store.clone());
        let user = user();
        let mut profile = profile_fixture(user.id);
        profile.resume_text = Some("x".repeat(2000));

        let docs = build_documents(&user, Some(&profile), &[], &TextSplitter::default());
        assert!(docs.len() > 3);
        store.replace_user_documents(user.id, &docs).await.unwrap();

        assert_eq!(provider.retrieve(user.id, None, 2).await.len(), 2);
        assert!(provider.retrieve(user.id, None, 0).await.is_empty());
    }

    #[test]
    fn test_no_profile_and_no_history_builds_nothing() {
        let docs = build_documents(&user(), None, &[], &TextSplitter::default());
        assert!(docs.is_empty());
    }

    #[test]
    fn test_documents_cover_every_category() {
        let user = user();
        let mut profile = profile_fixture(user.id);
        profile.bio = Some("Ten years in fintech".to_string());
        profile.resume_text = Some("Led the payments team.\n\nShipped a ledger.".to_string());

        let mut past = session_fixture(user.id, InterviewType::Technical);
        past.overall_score = Some(82.5);
        past.strengths = vec!["Clear structure".to_string()];

        let docs = build_documents(&user, Some(&profile), &[past.clone()], &TextSplitter::default());
        let categories: Vec<_> = docs.iter().map(|d| d.category).collect();
        assert_eq!(
            categories,
            vec![
                SnippetCategory::BasicInfo,
                SnippetCategory::Profile,
                SnippetCategory::ResumeChunk,
                SnippetCategory::SessionHistory,
            ]
        );

        let history = &docs[3];
        assert_eq!(history.source_session_id, Some(past.id));
        assert!(history.content.contains("Overall Score: 82.5/100"));
        assert!(history.content.contains("Strengths: Clear structure"));
    }
}
