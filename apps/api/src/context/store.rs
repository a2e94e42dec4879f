//! Context Store: pluggable, trait-based storage for each user's searchable corpus.
//!
//! Default: `PgContextStore` (Postgres full-text ranking, no extra infrastructure).
//! Tests use `InMemoryContextStore` (term overlap, can simulate an outage).
//!
//! `ContextProvider` holds an `Arc<dyn ContextStore>`. Every query is scoped to one user.

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use tracing::debug;
use uuid::Uuid;

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnippetCategory {
    BasicInfo,
    Profile,
    ResumeChunk,
    SessionHistory,
}

impl SnippetCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnippetCategory::BasicInfo => "basic_info",
            SnippetCategory::Profile => "profile",
            SnippetCategory::ResumeChunk => "resume_chunk",
            SnippetCategory::SessionHistory => "session_history",
        }
    }
}

impl fmt::Display for SnippetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SnippetCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic_info" => Ok(SnippetCategory::BasicInfo),
            "profile" => Ok(SnippetCategory::Profile),
            "resume_chunk" => Ok(SnippetCategory::ResumeChunk),
            "session_history" => Ok(SnippetCategory::SessionHistory),
            other => Err(format!("unknown snippet category '{other}'")),
        }
    }
}

/// A unit of the corpus as written by `index`.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextDocument {
    pub category: SnippetCategory,
    pub content: String,
    pub chunk_index: Option<i32>,
    pub source_session_id: Option<Uuid>,
}

impl ContextDocument {
    pub fn new(category: SnippetCategory, content: impl Into<String>) -> Self {
        Self {
            category,
            content: content.into(),
            chunk_index: None,
            source_session_id: None,
        }
    }
}

/// A retrieved snippet. `rank` is only meaningful relative to its siblings.
#[derive(Debug, Clone, Serialize)]
pub struct ContextSnippet {
    pub content: String,
    pub category: SnippetCategory,
    pub rank: f32,
}

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Replaces the user's whole corpus. Returns the number of documents written.
    async fn replace_user_documents(
        &self,
        user_id: Uuid,
        documents: &[ContextDocument],
    ) -> Result<usize>;

    /// Returns at most `k` of the user's snippets, most relevant to `query` first.
    async fn similarity_search(
        &self,
        user_id: Uuid,
        query: &str,
        k: usize,
    ) -> Result<Vec<ContextSnippet>>;
}

/// Lowercased alphanumeric terms of a free-text query.
pub fn query_terms(query: &str) -> Vec<String> {
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Postgres full-text store
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct PgContextStore {
    pool: PgPool,
}

impl PgContextStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct SnippetRow {
    content: String,
    category: String,
    rank: f32,
}

#[async_trait]
impl ContextStore for PgContextStore {
    async fn replace_user_documents(
        &self,
        user_id: Uuid,
        documents: &[ContextDocument],
    ) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM context_documents WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        for doc in documents {
            sqlx::query(
                r#"
                INSERT INTO context_documents
                    (user_id, category, content, chunk_index, source_session_id)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(user_id)
            .bind(doc.category.as_str())
            .bind(&doc.content)
            .bind(doc.chunk_index)
            .bind(doc.source_session_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(documents.len())
    }

    async fn similarity_search(
        &self,
        user_id: Uuid,
        query: &str,
        k: usize,
    ) -> Result<Vec<ContextSnippet>> {
        let limit = i64::try_from(k).unwrap_or(i64::MAX);
        let terms = query_terms(query);

        // OR-ed terms so partial matches still rank; non-matching rows trail at rank 0.
        let rows: Vec<SnippetRow> = if terms.is_empty() {
            sqlx::query_as(
                r#"
                SELECT content, category, 0::real AS rank
                FROM context_documents
                WHERE user_id = $1
                ORDER BY created_at DESC, chunk_index ASC NULLS FIRST
                LIMIT $2
                "#,
            )
            .bind(user_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query_as(
                r#"
                SELECT content, category,
                       ts_rank(search_vector, to_tsquery('english', $2)) AS rank
                FROM context_documents
                WHERE user_id = $1
                ORDER BY rank DESC, created_at DESC, chunk_index ASC NULLS FIRST
                LIMIT $3
                "#,
            )
            .bind(user_id)
            .bind(terms.join(" | "))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        };

        debug!("Context search for user {user_id} returned {} rows", rows.len());

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let category = row.category.parse().ok()?;
                Some(ContextSnippet {
                    content: row.content,
                    category,
                    rank: row.rank,
                })
            })
            .collect())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory store (tests)
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
pub use in_memory::InMemoryContextStore;

#[cfg(test)]
mod in_memory {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use uuid::Uuid;

    use super::{query_terms, ContextDocument, ContextSnippet, ContextStore};

    /// Ranks by how many query terms a document contains.
    #[derive(Default)]
    pub struct InMemoryContextStore {
        documents: Mutex<HashMap<Uuid, Vec<ContextDocument>>>,
        offline: AtomicBool,
    }

    impl InMemoryContextStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Makes every subsequent call fail, as if the backing service were down.
        pub fn go_offline(&self) {
            self.offline.store(true, Ordering::SeqCst);
        }

        pub fn document_count(&self, user_id: Uuid) -> usize {
            self.documents
                .lock()
                .map(|docs| docs.get(&user_id).map_or(0, Vec::len))
                .unwrap_or(0)
        }

        fn check_online(&self) -> Result<()> {
            if self.offline.load(Ordering::SeqCst) {
                bail!("context store unavailable");
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ContextStore for InMemoryContextStore {
        async fn replace_user_documents(
            &self,
            user_id: Uuid,
            documents: &[ContextDocument],
        ) -> Result<usize> {
            self.check_online()?;
            let mut all = self
                .documents
                .lock()
                .map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
            all.insert(user_id, documents.to_vec());
            Ok(documents.len())
        }

        async fn similarity_search(
            &self,
            user_id: Uuid,
            query: &str,
            k: usize,
        ) -> Result<Vec<ContextSnippet>> {
            self.check_online()?;
            let terms = query_terms(query);
            let all = self
                .documents
                .lock()
                .map_err(|_| anyhow::anyhow!("store lock poisoned"))?;

            let mut ranked: Vec<ContextSnippet> = all
                .get(&user_id)
                .into_iter()
                .flatten()
                .map(|doc| {
                    let haystack = doc.content.to_lowercase();
                    let hits = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
                    ContextSnippet {
                        content: doc.content.clone(),
                        category: doc.category,
                        rank: hits as f32,
                    }
                })
                .collect();

            ranked.sort_by(|a, b| b.rank.total_cmp(&a.rank));
            ranked.truncate(k);
            Ok(ranked)
        }
    }
}
