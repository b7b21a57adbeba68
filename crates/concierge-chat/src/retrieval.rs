//! Passage retrieval seam.
//!
//! Index building and embeddings live outside this crate. The pipeline
//! only needs something that returns scored passages for a query.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use crate::confidence::keywords;
use crate::error::ChatError;
use crate::types::RetrievedDocument;

#[async_trait]
pub trait Retriever: Send + Sync {
    /// Up to `k` passages for `query`, best first.
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedDocument>, ChatError>;
}

/// JSON passage file entry: a bare string or a full document.
#[derive(Deserialize)]
#[serde(untagged)]
enum PassageRecord {
    Text(String),
    Document(RetrievedDocument),
}

/// Keyword-overlap retriever over an in-memory passage list.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRetriever {
    documents: Vec<RetrievedDocument>,
}

impl InMemoryRetriever {
    pub fn new(documents: Vec<RetrievedDocument>) -> Self {
        Self { documents }
    }

    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(texts.into_iter().map(RetrievedDocument::new).collect())
    }

    /// Parse a JSON array of passages.
    pub fn from_json_str(json: &str) -> Result<Self, ChatError> {
        let records: Vec<PassageRecord> = serde_json::from_str(json)
            .map_err(|e| ChatError::Retrieval(format!("invalid passage file: {}", e)))?;
        let documents = records
            .into_iter()
            .map(|r| match r {
                PassageRecord::Text(text) => RetrievedDocument::new(text),
                PassageRecord::Document(doc) => doc,
            })
            .collect();
        Ok(Self::new(documents))
    }

    /// Load passages from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ChatError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| ChatError::Retrieval(format!("{}: {}", path.display(), e)))?;
        let retriever = Self::from_json_str(&json)?;
        tracing::info!(
            path = %path.display(),
            passages = retriever.len(),
            "Loaded knowledge passages"
        );
        Ok(retriever)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn score(terms: &[String], content: &str) -> f32 {
        if terms.is_empty() {
            return 0.0;
        }
        let content_terms = keywords(content);
        let hits = terms.iter().filter(|t| content_terms.contains(t)).count();
        hits as f32 / terms.len() as f32
    }
}

#[async_trait]
impl Retriever for InMemoryRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedDocument>, ChatError> {
        let terms = keywords(query);
        let mut scored: Vec<(f32, &RetrievedDocument)> = self
            .documents
            .iter()
            .map(|d| (Self::score(&terms, &d.content), d))
            .filter(|(s, _)| *s > 0.0)
            .collect();
        // Stable sort keeps file order among equal scores.
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(s, d)| d.clone().with_score(s))
            .collect())
    }
}
