//! Vector store abstraction.
//!
//! The [`VectorStore`] trait is the collaborator the upsert pipeline and
//! the query helper talk to: namespaced collections, upsert by id, and
//! nearest-neighbour query with an optional metadata filter. Backends
//! live behind it (in-memory here, SQLite in the app crate).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Serialize;

use crate::filter::Filter;
use crate::models::Metadata;

/// Similarity metric a collection ranks by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
}

impl DistanceMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cosine" => Ok(DistanceMetric::Cosine),
            other => bail!("Unsupported distance metric: '{}'. Supported: cosine", other),
        }
    }
}

/// Handle to a namespaced collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    pub name: String,
    pub metric: DistanceMetric,
}

/// One write: parallel lists of ids, texts, metadata, and embeddings.
#[derive(Debug, Clone, Default)]
pub struct UpsertBatch {
    pub ids: Vec<String>,
    pub documents: Vec<String>,
    pub metadatas: Vec<Metadata>,
    pub embeddings: Vec<Vec<f32>>,
}

impl UpsertBatch {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Check that all four lists have the same length.
    pub fn validate(&self) -> Result<()> {
        let n = self.ids.len();
        if self.documents.len() != n || self.metadatas.len() != n || self.embeddings.len() != n {
            bail!(
                "upsert batch lists differ in length: ids={}, documents={}, metadatas={}, embeddings={}",
                n,
                self.documents.len(),
                self.metadatas.len(),
                self.embeddings.len()
            );
        }
        Ok(())
    }
}

/// Raw query response: parallel lists wrapped once per query text.
///
/// Any list may be absent in a partial result; consumers must default
/// missing entries rather than fail.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub ids: Option<Vec<Vec<String>>>,
    pub documents: Option<Vec<Vec<String>>>,
    pub metadatas: Option<Vec<Vec<Option<Metadata>>>>,
    pub distances: Option<Vec<Vec<f32>>>,
}

/// A document as stored, returned by [`VectorStore::get`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredDocument {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    #[serde(skip)]
    pub embedding: Vec<f32>,
}

/// A scored candidate produced while ranking a collection.
#[derive(Debug, Clone)]
pub struct Scored<'a> {
    pub doc: &'a StoredDocument,
    pub distance: f32,
}

/// Rank documents by ascending distance to `query` (ties by id),
/// applying `filter`, and keep the best `k`.
///
/// Shared by store backends that compute distances in process.
pub fn rank<'a>(
    docs: impl IntoIterator<Item = &'a StoredDocument>,
    metric: DistanceMetric,
    query: &[f32],
    k: usize,
    filter: Option<&Filter>,
) -> Vec<Scored<'a>> {
    let mut scored: Vec<Scored<'a>> = docs
        .into_iter()
        .filter(|d| filter.is_none_or(|f| f.matches(&d.metadata)))
        .map(|doc| Scored {
            doc,
            distance: match metric {
                DistanceMetric::Cosine => crate::embedding::cosine_distance(query, &doc.embedding),
            },
        })
        .collect();
    scored.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.doc.id.cmp(&b.doc.id))
    });
    scored.truncate(k);
    scored
}

/// Package ranked candidates as a single-query [`QueryResult`].
pub fn to_query_result(scored: &[Scored<'_>]) -> QueryResult {
    QueryResult {
        ids: Some(vec![scored.iter().map(|s| s.doc.id.clone()).collect()]),
        documents: Some(vec![scored.iter().map(|s| s.doc.text.clone()).collect()]),
        metadatas: Some(vec![scored
            .iter()
            .map(|s| Some(s.doc.metadata.clone()))
            .collect()]),
        distances: Some(vec![scored.iter().map(|s| s.distance).collect()]),
    }
}

/// Namespace name and document count, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamespaceInfo {
    pub name: String,
    pub metric: DistanceMetric,
    pub count: usize,
}

/// Abstract vector store backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`get_or_create`](VectorStore::get_or_create) | Open a namespace, creating it on first use |
/// | [`upsert`](VectorStore::upsert) | Insert or overwrite documents by id |
/// | [`query`](VectorStore::query) | Nearest neighbours of a vector |
/// | [`get`](VectorStore::get) | Fetch one document by id |
/// | [`count`](VectorStore::count) | Number of documents in a namespace |
/// | [`list_namespaces`](VectorStore::list_namespaces) | All namespaces with counts |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Open `namespace`, creating it with `metric` if it does not exist.
    ///
    /// Fails if the namespace exists with a different metric.
    async fn get_or_create(&self, namespace: &str, metric: DistanceMetric) -> Result<Collection>;

    /// Insert or overwrite every document in `batch`.
    async fn upsert(&self, collection: &Collection, batch: UpsertBatch) -> Result<()>;

    /// Return up to `k` documents nearest to `query`, most similar first.
    async fn query(
        &self,
        collection: &Collection,
        query: &[f32],
        k: usize,
        filter: Option<&Filter>,
    ) -> Result<QueryResult>;

    /// Fetch a single document by id.
    async fn get(&self, collection: &Collection, id: &str) -> Result<Option<StoredDocument>>;

    /// Number of documents stored in the collection.
    async fn count(&self, collection: &Collection) -> Result<usize>;

    /// All namespaces, sorted by name.
    async fn list_namespaces(&self) -> Result<Vec<NamespaceInfo>>;
}
