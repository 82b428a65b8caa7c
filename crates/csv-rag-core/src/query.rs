//! Best-effort nearest-neighbour retrieval.
//!
//! [`query_namespace`] never fails: an unknown or empty namespace, an
//! unreachable store, or a failing embedder all yield an empty hit list
//! (with a warning logged). Partial store responses are tolerated field
//! by field.

use serde::Serialize;

use crate::embedding::{embed_one, Embedder};
use crate::filter::Filter;
use crate::models::Metadata;
use crate::store::{DistanceMetric, QueryResult, VectorStore};

/// One retrieved document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryHit {
    pub id: Option<String>,
    pub text: Option<String>,
    pub metadata: Metadata,
    pub distance: Option<f32>,
}

/// Flatten the first query's lists into hits.
///
/// Entries are driven by the longest list present; any list that is
/// absent or shorter contributes `None` (or empty metadata).
pub fn hits_from_result(result: QueryResult) -> Vec<QueryHit> {
    fn first<T>(outer: Option<Vec<Vec<T>>>) -> Vec<T> {
        outer
            .and_then(|lists| lists.into_iter().next())
            .unwrap_or_default()
    }

    let ids = first(result.ids);
    let documents = first(result.documents);
    let metadatas = first(result.metadatas);
    let distances = first(result.distances);

    let n = ids
        .len()
        .max(documents.len())
        .max(metadatas.len())
        .max(distances.len());

    let mut ids = ids.into_iter();
    let mut documents = documents.into_iter();
    let mut metadatas = metadatas.into_iter();
    let mut distances = distances.into_iter();

    (0..n)
        .map(|_| QueryHit {
            id: ids.next(),
            text: documents.next(),
            metadata: metadatas.next().flatten().unwrap_or_default(),
            distance: distances.next(),
        })
        .collect()
}

/// Retrieve up to `k` documents from `namespace` most similar to `text`,
/// ordered by ascending cosine distance.
pub async fn query_namespace(
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
    namespace: &str,
    text: &str,
    k: usize,
    filter: Option<&Filter>,
) -> Vec<QueryHit> {
    if k == 0 {
        return Vec::new();
    }
    match try_query(store, embedder, namespace, text, k, filter).await {
        Ok(hits) => hits,
        Err(e) => {
            tracing::warn!(namespace, error = %format!("{:#}", e), "query failed, returning no hits");
            Vec::new()
        }
    }
}

async fn try_query(
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
    namespace: &str,
    text: &str,
    k: usize,
    filter: Option<&Filter>,
) -> anyhow::Result<Vec<QueryHit>> {
    let collection = store.get_or_create(namespace, DistanceMetric::Cosine).await?;
    if store.count(&collection).await? == 0 {
        return Ok(Vec::new());
    }
    let vector = embed_one(embedder, text).await?;
    let result = store.query(&collection, &vector, k, filter).await?;
    let mut hits = hits_from_result(result);
    hits.truncate(k);
    Ok(hits)
}
