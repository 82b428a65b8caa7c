//! In-memory [`VectorStore`] implementation for tests and embedding.
//!
//! Namespaces are `BTreeMap`s of documents behind `std::sync::RwLock`.
//! Query is brute-force cosine distance over every document in the
//! namespace. Each upsert call's batch size is recorded so callers can
//! observe how a pipeline split its writes.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, RwLock};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::filter::Filter;

use super::{
    rank, to_query_result, Collection, DistanceMetric, NamespaceInfo, QueryResult, StoredDocument,
    UpsertBatch, VectorStore,
};

struct Namespace {
    metric: DistanceMetric,
    docs: BTreeMap<String, StoredDocument>,
}

/// In-memory vector store.
pub struct InMemoryStore {
    namespaces: RwLock<HashMap<String, Namespace>>,
    upserts: Mutex<Vec<(String, usize)>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            namespaces: RwLock::new(HashMap::new()),
            upserts: Mutex::new(Vec::new()),
        }
    }

    /// Size of every upsert call so far, in call order.
    pub fn upsert_calls(&self) -> Vec<usize> {
        self.upserts
            .lock()
            .map(|log| log.iter().map(|(_, n)| *n).collect())
            .unwrap_or_default()
    }

    /// Namespaces touched by upsert calls, in call order.
    pub fn upsert_namespaces(&self) -> Vec<String> {
        self.upserts
            .lock()
            .map(|log| log.iter().map(|(ns, _)| ns.clone()).collect())
            .unwrap_or_default()
    }

    /// Whether `namespace` exists.
    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.namespaces
            .read()
            .map(|ns| ns.contains_key(namespace))
            .unwrap_or(false)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn get_or_create(&self, namespace: &str, metric: DistanceMetric) -> Result<Collection> {
        let mut namespaces = self.namespaces.write().map_err(poisoned)?;
        let ns = namespaces
            .entry(namespace.to_string())
            .or_insert_with(|| Namespace {
                metric,
                docs: BTreeMap::new(),
            });
        if ns.metric != metric {
            bail!(
                "namespace '{}' exists with metric {}, requested {}",
                namespace,
                ns.metric,
                metric
            );
        }
        Ok(Collection {
            name: namespace.to_string(),
            metric,
        })
    }

    async fn upsert(&self, collection: &Collection, batch: UpsertBatch) -> Result<()> {
        batch.validate()?;
        let size = batch.len();
        {
            let mut namespaces = self.namespaces.write().map_err(poisoned)?;
            let ns = namespaces
                .get_mut(&collection.name)
                .ok_or_else(|| anyhow!("namespace '{}' does not exist", collection.name))?;

            let UpsertBatch {
                ids,
                documents,
                metadatas,
                embeddings,
            } = batch;
            for (((id, text), metadata), embedding) in ids
                .into_iter()
                .zip(documents)
                .zip(metadatas)
                .zip(embeddings)
            {
                ns.docs.insert(
                    id.clone(),
                    StoredDocument {
                        id,
                        text,
                        metadata,
                        embedding,
                    },
                );
            }
        }
        self.upserts
            .lock()
            .map_err(poisoned)?
            .push((collection.name.clone(), size));
        Ok(())
    }

    async fn query(
        &self,
        collection: &Collection,
        query: &[f32],
        k: usize,
        filter: Option<&Filter>,
    ) -> Result<QueryResult> {
        let namespaces = self.namespaces.read().map_err(poisoned)?;
        let Some(ns) = namespaces.get(&collection.name) else {
            return Ok(QueryResult::default());
        };
        let ranked = rank(ns.docs.values(), ns.metric, query, k, filter);
        Ok(to_query_result(&ranked))
    }

    async fn get(&self, collection: &Collection, id: &str) -> Result<Option<StoredDocument>> {
        let namespaces = self.namespaces.read().map_err(poisoned)?;
        Ok(namespaces
            .get(&collection.name)
            .and_then(|ns| ns.docs.get(id).cloned()))
    }

    async fn count(&self, collection: &Collection) -> Result<usize> {
        let namespaces = self.namespaces.read().map_err(poisoned)?;
        Ok(namespaces
            .get(&collection.name)
            .map(|ns| ns.docs.len())
            .unwrap_or(0))
    }

    async fn list_namespaces(&self) -> Result<Vec<NamespaceInfo>> {
        let namespaces = self.namespaces.read().map_err(poisoned)?;
        let mut out: Vec<NamespaceInfo> = namespaces
            .iter()
            .map(|(name, ns)| NamespaceInfo {
                name: name.clone(),
                metric: ns.metric,
                count: ns.docs.len(),
            })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }
}
