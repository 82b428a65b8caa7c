//! SQLite-backed [`VectorStore`] implementation.
//!
//! Each namespace is a row in `collections`; documents live in one table
//! keyed by `(collection, id)` with the embedding stored as a
//! little-endian `f32` BLOB. Queries load the namespace's vectors and rank
//! them in process, so the filter dialect is exactly the core one.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use csv_rag_core::embedding::{blob_to_vec, vec_to_blob};
use csv_rag_core::filter::Filter;
use csv_rag_core::models::Metadata;
use csv_rag_core::store::{
    rank, to_query_result, Collection, DistanceMetric, NamespaceInfo, QueryResult,
    StoredDocument, UpsertBatch, VectorStore,
};

use crate::config::Config;
use crate::{db, migrate};

/// SQLite implementation of the [`VectorStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect using the configured path and make sure the schema exists.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::ensure_schema(&pool)
            .await
            .context("Failed to create database schema")?;
        Ok(Self::new(pool))
    }

    /// Look up an existing namespace without creating it.
    pub async fn find_collection(&self, namespace: &str) -> Result<Option<Collection>> {
        let row = sqlx::query("SELECT metric FROM collections WHERE name = ?")
            .bind(namespace)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(r) => {
                let metric: String = r.get("metric");
                Ok(Some(Collection {
                    name: namespace.to_string(),
                    metric: metric.parse()?,
                }))
            }
            None => Ok(None),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn parse_metadata(json: &str) -> Metadata {
    serde_json::from_str(json).unwrap_or_default()
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn get_or_create(&self, namespace: &str, metric: DistanceMetric) -> Result<Collection> {
        if let Some(existing) = self.find_collection(namespace).await? {
            if existing.metric != metric {
                bail!(
                    "namespace '{}' exists with metric {}, requested {}",
                    namespace,
                    existing.metric,
                    metric
                );
            }
            return Ok(existing);
        }

        sqlx::query(
            "INSERT INTO collections (name, metric, created_at) VALUES (?, ?, ?) ON CONFLICT(name) DO NOTHING",
        )
        .bind(namespace)
        .bind(metric.as_str())
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        tracing::debug!(namespace, %metric, "created namespace");
        Ok(Collection {
            name: namespace.to_string(),
            metric,
        })
    }

    async fn upsert(&self, collection: &Collection, batch: UpsertBatch) -> Result<()> {
        batch.validate()?;
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        for (((id, text), metadata), embedding) in batch
            .ids
            .iter()
            .zip(&batch.documents)
            .zip(&batch.metadatas)
            .zip(&batch.embeddings)
        {
            let metadata_json = serde_json::to_string(metadata)?;
            sqlx::query(
                r#"
                INSERT INTO documents (collection, id, text, metadata_json, embedding, updated_at)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(collection, id) DO UPDATE SET
                    text = excluded.text,
                    metadata_json = excluded.metadata_json,
                    embedding = excluded.embedding,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&collection.name)
            .bind(id)
            .bind(text)
            .bind(&metadata_json)
            .bind(vec_to_blob(embedding))
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn query(
        &self,
        collection: &Collection,
        query: &[f32],
        k: usize,
        filter: Option<&Filter>,
    ) -> Result<QueryResult> {
        let rows = sqlx::query(
            "SELECT id, text, metadata_json, embedding FROM documents WHERE collection = ?",
        )
        .bind(&collection.name)
        .fetch_all(&self.pool)
        .await?;

        let docs: Vec<StoredDocument> = rows
            .iter()
            .map(|row| {
                let metadata_json: String = row.get("metadata_json");
                let blob: Vec<u8> = row.get("embedding");
                StoredDocument {
                    id: row.get("id"),
                    text: row.get("text"),
                    metadata: parse_metadata(&metadata_json),
                    embedding: blob_to_vec(&blob),
                }
            })
            .collect();

        let ranked = rank(&docs, collection.metric, query, k, filter);
        Ok(to_query_result(&ranked))
    }

    async fn get(&self, collection: &Collection, id: &str) -> Result<Option<StoredDocument>> {
        let row = sqlx::query(
            "SELECT id, text, metadata_json, embedding FROM documents WHERE collection = ? AND id = ?",
        )
        .bind(&collection.name)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| {
            let metadata_json: String = row.get("metadata_json");
            let blob: Vec<u8> = row.get("embedding");
            StoredDocument {
                id: row.get("id"),
                text: row.get("text"),
                metadata: parse_metadata(&metadata_json),
                embedding: blob_to_vec(&blob),
            }
        }))
    }

    async fn count(&self, collection: &Collection) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE collection = ?")
            .bind(&collection.name)
            .fetch_one(&self.pool)
            .await?;
        usize::try_from(n).map_err(|_| anyhow!("negative document count"))
    }

    async fn list_namespaces(&self) -> Result<Vec<NamespaceInfo>> {
        let rows = sqlx::query(
            r#"
            SELECT c.name AS name, c.metric AS metric, COUNT(d.id) AS doc_count
            FROM collections c
            LEFT JOIN documents d ON d.collection = c.name
            GROUP BY c.name, c.metric
            ORDER BY c.name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<NamespaceInfo> {
                let metric: String = row.get("metric");
                let count: i64 = row.get("doc_count");
                Ok(NamespaceInfo {
                    name: row.get("name"),
                    metric: metric.parse()?,
                    count: count.max(0) as usize,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    async fn open_temp() -> (TempDir, SqliteStore) {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.db.path = tmp.path().join("data").join("test.sqlite");
        let store = SqliteStore::open(&config).await.unwrap();
        (tmp, store)
    }

    fn batch(ids: &[&str], vectors: Vec<Vec<f32>>) -> UpsertBatch {
        UpsertBatch {
            ids: ids.iter().map(|s| s.to_string()).collect(),
            documents: ids.iter().map(|s| format!("doc {}", s)).collect(),
            metadatas: ids
                .iter()
                .map(|s| json!({"key": s, "missing": null}).as_object().unwrap().clone())
                .collect(),
            embeddings: vectors,
        }
    }

    #[tokio::test]
    async fn test_upsert_get_and_overwrite() {
        let (_tmp, store) = open_temp().await;
        let coll = store.get_or_create("ns", DistanceMetric::Cosine).await.unwrap();
        store
            .upsert(&coll, batch(&["a", "b"], vec![vec![1.0, 0.0], vec![0.0, 1.0]]))
            .await
            .unwrap();

        let a = store.get(&coll, "a").await.unwrap().unwrap();
        assert_eq!(a.text, "doc a");
        assert_eq!(a.metadata["missing"], serde_json::Value::Null);
        assert_eq!(a.embedding, vec![1.0, 0.0]);

        let mut again = batch(&["a"], vec![vec![0.6, 0.8]]);
        again.documents[0] = "new a".into();
        store.upsert(&coll, again).await.unwrap();

        assert_eq!(store.count(&coll).await.unwrap(), 2);
        assert_eq!(store.get(&coll, "a").await.unwrap().unwrap().text, "new a");
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let (_tmp, store) = open_temp().await;
        let one = store.get_or_create("one", DistanceMetric::Cosine).await.unwrap();
        let two = store.get_or_create("two", DistanceMetric::Cosine).await.unwrap();
        store
            .upsert(&one, batch(&["same"], vec![vec![1.0, 0.0]]))
            .await
            .unwrap();

        assert!(store.get(&two, "same").await.unwrap().is_none());
        let res = store.query(&two, &[1.0, 0.0], 5, None).await.unwrap();
        assert!(res.ids.unwrap()[0].is_empty());

        let listed = store.list_namespaces().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].name, "one");
        assert_eq!(listed[0].count, 1);
        assert_eq!(listed[1].count, 0);
    }

    #[tokio::test]
    async fn test_query_orders_and_truncates() {
        let (_tmp, store) = open_temp().await;
        let coll = store.get_or_create("ns", DistanceMetric::Cosine).await.unwrap();
        store
            .upsert(
                &coll,
                batch(
                    &["x", "y", "z"],
                    vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![0.7, 0.7]],
                ),
            )
            .await
            .unwrap();

        let res = store.query(&coll, &[1.0, 0.0], 2, None).await.unwrap();
        assert_eq!(res.ids.unwrap()[0], vec!["y", "z"]);

        let f = Filter::parse(&json!({"key": {"$in": ["x"]}})).unwrap();
        let res = store.query(&coll, &[1.0, 0.0], 2, Some(&f)).await.unwrap();
        assert_eq!(res.ids.unwrap()[0], vec!["x"]);
    }

    #[tokio::test]
    async fn test_find_collection_does_not_create() {
        let (_tmp, store) = open_temp().await;
        assert!(store.find_collection("ghost").await.unwrap().is_none());
        assert!(store.list_namespaces().await.unwrap().is_empty());
    }
}
