//! Document retrieval by id.
//!
//! Fetches one stored document from a namespace. Used by `csvrag get`.

use anyhow::{bail, Result};
use serde::Serialize;

use csv_rag_core::models::Metadata;
use csv_rag_core::store::VectorStore;

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

/// A stored document as printed by `csvrag get`.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentResponse {
    pub namespace: String,
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    pub dims: usize,
}

/// Fetch a document, failing if the namespace or id is unknown.
pub async fn get_document(config: &Config, namespace: &str, id: &str) -> Result<DocumentResponse> {
    let store = SqliteStore::open(config).await?;
    let result = fetch(&store, namespace, id).await;
    store.close().await;
    result
}

async fn fetch(store: &SqliteStore, namespace: &str, id: &str) -> Result<DocumentResponse> {
    let Some(collection) = store.find_collection(namespace).await? else {
        bail!("namespace not found: {}", namespace);
    };
    let Some(doc) = store.get(&collection, id).await? else {
        bail!("document not found: {}", id);
    };
    Ok(DocumentResponse {
        namespace: collection.name,
        id: doc.id,
        text: doc.text,
        metadata: doc.metadata,
        dims: doc.embedding.len(),
    })
}

/// CLI entry point: print the document or exit non-zero.
pub async fn run_get(config: &Config, namespace: &str, id: &str, json: bool) -> Result<()> {
    let doc = get_document(config, namespace, id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!("--- Document ---");
    println!("namespace:    {}", doc.namespace);
    println!("id:           {}", doc.id);
    println!("dims:         {}", doc.dims);
    println!("metadata:     {}", serde_json::Value::Object(doc.metadata.clone()));
    println!();
    println!("--- Text ---");
    println!("{}", doc.text);

    Ok(())
}
