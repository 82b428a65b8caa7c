//! `csvrag query`: semantic retrieval from one namespace.
//!
//! Retrieval is best-effort. A namespace that does not exist, an empty
//! namespace, or a failing store or provider all print no hits and exit
//! successfully; only an unparseable `--where` filter is a usage error.

use anyhow::{Context, Result};

use csv_rag_core::embedding::Embedder;
use csv_rag_core::filter::Filter;
use csv_rag_core::query::{query_namespace, QueryHit};
use csv_rag_core::store::VectorStore;

use crate::config::Config;
use crate::embedding::create_provider;
use crate::sqlite_store::SqliteStore;

/// Query a namespace without creating it.
///
/// The core helper opens namespaces with get-or-create; checking first
/// keeps read-only queries from leaving empty namespaces behind.
pub async fn search_namespace(
    store: &SqliteStore,
    embedder: &dyn Embedder,
    namespace: &str,
    text: &str,
    k: usize,
    filter: Option<&Filter>,
) -> Vec<QueryHit> {
    match store.find_collection(namespace).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            tracing::debug!(namespace, "namespace does not exist");
            return Vec::new();
        }
        Err(e) => {
            tracing::warn!(namespace, error = %format!("{:#}", e), "store unavailable");
            return Vec::new();
        }
    }
    query_namespace(store as &dyn VectorStore, embedder, namespace, text, k, filter).await
}

/// CLI entry point.
pub async fn run_query(
    config: &Config,
    namespace: &str,
    text: &str,
    k: Option<usize>,
    where_json: Option<&str>,
    json: bool,
) -> Result<()> {
    let filter = where_json
        .map(Filter::from_json_str)
        .transpose()
        .context("Invalid --where filter")?;
    let k = k.unwrap_or(config.retrieval.default_k);

    let hits = match SqliteStore::open(config).await {
        Ok(store) => {
            let hits = match create_provider(&config.embedding) {
                Ok(provider) => {
                    search_namespace(&store, provider.as_ref(), namespace, text, k, filter.as_ref())
                        .await
                }
                Err(e) => {
                    tracing::warn!(error = %format!("{:#}", e), "embedding provider unavailable");
                    Vec::new()
                }
            };
            store.close().await;
            hits
        }
        Err(e) => {
            tracing::warn!(error = %format!("{:#}", e), "store unavailable");
            Vec::new()
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        let distance = hit
            .distance
            .map(|d| format!("{:.4}", d))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}. [{}] {}",
            i + 1,
            distance,
            hit.id.as_deref().unwrap_or("(no id)")
        );
        println!("    text: {}", snippet(hit.text.as_deref().unwrap_or(""), 200));
        if !hit.metadata.is_empty() {
            println!("    metadata: {}", serde_json::Value::Object(hit.metadata.clone()));
        }
        println!();
    }

    Ok(())
}

/// First `max` characters of `text`, with an ellipsis when cut.
fn snippet(text: &str, max: usize) -> String {
    let mut out: String = text.chars().take(max).collect();
    if text.chars().nth(max).is_some() {
        out.push('…');
    }
    out.replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippet() {
        assert_eq!(snippet("short", 10), "short");
        assert_eq!(snippet("abcdef", 3), "abc…");
        assert_eq!(snippet("a\nb", 10), "a b");
    }
}
