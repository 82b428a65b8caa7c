//! Database statistics overview.
//!
//! Summarises what is indexed: namespaces, their document counts, and
//! when each was last written. Used by `csvrag stats`.

use anyhow::Result;
use serde::Serialize;
use sqlx::Row;
use std::collections::HashMap;

use csv_rag_core::store::VectorStore;

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

/// Per-namespace line of the report.
#[derive(Debug, Clone, Serialize)]
pub struct NamespaceStats {
    pub name: String,
    pub metric: String,
    pub documents: usize,
    pub last_write: Option<i64>,
}

/// Collect per-namespace stats.
pub async fn collect_stats(store: &SqliteStore) -> Result<Vec<NamespaceStats>> {
    let namespaces = store.list_namespaces().await?;

    let rows = sqlx::query(
        "SELECT collection, MAX(updated_at) AS last_write FROM documents GROUP BY collection",
    )
    .fetch_all(store.pool())
    .await?;
    let last_writes: HashMap<String, i64> = rows
        .iter()
        .map(|r| (r.get("collection"), r.get("last_write")))
        .collect();

    Ok(namespaces
        .into_iter()
        .map(|ns| NamespaceStats {
            last_write: last_writes.get(&ns.name).copied(),
            metric: ns.metric.to_string(),
            documents: ns.count,
            name: ns.name,
        })
        .collect())
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let stats = collect_stats(&store).await;
    store.close().await;
    let stats = stats?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);
    let total: usize = stats.iter().map(|s| s.documents).sum();

    println!("csv-rag: Database Stats");
    println!("========================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!("  Namespaces:  {}", stats.len());
    println!("  Documents:   {}", total);

    if !stats.is_empty() {
        println!();
        println!(
            "  {:<32} {:>8} {:>10}   {}",
            "NAMESPACE", "METRIC", "DOCUMENTS", "LAST WRITE"
        );
        println!("  {}", "-".repeat(72));
        for s in &stats {
            let last = match s.last_write {
                Some(ts) => format_ts_relative(ts),
                None => "never".to_string(),
            };
            println!(
                "  {:<32} {:>8} {:>10}   {}",
                s.name, s.metric, s.documents, last
            );
        }
    }

    println!();
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;

    if delta < 0 {
        format_ts_iso(ts)
    } else if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn test_format_ts_relative() {
        let now = chrono::Utc::now().timestamp();
        assert_eq!(format_ts_relative(now), "just now");
        assert_eq!(format_ts_relative(now - 7200), "2 hours ago");
        assert_eq!(format_ts_relative(now - 86400), "1 day ago");
    }
}
