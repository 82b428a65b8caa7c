//! `csvrag ingest`: load a CSV file and upsert its rows into a namespace.
//!
//! Flow: load → (empty? report and stop) → resolve options from config and
//! flags → (dry run? count and stop) → build provider and store → run the
//! core upsert pipeline → print a summary.

use anyhow::{Context, Result};
use std::path::Path;

use csv_rag_core::embedding::Embedder;
use csv_rag_core::models::Dataset;
use csv_rag_core::store::VectorStore;
use csv_rag_core::upsert::{
    plan_dataset, resolve_columns, upsert_dataset, UpsertObserver, UpsertOptions, UpsertReport,
};

use crate::config::Config;
use crate::dataset::load_csv;
use crate::embedding::create_provider;
use crate::progress::ProgressMode;
use crate::sqlite_store::SqliteStore;

/// Per-invocation overrides from the command line. `None` falls back to
/// the `[ingest]` config section.
#[derive(Debug, Clone, Default)]
pub struct IngestArgs {
    pub id_cols: Vec<String>,
    pub id_prefix: Option<String>,
    pub text_cols: Vec<String>,
    pub meta_cols: Vec<String>,
    pub auto_text_only: bool,
    pub batch_size: Option<usize>,
    pub max_chars: Option<usize>,
    pub dry_run: bool,
    pub progress: Option<ProgressMode>,
}

fn non_empty(cols: &[String]) -> Option<Vec<String>> {
    (!cols.is_empty()).then(|| cols.to_vec())
}

/// Merge config defaults with command-line overrides.
pub fn build_options(config: &Config, args: &IngestArgs) -> UpsertOptions {
    UpsertOptions {
        id_cols: non_empty(&args.id_cols),
        id_prefix: args
            .id_prefix
            .clone()
            .unwrap_or_else(|| config.ingest.id_prefix.clone()),
        text_cols: non_empty(&args.text_cols),
        meta_cols: non_empty(&args.meta_cols),
        auto_text_only: args.auto_text_only || config.ingest.auto_text_only,
        batch_size: args.batch_size.unwrap_or(config.ingest.batch_size),
        max_chars: args.max_chars.unwrap_or(config.ingest.max_chars),
    }
}

/// Ingest an already-loaded dataset through any store and embedder.
pub async fn ingest_dataset(
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
    dataset: &Dataset,
    namespace: &str,
    options: &UpsertOptions,
    observer: &dyn UpsertObserver,
) -> Result<UpsertReport> {
    upsert_dataset(store, embedder, dataset, namespace, options, observer)
        .await
        .with_context(|| format!("Ingest into namespace '{}' failed", namespace))
}

/// CLI entry point.
pub async fn run_ingest(
    config: &Config,
    csv_path: &Path,
    namespace: &str,
    args: &IngestArgs,
) -> Result<()> {
    let dataset = load_csv(csv_path)?;
    if dataset.is_empty() {
        println!("No data found in {}", csv_path.display());
        return Ok(());
    }

    println!("ingest {} -> {}", csv_path.display(), namespace);
    println!("  rows loaded: {}", dataset.len());
    println!("  columns: {}", dataset.schema().names().join(", "));

    let options = build_options(config, args);
    if options.batch_size == 0 {
        anyhow::bail!("--batch-size must be > 0");
    }
    if options.max_chars == 0 {
        anyhow::bail!("--max-chars must be > 0");
    }
    // Reject unknown columns before opening anything
    let plan = resolve_columns(dataset.schema(), &options)?;
    tracing::debug!(
        text_cols = ?plan.text_cols,
        meta_cols = ?plan.meta_cols,
        id_cols = ?plan.id_cols,
        "resolved columns"
    );

    if args.dry_run {
        let report = plan_dataset(&dataset, &options)?;
        println!("  dry run: {} documents in {} batches", report.documents, report.batches);
        println!("ok");
        return Ok(());
    }

    let provider = create_provider(&config.embedding)?;
    let store = SqliteStore::open(config).await?;
    let observer = args
        .progress
        .unwrap_or_else(ProgressMode::default_for_tty)
        .observer(namespace);

    tracing::info!(
        namespace,
        rows = dataset.len(),
        model = provider.model_name(),
        "starting ingest"
    );
    let result = ingest_dataset(
        &store,
        provider.as_ref(),
        &dataset,
        namespace,
        &options,
        observer.as_ref(),
    )
    .await;
    store.close().await;
    let report = result?;

    println!("  documents written: {}", report.documents);
    println!("  batches: {}", report.batches);
    println!("ok");
    Ok(())
}
