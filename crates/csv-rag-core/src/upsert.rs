//! Batched row-to-document upsert pipeline.
//!
//! For each row, in dataset order:
//!
//! 1. assemble text from the text columns and split it into chunks
//! 2. project the metadata columns, adding chunk bookkeeping when the row
//!    produced more than one chunk
//! 3. derive one deterministic id per chunk
//!
//! Documents accumulate in a buffer. Whenever the buffer holds
//! `batch_size` documents it is embedded in one call and upserted in one
//! call, then cleared. The remainder is flushed after the last row.
//! Flushing happens per document, so the chunks of a long row may land in
//! two consecutive batches.
//!
//! Because ids are deterministic and the store upserts by id, running the
//! pipeline twice over the same data leaves the store unchanged.

use anyhow::{bail, Context, Result};
use serde::Serialize;

use crate::chunk::{assemble_text, chunk_row_text, select_text_columns};
use crate::embedding::{embed_batch, Embedder};
use crate::key::document_id;
use crate::metadata::{annotate_chunk, project_metadata};
use crate::models::{Dataset, Metadata, RowRef, Schema};
use crate::store::{Collection, DistanceMetric, UpsertBatch, VectorStore};

/// Default number of documents per embed/upsert call.
pub const DEFAULT_BATCH_SIZE: usize = 64;
/// Default chunk window, in characters.
pub const DEFAULT_MAX_CHARS: usize = 1500;

/// Caller-tunable pipeline options.
#[derive(Debug, Clone)]
pub struct UpsertOptions {
    /// Columns whose values form the id key. `None` (or empty) uses every
    /// column plus a chunk marker.
    pub id_cols: Option<Vec<String>>,
    pub id_prefix: String,
    /// Columns assembled into document text. `None` selects automatically.
    pub text_cols: Option<Vec<String>>,
    /// Columns projected into metadata. `None` means all columns.
    pub meta_cols: Option<Vec<String>>,
    pub auto_text_only: bool,
    pub batch_size: usize,
    pub max_chars: usize,
}

impl Default for UpsertOptions {
    fn default() -> Self {
        Self {
            id_cols: None,
            id_prefix: String::new(),
            text_cols: None,
            meta_cols: None,
            auto_text_only: false,
            batch_size: DEFAULT_BATCH_SIZE,
            max_chars: DEFAULT_MAX_CHARS,
        }
    }
}

/// Column selections resolved against a schema, once per dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPlan {
    pub id_cols: Option<Vec<String>>,
    pub text_cols: Vec<String>,
    pub meta_cols: Vec<String>,
}

/// Resolve text and metadata columns and reject any caller-named column
/// the schema does not have.
pub fn resolve_columns(schema: &Schema, opts: &UpsertOptions) -> Result<ColumnPlan> {
    let named = [
        ("id", opts.id_cols.as_deref()),
        ("text", opts.text_cols.as_deref()),
        ("metadata", opts.meta_cols.as_deref()),
    ];
    for (role, cols) in named {
        let unknown: Vec<&str> = cols
            .unwrap_or_default()
            .iter()
            .filter(|c| !schema.contains(c))
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            bail!(
                "unknown {} column(s): {} (available: {})",
                role,
                unknown.join(", "),
                schema.names().join(", ")
            );
        }
    }

    Ok(ColumnPlan {
        id_cols: opts.id_cols.clone().filter(|c| !c.is_empty()),
        text_cols: select_text_columns(schema, opts.text_cols.as_deref(), opts.auto_text_only),
        meta_cols: opts.meta_cols.clone().unwrap_or_else(|| schema.names()),
    })
}

/// A document ready to be embedded and written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
}

/// Build every document a row produces, one per chunk.
pub fn documents_for_row(
    row: &RowRef<'_>,
    plan: &ColumnPlan,
    id_prefix: &str,
    max_chars: usize,
) -> Vec<Document> {
    let text = assemble_text(row, &plan.text_cols);
    let base = project_metadata(row, &plan.meta_cols);
    chunk_row_text(&text, max_chars)
        .into_iter()
        .map(|chunk| {
            let mut metadata = base.clone();
            annotate_chunk(&mut metadata, chunk.index, chunk.count);
            Document {
                id: document_id(
                    row,
                    plan.id_cols.as_deref(),
                    id_prefix,
                    chunk.index,
                    chunk.count,
                ),
                text: chunk.text,
                metadata,
            }
        })
        .collect()
}

/// Outcome of a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpsertReport {
    pub rows: usize,
    pub documents: usize,
    pub batches: usize,
}

/// Emitted after each batch is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFlush {
    /// One-based batch number.
    pub batch: usize,
    pub size: usize,
    /// Documents written so far, including this batch.
    pub documents_written: usize,
    /// Rows fully or partially consumed so far.
    pub rows_seen: usize,
    pub rows_total: usize,
}

/// Receives pipeline progress. Implementations must not fail.
pub trait UpsertObserver: Send + Sync {
    fn on_batch(&self, flush: &BatchFlush);
}

/// Observer that ignores every event.
pub struct NoopObserver;

impl UpsertObserver for NoopObserver {
    fn on_batch(&self, _flush: &BatchFlush) {}
}

/// Count rows, documents, and batches a run would produce, without
/// embedding or writing anything.
pub fn plan_dataset(dataset: &Dataset, opts: &UpsertOptions) -> Result<UpsertReport> {
    if dataset.is_empty() {
        return Ok(UpsertReport::default());
    }
    let batch_size = checked_batch_size(opts)?;
    let plan = resolve_columns(dataset.schema(), opts)?;
    let documents: usize = dataset
        .rows()
        .map(|row| documents_for_row(&row, &plan, &opts.id_prefix, opts.max_chars).len())
        .sum();
    Ok(UpsertReport {
        rows: dataset.len(),
        documents,
        batches: documents.div_ceil(batch_size),
    })
}

fn checked_batch_size(opts: &UpsertOptions) -> Result<usize> {
    if opts.batch_size == 0 {
        bail!("batch_size must be greater than zero");
    }
    Ok(opts.batch_size)
}

struct Flusher<'a> {
    store: &'a dyn VectorStore,
    embedder: &'a dyn Embedder,
    collection: Collection,
    observer: &'a dyn UpsertObserver,
    rows_total: usize,
    report: UpsertReport,
}

impl Flusher<'_> {
    async fn flush(&mut self, buffer: &mut Vec<Document>, rows_seen: usize) -> Result<()> {
        if buffer.is_empty() {
            return Ok(());
        }
        let docs = std::mem::take(buffer);
        let batch_no = self.report.batches + 1;

        let texts: Vec<String> = docs.iter().map(|d| d.text.clone()).collect();
        let embeddings = embed_batch(self.embedder, &texts)
            .await
            .with_context(|| format!("embedding batch {} ({} documents)", batch_no, docs.len()))?;

        let mut batch = UpsertBatch {
            embeddings,
            ..Default::default()
        };
        for doc in docs {
            batch.ids.push(doc.id);
            batch.documents.push(doc.text);
            batch.metadatas.push(doc.metadata);
        }
        let size = batch.len();

        self.store
            .upsert(&self.collection, batch)
            .await
            .with_context(|| {
                format!(
                    "writing batch {} to namespace '{}'",
                    batch_no, self.collection.name
                )
            })?;

        self.report.batches = batch_no;
        self.report.documents += size;
        tracing::debug!(
            namespace = %self.collection.name,
            batch = batch_no,
            size,
            "flushed batch"
        );
        self.observer.on_batch(&BatchFlush {
            batch: batch_no,
            size,
            documents_written: self.report.documents,
            rows_seen,
            rows_total: self.rows_total,
        });
        Ok(())
    }
}

/// Ingest a dataset into `namespace`.
///
/// An empty dataset is a no-op: the namespace is not even created. Any
/// store or embedding failure aborts the run; batches already written
/// stay written.
pub async fn upsert_dataset(
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
    dataset: &Dataset,
    namespace: &str,
    opts: &UpsertOptions,
    observer: &dyn UpsertObserver,
) -> Result<UpsertReport> {
    if dataset.is_empty() {
        tracing::info!(namespace, "dataset is empty, nothing to ingest");
        return Ok(UpsertReport::default());
    }
    let batch_size = checked_batch_size(opts)?;
    let plan = resolve_columns(dataset.schema(), opts)?;

    let collection = store
        .get_or_create(namespace, DistanceMetric::Cosine)
        .await
        .with_context(|| format!("opening namespace '{}'", namespace))?;

    let mut flusher = Flusher {
        store,
        embedder,
        collection,
        observer,
        rows_total: dataset.len(),
        report: UpsertReport::default(),
    };
    let mut buffer: Vec<Document> = Vec::with_capacity(batch_size);

    for (i, row) in dataset.rows().enumerate() {
        for doc in documents_for_row(&row, &plan, &opts.id_prefix, opts.max_chars) {
            buffer.push(doc);
            if buffer.len() >= batch_size {
                flusher.flush(&mut buffer, i + 1).await?;
            }
        }
    }
    flusher.flush(&mut buffer, dataset.len()).await?;

    let mut report = flusher.report;
    report.rows = dataset.len();
    tracing::info!(
        namespace,
        rows = report.rows,
        documents = report.documents,
        batches = report.batches,
        "ingest complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::hash_key;
    use crate::metadata::{CHUNK_COUNT_KEY, CHUNK_KEY};
    use crate::models::CellValue;
    use crate::store::memory::InMemoryStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Embeds text as (len, 1) and fails on the configured call.
    struct FakeEmbedder {
        calls: AtomicUsize,
        fail_on: Option<usize>,
    }

    impl FakeEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_on: None,
            }
        }
    }

    #[async_trait]
    impl Embedder for FakeEmbedder {
        fn model_name(&self) -> &str {
            "fake"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on == Some(call) {
                anyhow::bail!("model exploded");
            }
            Ok(texts
                .iter()
                .map(|t| vec![t.len() as f32 + 1.0, 1.0])
                .collect())
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<BatchFlush>>);

    impl UpsertObserver for Recorder {
        fn on_batch(&self, flush: &BatchFlush) {
            self.0.lock().unwrap().push(flush.clone());
        }
    }

    fn example() -> Dataset {
        Dataset::from_rows(
            &["id", "text", "score"],
            vec![vec!["1".into(), "hello world".into(), CellValue::Int(5)]],
        )
        .unwrap()
    }

    fn opts() -> UpsertOptions {
        UpsertOptions {
            id_cols: Some(vec!["id".into()]),
            id_prefix: "x-".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_example_row() {
        let store = InMemoryStore::new();
        let embedder = FakeEmbedder::new();
        let report = upsert_dataset(&store, &embedder, &example(), "ns", &opts(), &NoopObserver)
            .await
            .unwrap();
        assert_eq!(
            report,
            UpsertReport {
                rows: 1,
                documents: 1,
                batches: 1
            }
        );

        let coll = store.get_or_create("ns", DistanceMetric::Cosine).await.unwrap();
        let id = hash_key("x-", "1");
        let doc = store.get(&coll, &id).await.unwrap().unwrap();
        assert_eq!(doc.text, "1 | hello world | 5");
        assert_eq!(
            serde_json::Value::Object(doc.metadata),
            json!({"id": "1", "text": "hello world", "score": 5})
        );
    }

    #[tokio::test]
    async fn test_reingest_is_idempotent() {
        let store = InMemoryStore::new();
        let embedder = FakeEmbedder::new();
        let ds = Dataset::from_rows(
            &["id", "body"],
            vec![
                vec!["a".into(), "x".repeat(25).into()],
                vec!["b".into(), "short".into()],
            ],
        )
        .unwrap();
        let o = UpsertOptions {
            max_chars: 10,
            ..opts()
        };

        upsert_dataset(&store, &embedder, &ds, "ns", &o, &NoopObserver)
            .await
            .unwrap();
        let coll = store.get_or_create("ns", DistanceMetric::Cosine).await.unwrap();
        let first = store.count(&coll).await.unwrap();

        upsert_dataset(&store, &embedder, &ds, "ns", &o, &NoopObserver)
            .await
            .unwrap();
        assert_eq!(store.count(&coll).await.unwrap(), first);
        assert_eq!(first, 4);
    }

    #[tokio::test]
    async fn test_batch_boundary_sizes() {
        let store = InMemoryStore::new();
        let embedder = FakeEmbedder::new();
        let rows = (0..5)
            .map(|i| vec![CellValue::Int(i), "row".into()])
            .collect();
        let ds = Dataset::from_rows(&["id", "t"], rows).unwrap();
        let o = UpsertOptions {
            batch_size: 2,
            ..opts()
        };
        let recorder = Recorder::default();

        let report = upsert_dataset(&store, &embedder, &ds, "ns", &o, &recorder)
            .await
            .unwrap();
        assert_eq!(store.upsert_calls(), vec![2, 2, 1]);
        assert_eq!(report.documents, 5);
        assert_eq!(report.batches, 3);

        let events = recorder.0.lock().unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[2].documents_written, 5);
        assert_eq!(events[2].rows_seen, 5);
    }

    #[tokio::test]
    async fn test_multi_chunk_row_may_span_batches() {
        let store = InMemoryStore::new();
        let embedder = FakeEmbedder::new();
        let ds = Dataset::from_rows(&["t"], vec![vec!["abcdefg".into()]]).unwrap();
        let o = UpsertOptions {
            batch_size: 2,
            max_chars: 3,
            ..Default::default()
        };
        upsert_dataset(&store, &embedder, &ds, "ns", &o, &NoopObserver)
            .await
            .unwrap();
        assert_eq!(store.upsert_calls(), vec![2, 1]);

        let coll = store.get_or_create("ns", DistanceMetric::Cosine).await.unwrap();
        let res = store.query(&coll, &[1.0, 0.0], 10, None).await.unwrap();
        let metas = res.metadatas.unwrap();
        for meta in metas[0].iter().flatten() {
            assert_eq!(meta[CHUNK_COUNT_KEY], json!(3));
            assert!(meta.contains_key(CHUNK_KEY));
        }
    }

    #[tokio::test]
    async fn test_empty_dataset_writes_nothing() {
        let store = InMemoryStore::new();
        let embedder = FakeEmbedder::new();
        let ds = Dataset::from_rows(&["a"], Vec::new()).unwrap();
        let report = upsert_dataset(&store, &embedder, &ds, "ns", &opts(), &NoopObserver)
            .await
            .unwrap();
        assert_eq!(report, UpsertReport::default());
        assert!(store.upsert_calls().is_empty());
        assert!(!store.has_namespace("ns"));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_embedding_failure_keeps_earlier_batches() {
        let store = InMemoryStore::new();
        let embedder = FakeEmbedder {
            calls: AtomicUsize::new(0),
            fail_on: Some(2),
        };
        let rows = (0..5)
            .map(|i| vec![CellValue::Int(i), "row".into()])
            .collect();
        let ds = Dataset::from_rows(&["id", "t"], rows).unwrap();
        let o = UpsertOptions {
            batch_size: 2,
            ..opts()
        };
        let err = upsert_dataset(&store, &embedder, &ds, "ns", &o, &NoopObserver)
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("model exploded"));
        assert_eq!(store.upsert_calls(), vec![2]);
    }

    #[tokio::test]
    async fn test_fallback_ids_separate_rows_differing_outside_text() {
        let store = InMemoryStore::new();
        let embedder = FakeEmbedder::new();
        let ds = Dataset::from_rows(
            &["text", "source"],
            vec![
                vec!["same".into(), "a".into()],
                vec!["same".into(), "b".into()],
            ],
        )
        .unwrap();
        let o = UpsertOptions {
            text_cols: Some(vec!["text".into()]),
            ..Default::default()
        };
        upsert_dataset(&store, &embedder, &ds, "ns", &o, &NoopObserver)
            .await
            .unwrap();
        let coll = store.get_or_create("ns", DistanceMetric::Cosine).await.unwrap();
        assert_eq!(store.count(&coll).await.unwrap(), 2);
    }

    #[test]
    fn test_unknown_columns_rejected() {
        let ds = example();
        let o = UpsertOptions {
            meta_cols: Some(vec!["nope".into()]),
            ..opts()
        };
        let err = resolve_columns(ds.schema(), &o).unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_plan_dataset_counts() {
        let ds = Dataset::from_rows(
            &["t"],
            vec![vec!["abcdefg".into()], vec![CellValue::Missing]],
        )
        .unwrap();
        let o = UpsertOptions {
            batch_size: 3,
            max_chars: 3,
            ..Default::default()
        };
        let report = plan_dataset(&ds, &o).unwrap();
        assert_eq!(
            report,
            UpsertReport {
                rows: 2,
                documents: 4,
                batches: 2
            }
        );
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let o = UpsertOptions {
            batch_size: 0,
            ..opts()
        };
        assert!(plan_dataset(&example(), &o).is_err());
    }
}
