//! Ingest progress reporting.
//!
//! Emits one event per flushed batch while `csvrag ingest` runs, so users
//! can see how far along a large file is. Progress goes to **stderr** so
//! stdout stays parseable for scripts.

use std::io::Write;

use csv_rag_core::upsert::{BatchFlush, UpsertObserver};

/// Human-friendly progress on stderr:
/// `ingest reviews  batch 3  192 documents  (120 / 5,000 rows)`.
pub struct StderrProgress {
    namespace: String,
}

impl UpsertObserver for StderrProgress {
    fn on_batch(&self, flush: &BatchFlush) {
        let line = format!(
            "ingest {}  batch {}  {} documents  ({} / {} rows)\n",
            self.namespace,
            flush.batch,
            format_number(flush.documents_written as u64),
            format_number(flush.rows_seen as u64),
            format_number(flush.rows_total as u64),
        );
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress {
    namespace: String,
}

impl UpsertObserver for JsonProgress {
    fn on_batch(&self, flush: &BatchFlush) {
        let obj = serde_json::json!({
            "event": "progress",
            "namespace": self.namespace,
            "batch": flush.batch,
            "size": flush.size,
            "documents": flush.documents_written,
            "rows": flush.rows_seen,
            "total_rows": flush.rows_total,
        });
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Build an observer for this mode.
    pub fn observer(&self, namespace: &str) -> Box<dyn UpsertObserver> {
        let namespace = namespace.to_string();
        match self {
            ProgressMode::Off => Box::new(csv_rag_core::upsert::NoopObserver),
            ProgressMode::Human => Box::new(StderrProgress { namespace }),
            ProgressMode::Json => Box::new(JsonProgress { namespace }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn observers_accept_events() {
        let flush = BatchFlush {
            batch: 1,
            size: 2,
            documents_written: 2,
            rows_seen: 2,
            rows_total: 5,
        };
        for mode in [ProgressMode::Off, ProgressMode::Human, ProgressMode::Json] {
            mode.observer("ns").on_batch(&flush);
        }
    }
}
