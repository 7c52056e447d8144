//! Corpus materialization.
//!
//! Pulls a labeled document collection from the datasets-server rows API and
//! persists it as a backslash-escaped, tab-delimited record stream:
//!
//! ```text
//! docid   title   text
//! 0#0     Title   Body text...
//! ```
//!
//! Records keep the source's iteration order, one per source document.

mod source;

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;

use evalcorpus_records::{Escaping, RecordWriter};
use evalcorpus_shared::{Corpus, EvalCorpusError, Result, SourceConfig};
use tracing::{info, instrument, warn};

pub use source::{DatasetsServerClient, RowsPage, SourceDocument, SourceRow};

/// Header line of every document stream.
pub const STREAM_HEADER: [&str; 3] = ["docid", "title", "text"];

/// Suffix of the in-progress stream file.
const PARTIAL_SUFFIX: &str = ".partial";

// ---------------------------------------------------------------------------
// Config / result
// ---------------------------------------------------------------------------

/// Inputs for one materialization.
#[derive(Debug, Clone)]
pub struct MaterializeConfig {
    /// Corpus to fetch.
    pub corpus: Corpus,
    /// Destination of the document stream.
    pub output: PathBuf,
    /// External source settings.
    pub source: SourceConfig,
}

/// Outcome of a successful materialization.
#[derive(Debug)]
pub struct MaterializeResult {
    /// Where the stream was written.
    pub path: PathBuf,
    /// Corpus that was fetched.
    pub corpus: Corpus,
    /// Documents written (header excluded).
    pub documents: usize,
    /// Total elapsed time.
    pub elapsed: std::time::Duration,
}

/// Progress callback for long fetches.
pub trait MaterializeProgress: Send + Sync {
    /// Called after each page is written.
    fn records_fetched(&self, current: usize, total: usize);
}

/// No-op progress for headless/test usage.
pub struct NoProgress;

impl MaterializeProgress for NoProgress {
    fn records_fetched(&self, _current: usize, _total: usize) {}
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

/// Fetch every document of `config.corpus` and write the record stream.
///
/// The stream is built in `<output>.partial` and renamed onto `output` only
/// once the last page is written and synced. On failure the partial file is
/// removed and `output` is left as it was.
#[instrument(skip_all, fields(corpus = %config.corpus, output = %config.output.display()))]
pub async fn materialize(
    config: &MaterializeConfig,
    progress: &dyn MaterializeProgress,
) -> Result<MaterializeResult> {
    let start = Instant::now();
    let client = DatasetsServerClient::new(&config.source)?;

    if let Some(parent) = config.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| EvalCorpusError::io(parent, e))?;
    }

    let partial = partial_path(&config.output);
    info!(corpus = %config.corpus, "materializing corpus");

    let written = write_stream(&client, config.corpus, &partial, progress)
        .await
        .and_then(|count| {
            std::fs::rename(&partial, &config.output)
                .map(|()| count)
                .map_err(|e| EvalCorpusError::io(&config.output, e))
        });
    let documents = match written {
        Ok(count) => count,
        Err(e) => {
            if let Err(rm) = std::fs::remove_file(&partial) {
                warn!(path = %partial.display(), error = %rm, "could not remove partial stream");
            }
            return Err(e);
        }
    };

    let result = MaterializeResult {
        path: config.output.clone(),
        corpus: config.corpus,
        documents,
        elapsed: start.elapsed(),
    };

    info!(
        documents = result.documents,
        elapsed_ms = result.elapsed.as_millis(),
        "corpus materialized"
    );

    Ok(result)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn partial_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Page through the source into `path`; returns the document count.
async fn write_stream(
    client: &DatasetsServerClient,
    corpus: Corpus,
    path: &Path,
    progress: &dyn MaterializeProgress,
) -> Result<usize> {
    let file = File::create(path).map_err(|e| EvalCorpusError::io(path, e))?;
    let mut writer = RecordWriter::new(BufWriter::new(file), Escaping::Backslash);
    writer
        .write_record(&STREAM_HEADER)
        .map_err(|e| EvalCorpusError::io(path, e))?;

    let mut offset = 0usize;
    loop {
        let page = client.fetch_page(corpus, offset).await?;
        if page.rows.is_empty() {
            break;
        }

        for entry in &page.rows {
            if entry.row_idx != offset {
                return Err(EvalCorpusError::SourceUnavailable(format!(
                    "{corpus}: expected row {offset}, source returned row {}",
                    entry.row_idx
                )));
            }
            if !entry.truncated_cells.is_empty() {
                return Err(EvalCorpusError::SourceUnavailable(format!(
                    "{corpus}: row {} has truncated cells {:?}",
                    entry.row_idx, entry.truncated_cells
                )));
            }

            let doc = &entry.row;
            writer
                .write_record(&[doc.docid.as_str(), doc.title.as_str(), doc.text.as_str()])
                .map_err(|e| EvalCorpusError::io(path, e))?;
            offset += 1;
        }

        progress.records_fetched(offset, page.num_rows_total);
        if offset >= page.num_rows_total {
            break;
        }
    }

    let buffered = writer.into_inner().map_err(|e| EvalCorpusError::io(path, e))?;
    let file = buffered
        .into_inner()
        .map_err(|e| EvalCorpusError::io(path, e.into_error()))?;
    file.sync_all().map_err(|e| EvalCorpusError::io(path, e))?;

    Ok(offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "evalcorpus-materializer-test-{}",
            uuid::Uuid::now_v7()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn config_for(server: &MockServer, output: PathBuf) -> MaterializeConfig {
        MaterializeConfig {
            corpus: Corpus::En,
            output,
            source: SourceConfig {
                base_url: server.uri(),
                page_size: 2,
                ..SourceConfig::default()
            },
        }
    }

    fn page(start: usize, docs: &[(&str, &str, &str)], total: usize) -> serde_json::Value {
        let rows: Vec<_> = docs
            .iter()
            .enumerate()
            .map(|(i, (id, title, text))| {
                serde_json::json!({
                    "row_idx": start + i,
                    "row": {"docid": id, "title": title, "text": text},
                    "truncated_cells": []
                })
            })
            .collect();
        serde_json::json!({"rows": rows, "num_rows_total": total})
    }

    async fn mount_page(server: &MockServer, offset: &str, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/rows"))
            .and(query_param("config", "en"))
            .and(query_param("offset", offset))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn writes_header_and_every_row_in_order() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            "0",
            page(0, &[("d1", "T1", "B1"), ("d2", "T2", "line\nbreak")], 3),
        )
        .await;
        mount_page(&server, "2", page(2, &[("d3", "T3", "B3")], 3)).await;

        let dir = temp_dir();
        let output = dir.join("dataset.tsv");
        let result = materialize(&config_for(&server, output.clone()), &NoProgress)
            .await
            .unwrap();

        assert_eq!(result.documents, 3);
        let content = std::fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines,
            [
                "docid\ttitle\ttext",
                "d1\tT1\tB1",
                "d2\tT2\tline\\nbreak",
                "d3\tT3\tB3",
            ]
        );
        assert!(!partial_path(&output).exists());
    }

    #[tokio::test]
    async fn stops_on_empty_page() {
        let server = MockServer::start().await;
        // Server over-reports its total; the empty page ends the fetch.
        mount_page(&server, "0", page(0, &[("d1", "T1", "B1"), ("d2", "T2", "B2")], 10)).await;
        mount_page(&server, "2", page(2, &[], 10)).await;

        let dir = temp_dir();
        let result = materialize(&config_for(&server, dir.join("out.tsv")), &NoProgress)
            .await
            .unwrap();
        assert_eq!(result.documents, 2);
    }

    #[tokio::test]
    async fn server_error_is_source_unavailable_and_leaves_no_stream() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rows"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let dir = temp_dir();
        let output = dir.join("dataset.tsv");
        let err = materialize(&config_for(&server, output.clone()), &NoProgress)
            .await
            .unwrap_err();

        assert!(matches!(err, EvalCorpusError::SourceUnavailable(_)));
        assert!(!output.exists());
        assert!(!partial_path(&output).exists());
    }

    #[tokio::test]
    async fn failure_keeps_previous_stream_intact() {
        let server = MockServer::start().await;
        mount_page(&server, "0", page(0, &[("d1", "T1", "B1"), ("d2", "T2", "B2")], 4)).await;
        Mock::given(method("GET"))
            .and(path("/rows"))
            .and(query_param("offset", "2"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = temp_dir();
        let output = dir.join("dataset.tsv");
        std::fs::write(&output, "docid\ttitle\ttext\nold\tOld\tOld\n").unwrap();

        let err = materialize(&config_for(&server, output.clone()), &NoProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, EvalCorpusError::SourceUnavailable(_)));
        assert!(std::fs::read_to_string(&output).unwrap().contains("old\tOld"));
    }

    #[tokio::test]
    async fn row_gap_is_rejected() {
        let server = MockServer::start().await;
        mount_page(&server, "0", page(1, &[("d2", "T2", "B2")], 2)).await;

        let dir = temp_dir();
        let err = materialize(&config_for(&server, dir.join("gap.tsv")), &NoProgress)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("expected row 0"));
    }

    #[tokio::test]
    async fn truncated_cells_are_rejected() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "rows": [{
                "row_idx": 0,
                "row": {"docid": "d1", "title": "T1", "text": "cut off"},
                "truncated_cells": ["text"]
            }],
            "num_rows_total": 1
        });
        mount_page(&server, "0", body).await;

        let dir = temp_dir();
        let err = materialize(&config_for(&server, dir.join("cut.tsv")), &NoProgress)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("truncated"));
    }

    #[tokio::test]
    async fn failed_rename_removes_partial_stream() {
        let server = MockServer::start().await;
        mount_page(&server, "0", page(0, &[("d1", "T1", "B1")], 1)).await;

        // A non-empty directory at the destination makes the final rename fail.
        let dir = temp_dir();
        let output = dir.join("dataset-en.tsv");
        std::fs::create_dir_all(output.join("occupied")).unwrap();

        let err = materialize(&config_for(&server, output.clone()), &NoProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, EvalCorpusError::Io { .. }));
        assert!(!partial_path(&output).exists());
        assert!(output.is_dir());
    }

    #[test]
    fn partial_path_appends_suffix() {
        let p = partial_path(Path::new("/tmp/dataset.tsv"));
        assert_eq!(p, PathBuf::from("/tmp/dataset.tsv.partial"));
    }
}
