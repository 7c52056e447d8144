//! End-to-end pipelines: corpus → document stream → join → artifacts.

use std::path::PathBuf;
use std::time::Instant;

use tracing::{info, instrument};

use evalcorpus_materializer::{MaterializeConfig, MaterializeProgress, MaterializeResult};
use evalcorpus_shared::{Corpus, JoinReport, ManifestInputs, Result, SourceConfig};

use crate::assembler::{self, ArtifactMeta, ArtifactSet};
use crate::joiner::{self, JoinInputs};

/// Configuration for [`join_artifacts`].
#[derive(Debug, Clone)]
pub struct JoinConfig {
    /// The three input files.
    pub inputs: JoinInputs,
    /// Directory receiving the artifacts.
    pub output_dir: PathBuf,
    /// Corpus selector, recorded in the manifest when known.
    pub corpus: Option<Corpus>,
    /// Tool version string.
    pub tool_version: String,
}

/// Result of [`join_artifacts`].
#[derive(Debug)]
pub struct JoinResult {
    pub artifacts: ArtifactSet,
    pub report: JoinReport,
    pub elapsed: std::time::Duration,
}

/// Configuration for [`prepare`].
#[derive(Debug, Clone)]
pub struct PrepareConfig {
    /// Corpus to materialize.
    pub corpus: Corpus,
    /// External source settings.
    pub source: SourceConfig,
    /// Query/relevance tables and the document stream location.
    pub inputs: JoinInputs,
    /// Directory receiving the artifacts.
    pub output_dir: PathBuf,
    /// Re-fetch the corpus even if the document stream already exists.
    pub refresh: bool,
    /// Tool version string.
    pub tool_version: String,
}

/// Result of [`prepare`].
#[derive(Debug)]
pub struct PrepareResult {
    /// `None` when an existing document stream was reused.
    pub materialized: Option<MaterializeResult>,
    pub join: JoinResult,
    /// Total elapsed time.
    pub elapsed: std::time::Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called as corpus records are fetched.
    fn records_fetched(&self, current: usize, total: usize);
    /// Called when artifacts are written.
    fn done(&self, report: &JoinReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn records_fetched(&self, _current: usize, _total: usize) {}
    fn done(&self, _report: &JoinReport) {}
}

/// Adapts a `ProgressReporter` to the materializer's progress interface.
struct PipelineMaterializeProgress<'a> {
    inner: &'a dyn ProgressReporter,
}

impl MaterializeProgress for PipelineMaterializeProgress<'_> {
    fn records_fetched(&self, current: usize, total: usize) {
        self.inner.records_fetched(current, total);
    }
}

/// Materialize a corpus to its document stream.
pub async fn materialize(
    config: &MaterializeConfig,
    progress: &dyn ProgressReporter,
) -> Result<MaterializeResult> {
    progress.phase(&format!("Materializing corpus '{}'", config.corpus));
    let adapter = PipelineMaterializeProgress { inner: progress };
    evalcorpus_materializer::materialize(config, &adapter).await
}

/// Join the inputs and write the artifact pair.
///
/// All inputs are loaded and joined in memory first; nothing is written if
/// any of them is malformed.
#[instrument(skip_all, fields(output_dir = %config.output_dir.display()))]
pub fn join_artifacts(config: &JoinConfig, progress: &dyn ProgressReporter) -> Result<JoinResult> {
    let start = Instant::now();

    progress.phase("Joining queries, relevance judgments and documents");
    let output = joiner::join(&config.inputs)?;

    progress.phase("Writing artifacts");
    let meta = ArtifactMeta {
        corpus: config.corpus,
        inputs: ManifestInputs {
            queries: config.inputs.queries.display().to_string(),
            relevance: config.inputs.relevance.display().to_string(),
            documents: config.inputs.documents.display().to_string(),
        },
        tool_version: config.tool_version.clone(),
    };
    let artifacts = assembler::write_artifacts(&config.output_dir, &output, &meta)?;

    progress.done(&output.report);

    Ok(JoinResult {
        artifacts,
        report: output.report,
        elapsed: start.elapsed(),
    })
}

/// Run the full pipeline.
///
/// 1. Materialize the corpus (skipped when the stream exists and `refresh` is off)
/// 2. Join queries, judgments and documents
/// 3. Write `documents.json`, `queries.json`, `manifest.json`
#[instrument(skip_all, fields(corpus = %config.corpus))]
pub async fn prepare(config: &PrepareConfig, progress: &dyn ProgressReporter) -> Result<PrepareResult> {
    let start = Instant::now();
    let stream = &config.inputs.documents;

    let materialized = if config.refresh || !stream.exists() {
        let materialize_config = MaterializeConfig {
            corpus: config.corpus,
            output: stream.clone(),
            source: config.source.clone(),
        };
        Some(materialize(&materialize_config, progress).await?)
    } else {
        info!(path = %stream.display(), "reusing existing document stream");
        None
    };

    let join_config = JoinConfig {
        inputs: config.inputs.clone(),
        output_dir: config.output_dir.clone(),
        corpus: Some(config.corpus),
        tool_version: config.tool_version.clone(),
    };
    let join = join_artifacts(&join_config, progress)?;

    let result = PrepareResult {
        materialized,
        join,
        elapsed: start.elapsed(),
    };

    info!(
        corpus = %config.corpus,
        documents = result.join.report.documents,
        queries = result.join.report.queries_emitted,
        elapsed_ms = result.elapsed.as_millis(),
        "prepare pipeline complete"
    );

    Ok(result)
}
