//! Artifact assembler.
//!
//! Writes a join's output as the paired evaluation artifacts:
//!
//! ```text
//! <output_dir>/
//! ├── documents.json   [{"id", "title", "body"}, ...]
//! ├── queries.json     [{"query", "relevant_docs"}, ...]
//! └── manifest.json    run metadata + checksums of the two files above
//! ```
//!
//! The manifest is removed before and written after the artifacts, so a
//! directory holding a manifest always holds a matching pair.

use std::path::{Path, PathBuf};

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use evalcorpus_shared::{
    ArtifactChecksum, ArtifactManifest, CURRENT_SCHEMA_VERSION, Corpus, EvalCorpusError,
    ManifestInputs, Result, RunId,
};

use crate::joiner::JoinOutput;

/// File name of the document artifact.
pub const DOCUMENTS_FILE: &str = "documents.json";

/// File name of the query artifact.
pub const QUERIES_FILE: &str = "queries.json";

/// File name of the manifest.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Run metadata recorded in the manifest.
#[derive(Debug, Clone)]
pub struct ArtifactMeta {
    /// Corpus selector, when known.
    pub corpus: Option<Corpus>,
    /// Where the join read its inputs.
    pub inputs: ManifestInputs,
    /// Tool version string.
    pub tool_version: String,
}

/// Output from a successful write.
#[derive(Debug, Clone)]
pub struct ArtifactSet {
    /// Directory holding the artifacts.
    pub dir: PathBuf,
    pub documents_path: PathBuf,
    pub queries_path: PathBuf,
    /// The manifest that was written.
    pub manifest: ArtifactManifest,
}

/// Write `documents.json`, `queries.json`, then `manifest.json`.
///
/// Both artifacts are serialized before anything touches disk, then each is
/// written to a hidden temp file and renamed into place.
#[instrument(skip_all, fields(dir = %output_dir.display(), documents = output.documents.len(), queries = output.queries.len()))]
pub fn write_artifacts(
    output_dir: &Path,
    output: &JoinOutput,
    meta: &ArtifactMeta,
) -> Result<ArtifactSet> {
    let documents_json = render_json(&output.documents)?;
    let queries_json = render_json(&output.queries)?;

    std::fs::create_dir_all(output_dir).map_err(|e| EvalCorpusError::io(output_dir, e))?;

    let manifest_path = output_dir.join(MANIFEST_FILE);
    if manifest_path.exists() {
        std::fs::remove_file(&manifest_path)
            .map_err(|e| EvalCorpusError::io(&manifest_path, e))?;
        debug!("removed stale manifest");
    }

    let artifacts = [
        (DOCUMENTS_FILE, documents_json.as_str()),
        (QUERIES_FILE, queries_json.as_str()),
    ];

    let staged: Vec<(PathBuf, PathBuf)> = artifacts
        .iter()
        .map(|(filename, _)| {
            (
                output_dir.join(format!(".{filename}.tmp")),
                output_dir.join(filename),
            )
        })
        .collect();
    if let Err(e) = publish(&artifacts, &staged) {
        for (temp, _) in &staged {
            if !temp.exists() {
                continue;
            }
            if let Err(rm) = std::fs::remove_file(temp) {
                warn!(path = %temp.display(), error = %rm, "could not remove staged artifact");
            }
        }
        return Err(e);
    }

    let manifest = ArtifactManifest {
        schema_version: CURRENT_SCHEMA_VERSION,
        run_id: RunId::new(),
        tool_version: meta.tool_version.clone(),
        created_at: Utc::now(),
        corpus: meta.corpus,
        inputs: meta.inputs.clone(),
        report: output.report.clone(),
        artifacts: artifacts
            .iter()
            .map(|(filename, content)| checksum(filename, content.as_bytes()))
            .collect(),
    };

    let temp = output_dir.join(format!(".{MANIFEST_FILE}.tmp"));
    std::fs::write(&temp, render_json(&manifest)?).map_err(|e| EvalCorpusError::io(&temp, e))?;
    std::fs::rename(&temp, &manifest_path).map_err(|e| EvalCorpusError::io(&manifest_path, e))?;

    info!(
        run_id = %manifest.run_id,
        path = %output_dir.display(),
        "artifacts written"
    );

    Ok(ArtifactSet {
        dir: output_dir.to_path_buf(),
        documents_path: output_dir.join(DOCUMENTS_FILE),
        queries_path: output_dir.join(QUERIES_FILE),
        manifest,
    })
}

/// Write every artifact to its temp path, then rename each into place.
fn publish(artifacts: &[(&str, &str)], staged: &[(PathBuf, PathBuf)]) -> Result<()> {
    for ((_, content), (temp, _)) in artifacts.iter().zip(staged) {
        std::fs::write(temp, content).map_err(|e| EvalCorpusError::io(temp, e))?;
    }
    for (temp, target) in staged {
        std::fs::rename(temp, target).map_err(|e| EvalCorpusError::io(target, e))?;
        debug!(path = %target.display(), "wrote artifact");
    }
    Ok(())
}

/// Check both artifacts against the checksums in `manifest.json`.
pub fn verify_artifacts(output_dir: &Path) -> Result<ArtifactManifest> {
    let manifest_path = output_dir.join(MANIFEST_FILE);
    if !manifest_path.exists() {
        return Err(EvalCorpusError::validation(format!(
            "missing {MANIFEST_FILE} in {}",
            output_dir.display()
        )));
    }

    let content = std::fs::read_to_string(&manifest_path)
        .map_err(|e| EvalCorpusError::io(&manifest_path, e))?;
    let manifest: ArtifactManifest = serde_json::from_str(&content)
        .map_err(|e| EvalCorpusError::validation(format!("invalid {MANIFEST_FILE}: {e}")))?;

    if manifest.schema_version != CURRENT_SCHEMA_VERSION {
        return Err(EvalCorpusError::validation(format!(
            "unsupported schema_version: {} (expected {})",
            manifest.schema_version, CURRENT_SCHEMA_VERSION
        )));
    }

    for expected in &manifest.artifacts {
        let path = output_dir.join(&expected.filename);
        if !path.exists() {
            return Err(EvalCorpusError::validation(format!(
                "missing artifact {}",
                expected.filename
            )));
        }
        let bytes = std::fs::read(&path).map_err(|e| EvalCorpusError::io(&path, e))?;
        let actual = checksum(&expected.filename, &bytes);
        if actual != *expected {
            return Err(EvalCorpusError::validation(format!(
                "{} does not match manifest (sha256 {} != {})",
                expected.filename, actual.sha256, expected.sha256
            )));
        }
    }

    debug!(run_id = %manifest.run_id, "artifacts verified");
    Ok(manifest)
}

/// Serialize as pretty JSON (2-space indent, non-ASCII kept verbatim).
pub fn render_json<T: serde::Serialize + ?Sized>(data: &T) -> Result<String> {
    serde_json::to_string_pretty(data)
        .map_err(|e| EvalCorpusError::validation(format!("JSON serialization failed: {e}")))
}

fn checksum(filename: &str, bytes: &[u8]) -> ArtifactChecksum {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    ArtifactChecksum {
        filename: filename.to_string(),
        sha256: format!("{:x}", hasher.finalize()),
        size_bytes: bytes.len(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
