//! Core domain types for evaluation corpora.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EvalCorpusError;

/// Current schema version for the artifact manifest format.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Corpus
// ---------------------------------------------------------------------------

/// Corpus selectors offered by the external document source.
///
/// One corpus per MIRACL language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Corpus {
    Ar,
    Bn,
    De,
    En,
    Es,
    Fa,
    Fi,
    Fr,
    Hi,
    Id,
    Ja,
    Ko,
    Ru,
    Sw,
    Te,
    Th,
    Yo,
    Zh,
}

impl Corpus {
    /// Every supported selector, in alphabetical order.
    pub const ALL: [Corpus; 18] = [
        Corpus::Ar,
        Corpus::Bn,
        Corpus::De,
        Corpus::En,
        Corpus::Es,
        Corpus::Fa,
        Corpus::Fi,
        Corpus::Fr,
        Corpus::Hi,
        Corpus::Id,
        Corpus::Ja,
        Corpus::Ko,
        Corpus::Ru,
        Corpus::Sw,
        Corpus::Te,
        Corpus::Th,
        Corpus::Yo,
        Corpus::Zh,
    ];

    /// The selector string understood by the source (ISO 639-1 code).
    pub fn code(self) -> &'static str {
        match self {
            Corpus::Ar => "ar",
            Corpus::Bn => "bn",
            Corpus::De => "de",
            Corpus::En => "en",
            Corpus::Es => "es",
            Corpus::Fa => "fa",
            Corpus::Fi => "fi",
            Corpus::Fr => "fr",
            Corpus::Hi => "hi",
            Corpus::Id => "id",
            Corpus::Ja => "ja",
            Corpus::Ko => "ko",
            Corpus::Ru => "ru",
            Corpus::Sw => "sw",
            Corpus::Te => "te",
            Corpus::Th => "th",
            Corpus::Yo => "yo",
            Corpus::Zh => "zh",
        }
    }

    /// Comma-separated list of supported codes, for error messages.
    pub fn supported_list() -> String {
        Self::ALL
            .iter()
            .map(|c| c.code())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl std::fmt::Display for Corpus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Corpus {
    type Err = EvalCorpusError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.code() == wanted)
            .ok_or_else(|| EvalCorpusError::UnknownCorpus {
                corpus: s.to_string(),
                supported: Self::supported_list(),
            })
    }
}

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one artifact-producing run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A materialized corpus document, also the unit of `documents.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub body: String,
}

/// Title and body of a document, keyed elsewhere by its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFields {
    pub title: String,
    pub body: String,
}

/// One row of the query table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub id: String,
    pub text: String,
}

/// One relevance judgment; the grouping and label columns are not kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelevanceJudgment {
    pub query_id: String,
    pub doc_id: String,
}

/// A query together with every document judged relevant to it.
///
/// `relevant_docs` is duplicate-free and in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedQuery {
    pub query: String,
    pub relevant_docs: Vec<String>,
}

// ---------------------------------------------------------------------------
// JoinReport
// ---------------------------------------------------------------------------

/// Counters collected while joining the three inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinReport {
    /// Documents read from the document stream.
    pub documents: usize,
    /// Rows read from the query table.
    pub queries_loaded: usize,
    /// Queries written to `queries.json`.
    pub queries_emitted: usize,
    /// Queries dropped because no judgment references them.
    pub queries_without_judgments: usize,
    /// Distinct (query, document) judgment pairs.
    pub judgments: usize,
    /// Relevance rows collapsed as repeats of an earlier pair.
    pub duplicate_judgments: usize,
    /// Query ids in the relevance table that the query table lacks.
    pub judged_queries_not_in_table: usize,
    /// Emitted relevant doc ids that the document stream lacks.
    pub dangling_doc_refs: usize,
}

// ---------------------------------------------------------------------------
// ArtifactManifest
// ---------------------------------------------------------------------------

/// Checksum entry for one artifact file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactChecksum {
    pub filename: String,
    pub sha256: String,
    pub size_bytes: usize,
}

/// Input locations a run was built from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestInputs {
    pub queries: String,
    pub relevance: String,
    pub documents: String,
}

/// The `manifest.json` written after both artifacts are in place.
///
/// Its presence marks `documents.json` and `queries.json` as one
/// consistent pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactManifest {
    /// Schema version for forward compatibility.
    pub schema_version: u32,
    /// Run that produced the artifacts.
    pub run_id: RunId,
    /// Tool version that produced the artifacts.
    pub tool_version: String,
    /// When the artifacts were written.
    pub created_at: DateTime<Utc>,
    /// Corpus selector, when the run knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corpus: Option<Corpus>,
    /// Input file locations.
    pub inputs: ManifestInputs,
    /// Join counters.
    pub report: JoinReport,
    /// Checksums of `documents.json` and `queries.json`.
    pub artifacts: Vec<ArtifactChecksum>,
}
