//! Shared types, error model, and configuration for evalcorpus.
//!
//! This crate is the foundation depended on by all other evalcorpus crates.
//! It provides:
//! - [`EvalCorpusError`]: the unified error type
//! - Domain types ([`Document`], [`AnnotatedQuery`], [`Corpus`], [`ArtifactManifest`])
//! - Insertion-ordered containers ([`OrderedMap`], [`OrderedSet`])
//! - Configuration ([`AppConfig`], [`SourceConfig`], config loading)

pub mod config;
pub mod error;
pub mod ordered;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CORPUS_PLACEHOLDER, MAX_PAGE_SIZE, PathsConfig, SourceConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{EvalCorpusError, Result};
pub use ordered::{OrderedMap, OrderedSet};
pub use types::{
    AnnotatedQuery, ArtifactChecksum, ArtifactManifest, CURRENT_SCHEMA_VERSION, Corpus, Document,
    DocumentFields, JoinReport, ManifestInputs, Query, RelevanceJudgment, RunId,
};
