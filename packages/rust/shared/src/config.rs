//! Application configuration for evalcorpus.
//!
//! User config lives at `~/.evalcorpus/evalcorpus.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{EvalCorpusError, Result};
use crate::types::Corpus;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "evalcorpus.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".evalcorpus";

/// Replaced by the corpus code in `paths.documents_stream`.
pub const CORPUS_PLACEHOLDER: &str = "{corpus}";

// ---------------------------------------------------------------------------
// Config structs (matching evalcorpus.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// External document source.
    #[serde(default)]
    pub source: SourceConfig,

    /// Default input and output locations.
    #[serde(default)]
    pub paths: PathsConfig,
}

/// `[source]` section: the datasets-server endpoint the materializer pages through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base URL of the rows API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Dataset holding one config per corpus.
    #[serde(default = "default_dataset")]
    pub dataset: String,

    /// Dataset split to read.
    #[serde(default = "default_source_split")]
    pub split: String,

    /// Rows requested per page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            dataset: default_dataset(),
            split: default_source_split(),
            page_size: default_page_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl SourceConfig {
    /// Parse and check `base_url`.
    pub fn base_url(&self) -> Result<Url> {
        Url::parse(&self.base_url).map_err(|e| {
            EvalCorpusError::config(format!("invalid source.base_url '{}': {e}", self.base_url))
        })
    }

    /// Reject settings the source cannot serve.
    pub fn validate(&self) -> Result<()> {
        self.base_url()?;
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(EvalCorpusError::config(format!(
                "source.page_size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.page_size
            )));
        }
        if self.dataset.trim().is_empty() {
            return Err(EvalCorpusError::config("source.dataset is empty"));
        }
        Ok(())
    }
}

/// Largest page the datasets-server rows API returns.
pub const MAX_PAGE_SIZE: usize = 100;

fn default_base_url() -> String {
    "https://datasets-server.huggingface.co".into()
}
fn default_dataset() -> String {
    "miracl/miracl-corpus".into()
}
fn default_source_split() -> String {
    "train".into()
}
fn default_page_size() -> usize {
    MAX_PAGE_SIZE
}
fn default_timeout_secs() -> u64 {
    60
}

/// `[paths]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Where the materialized document stream is written and read.
    /// `{corpus}` expands to the corpus code, so streams of different
    /// corpora never share a file.
    #[serde(default = "default_documents_stream")]
    pub documents_stream: String,

    /// Directory receiving `documents.json`, `queries.json`, `manifest.json`.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Root of a MIRACL checkout holding topics and qrels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub miracl_root: Option<String>,

    /// Topics/qrels split used with `miracl_root`.
    #[serde(default = "default_judgment_split")]
    pub split: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            documents_stream: default_documents_stream(),
            output_dir: default_output_dir(),
            miracl_root: None,
            split: default_judgment_split(),
        }
    }
}

impl PathsConfig {
    /// Resolve the document stream location for `corpus`.
    ///
    /// A configured path containing `{corpus}` needs a corpus to expand.
    pub fn documents_stream_for(&self, corpus: Option<Corpus>) -> Result<PathBuf> {
        if !self.documents_stream.contains(CORPUS_PLACEHOLDER) {
            return Ok(PathBuf::from(&self.documents_stream));
        }
        let corpus = corpus.ok_or_else(|| {
            EvalCorpusError::config(format!(
                "paths.documents_stream `{}` depends on the corpus; pass --corpus or --documents",
                self.documents_stream
            ))
        })?;
        Ok(PathBuf::from(
            self.documents_stream.replace(CORPUS_PLACEHOLDER, corpus.code()),
        ))
    }
}

fn default_documents_stream() -> String {
    format!("dataset-{CORPUS_PLACEHOLDER}.tsv")
}
fn default_output_dir() -> String {
    ".".into()
}
fn default_judgment_split() -> String {
    "dev".into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.evalcorpus/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| EvalCorpusError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.evalcorpus/evalcorpus.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| EvalCorpusError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        EvalCorpusError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.source.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| EvalCorpusError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| EvalCorpusError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| EvalCorpusError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("miracl/miracl-corpus"));
        assert!(toml_str.contains("documents_stream"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.source.page_size, 100);
        assert_eq!(parsed.paths.split, "dev");
        assert!(parsed.paths.miracl_root.is_none());
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[source]
base_url = "http://localhost:8080"

[paths]
miracl_root = "/data/miracl"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.source.base_url, "http://localhost:8080");
        assert_eq!(config.source.dataset, "miracl/miracl-corpus");
        assert_eq!(config.paths.miracl_root.as_deref(), Some("/data/miracl"));
        assert_eq!(config.paths.documents_stream, "dataset-{corpus}.tsv");
    }

    #[test]
    fn default_stream_differs_per_corpus() {
        let paths = PathsConfig::default();
        let en = paths.documents_stream_for(Some(Corpus::En)).unwrap();
        let fr = paths.documents_stream_for(Some(Corpus::Fr)).unwrap();
        assert_eq!(en, PathBuf::from("dataset-en.tsv"));
        assert_eq!(fr, PathBuf::from("dataset-fr.tsv"));
    }

    #[test]
    fn corpus_dependent_stream_needs_corpus() {
        let err = PathsConfig::default().documents_stream_for(None).unwrap_err();
        assert!(matches!(err, EvalCorpusError::Config { .. }));
        assert!(err.to_string().contains("--corpus"));
    }

    #[test]
    fn fixed_stream_path_is_used_verbatim() {
        let paths = PathsConfig {
            documents_stream: "/data/stream.tsv".into(),
            ..PathsConfig::default()
        };
        assert_eq!(
            paths.documents_stream_for(None).unwrap(),
            PathBuf::from("/data/stream.tsv")
        );
    }

    #[test]
    fn page_size_is_bounded() {
        let mut source = SourceConfig::default();
        source.page_size = 0;
        assert!(source.validate().is_err());
        source.page_size = MAX_PAGE_SIZE + 1;
        assert!(source.validate().is_err());
        source.page_size = 25;
        assert!(source.validate().is_ok());
    }

    #[test]
    fn invalid_base_url_is_config_error() {
        let source = SourceConfig {
            base_url: "not a url".into(),
            ..SourceConfig::default()
        };
        let err = source.validate().unwrap_err();
        assert!(err.to_string().contains("source.base_url"));
    }
}
