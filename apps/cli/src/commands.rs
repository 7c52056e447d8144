//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use evalcorpus_core::assembler::verify_artifacts;
use evalcorpus_core::joiner::JoinInputs;
use evalcorpus_core::pipeline::{JoinConfig, PrepareConfig, ProgressReporter};
use evalcorpus_materializer::MaterializeConfig;
use evalcorpus_shared::{AppConfig, Corpus, JoinReport, init_config, load_config, load_config_from};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// evalcorpus: build search-quality evaluation corpora.
#[derive(Parser)]
#[command(
    name = "evalcorpus",
    version,
    about = "Join a document corpus, queries and relevance judgments into evaluation artifacts.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.evalcorpus/evalcorpus.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Fetch a corpus and write it as a tab-delimited document stream.
    Materialize {
        /// Corpus selector (language code, see `corpora`).
        corpus: String,

        /// Destination of the document stream.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Join queries, relevance judgments and a document stream into artifacts.
    Join {
        /// Query table (queryId, text).
        #[arg(long, requires = "relevance")]
        queries: Option<PathBuf>,

        /// Relevance table (queryId, group, docId, label).
        #[arg(long, requires = "queries")]
        relevance: Option<PathBuf>,

        /// MIRACL checkout root, used when --queries/--relevance are omitted.
        #[arg(long, conflicts_with_all = ["queries", "relevance"])]
        miracl_root: Option<PathBuf>,

        /// Corpus selector (required with --miracl-root, recorded in the manifest).
        #[arg(long)]
        corpus: Option<String>,

        /// Topics/qrels split used with --miracl-root.
        #[arg(long)]
        split: Option<String>,

        /// Materialized document stream.
        #[arg(long)]
        documents: Option<PathBuf>,

        /// Output directory for documents.json / queries.json.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Materialize (if needed) and join in one run.
    Prepare {
        /// Corpus selector (language code, see `corpora`).
        corpus: String,

        /// MIRACL checkout root holding topics and qrels.
        #[arg(long)]
        miracl_root: Option<PathBuf>,

        /// Topics/qrels split.
        #[arg(long)]
        split: Option<String>,

        /// Document stream location (fetched if missing).
        #[arg(long)]
        documents: Option<PathBuf>,

        /// Output directory for documents.json / queries.json.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Re-fetch the corpus even if the document stream exists.
        #[arg(long)]
        refresh: bool,
    },

    /// Check written artifacts against their manifest.
    Verify {
        /// Artifact directory.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// List supported corpus selectors.
    Corpora,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "evalcorpus=info",
        1 => "evalcorpus=debug",
        _ => "evalcorpus=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    match cli.command {
        Command::Materialize { corpus, out } => cmd_materialize(&config, &corpus, out).await,
        Command::Join {
            queries,
            relevance,
            miracl_root,
            corpus,
            split,
            documents,
            out,
        } => {
            let corpus = corpus.as_deref().map(str::parse::<Corpus>).transpose()?;
            let documents = stream_path(&config, documents, corpus)?;
            let inputs = resolve_inputs(
                &config,
                queries.zip(relevance),
                miracl_root,
                corpus,
                split,
                documents,
            )?;
            cmd_join(&config, inputs, corpus, out)
        }
        Command::Prepare {
            corpus,
            miracl_root,
            split,
            documents,
            out,
            refresh,
        } => {
            let corpus: Corpus = corpus.parse()?;
            let documents = stream_path(&config, documents, Some(corpus))?;
            let inputs = resolve_inputs(&config, None, miracl_root, Some(corpus), split, documents)?;
            cmd_prepare(&config, corpus, inputs, out, refresh).await
        }
        Command::Verify { out } => cmd_verify(&config, out),
        Command::Corpora => cmd_corpora(),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&config),
        },
    }
}

/// Decide where the query and relevance tables come from.
///
/// Explicit paths win; otherwise they are derived from a MIRACL root (flag,
/// then config) and the corpus selector.
fn resolve_inputs(
    config: &AppConfig,
    explicit: Option<(PathBuf, PathBuf)>,
    miracl_root: Option<PathBuf>,
    corpus: Option<Corpus>,
    split: Option<String>,
    documents: PathBuf,
) -> Result<JoinInputs> {
    if let Some((queries, relevance)) = explicit {
        return Ok(JoinInputs {
            queries,
            relevance,
            documents,
        });
    }

    let root = miracl_root
        .or_else(|| config.paths.miracl_root.clone().map(PathBuf::from))
        .ok_or_else(|| {
            eyre!("no query/relevance tables: pass --queries and --relevance, or --miracl-root")
        })?;
    let corpus = corpus.ok_or_else(|| eyre!("--corpus is required with a MIRACL root"))?;
    let split = split.unwrap_or_else(|| config.paths.split.clone());

    Ok(JoinInputs::miracl(&root, corpus, &split, documents))
}

/// Document stream location: the flag, else the configured per-corpus path.
fn stream_path(
    config: &AppConfig,
    flag: Option<PathBuf>,
    corpus: Option<Corpus>,
) -> Result<PathBuf> {
    match flag {
        Some(path) => Ok(path),
        None => Ok(config.paths.documents_stream_for(corpus)?),
    }
}

fn output_dir(config: &AppConfig, out: Option<PathBuf>) -> PathBuf {
    out.unwrap_or_else(|| PathBuf::from(&config.paths.output_dir))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_materialize(config: &AppConfig, corpus: &str, out: Option<PathBuf>) -> Result<()> {
    let corpus: Corpus = corpus.parse()?;
    let output = stream_path(config, out, Some(corpus))?;

    let materialize_config = MaterializeConfig {
        corpus,
        output,
        source: config.source.clone(),
    };

    info!(%corpus, output = %materialize_config.output.display(), "materializing corpus");

    let reporter = CliProgress::new();
    let result = evalcorpus_core::pipeline::materialize(&materialize_config, &reporter).await;
    reporter.spinner.finish_and_clear();
    let result = result?;

    println!();
    println!("  Corpus materialized!");
    println!("  Corpus:    {}", result.corpus);
    println!("  Documents: {}", result.documents);
    println!("  Path:      {}", result.path.display());
    println!("  Time:      {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

fn cmd_join(
    config: &AppConfig,
    inputs: JoinInputs,
    corpus: Option<Corpus>,
    out: Option<PathBuf>,
) -> Result<()> {
    let join_config = JoinConfig {
        inputs,
        output_dir: output_dir(config, out),
        corpus,
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
    };

    info!(
        queries = %join_config.inputs.queries.display(),
        relevance = %join_config.inputs.relevance.display(),
        documents = %join_config.inputs.documents.display(),
        "joining relevance data"
    );

    let reporter = CliProgress::new();
    let result = evalcorpus_core::pipeline::join_artifacts(&join_config, &reporter);
    reporter.spinner.finish_and_clear();
    let result = result?;

    print_summary(&result.artifacts.dir, &result.report);
    println!("  Time:      {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_prepare(
    config: &AppConfig,
    corpus: Corpus,
    inputs: JoinInputs,
    out: Option<PathBuf>,
    refresh: bool,
) -> Result<()> {
    let prepare_config = PrepareConfig {
        corpus,
        source: config.source.clone(),
        inputs,
        output_dir: output_dir(config, out),
        refresh,
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
    };

    info!(%corpus, refresh, "preparing evaluation corpus");

    let reporter = CliProgress::new();
    let result = evalcorpus_core::pipeline::prepare(&prepare_config, &reporter).await;
    reporter.spinner.finish_and_clear();
    let result = result?;

    if let Some(m) = &result.materialized {
        println!();
        println!("  Fetched {} documents into {}", m.documents, m.path.display());
    }
    print_summary(&result.join.artifacts.dir, &result.join.report);
    println!("  Time:      {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

fn cmd_verify(config: &AppConfig, out: Option<PathBuf>) -> Result<()> {
    let dir = output_dir(config, out);
    let manifest = verify_artifacts(&dir)?;

    println!("Artifacts in {} match manifest (run {}).", dir.display(), manifest.run_id);
    Ok(())
}

fn cmd_corpora() -> Result<()> {
    for corpus in Corpus::ALL {
        println!("{corpus}");
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

fn print_summary(dir: &Path, report: &JoinReport) {
    println!();
    println!("  Evaluation corpus written!");
    println!("  Documents: {}", report.documents);
    println!(
        "  Queries:   {} emitted, {} without judgments",
        report.queries_emitted, report.queries_without_judgments
    );
    println!(
        "  Judgments: {} ({} duplicate rows collapsed)",
        report.judgments, report.duplicate_judgments
    );
    if report.dangling_doc_refs > 0 {
        println!(
            "  Note:      {} relevant ids are not in the document stream",
            report.dangling_doc_refs
        );
    }
    println!("  Path:      {}", dir.display());
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn records_fetched(&self, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Fetching documents [{current}/{total}]"));
    }

    fn done(&self, _report: &JoinReport) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn join_accepts_explicit_tables() {
        let cli = Cli::try_parse_from([
            "evalcorpus",
            "join",
            "--queries",
            "topics.tsv",
            "--relevance",
            "qrels.tsv",
            "--documents",
            "dataset.tsv",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Join { .. }));
    }

    #[test]
    fn join_rejects_queries_without_relevance() {
        let res = Cli::try_parse_from(["evalcorpus", "join", "--queries", "topics.tsv"]);
        assert!(res.is_err());
    }

    #[test]
    fn explicit_tables_win_over_miracl_root() {
        let mut config = AppConfig::default();
        config.paths.miracl_root = Some("/data/miracl".into());
        let inputs = resolve_inputs(
            &config,
            Some(("t.tsv".into(), "q.tsv".into())),
            None,
            Some(Corpus::En),
            None,
            "dataset.tsv".into(),
        )
        .unwrap();
        assert_eq!(inputs.queries, PathBuf::from("t.tsv"));
        assert_eq!(inputs.relevance, PathBuf::from("q.tsv"));
    }

    #[test]
    fn miracl_root_falls_back_to_config() {
        let mut config = AppConfig::default();
        config.paths.miracl_root = Some("/data/miracl".into());
        let inputs = resolve_inputs(
            &config,
            None,
            None,
            Some(Corpus::Fi),
            None,
            "dataset.tsv".into(),
        )
        .unwrap();
        assert!(inputs.queries.ends_with("topics.miracl-v1.0-fi-dev.tsv"));
    }

    #[test]
    fn default_stream_path_follows_corpus() {
        let config = AppConfig::default();
        let en = stream_path(&config, None, Some(Corpus::En)).unwrap();
        let fr = stream_path(&config, None, Some(Corpus::Fr)).unwrap();
        assert_ne!(en, fr);
        assert_eq!(fr, PathBuf::from("dataset-fr.tsv"));

        let explicit = stream_path(&config, Some("mine.tsv".into()), Some(Corpus::Fr)).unwrap();
        assert_eq!(explicit, PathBuf::from("mine.tsv"));
    }

    #[test]
    fn missing_tables_are_reported() {
        let err = resolve_inputs(
            &AppConfig::default(),
            None,
            None,
            Some(Corpus::En),
            None,
            "dataset.tsv".into(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("--miracl-root"));
    }
}
