//! evalcorpus CLI: build search-quality evaluation corpora.
//!
//! Materializes a labeled document collection and joins it with queries and
//! relevance judgments into `documents.json` / `queries.json`.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
