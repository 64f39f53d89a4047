//! moralgraph CLI — moral-foundation annotation of news articles.
//!
//! Fetches articles, scores them across the five moral foundations, and
//! materializes the results into a relational store and a SPARQL graph.

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
