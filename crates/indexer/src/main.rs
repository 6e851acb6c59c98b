//! SAMAY indexer
//!
//! Builds the corpus and relation graph snapshots the `samay` binary loads.

use anyhow::Context;
use clap::{Parser, Subcommand};
use samay_common::{
    config::AppConfig, embeddings::create_embedder, metrics, telemetry::init_tracing, VERSION,
};
use samay_indexer::{chunk_rows, load_rows, IndexBuilder, TextStrategy};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "samay-indexer")]
#[command(version)]
#[command(about = "Build SAMAY corpus and relation graph snapshots", long_about = None)]
struct Cli {
    /// Configuration file (layered config/ directory and APP__ variables otherwise)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Chunk, embed and snapshot a verse file
    Build {
        /// Verse rows (JSON array); `data.source_path` by default
        #[arg(long)]
        source: Option<PathBuf>,

        /// combined_questions or sanskrit_translation
        #[arg(long, default_value_t = TextStrategy::CombinedQuestions)]
        strategy: TextStrategy,

        /// Corpus snapshot output; `data.corpus_path` by default
        #[arg(long)]
        corpus_out: Option<PathBuf>,

        /// Graph snapshot output; `data.graph_path` by default
        #[arg(long)]
        graph_out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(&path.to_string_lossy()),
        None => AppConfig::load(),
    }
    .context("Failed to load configuration")?;

    init_tracing(&config.observability);
    metrics::register_metrics();
    info!("Starting SAMAY indexer v{}", VERSION);

    match cli.command {
        Command::Build {
            source,
            strategy,
            corpus_out,
            graph_out,
        } => {
            let source = source.unwrap_or_else(|| PathBuf::from(&config.data.source_path));
            let corpus_out = corpus_out.unwrap_or_else(|| PathBuf::from(&config.data.corpus_path));
            let graph_out = graph_out.unwrap_or_else(|| PathBuf::from(&config.data.graph_path));

            let rows = load_rows(&source)?;
            let records = chunk_rows(&rows, strategy);
            info!(
                source = %source.display(),
                rows = rows.len(),
                passages = records.len(),
                strategy = %strategy,
                "Verses chunked"
            );
            if records.is_empty() {
                return Err(samay_indexer::IndexerError::EmptyCorpus(source.display().to_string()).into());
            }

            let embedder = create_embedder(&config.embedding)?;
            let builder = IndexBuilder::new(embedder, config.embedding.batch_size);
            let built = builder.build(records, strategy.as_str()).await?;
            built.save(&corpus_out, &graph_out)?;

            println!(
                "{} passages, {} graph edges -> {}, {}",
                built.corpus.len(),
                built.graph.edge_count(),
                corpus_out.display(),
                graph_out.display()
            );
        }
    }

    Ok(())
}
