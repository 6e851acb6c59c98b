//! SAMAY command line
//!
//! - `samay ask <question>`: answer one question from the loaded corpus
//! - `samay evaluate <dataset>`: retrieval hit rate over a question set
//! - `samay reformulate <question>`: show the rewritten, step-back or decomposed query

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use samay_common::{
    config::AppConfig, embeddings::create_embedder, llm::create_generator, metrics,
    telemetry::init_tracing, Generator, VERSION,
};
use samay_context::evaluation::load_dataset;
use samay_context::{AnswerOutcome, AnswerPipeline, QueryRewriter, RetrievalEvaluator};
use samay_search::{CorpusIndex, HybridRetriever, LlmReranker, RelationGraph};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// SAMAY - answers questions about the Bhagavad Gita and the Yoga Sutras
#[derive(Parser, Debug)]
#[command(name = "samay")]
#[command(version)]
#[command(about = "Hybrid retrieval and grounded answering over the Bhagavad Gita and Yoga Sutras", long_about = None)]
struct Cli {
    /// Configuration file (layered config/ directory and APP__ variables otherwise)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Answer a question
    Ask {
        #[arg(value_name = "QUESTION")]
        question: String,

        /// Print the full outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Measure retrieval hit rate over a JSON question set
    Evaluate {
        #[arg(value_name = "DATASET")]
        dataset: PathBuf,

        #[arg(long, value_enum, default_value_t = Method::RuleBased)]
        method: Method,
    },

    /// Reformulate a question without answering it
    Reformulate {
        #[arg(value_name = "QUESTION")]
        question: String,

        #[arg(long, value_enum, default_value_t = Reformulation::Rewrite)]
        mode: Reformulation,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Reformulation {
    Rewrite,
    StepBack,
    Decompose,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Method {
    RuleBased,
    LlmJudged,
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
    info!("Starting SAMAY v{}", VERSION);

    let generator = create_generator(&config.llm)?;

    if let Command::Reformulate { question, mode } = &cli.command {
        let rewriter = QueryRewriter::new(generator);
        match mode {
            Reformulation::Rewrite => println!("{}", rewriter.rewrite(question).await?),
            Reformulation::StepBack => println!("{}", rewriter.step_back(question).await?),
            Reformulation::Decompose => {
                for sub_query in rewriter.decompose(question).await? {
                    println!("{}", sub_query);
                }
            }
        }
        return Ok(());
    }

    let retriever = Arc::new(build_retriever(&config, generator.clone())?);

    match cli.command {
        Command::Ask { question, json } => {
            let pipeline = AnswerPipeline::new(generator, retriever, config.pipeline.clone());
            let outcome = pipeline.answer(&question).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("{}", outcome.message());
                if let AnswerOutcome::Answered(answer) = &outcome {
                    println!("\nVerses: {}", answer.cited_passage_ids.join(", "));
                }
            }
        }
        Command::Evaluate { dataset, method } => {
            let cases = load_dataset(&dataset)?;
            let evaluator = RetrievalEvaluator::new(retriever);
            let report = match method {
                Method::RuleBased => evaluator.rule_based(&cases).await?,
                Method::LlmJudged => evaluator.llm_judged(generator.as_ref(), &cases).await?,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Reformulate { .. } => {}
    }

    Ok(())
}

/// Load the snapshots and wire the retriever
fn build_retriever(
    config: &AppConfig,
    generator: Arc<dyn Generator>,
) -> anyhow::Result<HybridRetriever> {
    let embedder = create_embedder(&config.embedding)?;
    let corpus = CorpusIndex::load(&config.data.corpus_path, embedder)
        .context("Corpus snapshot unavailable; run samay-indexer build first")?;

    let mut retriever = HybridRetriever::from_corpus(&corpus, config.retrieval.clone())?;

    let graph_path = Path::new(&config.data.graph_path);
    if !config.retrieval.graph_contraction {
        info!("Graph contraction switched off");
    } else if graph_path.exists() {
        let graph = RelationGraph::load(graph_path)?;
        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "Relation graph loaded"
        );
        retriever = retriever.with_graph(Arc::new(graph));
    } else {
        warn!(path = %graph_path.display(), "No relation graph snapshot, graph contraction disabled");
    }

    if config.retrieval.rerank.enabled {
        retriever = retriever.with_reranker(LlmReranker::from_config(
            generator,
            &config.retrieval.rerank,
        ));
    }

    Ok(retriever)
}
