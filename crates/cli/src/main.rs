mod config;
mod prompts;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::PipelineConfig;
use extract::{HttpChatClient, OntologyTriplet, SimpleTriplet};
use graph::{EdgeBuilder, GraphStore, HttpEmbeddingClient, Namespaces};
use ingest::{ChunkingOptions, FileReader};
use pipeline::{
    BatchDriver, BatchRecord, OntologyChunkExtractor, SimpleChunkExtractor,
    TwoStageChunkExtractor,
};
use query::QueryEngine;

#[derive(Parser)]
#[command(
    name = "kgpipe",
    about = "Turn documents into a knowledge graph and retrieve grounding subgraphs"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Simple,
    Ontology,
}

#[derive(Subcommand)]
enum Command {
    /// Split a document into overlapping sentence-window chunks
    Chunk {
        #[arg(short = 'f', long = "file")]
        file: PathBuf,
        #[arg(short = 'o', long = "out")]
        out: PathBuf,
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,
    },
    /// Extract triplets from chunks and assemble the graph document
    Extract {
        /// Chunks file: a JSON array of {id, content} objects
        #[arg(short = 'f', long = "file")]
        file: PathBuf,
        #[arg(short = 'c', long = "config")]
        config: PathBuf,
        #[arg(short = 'o', long = "out-dir")]
        out_dir: PathBuf,
        #[arg(long, value_enum, default_value_t = Mode::Simple)]
        mode: Mode,
        /// Two-stage extraction (entities first); ontology mode only
        #[arg(long)]
        two_stage: bool,
        #[arg(long, default_value = "prompt")]
        prompt_dir: PathBuf,
    },
    /// Rebuild the graph document from a results log
    Graph {
        /// Results log: triplets.jsonl or the merged triplets.json
        #[arg(short = 'f', long = "file")]
        file: PathBuf,
        #[arg(short = 'o', long = "out")]
        out: PathBuf,
        #[arg(long, value_enum, default_value_t = Mode::Simple)]
        mode: Mode,
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,
    },
    /// Embed graph nodes for retrieval
    Embed {
        #[arg(short = 'f', long = "file")]
        file: PathBuf,
        #[arg(short = 'c', long = "config")]
        config: PathBuf,
        #[arg(short = 'o', long = "out")]
        out: Option<PathBuf>,
    },
    /// Retrieve the grounding subgraph for a query
    Query {
        #[arg(short = 'f', long = "file")]
        file: PathBuf,
        #[arg(short = 'e', long = "embeddings")]
        embeddings: Option<PathBuf>,
        #[arg(short = 'c', long = "config")]
        config: PathBuf,
        #[arg(short = 'q', long = "query")]
        query: String,
        /// Seed size: top-k most similar nodes
        #[arg(short = 'k', default_value_t = 3)]
        k: usize,
        /// Expansion radius in relationship hops
        #[arg(short = 'r', long = "hops", default_value_t = 1)]
        hops: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Command::Chunk { file, out, config } => run_chunk(&file, &out, config.as_deref()).await,
        Command::Extract {
            file,
            config,
            out_dir,
            mode,
            two_stage,
            prompt_dir,
        } => run_extract(&file, &config, &out_dir, mode, two_stage, &prompt_dir).await,
        Command::Graph {
            file,
            out,
            mode,
            config,
        } => run_graph(&file, &out, mode, config.as_deref()).await,
        Command::Embed { file, config, out } => run_embed(&file, &config, out).await,
        Command::Query {
            file,
            embeddings,
            config,
            query,
            k,
            hops,
        } => run_query(&file, embeddings, &config, &query, k, hops).await,
    }
}

async fn run_chunk(file: &Path, out: &Path, config: Option<&Path>) -> Result<()> {
    let options = match config {
        Some(path) => PipelineConfig::load(path).await?.chunking(),
        None => ChunkingOptions::default(),
    };

    let chunks = if file.is_dir() {
        ingest::chunk_directory(file, options).await?
    } else {
        ingest::chunk_file(file, options).await?
    };
    let json = serde_json::to_string_pretty(&chunks).context("Failed to serialize chunks")?;
    tokio::fs::write(out, json)
        .await
        .context(format!("Failed to write chunk document: {:?}", out))?;

    info!(chunks = chunks.len(), out = %out.display(), "wrote chunk document");
    Ok(())
}

async fn run_extract(
    file: &Path,
    config_path: &Path,
    out_dir: &Path,
    mode: Mode,
    two_stage: bool,
    prompt_dir: &Path,
) -> Result<()> {
    if two_stage && mode != Mode::Ontology {
        anyhow::bail!("--two-stage requires --mode ontology");
    }

    let config = PipelineConfig::load(config_path).await?;
    let chunks = FileReader::read_chunk_file(file).await?;
    tokio::fs::create_dir_all(out_dir)
        .await
        .context(format!("Failed to create output directory: {:?}", out_dir))?;

    let lines_path = out_dir.join("triplets.jsonl");
    let merged_path = out_dir.join("triplets.json");
    let graph_path = out_dir.join("graph.json");

    let model = HttpChatClient::new(
        config.endpoint.clone(),
        config.api_key.clone(),
        config.model.clone(),
        config.temperature,
    );
    let driver = BatchDriver::new(config.concurrency(), config.retry_max());
    let builder = EdgeBuilder::new(config.namespaces(), config.literal_classes());

    match mode {
        Mode::Simple => {
            let template = prompts::load_template(prompt_dir, false).await?;
            let extractor = Arc::new(SimpleChunkExtractor::new(model, template));
            let records = driver.run(chunks, extractor, &lines_path).await?;
            pipeline::merge_json_lines::<SimpleTriplet>(&lines_path, &merged_path).await?;

            let triplets: Vec<SimpleTriplet> = records
                .into_iter()
                .filter_map(|record| record.triplets)
                .flatten()
                .collect();
            graph::assemble_simple(&builder, &triplets)
                .save(&graph_path)
                .await?;
        }
        Mode::Ontology => {
            let records = if two_stage {
                let stages = prompts::load_two_stage(prompt_dir).await?;
                let extractor = Arc::new(TwoStageChunkExtractor::new(model, stages));
                driver.run(chunks, extractor, &lines_path).await?
            } else {
                let template = prompts::load_template(prompt_dir, true).await?;
                let extractor = Arc::new(OntologyChunkExtractor::new(model, template));
                driver.run(chunks, extractor, &lines_path).await?
            };
            pipeline::merge_json_lines::<OntologyTriplet>(&lines_path, &merged_path).await?;

            let triplets: Vec<OntologyTriplet> = records
                .into_iter()
                .filter_map(|record| record.triplets)
                .flatten()
                .collect();
            graph::assemble_ontology(&builder, &triplets)
                .save(&graph_path)
                .await?;
        }
    }

    info!(out_dir = %out_dir.display(), "extraction run complete");
    Ok(())
}

async fn run_graph(file: &Path, out: &Path, mode: Mode, config: Option<&Path>) -> Result<()> {
    let (namespaces, literal_classes) = match config {
        Some(path) => {
            let config = PipelineConfig::load(path).await?;
            (config.namespaces(), config.literal_classes())
        }
        None => (Namespaces::default(), vec!["E62_String".to_string()]),
    };
    let builder = EdgeBuilder::new(namespaces, literal_classes);

    let content = tokio::fs::read_to_string(file)
        .await
        .context(format!("Failed to read results file: {:?}", file))?;

    let store = match mode {
        Mode::Simple => {
            let records: Vec<BatchRecord<SimpleTriplet>> = parse_records(&content)?;
            let triplets: Vec<SimpleTriplet> = records
                .into_iter()
                .filter_map(|record| record.triplets)
                .flatten()
                .collect();
            graph::assemble_simple(&builder, &triplets)
        }
        Mode::Ontology => {
            let records: Vec<BatchRecord<OntologyTriplet>> = parse_records(&content)?;
            let triplets: Vec<OntologyTriplet> = records
                .into_iter()
                .filter_map(|record| record.triplets)
                .flatten()
                .collect();
            graph::assemble_ontology(&builder, &triplets)
        }
    };

    store.save(out).await?;
    info!(edges = store.len(), out = %out.display(), "wrote graph document");
    Ok(())
}

/// Accept either the line-delimited log or the merged array document.
fn parse_records<T: DeserializeOwned>(content: &str) -> Result<Vec<BatchRecord<T>>> {
    if content.trim_start().starts_with('[') {
        serde_json::from_str(content).context("Failed to parse merged results document")
    } else {
        content
            .lines()
            .filter(|line| !line.is_empty())
            .map(|line| {
                serde_json::from_str(line).context("Results log line is not a valid batch record")
            })
            .collect()
    }
}

async fn run_embed(file: &Path, config_path: &Path, out: Option<PathBuf>) -> Result<()> {
    let config = PipelineConfig::load(config_path).await?;
    let store = GraphStore::load(file).await?;
    let ns = config.namespaces();

    let client = HttpEmbeddingClient::new(
        config.endpoint.clone(),
        config.api_key.clone(),
        config.embedding_model().to_string(),
    );
    let records = graph::embed_graph_nodes(&store, &ns, &client).await?;

    let out = out.unwrap_or_else(|| default_embeddings_path(file));
    graph::save_embeddings(&records, &out).await?;
    info!(nodes = records.len(), out = %out.display(), "wrote embeddings document");
    Ok(())
}

async fn run_query(
    file: &Path,
    embeddings: Option<PathBuf>,
    config_path: &Path,
    query: &str,
    k: usize,
    hops: usize,
) -> Result<()> {
    let config = PipelineConfig::load(config_path).await?;
    let store = GraphStore::load(file).await?;
    let embeddings_path = embeddings.unwrap_or_else(|| default_embeddings_path(file));
    let records = graph::load_embeddings(&embeddings_path).await?;

    let client = HttpEmbeddingClient::new(
        config.endpoint.clone(),
        config.api_key.clone(),
        config.embedding_model().to_string(),
    );
    let engine = QueryEngine::new(store, records, client, config.namespaces());

    let subgraph = engine.retrieve(query, k, hops).await?;
    if subgraph.is_empty() {
        println!("(no grounding facts found)");
    } else {
        println!("{}", subgraph.format_context(engine.namespaces()));
    }
    Ok(())
}

/// `graph.json` → `graph_embeddings.json`, next to the graph document.
fn default_embeddings_path(graph_path: &Path) -> PathBuf {
    let stem = graph_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("graph");
    graph_path.with_file_name(format!("{stem}_embeddings.json"))
}
