use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

use archive_rag::config::Config;
use archive_rag::embedder::download;
use archive_rag::embedder::onnx::OnnxEmbedder;
use archive_rag::pipeline::Pipeline;

#[derive(Parser)]
#[command(name = "archive-rag", version, about = "Index an archive corpus and retrieve relevant passages")]
struct Cli {
    /// Configuration file (JSON)
    #[arg(long, env = "ARCHIVE_RAG_CONFIG", default_value = "config.json", global = true)]
    config: String,

    /// Corpus directory (overrides corpus_dir)
    #[arg(long, global = true)]
    corpus: Option<String>,

    /// Index directory (overrides index_dir)
    #[arg(long, global = true)]
    index_dir: Option<String>,

    /// Log level when RUST_LOG is not set (overrides log_level)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the index, or load it if it already exists
    Index {
        /// Rebuild even if an index exists
        #[arg(long)]
        force: bool,
    },
    /// Retrieve the most relevant passages for a query
    Query {
        text: String,
        #[arg(long)]
        top_k: Option<usize>,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show pipeline and index status as JSON
    Status,
    /// Download the embedding model files
    DownloadModel,
}

type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Install the subscriber before the configuration is read.
///
/// Returns a handle for applying the configured level later, or `None`
/// when `RUST_LOG` is set and wins.
fn init_tracing(level: Option<&str>) -> Option<FilterHandle> {
    let from_env = EnvFilter::try_from_default_env().ok();
    let env_set = from_env.is_some();
    let filter = from_env.unwrap_or_else(|| EnvFilter::new(level.unwrap_or("info")));

    let (filter, handle) = reload::Layer::new(filter);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    (!env_set).then_some(handle)
}

fn apply_log_level(handle: &FilterHandle, level: &str) -> Result<()> {
    handle
        .reload(EnvFilter::new(level))
        .context("failed to apply log level")
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(&cli.config)?;
    if let Some(corpus) = &cli.corpus {
        config.corpus_dir = corpus.clone();
    }
    if let Some(index_dir) = &cli.index_dir {
        config.index_dir = index_dir.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Load the ONNX model, downloading it first if allowed.
fn load_pipeline(config: Config) -> Result<Pipeline> {
    let model_dir = config.model_path();
    if !download::all_files_present(&model_dir) {
        anyhow::ensure!(
            config.model.auto_download,
            "model files missing in {} (run `archive-rag download-model`)",
            model_dir.display()
        );
        download::download_model_files(&config.model.name, &model_dir)
            .context("failed to download model files")?;
    }

    let embedder = OnnxEmbedder::new(&model_dir, &config.model)
        .context("failed to initialize embedding model")?;
    let tokenizer = embedder.tokenizer();
    Ok(Pipeline::new(config, Arc::new(embedder), tokenizer))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_handle = init_tracing(cli.log_level.as_deref());
    let config = load_config(&cli)?;
    if let Some(handle) = &log_handle {
        apply_log_level(handle, &config.log_level)?;
    }

    match cli.command {
        Command::Index { force } => {
            let corpus = PathBuf::from(&config.corpus_dir);
            let mut pipeline = load_pipeline(config)?;
            pipeline
                .initialize(Some(&corpus), force)
                .context("indexing failed")?;
            let status = pipeline.status();
            println!(
                "Index ready: {} chunks from {} documents in {}",
                status.indexed_chunks.unwrap_or(0),
                status.indexed_documents.unwrap_or(0),
                status.index_dir.display()
            );
        }
        Command::Query { text, top_k, json } => {
            let mut pipeline = load_pipeline(config)?;
            pipeline
                .initialize(None, false)
                .context("failed to initialize pipeline")?;
            let results = pipeline
                .retrieve(&text, top_k)
                .context("retrieval failed")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                for (rank, r) in results.iter().enumerate() {
                    println!(
                        "{}. [{:.4}] {} (chunk {})",
                        rank + 1,
                        r.score,
                        r.source,
                        r.position
                    );
                    println!("{}\n", r.text);
                }
            }
        }
        Command::Status => {
            let mut pipeline = load_pipeline(config)?;
            if pipeline.config().index_path().is_dir() {
                pipeline
                    .initialize(None, false)
                    .context("failed to load index")?;
            }
            println!("{}", serde_json::to_string_pretty(&pipeline.status())?);
        }
        Command::DownloadModel => {
            let model_dir = config.model_path();
            download::download_model_files(&config.model.name, &model_dir)?;
            info!("Model files ready in {}", model_dir.display());
        }
    }

    Ok(())
}
