use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fragdex_core::chunker::Chunker;
use fragdex_core::config::{Config, Settings};
use fragdex_core::records::load_records;
use fragdex_core::traits::{Embedder, VectorStore};
use fragdex_core::types::ParentRecord;
use fragdex_embed::embedder_from_settings;
use fragdex_hybrid::HybridEngine;
use fragdex_vector::MemoryVectorStore;

#[derive(Parser)]
#[command(name = "fragdex", version, about = "Chunk structured records and rank them with hybrid search")]
struct Cli {
    /// Directory holding fragdex.toml; relative paths in it resolve here.
    #[arg(long, global = true, default_value = ".")]
    config_dir: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the fragments of every record as JSON lines.
    Chunk { path: PathBuf },
    /// Index the records and print the ranked fragments for a query as JSON.
    Search {
        path: PathBuf,
        query: String,
        #[arg(short = 'k', long = "top-k", default_value_t = 10)]
        top_k: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Config::load_in(&cli.config_dir)?.settings().context("loading settings")?;
    match cli.command {
        Command::Chunk { path } => chunk(&settings, &path),
        Command::Search { path, query, top_k } => search(&settings, &cli.config_dir, &path, &query, top_k).await,
    }
}

fn chunk(settings: &Settings, path: &Path) -> anyhow::Result<()> {
    let records = load_records(path).with_context(|| format!("reading records from {}", path.display()))?;
    let report = Chunker::new(settings.chunking.policies()?)?.chunk_records(&records);
    for fragment in &report.fragments {
        println!("{}", serde_json::to_string(fragment)?);
    }
    info!(records = records.len(), fragments = report.fragments.len(), skipped = report.skipped.len(), "chunking complete");
    Ok(())
}

async fn search(settings: &Settings, base: &Path, path: &Path, query: &str, top_k: usize) -> anyhow::Result<()> {
    let records = load_records(path).with_context(|| format!("reading records from {}", path.display()))?;
    let embedder = embedder_from_settings(&settings.embedding, base)?;
    #[cfg(feature = "lancedb")]
    {
        if let Some(dir) = &settings.data.lancedb_dir {
            let uri = fragdex_core::config::resolve_with_base(base, dir);
            let store = fragdex_vector::LanceVectorStore::open(&uri.to_string_lossy(), &settings.data.table, embedder.dim()).await?;
            return run_search(settings, base, embedder, store, &records, query, top_k).await;
        }
    }
    let store = MemoryVectorStore::new(embedder.dim());
    run_search(settings, base, embedder, store, &records, query, top_k).await
}

async fn run_search<S>(settings: &Settings, base: &Path, embedder: Arc<dyn Embedder>, store: S, records: &[ParentRecord], query: &str, top_k: usize) -> anyhow::Result<()>
where
    S: VectorStore + 'static,
{
    let engine = HybridEngine::from_settings_in(settings, embedder, store, base)?;
    let report = engine.index_records(records).await?;
    info!(report = %serde_json::to_string(&report)?, "indexed");
    let ranked = engine.rank(query, top_k).await?;
    println!("{}", serde_json::to_string_pretty(&ranked)?);
    Ok(())
}
