use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kvsearch::{connect, Document, EngineConfig, FileSystemSource, IndexReader, IndexWriter, KvStore, RowSource};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and maintain full-text indexes in a key-value store", long_about = None)]
struct Cli {
    /// Engine configuration (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Store directory; overrides `storage` from the configuration
    #[arg(long, global = true)]
    storage: Option<PathBuf>,
    /// Index name
    #[arg(long, global = true, default_value = "default")]
    index: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recreate the index from JSON/JSONL rows, or from the configured directory walk
    Build {
        /// Input path (file or directory); omit to walk `location` from the configuration
        #[arg(long)]
        input: Option<PathBuf>,
        /// Log progress at debug level only
        #[arg(long, default_value_t = false)]
        quiet: bool,
    },
    /// Add one document given as a JSON object
    Insert {
        #[arg(long)]
        doc: String,
    },
    /// Replace the postings of a document
    Update {
        #[arg(long)]
        id: u64,
        #[arg(long)]
        doc: String,
    },
    /// Remove a document
    Delete {
        #[arg(long)]
        id: u64,
    },
    /// Print index statistics, or the statistics of one term
    Stats {
        #[arg(long)]
        term: Option<String>,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path).with_context(|| format!("reading {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if cli.storage.is_some() {
        config.storage = cli.storage.clone();
    }
    let store = connect(&config)?;

    match cli.command {
        Commands::Build { input, quiet } => {
            let mut writer = IndexWriter::create(store, &cli.index, &config)?;
            writer.disable_output(quiet);
            let report = match input {
                Some(path) => writer.run(&RowSource::from_path(&path)?)?,
                None => writer.run(&FileSystemSource::from_config(&config)?)?,
            };
            tracing::info!(index = %cli.index, indexed = report.indexed, skipped = report.skipped.len(), "index build complete");
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Insert { doc } => {
            let writer = IndexWriter::open(store.clone(), &cli.index, &config)?;
            let id = writer.insert(&parse_document(&doc)?)?;
            store.flush()?;
            tracing::info!(index = %cli.index, id, "inserted");
        }
        Commands::Update { id, doc } => {
            let writer = IndexWriter::open(store.clone(), &cli.index, &config)?;
            writer.update(id, &parse_document(&doc)?)?;
            store.flush()?;
            tracing::info!(index = %cli.index, id, "updated");
        }
        Commands::Delete { id } => {
            let writer = IndexWriter::open(store.clone(), &cli.index, &config)?;
            if writer.delete(id)? {
                store.flush()?;
                tracing::info!(index = %cli.index, id, "deleted");
            } else {
                tracing::info!(index = %cli.index, id, "document not indexed, nothing to delete");
            }
        }
        Commands::Stats { term } => {
            let reader = IndexReader::open(store, &cli.index, &config)?;
            let out = match term {
                Some(term) => serde_json::to_value(reader.word_from_wordlist(&term)?)?,
                None => serde_json::to_value(reader.info()?)?,
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }
    Ok(())
}

fn parse_document(raw: &str) -> Result<Document> {
    let value: serde_json::Value = serde_json::from_str(raw).context("document is not valid JSON")?;
    Ok(Document::from_json(value)?)
}
