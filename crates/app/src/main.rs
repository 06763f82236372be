use chrono::Utc;
use clap::{Parser, Subcommand};
use semsearch_core::{
    document_id_for_path, ingest_file, ingest_folder, DocumentStore, HashingEmbedder,
    IndexRegistry, IngestOptions, IngestOutcome, RemoteEmbedder, SearchCoordinator, SearchQuery,
};
use semsearch_core::{Embedder, DEFAULT_TOP_K, DOCUMENT_SUBDIR, INDEX_SUBDIR};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-semsearch", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory that holds the persisted indexes and original uploads.
    #[arg(long, default_value = "./data")]
    data_dir: String,

    /// OpenAI-compatible embeddings endpoint. Unset means the built-in
    /// hashing embedder.
    #[arg(long, env = "SEMSEARCH_EMBED_ENDPOINT")]
    embed_endpoint: Option<String>,

    /// Model name sent to the embeddings endpoint.
    #[arg(long, env = "SEMSEARCH_EMBED_MODEL")]
    embed_model: Option<String>,

    /// Bearer token for the embeddings endpoint.
    #[arg(long, env = "SEMSEARCH_EMBED_API_KEY")]
    embed_api_key: Option<String>,

    /// Output dimension of the configured embedding model.
    #[arg(long, env = "SEMSEARCH_EMBED_DIMENSIONS")]
    embed_dimensions: Option<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// Index a PDF file, or every PDF under a folder.
    Ingest {
        /// PDF file or folder to ingest; folders are scanned recursively.
        #[arg(long)]
        path: String,
        /// Rebuild documents that are already indexed with different content.
        #[arg(long, default_value_t = false)]
        replace: bool,
    },
    /// Search the indexed documents and print ranked snippets.
    Search {
        /// Search query
        #[arg(long)]
        query: String,
        /// Restrict the search to this document id; repeat for several.
        #[arg(long = "document")]
        documents: Vec<String>,
        /// Number of results to return.
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
    },
    /// List the indexed documents.
    List,
    /// Remove a document's index and stored bytes.
    Remove {
        /// Document id to remove.
        #[arg(long)]
        document: String,
    },
}

fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    info!(
        version = app_version,
        data_dir = %cli.data_dir,
        started_at = %Utc::now().to_rfc3339(),
        "pdf-semsearch boot"
    );

    let data_dir = Path::new(&cli.data_dir);
    let registry = Arc::new(
        IndexRegistry::open(data_dir.join(INDEX_SUBDIR))
            .map_err(|error| anyhow::anyhow!(error.to_string()))?,
    );
    let documents = DocumentStore::open(data_dir.join(DOCUMENT_SUBDIR))
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;

    let embedder: Box<dyn Embedder> = match &cli.embed_endpoint {
        Some(endpoint) => {
            let model = cli
                .embed_model
                .clone()
                .ok_or_else(|| anyhow::anyhow!("--embed-model is required with --embed-endpoint"))?;
            let dimensions = cli.embed_dimensions.ok_or_else(|| {
                anyhow::anyhow!("--embed-dimensions is required with --embed-endpoint")
            })?;
            let remote = RemoteEmbedder::new(endpoint, model, cli.embed_api_key.clone(), dimensions)
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            info!(
                endpoint = %remote.endpoint(),
                dimensions = remote.dimensions(),
                "using remote embedding endpoint"
            );
            Box::new(remote)
        }
        None => {
            info!("using built-in hashing embedder");
            Box::new(HashingEmbedder::default())
        }
    };

    match cli.command {
        Command::Ingest { path, replace } => {
            let path = Path::new(&path);
            let options = IngestOptions {
                replace,
                documents: Some(&documents),
                cancel: None,
            };

            if path.is_dir() {
                info!(folder = %path.display(), replace, "ingesting pdf folder");
                let report = ingest_folder(path, embedder.as_ref(), &registry, &options)
                    .map_err(|error| anyhow::anyhow!(error.to_string()))?;

                if !report.skipped.is_empty() {
                    warn!(
                        "skipped_files={} for folder={}",
                        report.skipped.len(),
                        path.display()
                    );
                    for skipped in &report.skipped {
                        warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped pdf");
                    }
                }

                for document_id in &report.needs_confirmation {
                    println!(
                        "{document_id} is already indexed with different content; rerun with --replace to rebuild"
                    );
                }

                println!(
                    "{} indexed, {} replaced, {} unchanged at {}",
                    report.indexed.len(),
                    report.replaced.len(),
                    report.unchanged.len(),
                    Utc::now().to_rfc3339()
                );
            } else {
                let document_id = document_id_for_path(path)
                    .map_err(|error| anyhow::anyhow!(error.to_string()))?;
                info!(path = %path.display(), document_id = document_id.as_str(), replace, "ingesting pdf");
                let outcome = ingest_file(path, embedder.as_ref(), &registry, &options)
                    .map_err(|error| anyhow::anyhow!(error.to_string()))?;

                match outcome {
                    IngestOutcome::Indexed => println!("{document_id} indexed"),
                    IngestOutcome::Replaced => println!("{document_id} replaced"),
                    IngestOutcome::Unchanged => println!("{document_id} unchanged"),
                    IngestOutcome::NeedsConfirmation => println!(
                        "{document_id} is already indexed with different content; rerun with --replace to rebuild"
                    ),
                }
            }
        }
        Command::Search {
            query,
            documents,
            top_k,
        } => {
            let coordinator = SearchCoordinator::new(Arc::clone(&registry), embedder);
            let search_query = SearchQuery {
                text: query,
                document_ids: documents,
                top_k,
            };

            let hits = coordinator
                .search(&search_query)
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            println!("query: {}", search_query.text);
            if hits.is_empty() {
                println!("no results");
            }
            for (rank, hit) in hits.iter().enumerate() {
                println!(
                    "[{}] score={:.4} document_id={} page={}",
                    rank + 1,
                    hit.score,
                    hit.document_id,
                    hit.page_number
                );
                println!("  {}", hit.snippet);
            }
        }
        Command::List => {
            let ids = registry.list_ids();
            if ids.is_empty() {
                println!("no documents indexed");
            }
            for id in ids {
                if let Some(index) = registry.get(&id) {
                    println!(
                        "{} blocks={} dimensions={} built_at={}",
                        id,
                        index.len(),
                        index.dimensions(),
                        index.built_at().to_rfc3339()
                    );
                }
            }
        }
        Command::Remove { document } => {
            let removed_index = registry
                .remove(&document)
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            let removed_bytes = documents
                .remove(&document)
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            if removed_index || removed_bytes {
                println!("removed {document}");
            } else {
                println!("{document} is not indexed");
            }
        }
    }

    Ok(())
}
