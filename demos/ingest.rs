//! Ingests a paginated specification document into the local vector index.
//!
//! ```bash
//! SPECSAGE_DOC=./docs/matter.txt cargo run --example ingest
//! ```
//!
//! With `SPECSAGE_API_KEY` set, embeddings come from the configured HTTP
//! endpoint; without it, deterministic mock embeddings are used so the
//! pipeline can be exercised offline.

use std::env;
use std::sync::Arc;
use std::time::Instant;

use reqwest::Client;
use tracing_subscriber::FmtSubscriber;

use specsage::config::ChunkingConfig;
use specsage::document::source::{DocumentSource, PagedTextDocument};
use specsage::embeddings::{EmbeddingProvider, HttpEmbeddingProvider, MockEmbeddingProvider};
use specsage::ingestion::pipeline::IngestionPipeline;
use specsage::ingestion::progress::ProgressLog;
use specsage::stores::sqlite::SqliteChunkStore;
use specsage::stores::VectorBackend;
use specsage::types::RagError;

const DEFAULT_EMBEDDINGS_URL: &str = "https://open.bigmodel.cn/api/paas/v4/embeddings";

#[tokio::main]
async fn main() -> Result<(), RagError> {
    init_tracing();
    dotenvy::dotenv().ok();

    let doc_path = env::var("SPECSAGE_DOC").unwrap_or_else(|_| "./docs/spec.txt".to_string());
    let db_path =
        env::var("SPECSAGE_DB").unwrap_or_else(|_| "./specsage_index.sqlite".to_string());
    let progress_path =
        env::var("SPECSAGE_PROGRESS").unwrap_or_else(|_| "./specsage_progress.json".to_string());

    let embedder: Arc<dyn EmbeddingProvider> = match env::var("SPECSAGE_API_KEY") {
        Ok(api_key) => {
            let endpoint = env::var("SPECSAGE_EMBEDDINGS_URL")
                .unwrap_or_else(|_| DEFAULT_EMBEDDINGS_URL.to_string());
            let model = env::var("SPECSAGE_EMBEDDING_MODEL")
                .unwrap_or_else(|_| "embedding-3".to_string());
            println!("Using remote embeddings ({model})");
            Arc::new(HttpEmbeddingProvider::new(
                Client::new(),
                endpoint,
                api_key,
                model,
            ))
        }
        Err(_) => {
            println!("SPECSAGE_API_KEY not set; using mock embeddings");
            Arc::new(MockEmbeddingProvider::new())
        }
    };

    let document = PagedTextDocument::load(&doc_path).await?;
    println!(
        "Loaded {} ({} pages, ToC: {})",
        document.source_id(),
        document.pages().len(),
        if document.toc().is_some() { "yes" } else { "no" },
    );

    let store = Arc::new(SqliteChunkStore::open(&db_path).await?);
    let progress = ProgressLog::new(&progress_path);
    let pipeline =
        IngestionPipeline::new(embedder, store.clone(), progress, ChunkingConfig::default())?;

    let start = Instant::now();
    let report = pipeline.ingest(&document).await?;

    println!("\n✅ Ingestion complete!");
    println!("  units processed : {}", report.units_processed);
    println!("  units skipped   : {}", report.units_skipped);
    println!("  chunks written  : {}", report.chunks_written);
    println!("  index size      : {} chunks", store.count().await?);
    println!("  duration        : {:.2?}", start.elapsed());
    println!("  sqlite database : {db_path}");
    println!("  progress file   : {progress_path}");

    Ok(())
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let subscriber = FmtSubscriber::builder().with_env_filter("info").finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
