//! Interactive grounded Q&A over a previously ingested index.
//!
//! ```bash
//! SPECSAGE_API_KEY=... cargo run --example ask
//! ```
//!
//! Type a question per line; `q`, `quit`, or `exit` ends the session.

use std::env;
use std::io::{self, Write};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use tracing_subscriber::FmtSubscriber;

use specsage::chat::glm::DEFAULT_ENDPOINT;
use specsage::chat::{ChatModel, ChatSession, GlmChatModel, Message};
use specsage::config::RetrievalConfig;
use specsage::embeddings::{EmbeddingProvider, HttpEmbeddingProvider, MockEmbeddingProvider};
use specsage::retrieval::Retriever;
use specsage::stores::sqlite::SqliteChunkStore;
use specsage::types::RagError;

/// Stand-in model for key-less runs: reports what would have been sent.
struct OfflineChatModel;

#[async_trait]
impl ChatModel for OfflineChatModel {
    async fn complete(&self, messages: &[Message]) -> Result<String, RagError> {
        let prompt_chars = messages.last().map(|m| m.content.len()).unwrap_or(0);
        Ok(format!(
            "(offline) would have sent {} messages ({prompt_chars} chars of grounded prompt); \
             set SPECSAGE_API_KEY for real answers",
            messages.len()
        ))
    }
}

#[tokio::main]
async fn main() -> Result<(), RagError> {
    init_tracing();
    dotenvy::dotenv().ok();

    let db_path =
        env::var("SPECSAGE_DB").unwrap_or_else(|_| "./specsage_index.sqlite".to_string());
    let store = Arc::new(SqliteChunkStore::open(&db_path).await?);

    // Query embeddings must come from the same model the index was built
    // with, so the provider choice mirrors the ingest example.
    let (embedder, model): (Arc<dyn EmbeddingProvider>, Arc<dyn ChatModel>) =
        match env::var("SPECSAGE_API_KEY") {
            Ok(api_key) => {
                let embeddings_url = env::var("SPECSAGE_EMBEDDINGS_URL").unwrap_or_else(|_| {
                    "https://open.bigmodel.cn/api/paas/v4/embeddings".to_string()
                });
                let embedding_model = env::var("SPECSAGE_EMBEDDING_MODEL")
                    .unwrap_or_else(|_| "embedding-3".to_string());
                let chat_url =
                    env::var("SPECSAGE_CHAT_URL").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
                let chat_model =
                    env::var("SPECSAGE_CHAT_MODEL").unwrap_or_else(|_| "glm-4".to_string());
                let client = Client::new();
                (
                    Arc::new(HttpEmbeddingProvider::new(
                        client.clone(),
                        embeddings_url,
                        api_key.clone(),
                        embedding_model,
                    )),
                    Arc::new(GlmChatModel::new(client, chat_url, api_key, chat_model)),
                )
            }
            Err(_) => (
                Arc::new(MockEmbeddingProvider::new()),
                Arc::new(OfflineChatModel),
            ),
        };

    let retriever = Retriever::new(embedder, store, RetrievalConfig::default())?;

    let mut session = ChatSession::new(retriever, model);
    println!("specsage Q&A — multi-turn, grounded in the ingested documents (q to quit)");

    loop {
        print!("\nQuestion: ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if matches!(query.to_lowercase().as_str(), "q" | "quit" | "exit") {
            println!("Bye.");
            break;
        }

        match session.ask(query).await {
            Ok(answer) => {
                println!("\n{}", answer.reply);
                for reference in &answer.references {
                    println!("  {reference}");
                }
            }
            Err(RagError::IndexMissing) => {
                println!("No index yet — run the ingest example first.");
                break;
            }
            Err(err) => {
                println!("Error: {err}");
            }
        }
    }

    Ok(())
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let subscriber = FmtSubscriber::builder().with_env_filter("info").finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
