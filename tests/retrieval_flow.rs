//! Integration tests for the retrieval → assembly → conversation flow.

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use tempfile::TempDir;

use specsage::chat::{ChatModel, ChatSession, FALLBACK_REPLY, Message};
use specsage::config::{ChunkingConfig, RetrievalConfig, ScoreOrder};
use specsage::document::source::PagedTextDocument;
use specsage::embeddings::MockEmbeddingProvider;
use specsage::ingestion::pipeline::IngestionPipeline;
use specsage::ingestion::progress::ProgressLog;
use specsage::retrieval::Retriever;
use specsage::VectorBackend;
use specsage::stores::sqlite::SqliteChunkStore;
use specsage::types::RagError;

const SPEC_TEXT: &str = "# Commissioning\nThe commissioning flow pairs a new \
device over Bluetooth LE and hands it network credentials.\x0cAfter pairing, \
the commissioner verifies the device attestation certificate.\x0c# Data Model\n\
Every device exposes clusters of attributes and commands grouped by endpoint.";

async fn ingest_fixture(dir: &TempDir) -> Arc<SqliteChunkStore> {
    let store = Arc::new(
        SqliteChunkStore::open(dir.path().join("index.sqlite"))
            .await
            .unwrap(),
    );
    let pipeline = IngestionPipeline::new(
        Arc::new(MockEmbeddingProvider::new()),
        store.clone(),
        ProgressLog::new(dir.path().join("progress.json")),
        ChunkingConfig::default(),
    )
    .unwrap();
    let doc = PagedTextDocument::from_text("matter.txt", SPEC_TEXT);
    pipeline.ingest(&doc).await.unwrap();
    store
}

fn retriever(store: Arc<SqliteChunkStore>, config: RetrievalConfig) -> Retriever {
    Retriever::new(Arc::new(MockEmbeddingProvider::new()), store, config).unwrap()
}

/// Chat model that records every message list it is asked to complete.
struct CapturingChatModel {
    seen: Mutex<Vec<Vec<Message>>>,
    replies: Mutex<Vec<String>>,
}

impl CapturingChatModel {
    fn new(replies: &[&str]) -> Self {
        Self {
            seen: Mutex::new(Vec::new()),
            replies: Mutex::new(replies.iter().rev().map(|r| r.to_string()).collect()),
        }
    }

    fn requests(&self) -> Vec<Vec<Message>> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for CapturingChatModel {
    async fn complete(&self, messages: &[Message]) -> Result<String, RagError> {
        self.seen.lock().unwrap().push(messages.to_vec());
        Ok(self
            .replies
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| "ok".to_string()))
    }
}

struct FailingChatModel;

#[async_trait]
impl ChatModel for FailingChatModel {
    async fn complete(&self, _messages: &[Message]) -> Result<String, RagError> {
        Err(RagError::Chat("connection refused".into()))
    }
}

#[tokio::test]
async fn exact_text_retrieves_its_own_chunk_first() {
    let dir = TempDir::new().unwrap();
    let store = ingest_fixture(&dir).await;

    let config = RetrievalConfig {
        top_k: 4,
        score_threshold: -1.0,
        score_order: ScoreOrder::HigherIsBetter,
    };
    let retriever = retriever(store.clone(), config);

    // Querying with a stored chunk's exact text embeds to the identical
    // vector, so that chunk must rank first with similarity ~1.
    let chunks = store.chunks_for_source("matter.txt").await.unwrap();
    let target = &chunks[0];
    let results = retriever.search(&target.content).await.unwrap();

    assert_eq!(results[0].chunk.id, target.id);
    assert!(results[0].score > 0.99);
    for pair in results.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[tokio::test]
async fn session_grounds_answers_and_keeps_alternation() {
    let dir = TempDir::new().unwrap();
    let store = ingest_fixture(&dir).await;
    let config = RetrievalConfig {
        top_k: 2,
        score_threshold: -1.0,
        score_order: ScoreOrder::HigherIsBetter,
    };
    let model = Arc::new(CapturingChatModel::new(&["pairing over BLE"]));
    let mut session = ChatSession::new(retriever(store, config), model.clone());

    let answer = session.ask("How are devices commissioned?").await.unwrap();
    assert_eq!(answer.reply, "pairing over BLE");
    assert_eq!(answer.references.len(), 2);
    assert!(answer.references[0].starts_with("[1] matter.txt"));

    let requests = model.requests();
    let messages = &requests[0];
    assert_eq!(messages[0].role, Message::SYSTEM);
    let prompt = &messages.last().unwrap().content;
    assert!(prompt.contains("[1]"));
    assert!(prompt.contains("Question: How are devices commissioned?"));

    assert_eq!(
        session
            .history()
            .iter()
            .map(|m| m.role.as_str())
            .collect::<Vec<_>>(),
        vec!["user", "assistant"]
    );
    assert_eq!(session.history()[0].content, "How are devices commissioned?");
}

#[tokio::test]
async fn empty_retrieval_still_advances_the_conversation() {
    let dir = TempDir::new().unwrap();
    let store = ingest_fixture(&dir).await;

    // A threshold no cosine similarity can reach filters every candidate.
    let config = RetrievalConfig {
        top_k: 2,
        score_threshold: 2.0,
        score_order: ScoreOrder::HigherIsBetter,
    };
    let model = Arc::new(CapturingChatModel::new(&["B", "not covered"]));
    let mut session = ChatSession::new(retriever(store, config), model.clone());

    session.ask("A").await.unwrap();
    let answer = session.ask("C").await.unwrap();

    assert_eq!(answer.reply, "not covered");
    assert!(answer.references.is_empty());

    // The second request carries the prior turns and the empty-context framing.
    let requests = model.requests();
    let second = &requests[1];
    assert_eq!(second[0].role, Message::SYSTEM);
    assert_eq!(second[1], Message::user("A"));
    assert_eq!(second[2], Message::assistant("B"));
    assert!(second[3].content.contains("No relevant documents were found"));
    assert!(second[3].content.contains("Question: C"));

    let roles: Vec<_> = session.history().iter().map(|m| m.role.as_str()).collect();
    assert_eq!(roles, vec!["user", "assistant", "user", "assistant"]);
    assert_eq!(session.history()[2].content, "C");
}

#[tokio::test]
async fn chat_failure_degrades_to_the_fallback_reply() {
    let dir = TempDir::new().unwrap();
    let store = ingest_fixture(&dir).await;
    let config = RetrievalConfig {
        top_k: 2,
        score_threshold: -1.0,
        score_order: ScoreOrder::HigherIsBetter,
    };
    let mut session = ChatSession::new(retriever(store, config), Arc::new(FailingChatModel));

    let answer = session.ask("anything").await.unwrap();
    assert_eq!(answer.reply, FALLBACK_REPLY);

    // The failed turn still lands in history with alternation intact.
    let roles: Vec<_> = session.history().iter().map(|m| m.role.as_str()).collect();
    assert_eq!(roles, vec!["user", "assistant"]);
    assert_eq!(session.history()[1].content, FALLBACK_REPLY);
}

#[tokio::test]
async fn querying_an_empty_index_is_surfaced_not_hidden() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(
        SqliteChunkStore::open(dir.path().join("index.sqlite"))
            .await
            .unwrap(),
    );
    let mut session = ChatSession::new(
        retriever(store, RetrievalConfig::default()),
        Arc::new(CapturingChatModel::new(&[])),
    );

    let err = session.ask("anything").await.unwrap_err();
    assert!(matches!(err, RagError::IndexMissing));
    assert!(session.history().is_empty());
}
