//! Multi-turn grounded conversation on top of retrieval.

pub mod glm;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::retrieval::context::ContextAssembler;
use crate::retrieval::Retriever;
use crate::types::RagError;

pub use glm::GlmChatModel;

/// Reply used when the chat capability fails; the conversation continues.
pub const FALLBACK_REPLY: &str =
    "I could not produce an answer right now; the language model is unavailable.";

/// A message in a conversation: a role and text content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub const USER: &'static str = "user";
    pub const ASSISTANT: &'static str = "assistant";
    pub const SYSTEM: &'static str = "system";

    #[must_use]
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    #[must_use]
    pub fn user(content: &str) -> Self {
        Self::new(Self::USER, content)
    }

    #[must_use]
    pub fn assistant(content: &str) -> Self {
        Self::new(Self::ASSISTANT, content)
    }

    #[must_use]
    pub fn system(content: &str) -> Self {
        Self::new(Self::SYSTEM, content)
    }
}

/// A stateless chat completion capability. History must be resent each call.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[Message]) -> Result<String, RagError>;
}

/// An answer with the provenance that grounded it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Answer {
    pub reply: String,
    pub references: Vec<String>,
}

/// One conversation over an indexed corpus.
///
/// Each [`ask`](ChatSession::ask) retrieves evidence, assembles a grounded
/// prompt, and dispatches `system + history + current user turn` to the chat
/// model. History records the raw question (not the stuffed prompt) and the
/// reply, appended only after the exchange completes, so role alternation is
/// `user, assistant, user, …` with no gaps:
///
/// * retrieval trouble (other than a missing index) degrades to an
///   empty-context turn framed as "no relevant documents found";
/// * a chat-capability failure degrades to [`FALLBACK_REPLY`].
///
/// A missing index is the one fatal case — it is surfaced instead of being
/// dressed up as an empty answer.
pub struct ChatSession {
    retriever: Retriever,
    assembler: ContextAssembler,
    model: Arc<dyn ChatModel>,
    history: Vec<Message>,
}

impl ChatSession {
    pub fn new(retriever: Retriever, model: Arc<dyn ChatModel>) -> Self {
        Self {
            retriever,
            assembler: ContextAssembler::new(),
            model,
            history: Vec::new(),
        }
    }

    /// Prior turns in order, alternating user/assistant.
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub async fn ask(&mut self, query: &str) -> Result<Answer, RagError> {
        let results = match self.retriever.search(query).await {
            Ok(results) => results,
            Err(RagError::IndexMissing) => return Err(RagError::IndexMissing),
            Err(err) => {
                tracing::warn!(error = %err, "retrieval failed; proceeding without context");
                Vec::new()
            }
        };

        let assembled = self.assembler.build(query, &results);

        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(Message::system(self.assembler.system_prompt()));
        messages.extend(self.history.iter().cloned());
        messages.push(Message::user(&assembled.prompt));

        let reply = match self.model.complete(&messages).await {
            Ok(reply) => reply,
            Err(err) => {
                tracing::warn!(error = %err, "chat model failed; returning fallback reply");
                FALLBACK_REPLY.to_string()
            }
        };

        self.history.push(Message::user(query));
        self.history.push(Message::assistant(&reply));

        Ok(Answer {
            reply,
            references: assembled.references,
        })
    }
}
