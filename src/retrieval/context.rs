//! Turning ranked retrieval results into a grounded prompt with provenance.

use std::fmt::Write as _;

use crate::retrieval::RankedChunk;

/// Instruction given to the model for every grounded exchange.
const SYSTEM_PROMPT: &str = "You are an expert at interpreting technical \
specifications. Answer using only the document excerpts supplied with each \
question. If the excerpts do not contain the answer, say that the indexed \
documents do not cover it. Never invent content that is not in the excerpts.";

/// Framing used when retrieval produced no evidence for the question.
const EMPTY_CONTEXT_NOTICE: &str = "No relevant documents were found for this \
question. Tell the user that the indexed documents do not cover it.";

/// A grounding prompt plus the human-readable provenance that backs it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssembledContext {
    pub prompt: String,
    pub references: Vec<String>,
}

impl AssembledContext {
    pub fn has_evidence(&self) -> bool {
        !self.references.is_empty()
    }
}

/// Builds grounded prompts from ranked chunks.
///
/// Chunks are numbered in rank order and concatenated into a context block;
/// one reference string per chunk surfaces source, chapter, and page span for
/// display alongside the answer. Empty retrieval still produces a usable
/// prompt so the conversation proceeds without a gap.
#[derive(Clone, Debug, Default)]
pub struct ContextAssembler;

impl ContextAssembler {
    pub fn new() -> Self {
        Self
    }

    pub fn system_prompt(&self) -> &'static str {
        SYSTEM_PROMPT
    }

    pub fn build(&self, query: &str, results: &[RankedChunk]) -> AssembledContext {
        if results.is_empty() {
            return AssembledContext {
                prompt: format!("{EMPTY_CONTEXT_NOTICE}\n\nQuestion: {query}"),
                references: Vec::new(),
            };
        }

        let mut context = String::from("Relevant document excerpts:\n");
        let mut references = Vec::with_capacity(results.len());

        for (rank, result) in results.iter().enumerate() {
            let number = rank + 1;
            let meta = &result.chunk.metadata;

            let _ = write!(context, "\n[{number}] {}\n", result.chunk.content.trim());
            references.push(format!(
                "[{number}] {} · {} · pages {}-{}",
                meta.source, meta.chapter, meta.start_page, meta.end_page
            ));
        }

        let prompt = format!(
            "{context}\nAnswer from the excerpts above only.\n\nQuestion: {query}"
        );
        AssembledContext { prompt, references }
    }
}
