//! Prompt construction.
//!
//! [`build_prompt`] is a pure function: the same chunks, question and target
//! language always render the same bytes.

use crate::language::TargetLanguage;
use crate::models::ScoredChunk;

/// Separator placed between retrieved chunk texts.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

const PREAMBLE: &str = "You are a helpful assistant. Answer the user's question based only on the \
document below. If the document does not contain the answer, say that you cannot find it in \
the document.";

/// Join chunk texts in retrieval order.
pub fn build_context(chunks: &[ScoredChunk]) -> String {
    chunks
        .iter()
        .map(|c| c.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// Render the instruction sent to the generator.
///
/// Layout:
///
/// ```text
/// <role and grounding constraint>
///
/// Document:
/// <chunk 1>
///
/// <chunk 2>
///
/// Question:
/// <query>
///
/// IMPORTANT: Write your entire response in <language>.   (non-English targets only)
/// ```
pub fn build_prompt(chunks: &[ScoredChunk], query: &str, target: &TargetLanguage) -> String {
    let mut prompt = format!(
        "{}\n\nDocument:\n{}\n\nQuestion:\n{}",
        PREAMBLE,
        build_context(chunks),
        query
    );

    if !target.is_default() {
        prompt.push_str(&format!(
            "\n\nIMPORTANT: Write your entire response in {}, even if the document is written \
             in another language.",
            target.name
        ));
    }

    prompt
}
