//! Prompt construction under the answer-only-from-the-document policy.
//!
//! Pure string building: the strict instruction block, the verbatim document
//! content (numbered and demarcated in multi-document mode), the serialized
//! recent history, and the literal question. Chat prompts never truncate
//! document content; only summary generation has a content budget.

use docuchat_core::types::{Document, Message};

/// The exact refusal sentence the model is instructed to use when the
/// answer is absent from the document. The grounding verifier's
/// "information is not" trigger matches it.
pub const REFUSAL_SENTENCE: &str = "The information is not present in the provided document.";

/// Canned reply for a single document with no usable text content.
pub const INSUFFICIENT_CONTENT_REPLY: &str = "I cannot answer questions about this document \
because it contains no readable text content. Please upload a document with extractable text.";

/// Canned reply when every supplied document lacks usable text content.
pub const INSUFFICIENT_CONTENT_REPLY_MULTI: &str = "I cannot answer questions about these \
documents because none of them contain readable text content. Please upload documents with \
extractable text.";

/// Canned reply for a bare greeting: prompt the user to engage with the
/// document instead of burning a model call.
pub const GREETING_REPLY: &str = "Hello! I'm ready to answer questions about your document. \
Ask me anything about its content.";

/// Greeting tokens matched case-insensitively, with an optional trailing "!".
const GREETINGS: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "hi there",
    "hello there",
    "good morning",
    "good afternoon",
    "good evening",
];

/// Whether the question is exactly a greeting (case-insensitive, optional
/// trailing exclamation mark).
pub fn is_greeting(question: &str) -> bool {
    let normalized = question.trim().trim_end_matches('!').trim().to_lowercase();
    GREETINGS.contains(&normalized.as_str())
}

/// Notice emitted before any model token when some (but not all) documents
/// were excluded for insufficient content. Names appear verbatim.
pub fn exclusion_notice(excluded_names: &[String]) -> String {
    format!(
        "Note: The following document(s) were excluded because they contain no readable text \
content: {}.\n\n",
        excluded_names.join(", ")
    )
}

/// Serialize recent history as one `role: content` line per message,
/// chronological order.
fn serialize_history(history: &[Message]) -> String {
    history
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the prompt for single-document chat.
pub fn single_document_prompt(document: &Document, history: &[Message], question: &str) -> String {
    let history_block = if history.is_empty() {
        "(no previous messages)".to_string()
    } else {
        serialize_history(history)
    };

    format!(
        "You are a document assistant. You answer questions strictly from the document \
content provided below.

Rules:
1. Use ONLY the document content to answer. Never use outside knowledge.
2. Quote or reference the relevant part of the document in your answer.
3. If the document does not contain the answer, reply exactly: \"{refusal}\"
4. If the question is ambiguous, ask for clarification instead of guessing.
5. Politely decline questions unrelated to the document.

DOCUMENT: {name}
{content}
END OF DOCUMENT

Conversation so far:
{history}

Question: {question}

Answer using only the document content above. If the information is absent, reply exactly \
with the refusal sentence from rule 3.",
        refusal = REFUSAL_SENTENCE,
        name = document.name,
        content = document.content,
        history = history_block,
        question = question,
    )
}

/// Build the prompt for multi-document chat.
///
/// Each document is numbered and demarcated so the model can attribute
/// facts to a specific source.
pub fn multi_document_prompt(
    documents: &[Document],
    history: &[Message],
    question: &str,
) -> String {
    let mut content_blocks = String::new();
    for (i, doc) in documents.iter().enumerate() {
        let n = i + 1;
        content_blocks.push_str(&format!(
            "DOCUMENT {n}: {name}\n{content}\nEND OF DOCUMENT {n}\n\n",
            n = n,
            name = doc.name,
            content = doc.content,
        ));
    }

    let history_block = if history.is_empty() {
        "(no previous messages)".to_string()
    } else {
        serialize_history(history)
    };

    format!(
        "You are a document assistant. You answer questions strictly from the {count} \
documents provided below.

Rules:
1. Use ONLY the document contents to answer. Never use outside knowledge.
2. Attribute every fact to its source by document number, e.g. \"According to Document 2\".
3. If the documents do not contain the answer, reply exactly: \"{refusal}\"
4. If the documents contradict each other, point out the contradiction and cite both sources.
5. If the question is ambiguous, ask for clarification instead of guessing.
6. Politely decline questions unrelated to the documents.

{blocks}Conversation so far:
{history}

Question: {question}

Answer using only the document contents above. If the information is absent, reply exactly \
with the refusal sentence from rule 3.",
        count = documents.len(),
        refusal = REFUSAL_SENTENCE,
        blocks = content_blocks,
        history = history_block,
        question = question,
    )
}

// =============================================================================
// Tests
// =============================================================================
