//! Document summary generation.
//!
//! Runs after upload, off the chat path. Asks the gateway for a structured
//! JSON summary of the first part of the document and stores whatever comes
//! back; any failure is logged and swallowed so uploads never depend on the
//! model being up. Unlike chat prompts, the summary prompt truncates content
//! to a fixed budget.

use serde::Deserialize;
use tracing::{debug, warn};

use docuchat_core::config::ChatConfig;
use docuchat_core::types::Document;
use docuchat_gateway::ModelGateway;
use docuchat_storage::DocumentRepository;

/// Build the summary prompt over at most `budget` characters of content.
pub fn summary_prompt(content: &str, budget: usize) -> String {
    let truncated: String = content.chars().take(budget).collect();
    format!(
        "Provide a detailed summary of this document. Include:
1. Main topic and purpose
2. Key points (3-5 bullet points)
3. Important conclusions or takeaways

Document:
{truncated}

Provide the response in JSON format: \
{{\"summary\": \"...\", \"briefSummary\": \"...\", \"keyPoints\": [\"...\", \"...\"]}}",
    )
}

/// The structured summary the model is asked to return.
#[derive(Debug, Deserialize, PartialEq)]
pub struct ParsedSummary {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(rename = "briefSummary", default)]
    pub brief_summary: Option<String>,
    #[serde(rename = "keyPoints", default)]
    pub key_points: Vec<String>,
}

/// Parse the model's summary response. Returns None if the response is not
/// the requested JSON shape; the caller treats that as "no summary".
pub fn parse_summary_response(text: &str) -> Option<ParsedSummary> {
    serde_json::from_str(text).ok()
}

/// Generate and store a summary for a freshly uploaded document.
///
/// Best-effort: returns whether a summary was stored. Gateway or parse
/// failures are logged at warn/debug and never propagate.
pub async fn generate_document_summary(
    gateway: &dyn ModelGateway,
    documents: &DocumentRepository,
    config: &ChatConfig,
    model: &str,
    document: &Document,
) -> bool {
    let prompt = summary_prompt(&document.content, config.summary_content_budget);

    let response = match gateway.generate(model, &prompt).await {
        Ok(text) => text,
        Err(e) => {
            warn!(document_id = %document.id, error = %e, "Summary generation failed");
            return false;
        }
    };

    let Some(parsed) = parse_summary_response(&response) else {
        debug!(document_id = %document.id, "Summary response was not valid JSON, skipping");
        return false;
    };

    match documents.update_summary(
        document.id,
        parsed.summary.as_deref(),
        parsed.brief_summary.as_deref(),
        &parsed.key_points,
    ) {
        Ok(()) => true,
        Err(e) => {
            warn!(document_id = %document.id, error = %e, "Failed to store summary");
            false
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
