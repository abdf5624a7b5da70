//! Heuristic grounding check over completed responses.
//!
//! A pure classifier: given the fully accumulated response text and (for
//! multi-document chat) the set of valid document names, decide whether the
//! response appears to reference the document at all and whether it is
//! itself a refusal. Substring and regex matching over natural language is
//! inherently fuzzy; this is a best-effort annotation, never a gate. The
//! orchestrator only appends a warning, it never blocks or retries.

use std::sync::LazyLock;

use regex::Regex;

use docuchat_core::config::ChatConfig;

/// Warning appended to responses that pass neither the reference nor the
/// refusal check. Emitted as one extra token before the terminal event.
pub const UNGROUNDED_WARNING: &str = "\n\nNote: This answer may not be based on the document \
content. Please verify it against the document.";

/// Phrases that suggest the response is drawing on the document.
const REFERENCE_PHRASES: &[&str] = &["according to", "the text", "states that", "mentions"];

/// Phrases that mark the response as a refusal.
const REFUSAL_PHRASES: &[&str] = &[
    "cannot answer",
    "not present in",
    "not found in",
    "information is not",
];

/// How many leading characters of a document name count as a name mention.
const NAME_PREFIX_CHARS: usize = 15;

static QUOTED_TEXT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("\"[^\"]+\"|\u{201c}[^\u{201d}]+\u{201d}").unwrap());

static DOCUMENT_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"document\s+\d+").unwrap());

/// Outcome of the grounding check. The two axes are independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroundingVerdict {
    pub has_document_reference: bool,
    pub is_refusal: bool,
}

/// Grounding classifier with configured length thresholds.
pub struct GroundingVerifier {
    /// Responses at or below this length never count as referencing.
    reference_min_chars: usize,
    /// Responses at or below this length never receive a warning.
    warn_min_chars: usize,
}

impl GroundingVerifier {
    pub fn new(config: &ChatConfig) -> Self {
        Self {
            reference_min_chars: config.reference_min_chars,
            warn_min_chars: config.warn_min_chars,
        }
    }

    /// Classify a completed response.
    ///
    /// `valid_names` is the set of document names in play; pass an empty
    /// slice for single-document chat, where the name and "document N"
    /// checks do not apply.
    pub fn assess(&self, response: &str, valid_names: &[String]) -> GroundingVerdict {
        let lower = response.to_lowercase();

        let is_refusal = REFUSAL_PHRASES.iter().any(|p| lower.contains(p));

        let long_enough = response.chars().count() > self.reference_min_chars;
        let has_document_reference = long_enough
            && (lower.contains("document")
                || (!valid_names.is_empty() && DOCUMENT_NUMBER_RE.is_match(&lower))
                || REFERENCE_PHRASES.iter().any(|p| lower.contains(p))
                || QUOTED_TEXT_RE.is_match(response)
                || valid_names.iter().any(|name| {
                    let prefix: String = name
                        .to_lowercase()
                        .chars()
                        .take(NAME_PREFIX_CHARS)
                        .collect();
                    !prefix.trim().is_empty() && lower.contains(&prefix)
                }));

        GroundingVerdict {
            has_document_reference,
            is_refusal,
        }
    }

    /// Whether the response should carry the ungrounded-answer warning.
    pub fn needs_warning(&self, response: &str, verdict: &GroundingVerdict) -> bool {
        !verdict.has_document_reference
            && !verdict.is_refusal
            && response.chars().count() > self.warn_min_chars
    }
}

// =============================================================================
// Tests
// =============================================================================
