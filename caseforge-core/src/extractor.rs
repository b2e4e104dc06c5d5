//! Requirement extraction.
//!
//! The text/OCR reader is an external collaborator behind
//! [`TextExtractor`]; segmentation of the extracted text into atomic
//! requirements is deterministic, so the same text always yields the
//! same requirement set and ids.

use crate::compliance::ComplianceDictionary;
use crate::storage::ObjectStorage;
use async_trait::async_trait;
use regex::Regex;
use shared_types::Requirement;
use std::sync::{Arc, OnceLock};

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("Extracted text is empty")]
    EmptyText,

    #[error("Segmentation produced no requirements")]
    NoRequirements,

    #[error("Extraction failed: {0}")]
    Failed(String),
}

/// Text/OCR extraction collaborator contract
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Read the plain text of the document behind `storage_ref`
    async fn extract(&self, storage_ref: &str) -> Result<String, ExtractionError>;
}

/// Extractor for text-bearing payloads: reads the stored bytes back
/// from object storage and decodes them as UTF-8.
pub struct PlainTextExtractor {
    storage: Arc<dyn ObjectStorage>,
}

impl PlainTextExtractor {
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract(&self, storage_ref: &str) -> Result<String, ExtractionError> {
        let bytes = self
            .storage
            .get(storage_ref)
            .await
            .map_err(|e| ExtractionError::Failed(e.to_string()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

fn clause_marker() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| {
        // Numbered clauses: "1.", "2)", dotted "3.1" / "3.1.2", or
        // explicit "REQ-7:" markers. A bare number with no punctuation
        // only counts as a marker when it is dotted, so prose starting
        // with a year does not segment.
        Regex::new(r"(?m)^[ \t]*(?:\d+(?:\.\d+)+[.)]?|\d+[.)]|REQ[-\s]?\d+[:.]?)[ \t]+").unwrap()
    })
}

/// Split text into requirement candidates.
///
/// Numbered-clause rule first: when the text carries clause markers,
/// each marker starts a candidate and the marker itself is stripped.
/// Otherwise the text is split at sentence boundaries.
pub fn segment_requirements(text: &str) -> Vec<String> {
    let marker = clause_marker();
    let starts: Vec<(usize, usize)> = marker.find_iter(text).map(|m| (m.start(), m.end())).collect();

    if !starts.is_empty() {
        let mut segments = Vec::with_capacity(starts.len());
        for (i, (_, body_start)) in starts.iter().enumerate() {
            let end = starts
                .get(i + 1)
                .map(|(next_start, _)| *next_start)
                .unwrap_or(text.len());
            let body = text[*body_start..end].trim();
            if has_substance(body) {
                segments.push(normalize_whitespace(body));
            }
        }
        return segments;
    }

    split_sentences(text)
        .into_iter()
        .map(|s| normalize_whitespace(&s))
        .filter(|s| has_substance(s))
        .collect()
}

/// A segment with no alphanumeric content is punctuation noise, not a
/// requirement candidate
fn has_substance(s: &str) -> bool {
    s.chars().any(|c| c.is_alphanumeric())
}

/// Sentence-boundary fallback: split after `.`, `!` or `?` followed by
/// whitespace. The terminator stays with its sentence.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();

    for (i, b) in bytes.iter().enumerate() {
        if matches!(b, b'.' | b'!' | b'?') {
            let at_end = i + 1 == bytes.len();
            let followed_by_space = bytes.get(i + 1).is_some_and(|next| next.is_ascii_whitespace());
            if at_end || followed_by_space {
                let sentence = text[start..=i].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence.to_string());
                }
                start = i + 1;
            }
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Turns extracted document text into immutable [`Requirement`] records
pub struct RequirementExtractor {
    dictionary: Arc<ComplianceDictionary>,
}

impl RequirementExtractor {
    pub fn new(dictionary: Arc<ComplianceDictionary>) -> Self {
        Self { dictionary }
    }

    /// Deterministically partition `text` into requirements for
    /// `document_id`, tagging each with matched compliance references.
    pub fn extract(
        &self,
        document_id: &str,
        text: &str,
    ) -> Result<Vec<Requirement>, ExtractionError> {
        if text.trim().is_empty() {
            return Err(ExtractionError::EmptyText);
        }

        let segments = segment_requirements(text);
        if segments.is_empty() {
            return Err(ExtractionError::NoRequirements);
        }

        let requirements = segments
            .into_iter()
            .enumerate()
            .map(|(i, description)| {
                let compliance_refs = self.dictionary.match_text(&description);
                Requirement {
                    id: format!("REQ-{}", i + 1),
                    source_document_id: document_id.to_string(),
                    description,
                    compliance_refs,
                }
            })
            .collect::<Vec<_>>();

        tracing::info!(
            document_id,
            requirement_count = requirements.len(),
            "Extracted requirements"
        );

        Ok(requirements)
    }
}
