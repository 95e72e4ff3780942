//! Conversion of structured-converter output into slide records.

use crate::error::PresentoError;
use crate::slide::SlideDeck;

const FENCE_MARKERS: [&str; 2] = ["```json", "```"];

/// Remove fenced-code delimiters and surrounding whitespace.
pub fn strip_fences(raw: &str) -> String {
    let mut cleaned = raw.to_string();
    for marker in FENCE_MARKERS {
        cleaned = cleaned.replace(marker, "");
    }
    cleaned.trim().to_string()
}

/// Parse the converter's text into a deck.
///
/// The text must be a JSON array of `{title, description, takeaways}`
/// objects, optionally wrapped in fenced-code markers. There is no partial
/// recovery: any malformed structure fails with
/// [`PresentoError::StructuredData`] carrying the raw text.
pub fn extract(raw: &str) -> Result<SlideDeck, PresentoError> {
    let cleaned = strip_fences(raw);

    let deck: SlideDeck =
        serde_json::from_str(&cleaned).map_err(|e| PresentoError::StructuredData {
            message: e.to_string(),
            raw: raw.to_string(),
        })?;

    tracing::info!(slides = deck.len(), json = %cleaned, "Extracted slide deck");
    Ok(deck)
}
