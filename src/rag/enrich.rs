//! Embedding-side chunk enrichment.
//!
//! Embeddings get sharper when the text carries its own provenance, so the
//! embedded copy of a chunk is prefixed with `[Source: ...]` and, when
//! known, `[Section: ...]` lines. The stored and displayed content stays
//! the plain chunk: injected headers must never reach keyword matching,
//! the UI, or the prompt a second time.

/// Candidate section headers are short single lines; anything outside this
/// range is body text.
const SECTION_MIN_CHARS: usize = 5;
const SECTION_MAX_CHARS: usize = 60;

/// Builds the text handed to the embedding service. Never store or display
/// the result.
pub fn enrich_for_embedding(
    chunk: &str,
    document: &str,
    page: u32,
    section: Option<&str>,
) -> String {
    let mut out = format!("[Source: {}, Page {}]\n", document, page);

    let header = section
        .map(str::to_string)
        .or_else(|| first_line_header(chunk));
    if let Some(header) = header {
        out.push_str(&format!("[Section: {}]\n", header));
    }

    out.push_str(chunk);
    out
}

/// Removes every `[Source: ...]` / `[Section: ...]` line, recovering the
/// plain chunk from an enriched one.
pub fn strip_enrichment_headers(text: &str) -> String {
    text.lines()
        .filter(|line| !is_enrichment_header(line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_enrichment_header(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.ends_with(']')
        && (trimmed.starts_with("[Source:") || trimmed.starts_with("[Section:"))
}

/// If a chunk's first line looks like a section heading, use it. Chunk text
/// is usually whitespace-normalized to one long line, so this mostly fires
/// on unnormalized input; detected section metadata takes precedence.
fn first_line_header(chunk: &str) -> Option<String> {
    let first = chunk.lines().next()?.trim();
    if first.len() >= SECTION_MIN_CHARS
        && first.len() <= SECTION_MAX_CHARS
        && chunk.lines().nth(1).is_some()
    {
        Some(first.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepends_source_header() {
        let enriched = enrich_for_embedding("Battery care basics.", "manual.pdf", 12, None);
        assert!(enriched.starts_with("[Source: manual.pdf, Page 12]\n"));
        assert!(enriched.ends_with("Battery care basics."));
    }

    #[test]
    fn known_section_is_included() {
        let enriched =
            enrich_for_embedding("Charge to 80% daily.", "manual.pdf", 3, Some("CHARGING"));
        assert!(enriched.contains("[Section: CHARGING]\n"));
    }

    #[test]
    fn short_first_line_is_treated_as_section_header() {
        let chunk = "Warranty Terms\nCoverage lasts eight years from delivery.";
        let enriched = enrich_for_embedding(chunk, "warranty.pdf", 1, None);
        assert!(enriched.contains("[Section: Warranty Terms]"));
    }

    #[test]
    fn strip_round_trips_the_plain_chunk() {
        for (doc, page) in [("manual.pdf", 1u32), ("Owner Guide 2024", 250)] {
            let chunk = "The pack is covered for 8 years.\nKeep charge between 20% and 80%.";
            let enriched = enrich_for_embedding(chunk, doc, page, Some("Battery"));
            assert_eq!(strip_enrichment_headers(&enriched), chunk);
        }
    }

    #[test]
    fn strip_is_a_noop_on_clean_content() {
        let clean = "No headers anywhere in this text.";
        assert_eq!(strip_enrichment_headers(clean), clean);
    }
}
