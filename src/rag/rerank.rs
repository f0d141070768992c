//! Hybrid re-ranking: vector similarity plus lexical overlap.
//!
//! Expansion and the low retrieval threshold widen recall at the cost of
//! precision; scoring candidates against the *original* query's literal
//! terms re-anchors the ranking without discarding semantic recall.

use super::store::{SearchHit, StoredChunk};

/// Query tokens that carry no lexical signal.
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "was", "were", "but", "not", "you", "your", "all", "can",
    "has", "have", "had", "what", "when", "where", "which", "who", "why", "how", "does",
    "did", "this", "that", "these", "those", "with", "from", "will", "would", "about",
    "than", "then", "them", "they", "their", "its", "any", "there", "into", "out",
    "under", "over",
];

/// A retrieved chunk moving through the re-ranking stage. After `rerank`,
/// `similarity` holds the hybrid score; the raw retrieval score survives in
/// `original_similarity` for diagnostics.
#[derive(Debug, Clone)]
pub struct RetrievalCandidate {
    pub chunk: StoredChunk,
    pub similarity: f32,
    pub original_similarity: f32,
    pub keyword_relevance: f32,
}

impl From<SearchHit> for RetrievalCandidate {
    fn from(hit: SearchHit) -> Self {
        Self {
            similarity: hit.similarity,
            original_similarity: hit.similarity,
            keyword_relevance: 0.0,
            chunk: hit.chunk,
        }
    }
}

fn meaningful_tokens(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2 && !STOP_WORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// Lexical overlap between the query and a chunk, in [0, 1].
///
/// Per meaningful query token: 1.0 for an exact word-boundary match in the
/// content, 0.5 for a substring-only match, 0 otherwise; averaged over the
/// token count and capped at 1. A query with no meaningful tokens scores 0.
pub fn keyword_relevance(query: &str, content: &str) -> f32 {
    let tokens = meaningful_tokens(query);
    if tokens.is_empty() {
        return 0.0;
    }

    let content_lower = content.to_lowercase();
    let content_words: std::collections::HashSet<&str> = content_lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let score: f32 = tokens
        .iter()
        .map(|token| {
            if content_words.contains(token.as_str()) {
                1.0
            } else if content_lower.contains(token.as_str()) {
                0.5
            } else {
                0.0
            }
        })
        .sum();

    (score / tokens.len() as f32).min(1.0)
}

/// Re-scores candidates with `similarity * vector_weight +
/// keyword_relevance * keyword_weight`, sorts descending (stable, so ties
/// keep retrieval order) and truncates to `top_n`.
pub fn rerank(
    original_query: &str,
    mut candidates: Vec<RetrievalCandidate>,
    vector_weight: f32,
    keyword_weight: f32,
    top_n: usize,
) -> Vec<RetrievalCandidate> {
    for candidate in &mut candidates {
        candidate.keyword_relevance = keyword_relevance(original_query, &candidate.chunk.content);
        candidate.original_similarity = candidate.similarity;
        candidate.similarity = candidate.original_similarity * vector_weight
            + candidate.keyword_relevance * keyword_weight;
    }

    candidates.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates.truncate(top_n);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::store::ChunkMetadata;

    fn candidate(id: &str, content: &str, similarity: f32) -> RetrievalCandidate {
        RetrievalCandidate {
            chunk: StoredChunk {
                chunk_id: id.to_string(),
                content: content.to_string(),
                metadata: ChunkMetadata {
                    document: "manual.pdf".to_string(),
                    page: 1,
                    section: None,
                    chunk_index: 0,
                },
            },
            similarity,
            original_similarity: similarity,
            keyword_relevance: 0.0,
        }
    }

    #[test]
    fn relevance_stays_in_unit_interval() {
        let samples = [
            ("warranty coverage", "The warranty covers defects."),
            ("battery battery battery", "battery"),
            ("zzz qqq xxx", "nothing matches here"),
        ];
        for (q, c) in samples {
            let r = keyword_relevance(q, c);
            assert!((0.0..=1.0).contains(&r), "{} -> {}", q, r);
        }
    }

    #[test]
    fn stop_words_and_short_tokens_score_zero() {
        assert_eq!(keyword_relevance("is it the", "the it is everywhere"), 0.0);
        assert_eq!(keyword_relevance("a an of", "anything"), 0.0);
    }

    #[test]
    fn exact_match_beats_substring_match() {
        let exact = keyword_relevance("charge", "charge the vehicle overnight");
        let partial = keyword_relevance("charge", "overcharged cells degrade");
        assert_eq!(exact, 1.0);
        assert_eq!(partial, 0.5);
    }

    #[test]
    fn warranty_query_scores_nonzero_on_warranty_chunk() {
        let content = "8-year/100,000-mile warranty covering manufacturing defects \
                       and battery capacity retention below 70% of original capacity.";
        let relevance = keyword_relevance("What's covered under warranty?", &content);
        assert!(relevance >= 0.5, "got {}", relevance);
        assert!(relevance <= 1.0);
    }

    #[test]
    fn hybrid_score_is_monotone_in_keyword_relevance() {
        let weak = rerank("warranty", vec![candidate("a", "no match at all", 0.6)], 0.7, 0.3, 5);
        let strong = rerank("warranty", vec![candidate("a", "warranty terms", 0.6)], 0.7, 0.3, 5);
        assert!(strong[0].similarity >= weak[0].similarity);
        assert_eq!(weak[0].original_similarity, 0.6);
        assert_eq!(strong[0].original_similarity, 0.6);
    }

    #[test]
    fn output_is_sorted_descending_and_truncated() {
        let candidates = vec![
            candidate("low", "nothing relevant", 0.35),
            candidate("kw", "warranty warranty terms", 0.35),
            candidate("vec", "nothing relevant", 0.9),
            candidate("mid", "nothing relevant", 0.5),
        ];
        let ranked = rerank("warranty details", candidates, 0.7, 0.3, 3);

        assert_eq!(ranked.len(), 3);
        for pair in ranked.windows(2) {
            assert!(pair[0].similarity >= pair[1].similarity);
        }
        assert_eq!(ranked[0].chunk.chunk_id, "vec");
        // keyword boost lifts "kw" above the equal-similarity "low"
        assert!(ranked.iter().any(|c| c.chunk.chunk_id == "kw"));
    }

    #[test]
    fn equal_scores_preserve_retrieval_order() {
        let candidates = vec![
            candidate("first", "same text", 0.5),
            candidate("second", "same text", 0.5),
        ];
        let ranked = rerank("unrelated query", candidates, 0.7, 0.3, 5);
        assert_eq!(ranked[0].chunk.chunk_id, "first");
        assert_eq!(ranked[1].chunk.chunk_id, "second");
    }
}
