//! Sentence-bounded chunking with sentence-count overlap.
//!
//! Splitting is heuristic: only terminal punctuation is respected, not
//! paragraphs or lists. Chunk boundaries carry the last few sentences of
//! the previous chunk forward so local context survives the split.

/// Collapse every whitespace run into a single space.
///
/// Raw PDF text is full of hard wraps and column artifacts; without this
/// the sentence splitter produces pathological fragments.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split on `.`, `!` or `?` followed by whitespace (or end of input).
/// The punctuation stays with its sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let chars: Vec<(usize, char)> = text.char_indices().collect();

    for (pos, &(idx, c)) in chars.iter().enumerate() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let boundary = match chars.get(pos + 1) {
            Some(&(_, next)) => next.is_whitespace(),
            None => true,
        };
        if boundary {
            let end = idx + c.len_utf8();
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            start = end;
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }

    sentences
}

/// Split `text` into overlapping, sentence-bounded chunks of at most
/// `chunk_size` characters (a single oversized sentence may exceed it).
///
/// When a chunk closes, the next one is seeded with its last
/// `overlap_sentences` sentences followed by the sentence that triggered
/// the split.
pub fn chunk(text: &str, chunk_size: usize, overlap_sentences: usize) -> Vec<String> {
    let normalized = normalize_whitespace(text);
    if normalized.is_empty() {
        return Vec::new();
    }
    if normalized.len() <= chunk_size {
        return vec![normalized];
    }

    let sentences = split_sentences(&normalized);
    if sentences.is_empty() {
        return vec![normalized];
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_len = 0usize;

    for sentence in sentences {
        let sep = usize::from(!current.is_empty());
        if current_len + sep + sentence.len() > chunk_size && !current.is_empty() {
            let closed = current.join(" ");

            let tail_start = current.len().saturating_sub(overlap_sentences);
            let mut seeded: Vec<String> = current[tail_start..].to_vec();
            seeded.push(sentence);

            if !closed.trim().is_empty() {
                chunks.push(closed);
            }

            current_len = seeded.iter().map(String::len).sum::<usize>() + seeded.len() - 1;
            current = seeded;
        } else {
            current_len += sep + sentence.len();
            current.push(sentence);
        }
    }

    // Final chunk is kept even when short; only blank material is dropped.
    let last = current.join(" ");
    if !last.trim().is_empty() {
        chunks.push(last);
    }

    chunks
}
