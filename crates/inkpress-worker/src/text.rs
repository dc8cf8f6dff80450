//! Text sanitization and byte-bounded chunking for narration.
//!
//! The speech provider narrates literal markup syntax, so the raw
//! generated text is stripped of HTML and markdown first. Chunking packs
//! sanitized sentences greedily under the provider byte limit, falling
//! back to word-level packing for an oversized sentence and to hard
//! truncation for an oversized word. The three-tier fallback guarantees
//! termination and a non-empty chunk set for any non-empty input.

use std::sync::LazyLock;

use regex::Regex;

/// A byte-bounded slice of sanitized text plus its ordinal position.
/// Lives only for the duration of one narration job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Position in production (and synthesis, and concatenation) order
    pub index: usize,
    /// Sanitized text, UTF-8 byte length within the provider limit
    pub text: String,
}

static FENCED_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("valid regex"));
static INLINE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`[^`\n]*`").expect("valid regex"));
static MD_IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[([^\]]*)\]\([^)]*\)").expect("valid regex"));
static MD_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("valid regex"));
static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
static MD_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s{0,3}#{1,6}\s+").expect("valid regex"));
static MD_BLOCKQUOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*>+\s?").expect("valid regex"));
static MD_LIST_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(?:[-+*]|\d+\.)\s+").expect("valid regex"));
static EMPHASIS_STARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*+").expect("valid regex"));
static EMPHASIS_UNDERSCORES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"__+").expect("valid regex"));
static BLANK_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));
static SPACE_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").expect("valid regex"));
static SENTENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^.!?]+[.!?]*").expect("valid regex"));

/// Strip markup so the speech provider receives plain prose.
pub fn sanitize(input: &str) -> String {
    let text = FENCED_CODE.replace_all(input, " ");
    let text = INLINE_CODE.replace_all(&text, " ");
    let text = MD_IMAGE.replace_all(&text, "$1");
    let text = MD_LINK.replace_all(&text, "$1");
    let text = HTML_TAG.replace_all(&text, " ");
    let text = MD_HEADER.replace_all(&text, "");
    let text = MD_BLOCKQUOTE.replace_all(&text, "");
    let text = MD_LIST_MARKER.replace_all(&text, "");
    let text = EMPHASIS_STARS.replace_all(&text, "");
    let text = EMPHASIS_UNDERSCORES.replace_all(&text, "");
    let text = SPACE_RUNS.replace_all(&text, " ");

    let trimmed_lines: Vec<&str> = text.lines().map(str::trim).collect();
    let text = trimmed_lines.join("\n");
    let text = BLANK_RUNS.replace_all(&text, "\n\n");

    text.trim().to_string()
}

/// Split sanitized text into byte-bounded chunks.
///
/// Under the limit the whole text is a single chunk. Over it, sentences
/// (runs ending in `.`, `!`, `?`) are packed greedily; a sentence over the
/// limit is packed word by word; a word over the limit is hard-truncated
/// with an ellipsis marker. Every produced chunk is within `byte_limit`.
pub fn chunk(text: &str, byte_limit: usize) -> Vec<TextChunk> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    if text.len() <= byte_limit {
        return vec![TextChunk {
            index: 0,
            text: text.to_string(),
        }];
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(text) {
        if sentence.len() > byte_limit {
            pack_words(sentence, byte_limit, &mut chunks, &mut current);
            continue;
        }
        append_piece(sentence, byte_limit, &mut chunks, &mut current);
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
        .into_iter()
        .enumerate()
        .map(|(index, text)| TextChunk { index, text })
        .collect()
}

fn split_sentences(text: &str) -> impl Iterator<Item = &str> {
    SENTENCE
        .find_iter(text)
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
}

/// Append a piece that fits the limit on its own, starting a new chunk
/// when the current one is full.
fn append_piece(piece: &str, byte_limit: usize, chunks: &mut Vec<String>, current: &mut String) {
    if current.is_empty() {
        current.push_str(piece);
    } else if current.len() + 1 + piece.len() <= byte_limit {
        current.push(' ');
        current.push_str(piece);
    } else {
        chunks.push(std::mem::take(current));
        current.push_str(piece);
    }
}

/// Word-level packing for a sentence that exceeds the limit by itself.
fn pack_words(sentence: &str, byte_limit: usize, chunks: &mut Vec<String>, current: &mut String) {
    for word in sentence.split_whitespace() {
        if word.len() > byte_limit {
            let truncated = truncate_word(word, byte_limit);
            append_piece(&truncated, byte_limit, chunks, current);
            continue;
        }
        append_piece(word, byte_limit, chunks, current);
    }
}

/// Hard-truncate a pathological over-limit word, keeping a visible
/// ellipsis marker and ending on a char boundary.
fn truncate_word(word: &str, byte_limit: usize) -> String {
    const ELLIPSIS: &str = "\u{2026}";

    let max_keep = byte_limit.saturating_sub(ELLIPSIS.len());
    let mut end = max_keep.min(word.len());
    while end > 0 && !word.is_char_boundary(end) {
        end -= 1;
    }

    format!("{}{}", &word[..end], ELLIPSIS)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: usize = 4500;

    fn squash(text: &str) -> String {
        text.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn sanitize_strips_html_and_markdown() {
        let input = "# Heading\n\nSome <b>bold</b> text with [a link](https://example.com) \
                     and ![alt text](img.png).\n\n```rust\nfn main() {}\n```\n\n- item one\n- item two\n\n> quoted\n\n*emphasis* and **strong**";
        let clean = sanitize(input);

        assert!(!clean.contains('<'));
        assert!(!clean.contains('#'));
        assert!(!clean.contains('`'));
        assert!(!clean.contains('*'));
        assert!(!clean.contains("]("));
        assert!(clean.contains("a link"));
        assert!(clean.contains("alt text"));
        assert!(clean.contains("item one"));
        assert!(clean.contains("quoted"));
        assert!(clean.contains("emphasis and strong"));
        assert!(!clean.contains("fn main"));
    }

    #[test]
    fn sanitize_collapses_whitespace_runs() {
        let clean = sanitize("One.\n\n\n\n\nTwo.\t\t Three.");
        assert_eq!(clean, "One.\n\nTwo. Three.");
    }

    #[test]
    fn under_limit_is_single_chunk() {
        let chunks = chunk("A short sentence.", LIMIT);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].text, "A short sentence.");
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(chunk("", LIMIT).is_empty());
        assert!(chunk("   \n  ", LIMIT).is_empty());
    }

    #[test]
    fn long_text_splits_on_sentence_boundaries_within_limit() {
        // ~10KB of clearly-terminated sentences.
        let sentence = "The movable type press changed the economics of the written word. ";
        let text: String = sentence.repeat(160);
        assert!(text.len() > 10_000);

        let chunks = chunk(&text, LIMIT);
        assert!(chunks.len() >= 2);

        for chunk in &chunks {
            assert!(chunk.text.len() <= LIMIT, "chunk over limit: {}", chunk.text.len());
            // Sentence packing keeps terminators at chunk ends.
            assert!(chunk.text.ends_with('.'));
        }

        // Ordinals are production order.
        for (expected, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, expected);
        }
    }

    #[test]
    fn chunk_coverage_reproduces_input() {
        let sentence = "Print shops spread along trade routes! Did literacy follow? It did. ";
        let text: String = sentence.repeat(120);
        let chunks = chunk(&text, LIMIT);
        assert!(chunks.len() >= 2);

        let rejoined: String = chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join(" ");
        assert_eq!(squash(&rejoined), squash(&text));
    }

    #[test]
    fn oversized_sentence_falls_back_to_word_packing() {
        // One sentence, far over the limit, no terminators until the end.
        let words = "lorem ".repeat(1200);
        let text = format!("{}.", words.trim());
        assert!(text.len() > LIMIT);

        let chunks = chunk(&text, LIMIT);
        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.text.len() <= LIMIT);
        }
        assert_eq!(squash(&chunks.iter().map(|c| c.text.as_str()).collect::<String>()), squash(&text));
    }

    #[test]
    fn pathological_word_is_truncated_with_marker() {
        let limit = 64;
        let word = "x".repeat(500);
        let text = format!("Short intro. {} trailing words here.", word);

        let chunks = chunk(&text, limit);
        let truncated = chunks
            .iter()
            .find(|c| c.text.contains('\u{2026}'))
            .expect("truncated chunk present");
        assert!(truncated.text.len() <= limit);

        for chunk in &chunks {
            assert!(chunk.text.len() <= limit);
        }
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        // 4-byte scalar values; a naive byte cut would split one.
        let word = "\u{1F5A8}".to_string().repeat(40);
        let truncated = truncate_word(&word, 10);
        assert!(truncated.len() <= 10);
        assert!(truncated.ends_with('\u{2026}'));
    }

    #[test]
    fn multibyte_text_chunks_without_panic() {
        let sentence = "Čtení nahlas mění každý článek v rozhlasové vysílání. ";
        let text = sentence.repeat(300);
        let chunks = chunk(&text, 1000);
        for chunk in &chunks {
            assert!(chunk.text.len() <= 1000);
            // Valid UTF-8 by construction; exercise the boundary math.
            assert!(chunk.text.chars().count() > 0);
        }
    }
}
