//! Sentence-aware chunking with page provenance
//!
//! Splits page text into sentences and packs them into chunks under a
//! character budget. Adjacent chunks overlap by trailing sentences of the
//! previous chunk, and every chunk carries the inclusive page range its
//! sentences came from so answers can cite source pages.

use crate::parse::ParsedPage;
use tracing::debug;

/// Configuration for text chunking
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Hard chunk size budget in characters
    pub max_chunk_size: usize,
    /// Chunks shorter than this are not emitted
    pub min_chunk_size: usize,
    /// Character budget for the sentence overlap between adjacent chunks
    pub overlap_size: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 1000,
            min_chunk_size: 200,
            overlap_size: 100,
        }
    }
}

/// A chunk with provenance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// 0-based, contiguous
    pub index: i32,
    pub content: String,
    /// First source page (1-based, inclusive)
    pub page_start: i32,
    /// Last source page (inclusive); always >= page_start
    pub page_end: i32,
    pub sentences: Vec<String>,
}

/// One sentence with the page it came from
#[derive(Debug, Clone)]
struct Sentence {
    text: String,
    page: i32,
}

/// Chunk a version's pages in order.
pub fn chunk_pages(pages: &[ParsedPage], config: &ChunkerConfig) -> Vec<TextChunk> {
    let mut chunks: Vec<TextChunk> = Vec::new();
    let mut current: Vec<Sentence> = Vec::new();
    let mut page_start = 0i32;
    let mut page_end = 0i32;

    for page in pages {
        let text = normalize_page_text(&page.content);

        for sentence_text in split_sentences(&text) {
            let sentence = Sentence {
                text: sentence_text,
                page: page.page_number,
            };

            if !current.is_empty()
                && joined_len(&current) + 1 + sentence.text.chars().count() > config.max_chunk_size
            {
                let closed_len = joined_len(&current);
                if closed_len >= config.min_chunk_size {
                    let emitted = emit(&mut chunks, &current, page_start, page_end);
                    current = overlap_tail(&emitted, config.overlap_size);
                } else {
                    // Sub-minimum content at a chunk boundary is dropped,
                    // matching the tail behavior below.
                    current.clear();
                }
                page_start = page.page_number;
                page_end = page.page_number;
            }

            if current.is_empty() && chunks.is_empty() {
                page_start = page.page_number;
            }
            page_end = page.page_number;
            current.push(sentence);
        }
    }

    let tail_len = joined_len(&current);
    let emit_tail = tail_len >= config.min_chunk_size
        // A short tail that would be the document's only chunk is kept:
        // dropping it would lose all content of very short documents.
        || (chunks.is_empty() && tail_len > 0);
    if emit_tail {
        emit(&mut chunks, &current, page_start, page_end);
    }

    debug!(
        page_count = pages.len(),
        chunk_count = chunks.len(),
        "Pages chunked"
    );

    chunks
}

fn emit(
    chunks: &mut Vec<TextChunk>,
    sentences: &[Sentence],
    page_start: i32,
    page_end: i32,
) -> Vec<Sentence> {
    let content = sentences
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    chunks.push(TextChunk {
        index: chunks.len() as i32,
        content,
        page_start,
        page_end,
        sentences: sentences.iter().map(|s| s.text.clone()).collect(),
    });

    sentences.to_vec()
}

/// Trailing sentences whose cumulative length fits the overlap budget,
/// taken from the end.
fn overlap_tail(sentences: &[Sentence], overlap_size: usize) -> Vec<Sentence> {
    let mut tail: Vec<Sentence> = Vec::new();
    let mut length = 0usize;

    for sentence in sentences.iter().rev() {
        let sentence_len = sentence.text.chars().count();
        let projected = if tail.is_empty() {
            sentence_len
        } else {
            length + 1 + sentence_len
        };
        if projected > overlap_size {
            break;
        }
        length = projected;
        tail.push(sentence.clone());
    }

    tail.reverse();
    tail
}

fn joined_len(sentences: &[Sentence]) -> usize {
    if sentences.is_empty() {
        return 0;
    }
    let content: usize = sentences.iter().map(|s| s.text.chars().count()).sum();
    content + sentences.len() - 1 // single-space joins
}

/// Normalize line endings and collapse runs of 3+ newlines to a paragraph
/// break.
fn normalize_page_text(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::with_capacity(unified.len());
    let mut newline_run = 0usize;

    for ch in unified.chars() {
        if ch == '\n' {
            newline_run += 1;
            if newline_run <= 2 {
                out.push('\n');
            }
        } else {
            newline_run = 0;
            out.push(ch);
        }
    }

    out
}

/// Split text into sentences. A sentence ends at `.`, `!` or `?` followed
/// by whitespace and an uppercase letter (including Ä, Ö, Ü), or by a
/// newline run.
fn split_sentences(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut sentences: Vec<String> = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;

    while i < chars.len() {
        if matches!(chars[i], '.' | '!' | '?') {
            let mut j = i + 1;
            let mut saw_newline = false;
            while j < chars.len() && chars[j].is_whitespace() {
                if chars[j] == '\n' {
                    saw_newline = true;
                }
                j += 1;
            }

            let at_end = j >= chars.len();
            let followed_by_upper = j > i + 1 && !at_end && chars[j].is_uppercase();
            if at_end || saw_newline || followed_by_upper {
                push_sentence(&mut sentences, &chars[start..=i]);
                start = j;
                i = j;
                continue;
            }
        }
        i += 1;
    }

    if start < chars.len() {
        push_sentence(&mut sentences, &chars[start..]);
    }

    sentences
}

fn push_sentence(sentences: &mut Vec<String>, chars: &[char]) {
    let sentence: String = chars.iter().collect::<String>().trim().to_string();
    if !sentence.is_empty() {
        sentences.push(sentence);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(contents: &[&str]) -> Vec<ParsedPage> {
        contents
            .iter()
            .enumerate()
            .map(|(i, content)| ParsedPage {
                page_number: (i + 1) as i32,
                content: content.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_sentence_splitting_on_uppercase() {
        let sentences = split_sentences("First sentence. Second one. and not this");
        assert_eq!(
            sentences,
            vec!["First sentence.", "Second one. and not this"]
        );
    }

    #[test]
    fn test_sentence_splitting_on_umlaut_uppercase() {
        let sentences = split_sentences("Das ist gut. Über den Satz hinaus.");
        assert_eq!(sentences, vec!["Das ist gut.", "Über den Satz hinaus."]);
    }

    #[test]
    fn test_sentence_splitting_on_newline_run() {
        let sentences = split_sentences("end of paragraph.\n\nlowercase start");
        assert_eq!(sentences, vec!["end of paragraph.", "lowercase start"]);
    }

    #[test]
    fn test_abbreviation_does_not_split() {
        let sentences = split_sentences("Dr. med. example continues here.");
        assert_eq!(sentences.len(), 1);
    }

    #[test]
    fn test_newline_collapse() {
        assert_eq!(normalize_page_text("a\n\n\n\nb"), "a\n\nb");
        assert_eq!(normalize_page_text("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_empty_pages_yield_no_chunks() {
        assert!(chunk_pages(&pages(&["", "  "]), &ChunkerConfig::default()).is_empty());
        assert!(chunk_pages(&[], &ChunkerConfig::default()).is_empty());
    }

    #[test]
    fn test_short_document_emits_single_small_chunk() {
        // Under min_chunk_size, but it is the only chunk: emitted anyway.
        let chunks = chunk_pages(&pages(&["Tiny document."]), &ChunkerConfig::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Tiny document.");
        assert_eq!((chunks[0].page_start, chunks[0].page_end), (1, 1));
    }

    #[test]
    fn test_sub_min_tail_is_dropped_when_other_chunks_exist() {
        let config = ChunkerConfig {
            max_chunk_size: 100,
            min_chunk_size: 40,
            overlap_size: 0,
        };
        // Two full sentences, then a short tail sentence that overflows
        // into a final sub-minimum chunk of its own.
        let text = "This sentence is about fifty characters in length. \
                    Another sentence follows here and it is stretched deliberately to pass the ninety character mark. \
                    Short tail.";
        let chunks = chunk_pages(&pages(&[text]), &config);
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| !c.content.contains("Short tail")));
    }

    #[test]
    fn test_indices_contiguous_and_provenance_monotonic() {
        let page = "A sentence that takes up a reasonable amount of space. ".repeat(20);
        let input = pages(&[&page, &page, &page]);
        let chunks = chunk_pages(&input, &ChunkerConfig::default());

        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i as i32);
            assert!(chunk.page_start >= 1);
            assert!(chunk.page_start <= chunk.page_end);
            assert!(chunk.page_end <= 3);
            assert!(chunk.content.chars().count() <= 1000);
        }
        for pair in chunks.windows(2) {
            assert!(pair[0].page_end <= pair[1].page_end);
        }
    }

    #[test]
    fn test_overlap_seeds_next_chunk() {
        let config = ChunkerConfig {
            max_chunk_size: 120,
            min_chunk_size: 30,
            overlap_size: 60,
        };
        let text = "First block of words sits here nicely. \
                    Second block of words follows along. \
                    Third block arrives with more words. \
                    Fourth block closes the sequence.";
        let chunks = chunk_pages(&pages(&[text]), &config);
        assert!(chunks.len() >= 2);

        // The second chunk starts with the trailing sentence of the first.
        let first_last = chunks[0].sentences.last().unwrap();
        assert_eq!(chunks[1].sentences.first().unwrap(), first_last);
    }

    #[test]
    fn test_overlap_tail_budget() {
        let sentences = vec![
            Sentence { text: "aaaa".into(), page: 1 },
            Sentence { text: "bbbb".into(), page: 1 },
            Sentence { text: "cccc".into(), page: 1 },
        ];
        // Budget fits the last two sentences joined ("bbbb cccc" = 9)
        let tail = overlap_tail(&sentences, 9);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].text, "bbbb");

        let tail = overlap_tail(&sentences, 3);
        assert!(tail.is_empty());
    }

    #[test]
    fn test_chunker_keeps_sentence_page_attribution() {
        let config = ChunkerConfig {
            max_chunk_size: 80,
            min_chunk_size: 20,
            overlap_size: 0,
        };
        let input = pages(&[
            "Page one carries this full sentence right here.",
            "Page two carries another complete sentence too.",
        ]);
        let chunks = chunk_pages(&input, &config);
        assert_eq!(chunks.len(), 2);
        assert_eq!((chunks[0].page_start, chunks[0].page_end), (1, 1));
        assert_eq!((chunks[1].page_start, chunks[1].page_end), (2, 2));
    }
}
