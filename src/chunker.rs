//! Token-bounded, sentence-aligned chunking with overlap.
//!
//! A document is cut into contiguous units at sentence boundaries
//! (`unicode-segmentation`). Units are packed greedily into chunks of at most
//! `chunk_size` tokens; the next chunk restarts on the trailing whole units of
//! the previous one as long as they fit into `overlap` tokens. A sentence that
//! is longer than `chunk_size` on its own is force-split at word boundaries,
//! and a single oversized word at character boundaries.
//!
//! Every chunk records the byte span it covers in the source text, so the
//! document can be reconstructed from the chunks by dropping the overlap.
use std::ops::Range;
use std::sync::Arc;

use unicode_segmentation::UnicodeSegmentation;

/// Counts model tokens in a piece of text.
pub trait TokenCounter: Send + Sync {
    fn count_tokens(&self, text: &str) -> usize;
}

/// Counts whitespace-separated words. Used in tests and as a rough fallback.
#[derive(Debug, Default, Clone, Copy)]
pub struct WhitespaceTokenizer;

impl TokenCounter for WhitespaceTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Chunk text with surrounding whitespace trimmed.
    pub text: String,
    /// Byte offset of the covered span in the document.
    pub start: usize,
    /// Exclusive end of the covered span.
    pub end: usize,
    pub token_count: usize,
    /// Index of the chunk within its document.
    pub position: usize,
}

pub struct SentenceChunker {
    counter: Arc<dyn TokenCounter>,
    chunk_size: usize,
    overlap: usize,
}

impl SentenceChunker {
    pub fn new(counter: Arc<dyn TokenCounter>, chunk_size: usize, overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            counter,
            chunk_size,
            overlap: overlap.min(chunk_size - 1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    fn count(&self, text: &str, span: Range<usize>) -> usize {
        self.counter.count_tokens(&text[span])
    }

    /// Split one document into chunks. Whitespace-only input yields none.
    pub fn split(&self, text: &str) -> Vec<TextChunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let units = self.units(text);
        let mut chunks = Vec::new();
        let mut first = 0;

        while first < units.len() {
            // Pack greedily, always taking at least one unit
            let mut last = first + 1;
            let mut tokens = self.count(text, units[first].start..units[first].end);
            while last < units.len() {
                let candidate = self.count(text, units[first].start..units[last].end);
                if candidate > self.chunk_size {
                    break;
                }
                tokens = candidate;
                last += 1;
            }

            let span = units[first].start..units[last - 1].end;
            let chunk_text = text[span.clone()].trim();
            if !chunk_text.is_empty() {
                chunks.push(TextChunk {
                    text: chunk_text.to_string(),
                    start: span.start,
                    end: span.end,
                    token_count: tokens,
                    position: chunks.len(),
                });
            }

            if last == units.len() {
                break;
            }
            first = self.overlap_start(text, &units, first, last);
        }

        chunks
    }

    /// First unit of the chunk after `units[first..last]`.
    ///
    /// Backs up over trailing whole units while they fit into the overlap
    /// and still leave room for `units[last]`. The result is always greater
    /// than `first`.
    fn overlap_start(&self, text: &str, units: &[Range<usize>], first: usize, last: usize) -> usize {
        let mut start = last;
        if self.overlap == 0 {
            return start;
        }
        while start > first + 1 {
            let candidate = start - 1;
            let overlap_tokens = self.count(text, units[candidate].start..units[last - 1].end);
            if overlap_tokens > self.overlap {
                break;
            }
            let with_next = self.count(text, units[candidate].start..units[last].end);
            if with_next > self.chunk_size {
                break;
            }
            start = candidate;
        }
        start
    }

    /// Contiguous sentence units covering the whole text, none larger than
    /// `chunk_size` tokens.
    fn units(&self, text: &str) -> Vec<Range<usize>> {
        let mut sentences: Vec<Range<usize>> = Vec::new();
        let mut pending_ws: Option<usize> = None;

        for (offset, sentence) in text.split_sentence_bound_indices() {
            let range = offset..offset + sentence.len();
            if sentence.trim().is_empty() {
                // Whitespace joins the previous unit, or the next one at the start
                match sentences.last_mut() {
                    Some(prev) => prev.end = range.end,
                    None => {
                        pending_ws.get_or_insert(range.start);
                    }
                }
                continue;
            }
            let start = pending_ws.take().unwrap_or(range.start);
            sentences.push(start..range.end);
        }

        let mut units = Vec::with_capacity(sentences.len());
        for sentence in sentences {
            if self.count(text, sentence.clone()) <= self.chunk_size {
                units.push(sentence);
            } else {
                units.extend(self.force_split(text, sentence));
            }
        }
        units
    }

    /// Break an oversized sentence at word boundaries, then characters.
    fn force_split(&self, text: &str, span: Range<usize>) -> Vec<Range<usize>> {
        let words: Vec<Range<usize>> = text[span.clone()]
            .split_word_bound_indices()
            .map(|(offset, word)| span.start + offset..span.start + offset + word.len())
            .collect();

        let mut out = Vec::new();
        for group in self.group(text, words) {
            if self.count(text, group.clone()) <= self.chunk_size {
                out.push(group);
                continue;
            }
            let chars: Vec<Range<usize>> = text[group.clone()]
                .char_indices()
                .map(|(offset, c)| group.start + offset..group.start + offset + c.len_utf8())
                .collect();
            out.extend(self.group(text, chars));
        }
        out
    }

    /// Merge consecutive pieces while the merged span fits `chunk_size`.
    fn group(&self, text: &str, pieces: Vec<Range<usize>>) -> Vec<Range<usize>> {
        let mut out: Vec<Range<usize>> = Vec::new();
        let mut current: Option<Range<usize>> = None;
        for piece in pieces {
            current = Some(match current {
                None => piece,
                Some(open) => {
                    if self.count(text, open.start..piece.end) <= self.chunk_size {
                        open.start..piece.end
                    } else {
                        out.push(open);
                        piece
                    }
                }
            });
        }
        out.extend(current);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(size: usize, overlap: usize) -> SentenceChunker {
        SentenceChunker::new(Arc::new(WhitespaceTokenizer), size, overlap)
    }

    /// Concatenate chunk spans, skipping what the previous chunk already covered.
    fn reconstruct(text: &str, chunks: &[TextChunk]) -> String {
        let mut out = String::new();
        let mut covered = 0;
        for chunk in chunks {
            assert!(chunk.start <= covered, "gap before chunk {}", chunk.position);
            if chunk.end > covered {
                out.push_str(&text[covered..chunk.end]);
                covered = chunk.end;
            }
        }
        out
    }

    fn sentences(n: usize, words: usize) -> String {
        (0..n)
            .map(|i| {
                let body: Vec<String> = (0..words - 1).map(|w| format!("Wort{i}x{w}")).collect();
                format!("{} ende{i}.", body.join(" "))
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_empty_and_whitespace_text() {
        assert!(chunker(10, 2).split("").is_empty());
        assert!(chunker(10, 2).split("  \n\n  ").is_empty());
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let text = "# Titel\nEin kurzer Absatz. Noch ein Satz.";
        let chunks = chunker(50, 5).split(text);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
        assert_eq!(chunks[0].token_count, 8);
        assert_eq!(chunks[0].position, 0);
    }

    #[test]
    fn test_chunks_respect_size_and_reconstruct() {
        let text = sentences(30, 4);
        let chunks = chunker(20, 5).split(&text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.token_count <= 20, "chunk too large: {chunk:?}");
            assert_eq!(chunk.token_count, WhitespaceTokenizer.count_tokens(&chunk.text));
            // sentences fit, so no chunk ends mid-sentence
            assert!(chunk.text.ends_with('.'), "mid-sentence cut: {:?}", chunk.text);
        }
        assert_eq!(reconstruct(&text, &chunks), text);
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        let text = sentences(30, 4);
        let chunks = chunker(20, 5).split(&text);
        for pair in chunks.windows(2) {
            assert!(pair[1].start < pair[0].end, "no overlap between {pair:?}");
            let shared = &text[pair[1].start..pair[0].end];
            assert!(WhitespaceTokenizer.count_tokens(shared) <= 5);
        }
    }

    #[test]
    fn test_zero_overlap_chunks_are_disjoint() {
        let text = sentences(12, 4);
        let chunks = chunker(10, 0).split(&text);
        for pair in chunks.windows(2) {
            assert_eq!(pair[1].start, pair[0].end);
        }
        assert_eq!(reconstruct(&text, &chunks), text);
    }

    #[test]
    fn test_long_sentence_is_force_split() {
        let words: Vec<String> = (0..50).map(|i| format!("w{i}")).collect();
        let text = format!("{}.", words.join(" "));
        let chunks = chunker(10, 3).split(&text);
        assert!(chunks.len() >= 5);
        for chunk in &chunks {
            assert!(chunk.token_count <= 10);
        }
        assert_eq!(reconstruct(&text, &chunks), text);
    }

    struct CharCounter;

    impl TokenCounter for CharCounter {
        fn count_tokens(&self, text: &str) -> usize {
            text.chars().filter(|c| !c.is_whitespace()).count()
        }
    }

    #[test]
    fn test_oversized_word_is_split_by_characters() {
        let text = "Donaudampfschifffahrtsgesellschaftskapitänsmütze";
        let chunks = SentenceChunker::new(Arc::new(CharCounter), 10, 0).split(text);
        assert!(chunks.len() >= 5);
        for chunk in &chunks {
            assert!(chunk.token_count <= 10);
        }
        assert_eq!(reconstruct(text, &chunks), text);
    }

    #[test]
    fn test_leading_whitespace_is_covered() {
        let text = "\n\n  Erster Satz hier. Zweiter Satz dort.";
        let chunks = chunker(3, 0).split(text);
        assert_eq!(chunks[0].start, 0);
        assert_eq!(chunks[0].text, "Erster Satz hier.");
        assert_eq!(reconstruct(text, &chunks), text);
    }

    #[test]
    fn test_overlap_is_clamped_below_chunk_size() {
        let c = chunker(5, 9);
        assert_eq!(c.overlap(), 4);
        let text = sentences(10, 2);
        let chunks = c.split(&text);
        assert_eq!(reconstruct(&text, &chunks), text);
    }
}
