//! Chunker: overlapping, boundary-aware text windows.
//!
//! Lengths are counted in Unicode scalar values. A window starting at `s`
//! ends at the last natural boundary inside `(s + max(overlap + 1, size / 2), s + size]`,
//! preferring paragraph breaks, then sentence breaks, then whitespace, and
//! falling back to a hard cut at `s + size`. The separator stays with the
//! left chunk. The next window starts `overlap` characters before the end of
//! the previous one, so consecutive chunks always share exactly `overlap`
//! characters.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::Document;

pub const DEFAULT_CHUNK_SIZE: usize = 1024;
pub const DEFAULT_CHUNK_OVERLAP: usize = 128;

const SENTENCE_BREAKS: [[char; 2]; 4] = [['.', ' '], ['!', ' '], ['?', ' '], ['.', '\n']];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkerError {
    #[error("chunk size must be at least 1")]
    ZeroChunkSize,

    #[error("chunk overlap ({overlap}) must be smaller than chunk size ({size})")]
    OverlapTooLarge { size: usize, overlap: usize },
}

/// Splits text into overlapping windows of at most `chunk_size` characters.
#[derive(Debug, Clone, Copy)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ChunkerError> {
        if chunk_size == 0 {
            return Err(ChunkerError::ZeroChunkSize);
        }
        if chunk_overlap >= chunk_size {
            return Err(ChunkerError::OverlapTooLarge {
                size: chunk_size,
                overlap: chunk_overlap,
            });
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Lazily split `text`. Empty text yields a single empty chunk.
    pub fn split<'a>(&self, text: &'a str) -> Chunks<'a> {
        let chars: Vec<char> = text.chars().collect();
        let mut offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        offsets.push(text.len());

        Chunks {
            text,
            chars,
            offsets,
            size: self.chunk_size,
            overlap: self.chunk_overlap,
            next_start: Some(0),
        }
    }

    /// Collect the chunk texts of `text`.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split(text).map(|c| c.text.to_string()).collect()
    }
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// A window of the source text. `start` is a character offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextChunk<'a> {
    pub start: usize,
    pub text: &'a str,
}

/// Iterator returned by [`TextSplitter::split`].
pub struct Chunks<'a> {
    text: &'a str,
    chars: Vec<char>,
    // byte offset of every char index, plus text.len()
    offsets: Vec<usize>,
    size: usize,
    overlap: usize,
    next_start: Option<usize>,
}

impl<'a> Chunks<'a> {
    fn window_end(&self, start: usize) -> usize {
        let hard_end = start + self.size;
        let floor = start + (self.overlap + 1).max(self.size / 2);

        let candidates = || (floor + 1..=hard_end).rev();

        candidates()
            .find(|&e| self.ends_with(e, &['\n', '\n']))
            .or_else(|| {
                candidates().find(|&e| SENTENCE_BREAKS.iter().any(|sep| self.ends_with(e, sep)))
            })
            .or_else(|| candidates().find(|&e| self.chars[e - 1].is_whitespace()))
            .unwrap_or(hard_end)
    }

    fn ends_with(&self, end: usize, sep: &[char]) -> bool {
        end >= sep.len() && self.chars[end - sep.len()..end] == *sep
    }

    fn slice(&self, start: usize, end: usize) -> &'a str {
        &self.text[self.offsets[start]..self.offsets[end]]
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = TextChunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.next_start?;
        let len = self.chars.len();

        if start + self.size >= len {
            self.next_start = None;
            return Some(TextChunk {
                start,
                text: self.slice(start, len),
            });
        }

        let end = self.window_end(start);
        self.next_start = Some(end - self.overlap);
        Some(TextChunk {
            start,
            text: self.slice(start, end),
        })
    }
}

/// A chunk traced back to its document and study.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub document_index: usize,
    /// Position within the document's chunk sequence
    pub chunk_index: usize,
    pub study_id: String,
    /// Character offset in the document text
    pub start: usize,
    pub text: String,
}

/// Flatten documents into chunks, document by document, left to right.
pub fn chunk_documents<'a>(
    splitter: &'a TextSplitter,
    documents: &'a [Document],
) -> impl Iterator<Item = Chunk> + 'a {
    documents.iter().flat_map(move |doc| {
        splitter
            .split(&doc.text)
            .enumerate()
            .map(move |(chunk_index, piece)| Chunk {
                document_index: doc.index,
                chunk_index,
                study_id: doc.study_id.clone(),
                start: piece.start,
                text: piece.text.to_string(),
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn reconstruct(chunks: &[TextChunk<'_>], overlap: usize) -> String {
        let mut out = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if i == 0 {
                out.push_str(chunk.text);
            } else {
                out.extend(chunk.text.chars().skip(overlap));
            }
        }
        out
    }

    #[test]
    fn rejects_bad_settings() {
        assert_eq!(TextSplitter::new(0, 0).unwrap_err(), ChunkerError::ZeroChunkSize);
        assert_eq!(
            TextSplitter::new(10, 10).unwrap_err(),
            ChunkerError::OverlapTooLarge { size: 10, overlap: 10 }
        );
        assert!(TextSplitter::new(10, 9).is_ok());
    }

    #[test]
    fn empty_text_yields_one_empty_chunk() {
        let splitter = TextSplitter::default();
        let chunks: Vec<_> = splitter.split("").collect();
        assert_eq!(chunks, vec![TextChunk { start: 0, text: "" }]);
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let text = "x".repeat(500);
        let splitter = TextSplitter::new(1024, 128).unwrap();
        let chunks: Vec<_> = splitter.split(&text).collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
    }

    #[test]
    fn text_of_exactly_chunk_size_is_a_single_chunk() {
        let text = "y".repeat(1024);
        let splitter = TextSplitter::default();
        assert_eq!(splitter.split(&text).count(), 1);
    }

    #[test]
    fn two_thousand_characters_without_boundaries() {
        let text = "a".repeat(2000);
        let splitter = TextSplitter::new(1024, 128).unwrap();
        let chunks: Vec<_> = splitter.split(&text).collect();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text.len(), 1024);
        assert!(chunks[1].start <= 896);
        assert_eq!(chunks[1].start, 896);
        assert_eq!(chunks[2].start, 1792);
        assert_eq!(reconstruct(&chunks, 128), text);
    }

    #[test]
    fn prefers_paragraph_over_sentence_over_word() {
        // 40-char window, overlap 4: boundaries searched in (20, 40]
        let text = format!(
            "{}. {}\n\n{} {}",
            "a".repeat(22),
            "b".repeat(4),
            "c".repeat(3),
            "d".repeat(40)
        );
        let splitter = TextSplitter::new(40, 4).unwrap();
        let first = splitter.split(&text).next().unwrap();
        assert!(first.text.ends_with("\n\n"), "got {:?}", first.text);

        let text = format!("{}. {} {}", "a".repeat(22), "b".repeat(4), "c".repeat(40));
        let first = splitter.split(&text).next().unwrap();
        assert!(first.text.ends_with(". "), "got {:?}", first.text);

        let text = format!("{} {} {}", "a".repeat(22), "b".repeat(4), "c".repeat(40));
        let first = splitter.split(&text).next().unwrap();
        assert_eq!(first.text, format!("{} {} ", "a".repeat(22), "b".repeat(4)));
    }

    #[test]
    fn boundaries_too_early_are_ignored() {
        // The only break sits at char 3, below the window floor.
        let text = format!("ab {}", "c".repeat(60));
        let splitter = TextSplitter::new(20, 2).unwrap();
        let first = splitter.split(&text).next().unwrap();
        assert_eq!(first.text.chars().count(), 20);
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        let text = "é".repeat(50) + &"漢".repeat(50);
        let splitter = TextSplitter::new(30, 5).unwrap();
        let chunks: Vec<_> = splitter.split(&text).collect();
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 30));
        assert_eq!(reconstruct(&chunks, 5), text);
    }

    #[test]
    fn documents_flatten_in_order_with_traceability() {
        let docs = vec![
            Document {
                index: 0,
                study_id: "NCT001".into(),
                text: "word ".repeat(60),
            },
            Document {
                index: 1,
                study_id: "NCT002".into(),
                text: "short".into(),
            },
        ];
        let splitter = TextSplitter::new(100, 10).unwrap();
        let chunks: Vec<Chunk> = chunk_documents(&splitter, &docs).collect();

        let first_doc: Vec<_> = chunks.iter().filter(|c| c.document_index == 0).collect();
        assert!(first_doc.len() > 1);
        assert!(first_doc.iter().enumerate().all(|(i, c)| c.chunk_index == i));
        assert!(first_doc.iter().all(|c| docs[0].text.contains(&c.text)));

        let last = chunks.last().unwrap();
        assert_eq!(last.study_id, "NCT002");
        assert_eq!(last.text, "short");
        assert_eq!(last.chunk_index, 0);
    }

    proptest! {
        #[test]
        fn chunks_cover_text_and_respect_size(
            text in "[a-z .!?\n]{0,400}",
            size in 1usize..80,
            overlap_seed in 0usize..80,
        ) {
            let overlap = overlap_seed % size;
            let splitter = TextSplitter::new(size, overlap).unwrap();
            let chunks: Vec<_> = splitter.split(&text).collect();

            prop_assert!(!chunks.is_empty());
            prop_assert_eq!(chunks[0].start, 0);
            for pair in chunks.windows(2) {
                prop_assert!(pair[1].start > pair[0].start);
            }
            for chunk in &chunks {
                prop_assert!(chunk.text.chars().count() <= size);
                let expected: String = text.chars().skip(chunk.start).take(chunk.text.chars().count()).collect();
                prop_assert_eq!(chunk.text, expected.as_str());
            }
            prop_assert_eq!(reconstruct(&chunks, overlap), text);
        }
    }
}
