use serde::{Deserialize, Serialize};

use crate::chunk::TextChunk;

/// Characters that terminate a sentence.
const SENTENCE_TERMINATORS: [char; 3] = ['.', '!', '?'];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingOptions {
    pub max_char_length: usize,
    pub min_sentences: usize,
    pub max_sentences: usize,
    pub sentence_overlap: usize,
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self {
            max_char_length: 1000,
            min_sentences: 2,
            max_sentences: 10,
            sentence_overlap: 1,
        }
    }
}

pub struct Chunker {
    options: ChunkingOptions,
}

impl Chunker {
    pub fn new(options: ChunkingOptions) -> Self {
        Self { options }
    }

    /// Split text into overlapping sentence windows.
    ///
    /// Single left-to-right pass. A window is force-fed sentences until it
    /// holds `min_sentences`; after that it closes as soon as the next
    /// sentence would push it past `max_char_length` characters or
    /// `max_sentences` sentences. A closing window seeds its successor with
    /// its last `sentence_overlap` sentences.
    pub fn chunk_sentences(&self, text: &str) -> Vec<Vec<String>> {
        let opts = &self.options;

        // Empty sentences (e.g. from a trailing terminator) are dropped.
        let sentences = text
            .split(SENTENCE_TERMINATORS)
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let mut windows: Vec<Vec<String>> = Vec::new();
        let mut current: Vec<String> = Vec::new();

        for sentence in sentences {
            if current.len() < opts.min_sentences {
                current.push(sentence.to_string());
                continue;
            }

            let current_chars: usize = current.iter().map(|s| s.len()).sum();
            let over_characters = current_chars + sentence.len() >= opts.max_char_length;
            let over_sentences = current.len() >= opts.max_sentences;

            if over_characters || over_sentences {
                let overlap_start = current.len().saturating_sub(opts.sentence_overlap);
                let mut next: Vec<String> = current[overlap_start..].to_vec();
                next.push(sentence.to_string());
                windows.push(std::mem::replace(&mut current, next));
            } else {
                current.push(sentence.to_string());
            }
        }

        if !current.is_empty() {
            windows.push(current);
        }

        windows
    }

    /// Chunk text and flatten each window into a `TextChunk` with a stable id.
    pub fn chunk_text(&self, text: &str) -> Vec<TextChunk> {
        self.chunk_sentences(text)
            .into_iter()
            .enumerate()
            .map(|(index, window)| TextChunk::new(window.join(". "), index))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(
        max_char_length: usize,
        min_sentences: usize,
        max_sentences: usize,
        sentence_overlap: usize,
    ) -> ChunkingOptions {
        ChunkingOptions {
            max_char_length,
            min_sentences,
            max_sentences,
            sentence_overlap,
        }
    }

    #[test]
    fn test_three_facts_scenario() {
        let chunker = Chunker::new(options(100, 1, 2, 1));
        let chunks = chunker.chunk_text("Fact A. Fact B. Fact C.");

        let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["Fact A. Fact B", "Fact B. Fact C"]);
    }

    #[test]
    fn test_trailing_terminator_adds_no_empty_sentence() {
        let chunker = Chunker::new(options(100, 1, 2, 1));
        let with_trailing = chunker.chunk_sentences("Fact A. Fact B.");
        let without_trailing = chunker.chunk_sentences("Fact A. Fact B");

        assert_eq!(with_trailing, without_trailing);
        assert_eq!(with_trailing, vec![vec!["Fact A", "Fact B"]]);
    }

    #[test]
    fn test_every_sentence_appears_in_a_window() {
        let text = "One. Two. Three. Four. Five. Six. Seven. Eight. Nine. Ten.";
        let chunker = Chunker::new(options(30, 1, 3, 1));
        let windows = chunker.chunk_sentences(text);

        let expected: Vec<&str> = text
            .split('.')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        for sentence in expected {
            assert!(
                windows.iter().any(|w| w.iter().any(|s| s == sentence)),
                "sentence {sentence:?} missing from all windows"
            );
        }
    }

    #[test]
    fn test_windows_preserve_input_order_without_overlap_duplication() {
        let text = "One. Two. Three. Four. Five. Six.";
        let overlap = 1;
        let chunker = Chunker::new(options(10_000, 1, 2, overlap));
        let windows = chunker.chunk_sentences(text);

        // Dropping each window's overlap prefix reconstructs the original
        // sentence sequence exactly once.
        let mut reconstructed: Vec<String> = windows[0].clone();
        for window in &windows[1..] {
            reconstructed.extend_from_slice(&window[overlap..]);
        }
        assert_eq!(
            reconstructed,
            vec!["One", "Two", "Three", "Four", "Five", "Six"]
        );
    }

    #[test]
    fn test_overlap_repeats_tail_sentences() {
        let chunker = Chunker::new(options(10_000, 1, 3, 2));
        let windows = chunker.chunk_sentences("A1. B2. C3. D4. E5. F6. G7.");

        assert!(windows.len() > 1);
        for pair in windows.windows(2) {
            let tail = &pair[0][pair[0].len() - 2..];
            assert_eq!(tail, &pair[1][..2]);
        }
    }

    #[test]
    fn test_min_sentences_overrides_length_trigger() {
        // Both sentences blow past max_char_length, but the window must
        // still reach min_sentences before it may close.
        let long_a = "a".repeat(50);
        let long_b = "b".repeat(50);
        let text = format!("{long_a}. {long_b}. tail");
        let chunker = Chunker::new(options(10, 2, 5, 0));
        let windows = chunker.chunk_sentences(&text);

        assert_eq!(windows[0].len(), 2);
    }

    #[test]
    fn test_max_sentences_bound_holds() {
        let chunker = Chunker::new(options(10_000, 1, 3, 1));
        let windows = chunker.chunk_sentences("A. B. C. D. E. F. G. H. I. J.");

        for window in &windows {
            assert!(window.len() <= 3);
        }
    }

    #[test]
    fn test_zero_overlap_shares_no_sentences() {
        let chunker = Chunker::new(options(10_000, 1, 2, 0));
        let windows = chunker.chunk_sentences("A. B. C. D. E. F.");

        for pair in windows.windows(2) {
            for sentence in &pair[1] {
                assert!(!pair[0].contains(sentence));
            }
        }
    }

    #[test]
    fn test_empty_input_produces_no_windows() {
        let chunker = Chunker::new(ChunkingOptions::default());
        assert!(chunker.chunk_sentences("").is_empty());
        assert!(chunker.chunk_sentences("...").is_empty());
    }
}
