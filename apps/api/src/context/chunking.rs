//! Recursive character splitting for long resume text.
//!
//! Text is cut at the coarsest separator present (paragraph, line, sentence,
//! word, character), pieces are merged back up to `chunk_size` characters and
//! consecutive chunks share up to `chunk_overlap` trailing characters.

use std::collections::VecDeque;

pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " ", ""];

#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap: chunk_overlap.min(chunk_size.saturating_sub(1)),
        }
    }

    /// Splits `text` into trimmed, non-empty chunks of at most `chunk_size` characters.
    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, SEPARATORS)
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let (separator, finer) = pick_separator(text, separators);

        let mut chunks = Vec::new();
        let mut pending: Vec<String> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(&piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                chunks.extend(self.merge(&pending));
                pending.clear();
            }
            if finer.is_empty() {
                chunks.push(piece);
            } else {
                chunks.extend(self.split_with(&piece, finer));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge(&pending));
        }
        chunks
    }

    /// Greedily packs small pieces into chunks, carrying the overlap forward.
    fn merge(&self, pieces: &[String]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);

            if total + len > self.chunk_size && !window.is_empty() {
                push_chunk(&mut chunks, &window);
                while total > self.chunk_overlap || (total > 0 && total + len > self.chunk_size) {
                    match window.pop_front() {
                        Some((_, dropped)) => total -= dropped,
                        None => break,
                    }
                }
            }

            window.push_back((piece.as_str(), len));
            total += len;
        }

        push_chunk(&mut chunks, &window);
        chunks
    }
}

fn pick_separator<'a>(text: &str, separators: &'a [&'a str]) -> (&'a str, &'a [&'a str]) {
    for (i, separator) in separators.iter().enumerate() {
        if separator.is_empty() {
            return (*separator, &[]);
        }
        if text.contains(*separator) {
            return (*separator, &separators[i + 1..]);
        }
    }
    ("", &[])
}

/// Splits on `separator`, keeping it attached to the start of the following piece.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }

    let mut parts = text.split(separator);
    let mut pieces: Vec<String> = parts.next().map(str::to_string).into_iter().collect();
    pieces.extend(parts.map(|part| format!("{separator}{part}")));
    pieces.retain(|p| !p.is_empty());
    pieces
}

fn push_chunk(chunks: &mut Vec<String>, window: &VecDeque<(&str, usize)>) {
    let joined: String = window.iter().map(|(piece, _)| *piece).collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alphabet_text(len: usize) -> String {
        (0..len).map(|i| char::from(b'a' + (i % 26) as u8)).collect()
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunks = TextSplitter::default().split("  Senior engineer.\n\nLoves Rust.  ");
        assert_eq!(chunks, vec!["Senior engineer.\n\nLoves Rust.".to_string()]);
    }

    #[test]
    fn test_unbroken_text_falls_back_to_characters_with_overlap() {
        let text = alphabet_text(1200);
        let chunks = TextSplitter::default().split(&text);

        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= DEFAULT_CHUNK_SIZE));
        let tail: String = chunks[0].chars().skip(DEFAULT_CHUNK_SIZE - DEFAULT_CHUNK_OVERLAP).collect();
        assert!(chunks[1].starts_with(&tail));
    }

    #[test]
    fn test_paragraph_boundaries_are_preferred() {
        let first = format!("{}.", "word ".repeat(60).trim_end());
        let second = format!("{}.", "term ".repeat(60).trim_end());
        let text = format!("{first}\n\n{second}");

        let chunks = TextSplitter::default().split(&text);
        assert_eq!(chunks, vec![first, second]);
    }

    #[test]
    fn test_multibyte_text_is_measured_in_characters() {
        let text = "é".repeat(700);
        let chunks = TextSplitter::default().split(&text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        assert!(TextSplitter::default().split("   ").is_empty());
    }
}
