// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Text chunking for ingestion
//!
//! Splits extracted document text into overlapping bounded-length segments.
//! Chunks are cut at sentence or word boundaries where one exists close to
//! the target length, so embeddings are not fed mid-word fragments.

use thiserror::Error;

/// Sentence-ending delimiters preferred as cut points, checked in order
const SENTENCE_DELIMITERS: [&str; 6] = [". ", ".\n", "! ", "!\n", "? ", "?\n"];

/// Upper bound on how far back from the target length a boundary is searched
const MAX_LOOKBACK: usize = 40;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChunkerError {
    #[error("Invalid chunker config: max_len ({max_len}) must be greater than overlap ({overlap})")]
    InvalidOverlap { max_len: usize, overlap: usize },

    #[error("Invalid chunker config: max_len must be greater than zero")]
    ZeroMaxLen,
}

/// Chunking parameters, in characters
#[derive(Debug, Clone, Copy)]
pub struct ChunkerConfig {
    /// Target maximum chunk length
    pub max_len: usize,
    /// Characters shared between consecutive chunks
    pub overlap: usize,
}

impl ChunkerConfig {
    pub fn new(max_len: usize, overlap: usize) -> Result<Self, ChunkerError> {
        let config = Self { max_len, overlap };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ChunkerError> {
        if self.max_len == 0 {
            return Err(ChunkerError::ZeroMaxLen);
        }
        if self.overlap >= self.max_len {
            return Err(ChunkerError::InvalidOverlap {
                max_len: self.max_len,
                overlap: self.overlap,
            });
        }
        Ok(())
    }

    /// Characters between consecutive chunk starts
    fn stride(&self) -> usize {
        self.max_len - self.overlap
    }

    /// Boundary search window, capped so a snapped cut can never fall
    /// before the next chunk's start
    fn lookback(&self) -> usize {
        self.overlap.min(MAX_LOOKBACK)
    }
}

/// Lazy iterator over the chunks of a text
///
/// Each chunk starts `max_len - overlap` characters after the previous
/// chunk's start. The final chunk runs to the end of the text; tails shorter
/// than `overlap` are absorbed into it rather than emitted on their own.
/// Borrowed slices, no allocation per chunk.
pub struct Chunks<'a> {
    text: &'a str,
    /// Byte offset of each char, plus the total byte length as a sentinel
    offsets: Vec<usize>,
    config: ChunkerConfig,
    /// Next chunk start, as a char index
    start: usize,
    done: bool,
}

impl<'a> Chunks<'a> {
    pub fn new(text: &'a str, config: ChunkerConfig) -> Self {
        let mut offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        offsets.push(text.len());
        Self {
            text,
            offsets,
            config,
            start: 0,
            done: text.is_empty(),
        }
    }

    fn char_count(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Find the cut point (byte offset) for a chunk that would otherwise end
    /// at char index `end`. Prefers the last sentence delimiter in the
    /// lookback window, then the last whitespace, then a hard cut.
    fn snap_cut(&self, end: usize) -> usize {
        let lookback = self.config.lookback();
        if lookback == 0 {
            return self.offsets[end];
        }
        let window_start = self.offsets[end - lookback];
        let window_end = self.offsets[end];
        let window = &self.text[window_start..window_end];

        let mut best: Option<usize> = None;
        for delim in SENTENCE_DELIMITERS {
            if let Some(pos) = window.rfind(delim) {
                let cut = window_start + pos + delim.len();
                best = Some(best.map_or(cut, |b: usize| b.max(cut)));
            }
        }
        if let Some(cut) = best {
            return cut;
        }

        // No sentence end in range, fall back to word boundary
        for (pos, c) in window.char_indices().rev() {
            if c.is_whitespace() {
                return window_start + pos + c.len_utf8();
            }
        }

        self.offsets[end]
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let n = self.char_count();
        let remaining = n - self.start;
        if remaining <= self.config.max_len {
            self.done = true;
            return Some(&self.text[self.offsets[self.start]..]);
        }

        let end = self.start + self.config.max_len;
        let cut = self.snap_cut(end);
        let chunk = &self.text[self.offsets[self.start]..cut];
        self.start += self.config.stride();
        Some(chunk)
    }
}

/// Chunk a text into owned strings
pub fn chunk_text(text: &str, config: ChunkerConfig) -> Vec<String> {
    Chunks::new(text, config).map(str::to_string).collect()
}
