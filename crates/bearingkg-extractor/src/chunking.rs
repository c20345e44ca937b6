//! Chunking of normalized documents
//!
//! Paragraph units are packed into chunks of at most `max_chunk_size`
//! characters. A paragraph too large on its own is split into sentences,
//! and a sentence too large on its own is hard-cut. Chunks never overlap
//! and nothing is trimmed, so joining the chunk texts in order gives back
//! the normalized text.

use crate::config::{ChunkStrategy, ExtractorConfig};
use crate::normalizer::NormalizedText;
use crate::types::{Chunk, ChunkKind, ParagraphUnit};
use tracing::{debug, warn};

/// Splits normalized text into size-bounded chunks
#[derive(Debug, Clone)]
pub struct Chunker {
    strategy: ChunkStrategy,
    max_chunk_size: usize,
}

impl Chunker {
    /// Create a new chunker (a zero size is treated as 1)
    pub fn new(strategy: ChunkStrategy, max_chunk_size: usize) -> Self {
        Self {
            strategy,
            max_chunk_size: max_chunk_size.max(1),
        }
    }

    /// Create a chunker from the pipeline configuration
    pub fn from_config(config: &ExtractorConfig) -> Self {
        Self::new(config.chunk_strategy, config.max_chunk_size)
    }

    /// Chunk the given text
    pub fn chunk(&self, normalized: &NormalizedText) -> Vec<Chunk> {
        let mut sink = ChunkSink::new(&normalized.text, self.max_chunk_size);

        for unit in &normalized.paragraphs {
            let chars = unit.slice(&normalized.text).chars().count();

            if chars > self.max_chunk_size {
                sink.flush();
                self.split_paragraph(&mut sink, unit);
                sink.flush();
                continue;
            }

            let starts_chunk = match self.strategy {
                ChunkStrategy::Packed => false,
                ChunkStrategy::BySection => unit.heading,
                ChunkStrategy::ByParagraph => true,
            };
            if starts_chunk {
                sink.flush();
            }
            sink.push(unit.start, unit.end, chars, ChunkKind::Paragraphs);
        }
        sink.flush();

        debug!(
            "Split {} paragraphs into {} chunks (max {} chars)",
            normalized.paragraphs.len(),
            sink.chunks.len(),
            self.max_chunk_size
        );
        sink.chunks
    }

    /// Pack the sentences of one oversized paragraph
    fn split_paragraph(&self, sink: &mut ChunkSink<'_>, unit: &ParagraphUnit) {
        let paragraph = unit.slice(sink.text);

        for (rel_start, rel_end) in sentence_spans(paragraph) {
            let start = unit.start + rel_start;
            let end = unit.start + rel_end;
            let chars = sink.text[start..end].chars().count();

            if chars > self.max_chunk_size {
                sink.flush();
                warn!(
                    "Sentence of {} chars at byte {} exceeds max chunk size {}, hard-cutting",
                    chars, start, self.max_chunk_size
                );
                for (cut_start, cut_end, cut_chars) in hard_cuts(sink.text, start, end, self.max_chunk_size) {
                    sink.emit(cut_start, cut_end, cut_chars, ChunkKind::HardCut);
                }
            } else {
                sink.push(start, end, chars, ChunkKind::SentenceFragment);
            }
        }
    }
}

/// Open chunk being packed
#[derive(Debug, Clone, Copy)]
struct Pending {
    start: usize,
    end: usize,
    chars: usize,
    kind: ChunkKind,
}

struct ChunkSink<'a> {
    text: &'a str,
    max_chunk_size: usize,
    chunks: Vec<Chunk>,
    pending: Option<Pending>,
}

impl<'a> ChunkSink<'a> {
    fn new(text: &'a str, max_chunk_size: usize) -> Self {
        Self {
            text,
            max_chunk_size,
            chunks: Vec::new(),
            pending: None,
        }
    }

    /// Append a contiguous piece, flushing first if it would not fit
    fn push(&mut self, start: usize, end: usize, chars: usize, kind: ChunkKind) {
        if let Some(open) = self.pending.as_mut() {
            if open.chars + chars <= self.max_chunk_size && open.kind == kind {
                open.end = end;
                open.chars += chars;
                return;
            }
            self.flush();
        }
        self.pending = Some(Pending {
            start,
            end,
            chars,
            kind,
        });
    }

    fn flush(&mut self) {
        if let Some(open) = self.pending.take() {
            self.emit(open.start, open.end, open.chars, open.kind);
        }
    }

    fn emit(&mut self, start: usize, end: usize, chars: usize, kind: ChunkKind) {
        self.chunks.push(Chunk {
            index: self.chunks.len(),
            text: self.text[start..end].to_string(),
            start,
            end,
            char_len: chars,
            kind,
        });
    }
}

/// Sentence spans of `text`, as relative byte ranges tiling it
///
/// A sentence ends after `.`, `!` or `?` followed by whitespace or the end
/// of text, after any of `。！？；`, or at a line break. Whitespace after
/// the terminator stays with the sentence it ends.
pub(crate) fn sentence_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let boundary = match c {
            '。' | '！' | '？' | '；' | '\n' => true,
            '.' | '!' | '?' => chars.peek().map_or(true, |(_, next)| next.is_whitespace()),
            _ => false,
        };
        if !boundary {
            continue;
        }

        let mut end = i + c.len_utf8();
        while let Some(&(j, next)) = chars.peek() {
            if !next.is_whitespace() {
                break;
            }
            end = j + next.len_utf8();
            chars.next();
        }
        spans.push((start, end));
        start = end;
    }

    if start < text.len() {
        spans.push((start, text.len()));
    }
    spans
}

/// Cut `text[start..end]` into pieces of at most `max` chars
fn hard_cuts(text: &str, start: usize, end: usize, max: usize) -> Vec<(usize, usize, usize)> {
    let mut cuts = Vec::new();
    let mut piece_start = start;
    let mut piece_chars = 0;

    for (i, _) in text[start..end].char_indices() {
        if piece_chars == max {
            cuts.push((piece_start, start + i, piece_chars));
            piece_start = start + i;
            piece_chars = 0;
        }
        piece_chars += 1;
    }
    if piece_chars > 0 {
        cuts.push((piece_start, end, piece_chars));
    }
    cuts
}
