//! Text normalization and paragraph segmentation

use crate::error::ExtractorError;
use crate::types::ParagraphUnit;
use tracing::debug;

/// Normalized text plus its paragraph units
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText {
    /// Canonical text
    pub text: String,
    /// Paragraph units tiling `text`, in order
    pub paragraphs: Vec<ParagraphUnit>,
}

impl NormalizedText {
    /// True if there is no text
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Length in characters
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Turns parsed plain text into canonical text and paragraph units
///
/// The canonical form has `\n` line endings, no control characters other
/// than newline and tab, no trailing whitespace on any line, at most one
/// blank line in a row and no blank lines at either end.
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    max_text_length: usize,
}

impl TextNormalizer {
    /// Create a normalizer rejecting text longer than `max_text_length` chars
    pub fn new(max_text_length: usize) -> Self {
        Self { max_text_length }
    }

    /// Normalize `raw` and split it into paragraph units
    pub fn normalize(&self, raw: &str) -> Result<NormalizedText, ExtractorError> {
        let text = canonicalize(raw);

        let char_len = text.chars().count();
        if char_len > self.max_text_length {
            return Err(ExtractorError::TextTooLong(char_len, self.max_text_length));
        }

        let paragraphs = segment(&text);
        debug!(
            "Normalized {} chars into {} chars, {} paragraphs",
            raw.len(),
            char_len,
            paragraphs.len()
        );

        Ok(NormalizedText { text, paragraphs })
    }
}

fn canonicalize(raw: &str) -> String {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let unified = raw.replace("\r\n", "\n").replace('\r', "\n");
    let cleaned: String = unified
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect();

    let mut lines: Vec<&str> = Vec::new();
    for line in cleaned.split('\n').map(str::trim_end) {
        let blank = line.is_empty();
        let previous_blank = lines.last().map_or(true, |l| l.is_empty());
        if blank && previous_blank {
            continue;
        }
        lines.push(line);
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }

    lines.join("\n")
}

/// True for a markdown ATX heading line (`#` to `######` at column 0, then a space)
pub(crate) fn is_heading(line: &str) -> bool {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    (1..=6).contains(&hashes) && line[hashes..].starts_with([' ', '\t'])
}

fn is_fence(line: &str) -> bool {
    line.starts_with("```") || line.starts_with("~~~")
}

fn segment(text: &str) -> Vec<ParagraphUnit> {
    if text.is_empty() {
        return Vec::new();
    }

    let mut units = Vec::new();
    let mut unit_start = 0;
    let mut unit_heading = false;
    let mut after_blank = false;
    let mut in_fence = false;
    let mut offset = 0;

    for line in text.split('\n') {
        let line_start = offset;
        offset += line.len() + 1;

        if line.is_empty() {
            after_blank = true;
            continue;
        }

        if is_fence(line) {
            in_fence = !in_fence;
        }
        let heading = !in_fence && is_heading(line);
        if line_start == 0 {
            unit_heading = heading;
        } else if after_blank || heading {
            units.push(ParagraphUnit {
                start: unit_start,
                end: line_start,
                heading: unit_heading,
            });
            unit_start = line_start;
            unit_heading = heading;
        }
        after_blank = false;
    }

    units.push(ParagraphUnit {
        start: unit_start,
        end: text.len(),
        heading: unit_heading,
    });
    units
}
