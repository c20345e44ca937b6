//! Document format parsers and the extension registry

use crate::error::ExtractorError;
use crate::types::{DocumentFormat, ParsedDocument};
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Turns the bytes of one document into plain text
pub trait DocumentParser: Send + Sync {
    /// Format produced by this parser
    fn format(&self) -> DocumentFormat;

    /// Extract plain text
    fn parse(&self, bytes: &[u8]) -> Result<String, ExtractorError>;
}

/// Plain UTF-8 text
#[derive(Debug, Clone, Copy, Default)]
pub struct TextParser;

impl DocumentParser for TextParser {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Text
    }

    fn parse(&self, bytes: &[u8]) -> Result<String, ExtractorError> {
        decode_utf8(bytes)
    }
}

/// Markdown; front matter is dropped, heading markers are kept
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownParser;

impl DocumentParser for MarkdownParser {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Markdown
    }

    fn parse(&self, bytes: &[u8]) -> Result<String, ExtractorError> {
        let text = decode_utf8(bytes)?;
        Ok(strip_front_matter(&text).to_string())
    }
}

/// Word-processor documents (.docx)
///
/// Reads `word/document.xml` from the zip container and emits one
/// paragraph per `<w:p>`, separated by blank lines. Paragraphs styled as
/// headings become markdown headings.
#[derive(Debug, Clone)]
pub struct WordParser {
    paragraph: Regex,
    heading_style: Regex,
    run: Regex,
    entity: Regex,
}

impl WordParser {
    /// Create a new parser
    pub fn new() -> Result<Self, ExtractorError> {
        let compile = |pattern: &str| Regex::new(pattern).map_err(|e| ExtractorError::Config(e.to_string()));
        Ok(Self {
            paragraph: compile(r"(?s)<w:p(?:\s[^>]*)?>(.*?)</w:p>")?,
            heading_style: compile(r#"<w:pStyle\s+w:val="(?i:heading)\s*([1-6])""#)?,
            run: compile(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>|<w:tab\s*/>|<w:br\s*/>|<w:cr\s*/>")?,
            entity: compile(r"&(#x[0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);")?,
        })
    }

    fn paragraphs(&self, xml: &str) -> Vec<String> {
        let mut paragraphs = Vec::new();

        for paragraph in self.paragraph.captures_iter(xml) {
            let body = paragraph.get(1).map_or("", |m| m.as_str());

            let mut text = String::new();
            for token in self.run.captures_iter(body) {
                match token.get(1) {
                    Some(run_text) => text.push_str(&self.decode_entities(run_text.as_str())),
                    None if token[0].starts_with("<w:tab") => text.push('\t'),
                    None => text.push('\n'),
                }
            }
            if text.trim().is_empty() {
                continue;
            }

            if let Some(level) = self.heading_style.captures(body).and_then(|c| c[1].parse::<usize>().ok()) {
                text = format!("{} {}", "#".repeat(level), text.trim_start());
            }
            paragraphs.push(text);
        }

        paragraphs
    }

    fn decode_entities(&self, text: &str) -> String {
        self.entity
            .replace_all(text, |caps: &Captures| {
                let name = &caps[1];
                let decoded = match name {
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "amp" => Some('&'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    _ if name.starts_with("#x") => u32::from_str_radix(&name[2..], 16).ok().and_then(char::from_u32),
                    _ if name.starts_with('#') => name[1..].parse::<u32>().ok().and_then(char::from_u32),
                    _ => None,
                };
                decoded.map_or_else(|| caps[0].to_string(), String::from)
            })
            .into_owned()
    }
}

impl DocumentParser for WordParser {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Word
    }

    fn parse(&self, bytes: &[u8]) -> Result<String, ExtractorError> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| ExtractorError::Format(format!("Not a .docx container: {}", e)))?;
        let mut entry = archive
            .by_name("word/document.xml")
            .map_err(|e| ExtractorError::Format(format!("Missing word/document.xml: {}", e)))?;

        let mut xml = String::new();
        entry
            .read_to_string(&mut xml)
            .map_err(|e| ExtractorError::Format(format!("Unreadable word/document.xml: {}", e)))?;

        let paragraphs = self.paragraphs(&xml);
        debug!("Extracted {} paragraphs from .docx", paragraphs.len());
        Ok(paragraphs.join("\n\n"))
    }
}

/// Maps file extensions to parsers
///
/// Owned by the caller; registering a parser for an extension that already
/// has one replaces it.
#[derive(Clone, Default)]
pub struct ParserRegistry {
    parsers: BTreeMap<String, Arc<dyn DocumentParser>>,
}

impl ParserRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in parsers for `.txt`, `.md`, `.markdown` and `.docx`
    pub fn with_defaults() -> Result<Self, ExtractorError> {
        let mut registry = Self::new();
        registry.register("txt", TextParser);
        registry.register("md", MarkdownParser);
        registry.register("markdown", MarkdownParser);
        registry.register("docx", WordParser::new()?);
        Ok(registry)
    }

    /// Register `parser` for `extension` (leading dot and case are ignored)
    pub fn register(&mut self, extension: &str, parser: impl DocumentParser + 'static) {
        self.parsers.insert(normalize_extension(extension), Arc::new(parser));
    }

    /// Parser registered for `extension`
    pub fn get(&self, extension: &str) -> Option<&dyn DocumentParser> {
        self.parsers.get(&normalize_extension(extension)).map(|p| p.as_ref())
    }

    /// Registered extensions, sorted
    pub fn extensions(&self) -> Vec<&str> {
        self.parsers.keys().map(String::as_str).collect()
    }

    /// Parse `bytes` named `name`, choosing the parser by extension
    pub fn parse(&self, name: &str, bytes: &[u8]) -> Result<ParsedDocument, ExtractorError> {
        let extension = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let parser = self.get(extension).ok_or_else(|| {
            ExtractorError::UnsupportedFormat(if extension.is_empty() {
                format!("'{}' has no file extension", name)
            } else {
                format!(".{} (supported: {})", extension, self.extensions().join(", "))
            })
        })?;

        Ok(ParsedDocument {
            id: name.to_string(),
            source: name.to_string(),
            format: parser.format(),
            text: parser.parse(bytes)?,
        })
    }
}

fn normalize_extension(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_lowercase()
}

fn decode_utf8(bytes: &[u8]) -> Result<String, ExtractorError> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| ExtractorError::Format(format!("Invalid UTF-8 at byte {}", e.utf8_error().valid_up_to())))
}

/// Drop a leading `---` ... `---` (or `...`) YAML front matter block
fn strip_front_matter(text: &str) -> &str {
    let body = text.strip_prefix('\u{feff}').unwrap_or(text);
    let Some(rest) = body.strip_prefix("---\n").or_else(|| body.strip_prefix("---\r\n")) else {
        return text;
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        offset += line.len();
        let marker = line.trim_end();
        if marker == "---" || marker == "..." {
            return &rest[offset..];
        }
    }
    text
}
