//! Context digest carried from one chunk to the next

use crate::config::ExtractorConfig;
use bearingkg_domain::{Entity, KnowledgeGraph, Relation};
use std::cmp::Reverse;

const ENTITY_HEADER: &str = "Known entities:";
const RELATION_HEADER: &str = "Known relations:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Section {
    Entities,
    Relations,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct DigestLine {
    section: Section,
    text: String,
    chars: usize,
}

/// Bounded summary of the entities and relations extracted so far
///
/// Lines are kept in priority order; the rendered text groups them into an
/// entity section and a relation section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextDigest {
    lines: Vec<DigestLine>,
    rendered: String,
}

impl ContextDigest {
    /// A digest with nothing in it
    pub fn empty() -> Self {
        Self::default()
    }

    /// True if the digest holds no items
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of items (entities plus relations)
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Rendered text
    pub fn text(&self) -> &str {
        &self.rendered
    }

    /// Length of the rendered text in characters
    pub fn char_len(&self) -> usize {
        self.rendered.chars().count()
    }

    /// Longest priority prefix of this digest that renders within `limit` chars
    pub fn fit(&self, limit: usize) -> ContextDigest {
        select(self.lines.iter().cloned(), limit)
    }
}

/// Derives context digests from a knowledge graph
#[derive(Debug, Clone)]
pub struct ContextSummarizer {
    cap: usize,
}

impl ContextSummarizer {
    /// Create a summarizer producing digests of at most `cap` chars
    pub fn new(cap: usize) -> Self {
        Self { cap }
    }

    /// Create a summarizer from the pipeline configuration
    pub fn from_config(config: &ExtractorConfig) -> Self {
        Self::new(config.context_digest_cap)
    }

    /// Summarize `graph`
    ///
    /// Items emitted by the latest chunk come first, then the most often
    /// emitted, then the most recently inserted. Items are taken whole until
    /// the first one that does not fit.
    pub fn summarize(&self, graph: &KnowledgeGraph) -> ContextDigest {
        let mut ranked: Vec<(Rank, DigestLine)> = Vec::with_capacity(graph.entity_count() + graph.relation_count());

        for entity in graph.entities() {
            let rank = Rank::new(entity.last_chunk(), entity.mentions(), entity.ordinal, Section::Entities);
            ranked.push((rank, DigestLine::new(Section::Entities, entity_line(entity))));
        }
        for relation in graph.relations() {
            let rank = Rank::new(relation.last_chunk(), relation.mentions(), relation.ordinal, Section::Relations);
            ranked.push((rank, DigestLine::new(Section::Relations, relation_line(relation))));
        }

        ranked.sort_by(|(a_rank, a_line), (b_rank, b_line)| a_rank.cmp(b_rank).then_with(|| a_line.text.cmp(&b_line.text)));
        select(ranked.into_iter().map(|(_, line)| line), self.cap)
    }
}

/// Sort key; smaller sorts first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Rank {
    last_chunk: Reverse<Option<usize>>,
    mentions: Reverse<usize>,
    ordinal: Reverse<usize>,
    section: Section,
}

impl Rank {
    fn new(last_chunk: Option<usize>, mentions: usize, ordinal: usize, section: Section) -> Self {
        Self {
            last_chunk: Reverse(last_chunk),
            mentions: Reverse(mentions),
            ordinal: Reverse(ordinal),
            section,
        }
    }
}

impl DigestLine {
    fn new(section: Section, text: String) -> Self {
        let chars = text.chars().count();
        Self { section, text, chars }
    }
}

fn entity_line(entity: &Entity) -> String {
    let mut line = format!("- {} ({})", entity.name, entity.entity_type());
    if !entity.attributes.is_empty() {
        let attributes: Vec<String> = entity
            .attributes
            .iter()
            .map(|(field, value)| format!("{}={}", field, value))
            .collect();
        line.push_str(": ");
        line.push_str(&attributes.join(", "));
    }
    line
}

fn relation_line(relation: &Relation) -> String {
    format!("- {}", relation)
}

/// Running size of a rendered digest
#[derive(Default)]
struct Tally {
    entities: Option<usize>,
    relations: Option<usize>,
}

impl Tally {
    fn with(&self, line: &DigestLine) -> Tally {
        let (entities, relations) = match line.section {
            Section::Entities => (Some(self.entities.unwrap_or(0) + 1 + line.chars), self.relations),
            Section::Relations => (self.entities, Some(self.relations.unwrap_or(0) + 1 + line.chars)),
        };
        Tally { entities, relations }
    }

    fn chars(&self) -> usize {
        let entity_part = self.entities.map_or(0, |n| ENTITY_HEADER.len() + n);
        let relation_part = self.relations.map_or(0, |n| RELATION_HEADER.len() + n);
        let separator = usize::from(self.entities.is_some() && self.relations.is_some());
        entity_part + relation_part + separator
    }
}

fn select(lines: impl Iterator<Item = DigestLine>, cap: usize) -> ContextDigest {
    let mut tally = Tally::default();
    let mut kept = Vec::new();

    for line in lines {
        let next = tally.with(&line);
        if next.chars() > cap {
            break;
        }
        tally = next;
        kept.push(line);
    }

    let rendered = render(&kept);
    debug_assert_eq!(rendered.chars().count(), tally.chars());
    ContextDigest { lines: kept, rendered }
}

fn render(lines: &[DigestLine]) -> String {
    let mut sections = Vec::new();
    for (section, header) in [(Section::Entities, ENTITY_HEADER), (Section::Relations, RELATION_HEADER)] {
        let body: Vec<&str> = lines
            .iter()
            .filter(|l| l.section == section)
            .map(|l| l.text.as_str())
            .collect();
        if !body.is_empty() {
            sections.push(format!("{}\n{}", header, body.join("\n")));
        }
    }
    sections.join("\n")
}
