//! Parse LLM output into entity/relation extractions

use crate::config::ExtractorConfig;
use crate::error::ExtractorError;
use bearingkg_domain::{
    normalize_name, ChunkExtraction, EntityDraft, EntityKey, EntityType, RelationDraft, RelationType,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Accepted values of the `severity` attribute
pub const SEVERITY_LEVELS: [&str; 3] = ["mild", "moderate", "severe"];

/// Parses and validates raw model output for one chunk
///
/// Any violation fails the whole chunk: a chunk contributes either a fully
/// valid extraction or nothing.
#[derive(Debug, Clone)]
pub struct ResultParser {
    config: ExtractorConfig,
}

impl ResultParser {
    /// Create a parser accepting the types the configuration recognizes
    pub fn from_config(config: &ExtractorConfig) -> Self {
        Self { config: config.clone() }
    }

    /// Parse raw model output
    ///
    /// Fails with `ExtractorError::Parse` if no JSON object of the expected
    /// shape can be decoded and with `ExtractorError::Schema` if the object
    /// violates type or reference constraints.
    pub fn parse(&self, response: &str) -> Result<ChunkExtraction, ExtractorError> {
        let json = extract_json(response)?;
        let obj = json
            .as_object()
            .ok_or_else(|| ExtractorError::Parse("Expected a JSON object".to_string()))?;

        let entities_json: &[Value] = match obj.get("entities") {
            Some(Value::Array(items)) => items.as_slice(),
            Some(_) => return Err(ExtractorError::Parse("'entities' is not an array".to_string())),
            None => return Err(ExtractorError::Parse("Missing 'entities' array".to_string())),
        };
        let relations_json: &[Value] = match obj.get("relations") {
            Some(Value::Array(items)) => items.as_slice(),
            Some(Value::Null) | None => &[],
            Some(_) => return Err(ExtractorError::Parse("'relations' is not an array".to_string())),
        };

        let mut entities = Vec::with_capacity(entities_json.len());
        for (idx, entity_json) in entities_json.iter().enumerate() {
            entities.push(self.parse_entity(idx, entity_json)?);
        }

        let mut relations = Vec::with_capacity(relations_json.len());
        for (idx, relation_json) in relations_json.iter().enumerate() {
            relations.push(self.parse_relation(idx, relation_json, &entities)?);
        }

        debug!("Parsed {} entities and {} relations", entities.len(), relations.len());
        Ok(ChunkExtraction { entities, relations })
    }

    fn parse_entity(&self, idx: usize, json: &Value) -> Result<EntityDraft, ExtractorError> {
        let obj = json
            .as_object()
            .ok_or_else(|| schema(format!("entity {} is not a JSON object", idx)))?;

        let name = required_str(obj, "name").map_err(|e| schema(format!("entity {}: {}", idx, e)))?;
        let type_name = required_str(obj, "type").map_err(|e| schema(format!("entity '{}': {}", name, e)))?;
        let entity_type = self.entity_type(type_name)?;

        let mut draft = EntityDraft::new(name.trim(), entity_type);

        match obj.get("attributes") {
            None | Some(Value::Null) => {}
            Some(Value::Object(attributes)) => {
                for (field, value) in attributes {
                    match scalar(value) {
                        Scalar::Text(text) => {
                            draft.attributes.insert(field.clone(), text);
                        }
                        Scalar::Absent => {}
                        Scalar::Nested => {
                            return Err(schema(format!(
                                "entity '{}': attribute '{}' is not a scalar",
                                name, field
                            )))
                        }
                    }
                }
            }
            Some(_) => return Err(schema(format!("entity '{}': 'attributes' is not an object", name))),
        }

        match obj.get("description") {
            None | Some(Value::Null) => {}
            Some(Value::String(text)) if text.trim().is_empty() => {}
            Some(Value::String(text)) => draft.notes.push(text.trim().to_string()),
            Some(_) => return Err(schema(format!("entity '{}': 'description' is not a string", name))),
        }

        // Flat fields such as "severity" are attributes the model forgot to nest
        let mut extras = BTreeMap::new();
        for (field, value) in obj {
            if matches!(field.as_str(), "name" | "type" | "attributes" | "description") {
                continue;
            }
            match scalar(value) {
                Scalar::Text(text) => {
                    extras.insert(field.clone(), text);
                }
                Scalar::Absent => {}
                Scalar::Nested => debug!("Ignoring nested field '{}' on entity '{}'", field, name),
            }
        }
        for (field, text) in extras {
            draft.attributes.entry(field).or_insert(text);
        }

        if let Some(severity) = draft.attributes.get_mut("severity") {
            let level = severity.to_lowercase();
            if !SEVERITY_LEVELS.contains(&level.as_str()) {
                return Err(schema(format!(
                    "entity '{}': severity '{}' is not one of {}",
                    name,
                    severity,
                    SEVERITY_LEVELS.join(", ")
                )));
            }
            *severity = level;
        }

        Ok(draft)
    }

    fn parse_relation(
        &self,
        idx: usize,
        json: &Value,
        entities: &[EntityDraft],
    ) -> Result<RelationDraft, ExtractorError> {
        let obj = json
            .as_object()
            .ok_or_else(|| schema(format!("relation {} is not a JSON object", idx)))?;
        let field = |key: &'static str| {
            required_str(obj, key).map_err(|e| schema(format!("relation {}: {}", idx, e)))
        };

        let source = field("source")?;
        let target = field("target")?;
        let relation = RelationType::new(field("relation")?);
        if !self.config.recognizes_relation(&relation) {
            return Err(schema(format!("relation {}: unrecognized relation type '{}'", idx, relation)));
        }

        let source = self.resolve(source, optional_str(obj, "source_type"), entities)?;
        let target = self.resolve(target, optional_str(obj, "target_type"), entities)?;

        Ok(RelationDraft {
            source,
            relation,
            target,
        })
    }

    /// Find the key of a relation endpoint among this chunk's entities
    fn resolve(
        &self,
        name: &str,
        type_name: Option<&str>,
        entities: &[EntityDraft],
    ) -> Result<EntityKey, ExtractorError> {
        let normalized = normalize_name(name);

        if let Some(type_name) = type_name {
            let key = EntityKey {
                name: normalized,
                entity_type: self.entity_type(type_name)?,
            };
            return if entities.iter().any(|e| e.key() == key) {
                Ok(key)
            } else {
                Err(schema(format!(
                    "relation endpoint '{}' ({}) is not among this chunk's entities",
                    name, key.entity_type
                )))
            };
        }

        let mut matches: Vec<EntityKey> = entities
            .iter()
            .map(EntityDraft::key)
            .filter(|key| key.name == normalized)
            .collect();
        matches.sort();
        matches.dedup();

        match matches.len() {
            0 => Err(schema(format!(
                "relation endpoint '{}' is not among this chunk's entities",
                name
            ))),
            1 => Ok(matches.remove(0)),
            _ => Err(schema(format!(
                "relation endpoint '{}' is ambiguous across {} types; add a type",
                name,
                matches.len()
            ))),
        }
    }

    fn entity_type(&self, type_name: &str) -> Result<EntityType, ExtractorError> {
        self.config
            .recognized_entity(&EntityType::parse(type_name))
            .cloned()
            .ok_or_else(|| schema(format!("unrecognized entity type '{}'", type_name)))
    }
}

enum Scalar {
    Text(String),
    Absent,
    Nested,
}

fn scalar(value: &Value) -> Scalar {
    match value {
        Value::String(s) => Scalar::Text(s.trim().to_string()),
        Value::Number(n) => Scalar::Text(n.to_string()),
        Value::Bool(b) => Scalar::Text(b.to_string()),
        Value::Null => Scalar::Absent,
        Value::Array(_) | Value::Object(_) => Scalar::Nested,
    }
}

fn schema(message: String) -> ExtractorError {
    ExtractorError::Schema(message)
}

fn required_str<'a>(obj: &'a Map<String, Value>, key: &str) -> Result<&'a str, String> {
    match obj.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.as_str()),
        Some(Value::String(_)) => Err(format!("'{}' is empty", key)),
        Some(_) => Err(format!("'{}' is not a string", key)),
        None => Err(format!("missing '{}'", key)),
    }
}

fn optional_str<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Decode the JSON object in a model response
///
/// Tries the whole response, then the first fenced code block, then the span
/// from the first `{` to the last `}`.
fn extract_json(response: &str) -> Result<Value, ExtractorError> {
    let trimmed = response.trim();
    if trimmed.is_empty() {
        return Err(ExtractorError::Parse("Empty response".to_string()));
    }

    let mut candidates = vec![trimmed];
    if let Some(fenced) = fenced_block(trimmed) {
        candidates.push(fenced);
    }
    if let (Some(open), Some(close)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if open < close {
            candidates.push(&trimmed[open..=close]);
        }
    }

    let mut last_error = None;
    for candidate in candidates {
        match serde_json::from_str::<Value>(candidate) {
            Ok(value) => return Ok(value),
            Err(e) => last_error = Some(e),
        }
    }

    Err(ExtractorError::Parse(match last_error {
        Some(e) => format!("No JSON object in response: {}", e),
        None => "No JSON object in response".to_string(),
    }))
}

/// Contents of the first ``` fenced block, without the info string
fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_fence = &text[open + 3..];
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let close = body.find("```")?;
    Some(body[..close].trim())
}
