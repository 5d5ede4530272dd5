use crate::geo::Geometry;
use serde_json::{Map, Value};
use thiserror::Error;

/// The payload as a whole could not be read.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Body is not JSON
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// Body is JSON but not a GeoJSON FeatureCollection
    #[error("Expected a FeatureCollection, found {0}")]
    NotFeatureCollection(String),
}

/// One GeoJSON feature before any feed-specific interpretation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFeature {
    /// Top-level GeoJSON `id`, if present
    pub id: Option<Value>,
    /// `None` when absent, `null`, or of an unsupported shape
    pub geometry: Option<Geometry>,
    /// `null` properties decode as an empty map
    pub properties: Map<String, Value>,
}

#[derive(Debug)]
pub struct ParseResult {
    pub features: Vec<RawFeature>,
    /// Number of array members that were not feature objects
    pub skipped: usize,
}

/// Parses a GeoJSON `FeatureCollection`.
///
/// Only the collection itself must be well formed. Individual members that
/// are not objects are counted in `skipped`; a feature whose geometry cannot
/// be decoded keeps its properties and gets `geometry: None`.
pub fn parse_feature_collection(bytes: &[u8]) -> Result<ParseResult, ParseError> {
    let document: Value = serde_json::from_slice(bytes)?;

    let mut root = match document {
        Value::Object(root) => root,
        other => return Err(ParseError::NotFeatureCollection(json_kind(&other).to_owned())),
    };

    match root.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => {}
        Some(other) => return Err(ParseError::NotFeatureCollection(other.to_owned())),
        None => return Err(ParseError::NotFeatureCollection("untyped object".to_owned())),
    }

    let members = match root.remove("features") {
        Some(Value::Array(members)) => members,
        Some(Value::Null) | None => Vec::new(),
        Some(other) => {
            return Err(ParseError::NotFeatureCollection(format!(
                "features as {}",
                json_kind(&other)
            )))
        }
    };

    let mut features = Vec::with_capacity(members.len());
    let mut skipped = 0;

    for member in members {
        match member {
            Value::Object(object) => features.push(read_feature(object)),
            other => {
                tracing::debug!(kind = json_kind(&other), "Skipping non-object feature");
                skipped += 1;
            }
        }
    }

    Ok(ParseResult { features, skipped })
}

fn read_feature(mut object: Map<String, Value>) -> RawFeature {
    let geometry = match object.remove("geometry") {
        None | Some(Value::Null) => None,
        Some(raw) => match serde_json::from_value::<Geometry>(raw) {
            Ok(geometry) => Some(geometry),
            Err(e) => {
                tracing::debug!(error = %e, "Unsupported feature geometry, treating as absent");
                None
            }
        },
    };

    let properties = match object.remove("properties") {
        Some(Value::Object(properties)) => properties,
        _ => Map::new(),
    };

    RawFeature {
        id: object.remove("id"),
        geometry,
        properties,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
