//! Turning raw model text into a validated `NutritionRecord`.
//!
//! The model may wrap its JSON in prose or code fences. Extraction looks
//! inside the first fenced block when there is one, then falls back to the
//! span from the first `{` to the last `}` of the whole reply.
//!
//! Validation walks the parsed JSON by hand so every failure names the exact
//! field (`items[1].macros.fat`) instead of a generic serde message.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::{FoodItem, Macros, NutritionRecord};

/// Longest excerpt of model text carried in an error
const MAX_SNIPPET_CHARS: usize = 120;

const FENCE: &str = "```";

/// Why a model reply could not be turned into a record
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no JSON object found in model reply: {snippet:?}")]
    NoJsonObject { snippet: String },

    #[error("model reply is not valid JSON ({source}): {snippet:?}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
        snippet: String,
    },

    #[error("missing field `{0}`")]
    MissingField(String),

    #[error("field `{field}` must be {expected}")]
    InvalidField { field: String, expected: &'static str },

    #[error("field `{field}` must be a finite number >= 0, got {value}")]
    InvalidNumber { field: String, value: String },

    #[error("model reply contains no food items")]
    EmptyItems,
}

/// Parse and validate a raw model reply.
///
/// Every candidate object is tried in turn: the body of each fenced block,
/// then the brace span of the whole reply. The first candidate that forms a
/// valid record wins; otherwise the first candidate's error is returned.
///
/// Totals are returned exactly as the model stated them; reconciling them
/// against the items is the caller's job.
pub fn extract_record(raw: &str) -> Result<NutritionRecord, ExtractError> {
    let mut first_error = None;

    for candidate in json_candidates(raw) {
        match parse_candidate(candidate) {
            Ok(record) => return Ok(record),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    Err(first_error.unwrap_or_else(|| ExtractError::NoJsonObject {
        snippet: snippet(raw),
    }))
}

fn parse_candidate(candidate: &str) -> Result<NutritionRecord, ExtractError> {
    let value: Value = serde_json::from_str(candidate).map_err(|source| ExtractError::InvalidJson {
        source,
        snippet: snippet(candidate),
    })?;

    record_from_value(&value)
}

/// Object-shaped spans worth parsing, most specific first
pub fn json_candidates(raw: &str) -> Vec<&str> {
    let mut candidates: Vec<&str> = fenced_blocks(raw).into_iter().filter_map(brace_span).collect();
    if let Some(whole) = brace_span(raw)
        && !candidates.contains(&whole)
    {
        candidates.push(whole);
    }
    candidates
}

/// Bodies of every ``` block; an unclosed fence runs to the end of the text
fn fenced_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find(FENCE) {
        // The language tag may share its line with the opening brace
        let body = rest[open + FENCE.len()..]
            .trim_start_matches(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        match body.find(FENCE) {
            Some(close) => {
                blocks.push(&body[..close]);
                rest = &body[close + FENCE.len()..];
            }
            None => {
                blocks.push(body);
                break;
            }
        }
    }

    blocks
}

fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Truncate model text for diagnostics, on a char boundary
pub fn snippet(text: &str) -> String {
    let text = text.trim();
    match text.char_indices().nth(MAX_SNIPPET_CHARS) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

fn record_from_value(value: &Value) -> Result<NutritionRecord, ExtractError> {
    let root = as_object(value, "$")?;

    let items = root
        .get("items")
        .ok_or_else(|| ExtractError::MissingField("items".to_string()))?
        .as_array()
        .ok_or_else(|| ExtractError::InvalidField {
            field: "items".to_string(),
            expected: "an array",
        })?;

    if items.is_empty() {
        return Err(ExtractError::EmptyItems);
    }

    let items = items
        .iter()
        .enumerate()
        .map(|(i, item)| read_item(item, &format!("items[{}]", i)))
        .collect::<Result<Vec<_>, _>>()?;

    let totals = root
        .get("totals")
        .ok_or_else(|| ExtractError::MissingField("totals".to_string()))?;
    let totals = read_macros(totals, "totals")?;

    Ok(NutritionRecord { items, totals })
}

fn read_item(value: &Value, path: &str) -> Result<FoodItem, ExtractError> {
    let item = as_object(value, path)?;

    let food = match field(item, path, "food")? {
        Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
        _ => {
            return Err(ExtractError::InvalidField {
                field: format!("{}.food", path),
                expected: "a non-empty string",
            });
        }
    };

    // Models occasionally emit a bare count here
    let quantity = match field(item, path, "quantity")? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => {
            return Err(ExtractError::InvalidField {
                field: format!("{}.quantity", path),
                expected: "a string",
            });
        }
    };

    let macros = read_macros(field(item, path, "macros")?, &format!("{}.macros", path))?;

    Ok(FoodItem { food, quantity, macros })
}

fn read_macros(value: &Value, path: &str) -> Result<Macros, ExtractError> {
    let macros = as_object(value, path)?;

    Ok(Macros {
        calories: read_number(macros, path, "calories")?,
        protein: read_number(macros, path, "protein")?,
        carbs: read_number(macros, path, "carbs")?,
        fat: read_number(macros, path, "fat")?,
    })
}

fn read_number(object: &Map<String, Value>, path: &str, name: &str) -> Result<f64, ExtractError> {
    let value = field(object, path, name)?;
    match value.as_f64() {
        Some(n) if n.is_finite() && n >= 0.0 => Ok(n),
        _ => Err(ExtractError::InvalidNumber {
            field: format!("{}.{}", path, name),
            value: value.to_string(),
        }),
    }
}

fn field<'a>(object: &'a Map<String, Value>, path: &str, name: &str) -> Result<&'a Value, ExtractError> {
    object
        .get(name)
        .ok_or_else(|| ExtractError::MissingField(format!("{}.{}", path, name)))
}

fn as_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, ExtractError> {
    value.as_object().ok_or_else(|| ExtractError::InvalidField {
        field: path.to_string(),
        expected: "an object",
    })
}
