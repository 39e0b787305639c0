//! Language-model extraction prompt and response parsing.
//!
//! The model is asked for every version visible on the page. Its answer is
//! never trusted to be well-formed: [`parse_extraction_response`] strips code
//! fences, accepts the two shapes models actually produce, and maps anything
//! else to [`ExtractionOutcome::Malformed`] instead of an error.

use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::version::VersionClassification;

/// Maximum number of characters of page content sent to the model.
pub const MAX_CONTENT_CHARS: usize = 50_000;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One version record as reported by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedVersion {
    pub version: String,
    pub release_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub classification: Option<VersionClassification>,
}

/// Result of parsing a model response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    /// At least one usable version record.
    Versions(Vec<ExtractedVersion>),
    /// Well-formed response with no versions.
    Empty,
    /// The response was not JSON of an accepted shape. Treated as zero
    /// results by callers.
    Malformed { reason: String },
}

impl ExtractionOutcome {
    /// The extracted versions, empty for `Empty` and `Malformed`.
    pub fn versions(&self) -> &[ExtractedVersion] {
        match self {
            ExtractionOutcome::Versions(v) => v,
            _ => &[],
        }
    }

    pub fn into_versions(self) -> Vec<ExtractedVersion> {
        match self {
            ExtractionOutcome::Versions(v) => v,
            _ => Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Prompt
// ---------------------------------------------------------------------------

/// Truncate `content` to at most `max_chars` characters on a char boundary.
pub fn truncate_content(content: &str, max_chars: usize) -> &str {
    match content.char_indices().nth(max_chars) {
        Some((idx, _)) => &content[..idx],
        None => content,
    }
}

/// Build the extraction prompt for `product_name`.
pub fn build_extraction_prompt(product_name: &str, content: &str) -> String {
    let content = truncate_content(content, MAX_CONTENT_CHARS);
    format!(
        "You are extracting software release information for \"{product_name}\".\n\
         \n\
         Find ALL versions of {product_name} mentioned in the page content below, \
         not only the latest one. For each version return:\n\
         - \"version\": the version string exactly as published\n\
         - \"release_date\": the release date in ISO format (YYYY-MM-DD), or null if not stated\n\
         - \"notes\": the release notes for that version formatted as markdown, or null\n\
         - \"type\": one of \"major\", \"minor\" or \"patch\"\n\
         \n\
         Respond with a JSON object of the form {{\"versions\": [...]}} and nothing else. \
         If the content contains no version information for {product_name}, respond with \
         {{\"versions\": []}}. Never invent versions, dates or notes that are not in the content.\n\
         \n\
         Page content:\n\
         {content}"
    )
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Remove a surrounding markdown code fence (```` ``` ```` or ```` ```json ````).
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. `json`) up to the first newline.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest.trim_start_matches("json"),
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse a model response into an [`ExtractionOutcome`].
///
/// Only the top-level shape can make a response `Malformed`. Entries are
/// converted one by one: an entry without a usable version is dropped, and a
/// field of the wrong type is ignored without losing the rest of the entry.
pub fn parse_extraction_response(text: &str) -> ExtractionOutcome {
    let json_text = strip_code_fence(text);

    let payload: Value = match serde_json::from_str(json_text) {
        Ok(p) => p,
        Err(e) => {
            return ExtractionOutcome::Malformed {
                reason: e.to_string(),
            }
        }
    };

    let entries = match payload {
        Value::Array(entries) => entries,
        Value::Object(mut map) => match map.remove("versions") {
            Some(Value::Array(entries)) => entries,
            _ => {
                return ExtractionOutcome::Malformed {
                    reason: "object has no `versions` array".to_string(),
                }
            }
        },
        other => {
            return ExtractionOutcome::Malformed {
                reason: format!("expected an array or object, got {other}"),
            }
        }
    };

    let versions: Vec<ExtractedVersion> = entries.iter().filter_map(convert).collect();

    if versions.is_empty() {
        ExtractionOutcome::Empty
    } else {
        ExtractionOutcome::Versions(versions)
    }
}

/// Convert a raw entry, dropping it if it has no usable version string.
fn convert(entry: &Value) -> Option<ExtractedVersion> {
    let fields = entry.as_object()?;

    let version = match fields.get("version")? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if version.is_empty() {
        return None;
    }

    let release_date = string_field(fields, &["release_date", "date"]).and_then(|d| {
        let d = d.trim();
        NaiveDate::parse_from_str(d.get(..10).unwrap_or(d), "%Y-%m-%d").ok()
    });

    Some(ExtractedVersion {
        version,
        release_date,
        notes: fields.get("notes").and_then(notes_text),
        classification: string_field(fields, &["type", "classification"])
            .and_then(VersionClassification::parse),
    })
}

/// First of `keys` holding a string value.
fn string_field<'a>(fields: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| fields.get(*k).and_then(Value::as_str))
}

/// Notes as markdown. A list of strings becomes a bullet list.
fn notes_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| format!("- {}", line.trim_start_matches("- ")))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => return None,
    };
    Some(text).filter(|t| !t.is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
