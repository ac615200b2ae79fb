//! Override phase helpers: prompt assembly, reply parsing and the nested merge
//! of a model-proposed patch onto the base document.

use super::document::ParameterDocument;
use crate::ai::BackendError;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;
use thiserror::Error;

/// Fields whose keys are free-form, replaced wholesale instead of merged
const FREE_FORM_FIELDS: &[&str] = &["path_filters"];

const TRUNCATION_MARKER: &str = "\n[truncated]";

pub const SYSTEM_PROMPT: &str = "You refine CI/CD pipeline parameters. \
Reply with a single JSON object containing only the keys you want to change. \
Use only the allowed keys. Do not add commentary.";

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("no JSON object found in model reply")]
    NoJsonObject,

    #[error("invalid JSON in model reply: {0}")]
    InvalidJson(String),
}

#[derive(Debug, Error)]
pub enum OverrideError {
    #[error("override model failed: {0}")]
    Backend(#[from] BackendError),

    #[error("override model did not answer within {seconds}s")]
    Timeout { seconds: u64 },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("merged document is invalid: {0}")]
    Invalid(String),
}

/// User prompt for the override model, at most `max_chars` characters.
///
/// The allowed keys and base document come first so truncation only ever
/// cuts into the free-text context at the end.
pub fn build_prompt(
    features_summary: &str,
    signal_summary: &str,
    base: &ParameterDocument,
    max_chars: usize,
) -> String {
    let base_json = serde_json::to_string_pretty(base).unwrap_or_else(|_| "{}".to_string());
    let prompt = format!(
        "Allowed keys: {}\n\nBase document:\n{}\n\nMerged signals:\n{}\n\nRepository summary:\n{}\n",
        ParameterDocument::field_names().join(", "),
        base_json,
        signal_summary,
        features_summary
    );
    truncate_chars(prompt, max_chars)
}

fn truncate_chars(text: String, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text;
    }
    let marker_chars = TRUNCATION_MARKER.chars().count();
    if max_chars <= marker_chars {
        return TRUNCATION_MARKER.chars().take(max_chars).collect();
    }
    let mut truncated: String = text.chars().take(max_chars - marker_chars).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

/// First well-formed JSON object in a model reply.
///
/// Fenced code blocks are tried before bare text.
pub fn extract_json_object(reply: &str) -> Result<Map<String, Value>, ParseError> {
    static FENCE_RE: OnceLock<Regex> = OnceLock::new();
    let re = FENCE_RE.get_or_init(|| {
        Regex::new(r"```(?:json|JSON)?\s*\n?([\s\S]*?)```").expect("fence pattern is valid")
    });

    for caps in re.captures_iter(reply) {
        if let Some(obj) = caps.get(1).and_then(|m| first_object(m.as_str())) {
            return Ok(obj);
        }
    }

    if let Some(obj) = first_object(reply) {
        return Ok(obj);
    }

    match reply.find('{') {
        Some(start) => {
            let err = serde_json::from_str::<Value>(&reply[start..])
                .err()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "not an object".to_string());
            Err(ParseError::InvalidJson(err))
        }
        None => Err(ParseError::NoJsonObject),
    }
}

fn first_object(text: &str) -> Option<Map<String, Value>> {
    text.match_indices('{').find_map(|(start, _)| {
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(Value::Object(map))) => Some(map),
            _ => None,
        }
    })
}

/// Applies `patch` onto `base`: scalars and arrays replace, objects merge
/// recursively, nulls are ignored and keys absent from `base` are dropped.
pub fn merge_patch(base: &mut Value, patch: &Map<String, Value>) -> Vec<String> {
    let mut dropped = Vec::new();
    merge_into(base, patch, "", &mut dropped);
    dropped
}

fn merge_into(base: &mut Value, patch: &Map<String, Value>, prefix: &str, dropped: &mut Vec<String>) {
    let Value::Object(target) = base else {
        return;
    };
    for (key, value) in patch {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        if value.is_null() {
            continue;
        }
        let Some(slot) = target.get_mut(key) else {
            dropped.push(path);
            continue;
        };
        match value {
            Value::Object(inner) if slot.is_object() && !FREE_FORM_FIELDS.contains(&path.as_str()) => {
                merge_into(slot, inner, &path, dropped);
            }
            other => *slot = other.clone(),
        }
    }
}

/// Merges the patch and re-validates the result as a parameter document
pub fn apply_override(
    base: &ParameterDocument,
    patch: &Map<String, Value>,
) -> Result<(ParameterDocument, Vec<String>), OverrideError> {
    let mut value =
        serde_json::to_value(base).map_err(|e| OverrideError::Invalid(e.to_string()))?;
    let dropped = merge_patch(&mut value, patch);

    let mut doc: ParameterDocument =
        serde_json::from_value(value).map_err(|e| OverrideError::Invalid(e.to_string()))?;
    validate(&doc)?;

    doc.secrets_required.sort();
    doc.secrets_required.dedup();
    Ok((doc, dropped))
}

fn validate(doc: &ParameterDocument) -> Result<(), OverrideError> {
    if doc.project_type.trim().is_empty() {
        return Err(OverrideError::Invalid("project_type is empty".to_string()));
    }
    if doc.triggers.branches.is_empty() {
        return Err(OverrideError::Invalid("no trigger branches".to_string()));
    }
    if doc.triggers.branches.iter().any(|b| b.trim().is_empty()) {
        return Err(OverrideError::Invalid("empty trigger branch".to_string()));
    }
    if doc.container.enabled && doc.container.image.trim().is_empty() {
        return Err(OverrideError::Invalid(
            "container enabled without an image".to_string(),
        ));
    }
    if doc.deploy.enabled && doc.deploy.provider.trim().is_empty() {
        return Err(OverrideError::Invalid(
            "deploy enabled without a provider".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_extract_from_fence() {
        let reply = "Sure, here it is:\n```json\n{\"test_command\": \"npm run ci\"}\n```\nDone.";
        let map = extract_json_object(reply).unwrap();
        assert_eq!(map["test_command"], "npm run ci");
    }

    #[test]
    fn test_extract_first_bare_object() {
        let reply = "Changes {\"language\": \"typescript\"} and {\"language\": \"x\"}";
        let map = extract_json_object(reply).unwrap();
        assert_eq!(map["language"], "typescript");
    }

    #[test]
    fn test_extract_skips_broken_prefix() {
        let reply = "{not json} then {\"lint_command\": \"eslint .\"}";
        let map = extract_json_object(reply).unwrap();
        assert_eq!(map["lint_command"], "eslint .");
    }

    #[test]
    fn test_extract_errors() {
        assert_eq!(extract_json_object("no braces here"), Err(ParseError::NoJsonObject));
        assert!(matches!(
            extract_json_object("{\"a\": "),
            Err(ParseError::InvalidJson(_))
        ));
        assert!(matches!(
            extract_json_object("[1, 2, 3]"),
            Err(ParseError::NoJsonObject)
        ));
    }

    #[test]
    fn test_nested_merge_rules() {
        let mut base = json!({
            "a": "x",
            "nested": {"keep": 1, "change": 2},
            "list": [1, 2]
        });
        let patch = obj(json!({
            "a": null,
            "nested": {"change": 3, "bogus": true},
            "list": [9],
            "unknown": "dropped"
        }));
        let mut dropped = merge_patch(&mut base, &patch);
        dropped.sort();

        assert_eq!(base, json!({"a": "x", "nested": {"keep": 1, "change": 3}, "list": [9]}));
        assert_eq!(dropped, vec!["nested.bogus", "unknown"]);
    }

    #[test]
    fn test_apply_override_keeps_untouched_fields() {
        let base = ParameterDocument::default();
        let patch = obj(json!({
            "test_command": "make test",
            "triggers": {"branches": ["develop"]},
            "path_filters": {"web": ["web/**"]}
        }));
        let (doc, dropped) = apply_override(&base, &patch).unwrap();
        assert!(dropped.is_empty());
        assert_eq!(doc.test_command, "make test");
        assert_eq!(doc.triggers.branches, vec!["develop"]);
        assert!(doc.triggers.push);
        assert_eq!(doc.path_filters["web"], vec!["web/**"]);
        assert_eq!(doc.build_command, base.build_command);
    }

    #[test]
    fn test_apply_override_rejects_wrong_types() {
        let base = ParameterDocument::default();
        let patch = obj(json!({"container": {"enabled": "yes"}}));
        assert!(matches!(
            apply_override(&base, &patch),
            Err(OverrideError::Invalid(_))
        ));

        let patch = obj(json!({"container": {"enabled": true}}));
        assert!(matches!(
            apply_override(&base, &patch),
            Err(OverrideError::Invalid(_))
        ));

        let patch = obj(json!({"triggers": {"branches": []}}));
        assert!(matches!(
            apply_override(&base, &patch),
            Err(OverrideError::Invalid(_))
        ));
    }

    #[test]
    fn test_prompt_is_bounded() {
        let base = ParameterDocument::default();
        let summary = "x".repeat(50_000);
        let prompt = build_prompt(&summary, "node: combined 0.98", &base, 2_000);
        assert_eq!(prompt.chars().count(), 2_000);
        assert!(prompt.starts_with("Allowed keys: project_type"));
        assert!(prompt.ends_with("[truncated]"));

        for tiny in [0, 3, TRUNCATION_MARKER.chars().count()] {
            assert_eq!(build_prompt(&summary, "node", &base, tiny).chars().count(), tiny);
        }

        let short = build_prompt("small", "node", &base, 20_000);
        assert!(short.contains("Repository summary:\nsmall"));
    }
}
