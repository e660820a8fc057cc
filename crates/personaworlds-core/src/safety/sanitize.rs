//! Analytics metadata sanitizer.
//!
//! External clients post arbitrary JSON metadata with analytics events.
//! Before persistence we drop anything that looks like user content,
//! truncate strings, clamp collection sizes, and bound recursion depth so
//! a hostile payload cannot bloat the event log.

use serde_json::{Map, Value};

use super::truncate_runes;

/// Key-name fragments that indicate user content; such keys are dropped.
const CONTENT_KEY_FRAGMENTS: [&str; 4] = ["content", "message", "text", "body"];

/// Maximum rune length for string values.
const MAX_STRING_RUNES: usize = 180;

/// Maximum number of elements kept per array or object.
const MAX_COLLECTION_LEN: usize = 25;

/// Maximum nesting depth; anything deeper is dropped.
const MAX_DEPTH: usize = 4;

/// Sanitize an untrusted metadata payload.
pub fn sanitize_metadata(value: &Value) -> Value {
    sanitize_at_depth(value, 1)
}

fn sanitize_at_depth(value: &Value, depth: usize) -> Value {
    if depth > MAX_DEPTH {
        return Value::Null;
    }
    match value {
        Value::String(s) => Value::String(truncate_runes(s, MAX_STRING_RUNES)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .take(MAX_COLLECTION_LEN)
                .map(|item| sanitize_at_depth(item, depth + 1))
                .filter(|item| !item.is_null())
                .collect(),
        ),
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, val) in map.iter().take(MAX_COLLECTION_LEN) {
                if is_content_key(key) {
                    continue;
                }
                let sanitized = sanitize_at_depth(val, depth + 1);
                if !sanitized.is_null() {
                    out.insert(key.clone(), sanitized);
                }
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

fn is_content_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    CONTENT_KEY_FRAGMENTS
        .iter()
        .any(|fragment| lower.contains(fragment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn drops_content_like_keys() {
        let input = json!({
            "battle_id": "b-1",
            "content": "secret user prose",
            "MessageText": "also secret",
            "post_body": "and this",
            "kind": "share"
        });
        let out = sanitize_metadata(&input);
        assert_eq!(out, json!({"battle_id": "b-1", "kind": "share"}));
    }

    #[test]
    fn truncates_long_strings() {
        let long = "x".repeat(400);
        let out = sanitize_metadata(&json!({ "slug": long }));
        assert_eq!(out["slug"].as_str().unwrap().chars().count(), 180);
    }

    #[test]
    fn clamps_array_length() {
        let items: Vec<i64> = (0..100).collect();
        let out = sanitize_metadata(&json!({ "ids": items }));
        assert_eq!(out["ids"].as_array().unwrap().len(), 25);
    }

    #[test]
    fn bounds_recursion_depth() {
        let input = json!({ "a": { "b": { "c": { "d": { "e": "too deep" } } } } });
        let out = sanitize_metadata(&input);
        // the root and three nested objects survive; level five is gone
        assert_eq!(out["a"]["b"]["c"], json!({}));
    }

    #[test]
    fn passes_scalars_through() {
        let input = json!({ "count": 3, "ratio": 0.5, "ok": true });
        assert_eq!(sanitize_metadata(&input), input);
    }
}
