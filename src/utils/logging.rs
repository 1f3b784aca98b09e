//! Logging utilities
//!
//! Helpers for keeping request payloads readable in debug logs

use serde_json::Value;

/// Set to true to log request bodies unabridged
/// Default is false; long prompts (100K+ token inputs) would flood the log
pub const VERBOSE_REQUEST_LOGGING: bool = false;

/// Longest string kept verbatim in a payload summary
const MAX_STRING_CHARS: usize = 200;

/// System prompts are truncated more aggressively
const MAX_SYSTEM_CHARS: usize = 100;

/// Arrays longer than this are cut down to a count marker
const MAX_ARRAY_ITEMS: usize = 8;

/// Truncate a string with a note about original length
pub fn truncate_content(s: &str, max_chars: usize) -> String {
    let total = s.chars().count();
    if total > max_chars {
        let kept: String = s.chars().take(max_chars).collect();
        format!("{}... ({} chars truncated)", kept, total - max_chars)
    } else {
        s.to_string()
    }
}

/// Create a filtered summary of a request body for logging
/// Keeps the original structure but truncates long strings and arrays
pub fn create_request_log_summary(body: &Value) -> Value {
    if VERBOSE_REQUEST_LOGGING {
        return body.clone();
    }
    summarize(body, MAX_STRING_CHARS)
}

fn summarize(value: &Value, max_chars: usize) -> Value {
    match value {
        Value::String(s) => Value::String(truncate_content(s, max_chars)),
        Value::Array(items) => {
            let mut kept: Vec<Value> = items
                .iter()
                .take(MAX_ARRAY_ITEMS)
                .map(|item| summarize(item, max_chars))
                .collect();
            if items.len() > MAX_ARRAY_ITEMS {
                kept.push(Value::String(format!(
                    "...and {} more items",
                    items.len() - MAX_ARRAY_ITEMS
                )));
            }
            Value::Array(kept)
        }
        Value::Object(map) => {
            let is_system = map.get("role").and_then(Value::as_str) == Some("system");
            let limit = if is_system { MAX_SYSTEM_CHARS } else { max_chars };
            Value::Object(
                map.iter()
                    .map(|(key, v)| {
                        let limit = if key == "system" || key == "instructions" {
                            MAX_SYSTEM_CHARS
                        } else {
                            limit
                        };
                        (key.clone(), summarize(v, limit))
                    })
                    .collect(),
            )
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truncate_content() {
        assert_eq!(truncate_content("short", 10), "short");
        assert_eq!(truncate_content("abcdef", 3), "abc... (3 chars truncated)");
        assert_eq!(truncate_content("你好世界", 2), "你好... (2 chars truncated)");
    }

    #[test]
    fn test_summary_truncates_system_harder() {
        let body = json!({
            "model": "m",
            "messages": [
                {"role": "system", "content": "s".repeat(150)},
                {"role": "user", "content": "u".repeat(150)}
            ],
            "max_tokens": 10
        });
        let summary = create_request_log_summary(&body);
        let system = summary["messages"][0]["content"].as_str().unwrap();
        let user = summary["messages"][1]["content"].as_str().unwrap();
        assert!(system.contains("50 chars truncated"));
        assert_eq!(user.len(), 150);
        assert_eq!(summary["max_tokens"], 10);
    }

    #[test]
    fn test_summary_cuts_long_arrays() {
        let body = json!({"image_list": (0..12).map(|i| json!({"image": i})).collect::<Vec<_>>()});
        let summary = create_request_log_summary(&body);
        let list = summary["image_list"].as_array().unwrap();
        assert_eq!(list.len(), MAX_ARRAY_ITEMS + 1);
        assert_eq!(list[MAX_ARRAY_ITEMS], "...and 4 more items");
    }
}
