//! Text helpers for oracle replies and log hygiene

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::{Result, ServiceError};

static FENCE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)\r?\n?[ \t]*```$").expect("valid fence regex")
});

static SENSITIVE_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"Bearer [A-Za-z0-9\-_.]+", "Bearer [REDACTED]"),
        (r"sk-[A-Za-z0-9\-_]{8,}", "sk-[REDACTED]"),
        (r"(?i)api[_-]?key[=:]\s*[A-Za-z0-9\-_]+", "api_key=[REDACTED]"),
        (r"(?i)password[=:]\s*[^\s&]+", "password=[REDACTED]"),
    ]
    .into_iter()
    .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
    .collect()
});

/// Remove a surrounding markdown code fence (optionally labeled, e.g.
/// ```` ```json ````). Text without a surrounding fence is returned trimmed.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    match FENCE_PATTERN.captures(trimmed) {
        Some(caps) => caps.get(1).map(|m| m.as_str().trim()).unwrap_or("").to_string(),
        None => trimmed.to_string(),
    }
}

/// Find the first balanced `{ ... }` block in free text, honoring strings.
pub fn extract_json_block(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Parse a JSON object out of an oracle reply.
///
/// Fences are stripped first; if the remaining text is not a JSON object
/// the first embedded object is tried. A fenced object parses identically
/// to the same object without fences.
pub fn parse_json_object(text: &str) -> Result<serde_json::Map<String, Value>> {
    let unfenced = strip_code_fences(text);

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&unfenced) {
        return Ok(map);
    }

    let block = extract_json_block(&unfenced)
        .ok_or_else(|| ServiceError::parsing("No JSON object found in oracle reply"))?;

    match serde_json::from_str::<Value>(block)? {
        Value::Object(map) => Ok(map),
        _ => Err(ServiceError::parsing("Oracle reply JSON is not an object")),
    }
}

/// Truncate a string to at most `max_chars` characters, adding an
/// ellipsis when something was cut.
pub fn truncate_string(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    if max_chars <= 3 {
        return s.chars().take(max_chars).collect();
    }
    let mut out: String = s.chars().take(max_chars - 3).collect();
    out.push_str("...");
    out
}

/// Sanitize a string for logging (remove credential patterns)
pub fn sanitize_for_logging(s: &str) -> String {
    let mut result = s.to_string();
    for (re, replacement) in SENSITIVE_PATTERNS.iter() {
        result = re.replace_all(&result, *replacement).to_string();
    }
    result
}

/// Generate a unique request ID
pub fn generate_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```\nSELECT 1;\n```"), "SELECT 1;");
        assert_eq!(strip_code_fences("  plain text  "), "plain text");
        assert_eq!(strip_code_fences("```json {\"a\": 1} ```"), "{\"a\": 1}");
    }

    #[test]
    fn test_fenced_and_unfenced_parse_identically() {
        let raw = r#"{"severity": "CRITICAL", "possibleCause": "overload", "recommendation": "shut down"}"#;
        let fenced = format!("```json\n{}\n```", raw);
        let inline_fenced = format!("```json {} ```", raw);

        let a = parse_json_object(raw).unwrap();
        let b = parse_json_object(&fenced).unwrap();
        let c = parse_json_object(&inline_fenced).unwrap();

        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn test_embedded_object() {
        let text = "Here is the analysis: {\"severity\": \"WARNING\", \"note\": \"a } in text\"} thanks";
        let map = parse_json_object(text).unwrap();
        assert_eq!(map["severity"], "WARNING");
        assert_eq!(map["note"], "a } in text");
    }

    #[test]
    fn test_no_object() {
        assert!(parse_json_object("no json here").is_err());
        assert!(parse_json_object("[1, 2, 3]").is_err());
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("hello world", 8), "hello...");
        assert_eq!(truncate_string("hi", 2), "hi");
        assert_eq!(truncate_string("temperatura °C alta", 14), "temperatura...");
    }

    #[test]
    fn test_sanitize_for_logging() {
        let output = sanitize_for_logging("Authorization: Bearer abc123xyz");
        assert!(output.contains("[REDACTED]"));
        assert!(!output.contains("abc123xyz"));
    }
}
