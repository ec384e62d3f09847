//! Secret redaction for structured data.
//!
//! Every log line, stored trace step, and user-visible debug dump passes
//! through [`redact_value`] before leaving the process.

use serde_json::Value;

/// Case-insensitive substring patterns that mark a key as sensitive.
pub const SENSITIVE_PATTERNS: &[&str] = &[
    "token",
    "secret",
    "password",
    "passwd",
    "key",
    "authorization",
    "auth",
    "cookie",
    "credential",
];

/// Whether a key names a sensitive field.
pub fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_lowercase();
    SENSITIVE_PATTERNS.iter().any(|p| key.contains(p))
}

/// Mask a sensitive string, keeping only the last four characters.
/// Values shorter than four characters are fully masked.
pub fn mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() < 4 {
        "***".to_string()
    } else {
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("***{tail}")
    }
}

/// Deep-copy `value` with every scalar under a sensitive key masked.
///
/// Containers are traversed recursively; non-matching keys pass through
/// unchanged. Pure; the input is never mutated.
pub fn redact_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, val)| (key.clone(), redact_entry(key, val)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_value).collect()),
        other => other.clone(),
    }
}

fn redact_entry(key: &str, value: &Value) -> Value {
    if !is_sensitive_key(key) {
        return redact_value(value);
    }
    match value {
        Value::String(s) => Value::String(mask(s)),
        // A container under a sensitive key is still traversed normally.
        Value::Object(_) | Value::Array(_) => redact_value(value),
        Value::Null => Value::Null,
        // Non-string scalars under a sensitive key carry no tail worth keeping.
        _ => Value::String("***".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn masks_keep_last_four_characters() {
        assert_eq!(mask("github_pat_abcd1234"), "***1234");
        assert_eq!(mask("ab12"), "***ab12");
    }

    #[test]
    fn short_values_fully_masked() {
        assert_eq!(mask("ab"), "***");
        assert_eq!(mask(""), "***");
    }

    #[test]
    fn key_matching_is_case_insensitive() {
        let input = json!({"Password": "hunter2x", "password": "hunter2x"});
        let out = redact_value(&input);
        assert_eq!(out["Password"], "***er2x");
        assert_eq!(out["password"], "***er2x");
    }

    #[test]
    fn nested_structures_redacted_recursively() {
        let input = json!({
            "request": {
                "url": "https://api.lodge.social",
                "headers": {"Authorization": "Bearer abcd9999"}
            },
            "items": [{"api_token": "tok_12345678"}]
        });
        let out = redact_value(&input);
        assert_eq!(out["request"]["url"], "https://api.lodge.social");
        assert_eq!(out["request"]["headers"]["Authorization"], "***9999");
        assert_eq!(out["items"][0]["api_token"], "***5678");
    }

    #[test]
    fn non_matching_keys_pass_through() {
        let input = json!({"workflow": "verify.yml", "count": 3, "ok": true});
        assert_eq!(redact_value(&input), input);
    }

    #[test]
    fn non_string_scalars_under_sensitive_keys_are_opaque() {
        let input = json!({"secret_number": 424242, "key_enabled": true});
        let out = redact_value(&input);
        assert_eq!(out["secret_number"], "***");
        assert_eq!(out["key_enabled"], "***");
    }

    #[test]
    fn input_is_not_mutated() {
        let input = json!({"token": "abcd1234"});
        let _ = redact_value(&input);
        assert_eq!(input["token"], "abcd1234");
    }
}
