//! Secret redaction.
//!
//! Raw tool I/O is walked as a JSON tree before anything touches the
//! catalog; any value under a sensitive-looking key is replaced with the
//! literal `[REDACTED]`. Raw bytes are never stored. Redaction is a fixed
//! point: redacting already-redacted input changes nothing.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Replacement literal
pub const REDACTED: &str = "[REDACTED]";

/// Case-insensitive union of sensitive key patterns, matched as a substring
/// of the key so header-style names (`X-Api-Key`, `Authorization`) are
/// caught too.
fn sensitive_key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)(api[_-]?key|apikey|password|passwd|pwd|secret|token|credential|auth[_-]?token|access[_-]?token|private[_-]?key|ssh[_-]?key|authorization)",
        )
        .expect("redaction pattern is valid")
    })
}

/// Whether a key name looks sensitive
pub fn is_sensitive_key(key: &str) -> bool {
    sensitive_key_pattern().is_match(key)
}

/// Redact a JSON tree in place: every value (scalar or subtree) under a
/// sensitive key becomes the `[REDACTED]` literal; other mappings and
/// sequences are traversed recursively.
pub fn redact_value(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                if is_sensitive_key(key) {
                    *child = Value::String(REDACTED.to_string());
                } else {
                    redact_value(child);
                }
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                redact_value(item);
            }
        }
        _ => {}
    }
}

/// Redact and serialize a JSON value for persistence. Strings that parse as
/// JSON are redacted structurally; other strings pass through unchanged.
pub fn redact_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(mut parsed) if parsed.is_object() || parsed.is_array() => {
                redact_value(&mut parsed);
                parsed.to_string()
            }
            _ => s.clone(),
        },
        other => {
            let mut owned = other.clone();
            redact_value(&mut owned);
            owned.to_string()
        }
    }
}
