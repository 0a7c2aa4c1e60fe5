//! Output sanitizer for user-echoed strings in error bodies and logs.
//!
//! Every user-controlled string that can reach a response passes through
//! [`sanitize_str`]: angle brackets are HTML-escaped, dangerous schemes,
//! event handlers, traversal sequences, control characters and a fixed
//! denylist are rewritten to `[FILTERED]`, and the result is length-bounded.
//! The function is idempotent and its output never matches any of the
//! filtered patterns. [`sanitize_detail`] applies the same treatment
//! recursively to JSON objects and arrays, truncating arrays to three items.

use std::sync::OnceLock;

use regex::Regex;

pub const FILTERED: &str = "[FILTERED]";

/// Default length bound for a single sanitized string.
pub const DEFAULT_MAX_LEN: usize = 200;

/// Error-detail arrays and objects are truncated to this many entries.
const MAX_DETAIL_ITEMS: usize = 3;

fn patterns() -> &'static Vec<Regex> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // URL schemes that execute or exfiltrate.
            r"(?i)javascript\s*:",
            r"(?i)vbscript\s*:",
            r"(?i)data\s*:",
            r"(?i)file\s*:",
            // Inline event handlers and CSS vectors.
            r"(?i)\bon\w+\s*=",
            r"(?i)expression\s*\(",
            r"(?i)@import",
            // Path traversal.
            r"\.\./",
            r"\.\.\\",
            // Encoded-character escape text.
            r"(?i)\\x[0-9a-f]{2}",
            r"(?i)\\u[0-9a-f]{4}",
            r"\\r\\n|\\r|\\n|\\t",
            // Raw control characters (C0, DEL, C1).
            r"[\x00-\x1f\x7f-\x9f]+",
            // Dangerous-string denylist, longest entries first.
            r"(?i)document\.cookie",
            r"(?i)window\.location",
            r"(?i)xmlhttprequest",
            r"(?i)javascript",
            r"(?i)vbscript",
            r"(?i)iframe",
            r"(?i)object",
            r"(?i)embed",
            r"(?i)script",
            r"(?i)eval",
            r"(?i)alert",
        ]
        .into_iter()
        .map(|p| Regex::new(p).expect("sanitizer pattern"))
        .collect()
    })
}

fn collapse_re() -> &'static Regex {
    static COLLAPSE: OnceLock<Regex> = OnceLock::new();
    COLLAPSE.get_or_init(|| Regex::new(r"(?:\[FILTERED\]\s*){2,}").expect("collapse pattern"))
}

/// Sanitize with the default length bound.
pub fn sanitize_str(input: &str) -> String {
    sanitize_str_bounded(input, DEFAULT_MAX_LEN)
}

/// Sanitize `input`, bounding the result to `max_len` characters (plus a
/// `...` marker when truncated).
pub fn sanitize_str_bounded(input: &str, max_len: usize) -> String {
    // Escape angle brackets only; `&` is left alone so re-sanitizing an
    // already-escaped string is a no-op.
    let mut out = input.replace('<', "&lt;").replace('>', "&gt;");

    for pattern in patterns() {
        out = pattern.replace_all(&out, FILTERED).into_owned();
    }
    out = collapse_re().replace_all(&out, FILTERED).into_owned();

    if out.chars().count() > max_len {
        out = out.chars().take(max_len).collect::<String>() + "...";
    }
    out
}

/// Sanitize an arbitrary JSON detail value into a flat, bounded string.
/// Arrays and objects are truncated to three entries with a
/// `... and more` sentinel.
pub fn sanitize_detail(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => sanitize_str(s),
        serde_json::Value::Array(items) => {
            let mut parts: Vec<String> = items
                .iter()
                .take(MAX_DETAIL_ITEMS)
                .map(sanitize_detail)
                .collect();
            if items.len() > MAX_DETAIL_ITEMS {
                parts.push("... and more".into());
            }
            parts.join("; ")
        }
        serde_json::Value::Object(map) => {
            let mut parts: Vec<String> = map
                .iter()
                .take(MAX_DETAIL_ITEMS)
                .map(|(k, v)| format!("{}: {}", sanitize_str(k), sanitize_detail(v)))
                .collect();
            if map.len() > MAX_DETAIL_ITEMS {
                parts.push("... and more".into());
            }
            parts.join("; ")
        }
        other => sanitize_str(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clean_strings_pass_through() {
        assert_eq!(sanitize_str("Hello World"), "Hello World");
        assert_eq!(sanitize_str("agent sec-1 not found"), "agent sec-1 not found");
    }

    #[test]
    fn script_tags_are_escaped_and_filtered() {
        let out = sanitize_str("<script>javascript:alert(1)</script>");
        assert!(!out.contains("<script>"));
        assert!(!out.to_lowercase().contains("javascript:"));
        assert!(out.contains("&lt;"));
        assert!(out.contains(FILTERED));
    }

    #[test]
    fn dangerous_schemes_are_filtered() {
        for input in [
            "javascript:alert(1)",
            "data:text/html,payload",
            "vbscript:msgbox(1)",
            "file:///etc/passwd",
        ] {
            let out = sanitize_str(input);
            let lower = out.to_lowercase();
            assert!(!lower.contains("javascript:"), "{input} -> {out}");
            assert!(!lower.contains("data:"), "{input} -> {out}");
            assert!(!lower.contains("vbscript:"), "{input} -> {out}");
            assert!(!lower.contains("file:"), "{input} -> {out}");
            assert!(out.contains(FILTERED));
        }
    }

    #[test]
    fn event_handlers_are_filtered() {
        for input in ["onload=alert(1)", "onerror=boom()", "OnClick=x()"] {
            let out = sanitize_str(input);
            assert!(out.contains(FILTERED));
            assert!(!out.to_lowercase().contains("onload"));
            assert!(!out.to_lowercase().contains("onerror"));
        }
    }

    #[test]
    fn traversal_and_null_bytes_are_filtered() {
        let out = sanitize_str("../../../etc/passwd");
        assert!(!out.contains("../"));
        assert!(out.contains(FILTERED));

        let out = sanitize_str("admin\x00");
        assert!(!out.contains('\x00'));
        assert!(out.contains(FILTERED));
    }

    #[test]
    fn control_characters_collapse_to_one_marker() {
        let out = sanitize_str("\x01\x02\x03\x1f\x7f\u{80}\u{9f}");
        assert_eq!(out, FILTERED);
    }

    #[test]
    fn denylist_is_case_insensitive() {
        for input in ["JAVASCRIPT:x", "JavaScript", "SCRIPT", "Eval", "document.cookie"] {
            let out = sanitize_str(input);
            assert!(out.contains(FILTERED), "{input} -> {out}");
        }
    }

    #[test]
    fn consecutive_markers_are_collapsed() {
        let out = sanitize_str("javascript:alert('script eval')");
        assert!(!out.contains("[FILTERED][FILTERED]"));
    }

    #[test]
    fn length_bound_with_ellipsis() {
        let out = sanitize_str_bounded(&"A".repeat(300), 100);
        assert!(out.chars().count() <= 103);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn sanitizer_is_idempotent() {
        let inputs = [
            "<script>javascript:alert(1)</script>",
            "../../../etc/passwd",
            "plain text",
            "onload=alert('x') data:text/html",
            &"B".repeat(500),
        ];
        for input in inputs {
            let once = sanitize_str(input);
            let twice = sanitize_str(&once);
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn spec_scenario_sanitize_script() {
        let out = sanitize_str("<script>javascript:alert(1)</script>");
        assert!(!out.contains("<script>"));
        assert!(!out.contains("javascript:"));
        assert!(out.contains(FILTERED));
        assert!(out.chars().count() <= DEFAULT_MAX_LEN + 3);
    }

    #[test]
    fn detail_arrays_truncate_to_three() {
        let out = sanitize_detail(&json!([
            "<script>x</script>",
            "javascript:y",
            "error three",
            "error four",
            "error five",
        ]));
        assert!(out.contains(FILTERED));
        assert!(!out.contains("<script>"));
        assert!(out.contains("... and more"));
        assert!(!out.contains("error four"));
    }

    #[test]
    fn detail_objects_sanitize_recursively() {
        let out = sanitize_detail(&json!({
            "field": ["<script>a</script>"],
            "other": "javascript:b",
        }));
        assert!(out.contains(FILTERED));
        assert!(!out.contains("<script>"));
        assert!(!out.contains("javascript:"));
    }
}
