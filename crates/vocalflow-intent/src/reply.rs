//! Parsing of structured language-model replies.

use serde::de::DeserializeOwned;

/// Strip an optional Markdown code fence (```` ```json ```` or ```` ``` ````)
/// that models sometimes wrap around JSON.
pub(crate) fn strip_code_fence(text: &str) -> &str {
    let cleaned = text.trim();
    let cleaned = cleaned.strip_prefix("```json").unwrap_or(cleaned);
    let cleaned = cleaned.strip_prefix("```").unwrap_or(cleaned);
    let cleaned = cleaned.strip_suffix("```").unwrap_or(cleaned);
    cleaned.trim()
}

/// Parse a reply that must be a single JSON object of shape `T`.
///
/// Arrays are rejected even when `T` could be read positionally from one.
pub(crate) fn parse_object_reply<T: DeserializeOwned>(text: &str) -> Result<T, String> {
    let value: serde_json::Value = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| format!("reply is not valid JSON: {e}"))?;

    if !value.is_object() {
        return Err("reply is not a JSON object".into());
    }

    serde_json::from_value(value).map_err(|e| format!("reply has unexpected shape: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Named {
        #[serde(default)]
        name: String,
    }

    #[test]
    fn fence_is_optional() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("  {} "), "{}");
    }

    #[test]
    fn object_reply_parses() {
        let named: Named = parse_object_reply("```json\n{\"name\": \"x\"}\n```").unwrap();
        assert_eq!(named.name, "x");
    }

    #[test]
    fn non_object_replies_fail() {
        assert!(parse_object_reply::<Named>("[\"x\"]").is_err());
        assert!(parse_object_reply::<Named>("Sure! Here you go.").is_err());
        assert!(parse_object_reply::<Named>("{\"name\": 3}").is_err());
    }
}
