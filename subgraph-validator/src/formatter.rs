//! Conversion between generator text and JSON values.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

#[allow(clippy::expect_used)]
static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\n?```([a-z]+)?\n?").expect("valid regex"));

/// Extract the JSON payload of generated text, dropping any markdown code fences around it.
pub fn parse_generated_text(text: &str) -> Result<Value, serde_json::Error> {
    let stripped = CODE_FENCE.replace_all(text, "");
    serde_json::from_str(&stripped)
}

/// Render a value as JSON indented by two spaces.
pub fn to_pretty_string(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn strips_code_fences() {
        let text = "```json\n{\"bookTitle\": \"The Martian\"}\n```";
        assert_eq!(
            parse_generated_text(text).unwrap(),
            json!({"bookTitle": "The Martian"})
        );
        assert_eq!(
            parse_generated_text("```JSON\n[1, 2]\n```\n").unwrap(),
            json!([1, 2])
        );
        assert_eq!(parse_generated_text("{\"a\": true}").unwrap(), json!({"a": true}));
    }

    #[test]
    fn rejects_prose() {
        assert!(parse_generated_text("Sure! Here is your data.").is_err());
    }

    #[test]
    fn pretty_prints_with_two_spaces() {
        insta::assert_snapshot!(to_pretty_string(&json!({"book": {"title": "Dune"}})), @r###"
        {
          "book": {
            "title": "Dune"
          }
        }
        "###);
    }
}
