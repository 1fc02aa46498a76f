//! Parser configuration

use serde::{Deserialize, Serialize};

/// Settings shared by the coordinator and the table helpers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseConfig {
    /// Opening and closing markers of embedded expressions
    pub expression_delimiters: (String, String),
    /// Maximum nesting depth of JSON objects
    pub max_depth: usize,
    /// Rewrite `a.b.c` keys into nested objects
    pub split_dotted_keys: bool,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            expression_delimiters: ("<<<".to_string(), ">>>".to_string()),
            max_depth: 64,
            split_dotted_keys: false,
        }
    }
}

impl ParseConfig {
    /// Inner text of `text` if it is wrapped in the expression delimiters
    pub fn expression_body<'t>(&self, text: &'t str) -> Option<&'t str> {
        let (open, close) = &self.expression_delimiters;
        text.trim()
            .strip_prefix(open.as_str())?
            .strip_suffix(close.as_str())
            .map(str::trim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_partial_json() {
        let config: ParseConfig = serde_json::from_str(r#"{"max_depth": 8}"#).unwrap();
        assert_eq!(config.max_depth, 8);
        assert_eq!(config.expression_delimiters.0, "<<<");
        assert!(!config.split_dotted_keys);
    }

    #[test]
    fn test_expression_body() {
        let config = ParseConfig::default();
        assert_eq!(config.expression_body("<<< a + 1 >>>"), Some("a + 1"));
        assert_eq!(config.expression_body("a + 1"), None);
        assert_eq!(config.expression_body("<<< open"), None);
    }
}
