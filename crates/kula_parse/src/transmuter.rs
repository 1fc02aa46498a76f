//! Key transmuters
//!
//! Transmuters rewrite a member before any helper sees it. The keyword
//! transmuter expands annotated keys:
//!
//! | key                   | rewritten member                              |
//! |-----------------------|-----------------------------------------------|
//! | `"int Score": 5`      | `"Score": {"type": "int", "value": 5}`        |
//! | `"Monster Orc": {..}` | `"Orc": {"class": "Monster", "value": {..}}`  |
//! | `"object Monster Orc"`| same as above                                 |
//!
//! The path transmuter splits dotted keys into nested objects.

use kula_core::Error;
use kula_data::DatumType;
use serde_json::{Map, Value};

use crate::coordinator::{KeyTransmuter, ParseWrapper};
use crate::error::{ParseError, Result};
use crate::table::{CLASS_KEY, TYPE_KEY, VALUE_KEY};

/// Marker that introduces an explicit class annotation
pub const OBJECT_MARKER: &str = "object";

/// Expands `"<type-or-class> <name>"` keys
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordTransmuter;

impl KeywordTransmuter {
    pub fn new() -> Self {
        Self
    }

    fn annotate(meta: &str, hint: &str, value: Value) -> Value {
        let mut object = Map::new();
        object.insert(meta.to_string(), Value::String(hint.to_string()));
        object.insert(VALUE_KEY.to_string(), value);
        Value::Object(object)
    }
}

impl<W: ParseWrapper> KeyTransmuter<W> for KeywordTransmuter {
    fn create(&self) -> Box<dyn KeyTransmuter<W>> {
        Box::new(*self)
    }

    fn transmute(&mut self, _wrapper: &mut W, key: String, value: Value) -> Result<(String, Value)> {
        let tokens: Vec<&str> = key.split_whitespace().collect();
        match tokens.as_slice() {
            [] | [_] => Ok((key, value)),
            [hint, name] => {
                let meta = match DatumType::from_keyword(hint) {
                    Some(_) => TYPE_KEY,
                    None => CLASS_KEY,
                };
                Ok((name.to_string(), Self::annotate(meta, hint, value)))
            }
            [marker, class, name] if *marker == OBJECT_MARKER => {
                Ok((name.to_string(), Self::annotate(CLASS_KEY, class, value)))
            }
            [_, _, _] => Err(ParseError::Data(Error::InvalidArgument(format!(
                "two annotation tokens must start with `{}`: {}",
                OBJECT_MARKER, key
            )))),
            _ => Err(ParseError::TooManyTokens(key)),
        }
    }
}

/// Rewrites `"a.b.c": v` into `"a": {"b": {"c": v}}`
#[derive(Debug, Clone, Copy, Default)]
pub struct PathTransmuter;

impl PathTransmuter {
    pub fn new() -> Self {
        Self
    }
}

impl<W: ParseWrapper> KeyTransmuter<W> for PathTransmuter {
    fn create(&self) -> Box<dyn KeyTransmuter<W>> {
        Box::new(*self)
    }

    fn transmute(&mut self, _wrapper: &mut W, key: String, value: Value) -> Result<(String, Value)> {
        let segments: Vec<&str> = key.split('.').collect();
        if segments.len() < 2 || segments.iter().any(|s| s.trim().is_empty()) {
            return Ok((key, value));
        }

        let nested = segments[1..].iter().rev().fold(value, |inner, segment| {
            let mut object = Map::new();
            object.insert(segment.to_string(), inner);
            Value::Object(object)
        });
        Ok((segments[0].to_string(), nested))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Flat(usize);

    impl ParseWrapper for Flat {
        fn depth(&self) -> usize {
            self.0
        }

        fn increment_depth(&mut self) {
            self.0 += 1;
        }

        fn decrement_depth(&mut self) {
            self.0 -= 1;
        }
    }

    fn keyword(key: &str, value: Value) -> Result<(String, Value)> {
        KeyTransmuter::<Flat>::transmute(&mut KeywordTransmuter, &mut Flat(0), key.to_string(), value)
    }

    fn path(key: &str, value: Value) -> Result<(String, Value)> {
        KeyTransmuter::<Flat>::transmute(&mut PathTransmuter, &mut Flat(0), key.to_string(), value)
    }

    #[test]
    fn test_plain_key_unchanged() {
        let (key, value) = keyword("Score", json!(5)).unwrap();
        assert_eq!(key, "Score");
        assert_eq!(value, json!(5));
    }

    #[test]
    fn test_type_keyword() {
        let (key, value) = keyword("int Score", json!(5)).unwrap();
        assert_eq!(key, "Score");
        assert_eq!(value, json!({"type": "int", "value": 5}));
    }

    #[test]
    fn test_class_hint() {
        let (key, value) = keyword("Monster Orc", json!({"Health": 3})).unwrap();
        assert_eq!(key, "Orc");
        assert_eq!(value, json!({"class": "Monster", "value": {"Health": 3}}));

        let (key, value) = keyword("object Monster Orc", json!({})).unwrap();
        assert_eq!(key, "Orc");
        assert_eq!(value, json!({"class": "Monster", "value": {}}));
    }

    #[test]
    fn test_token_errors() {
        assert!(matches!(
            keyword("big Monster Orc", json!({})),
            Err(ParseError::Data(Error::InvalidArgument(_)))
        ));
        assert!(matches!(
            keyword("object Monster Orc Extra", json!({})),
            Err(ParseError::TooManyTokens(_))
        ));
    }

    #[test]
    fn test_dotted_path() {
        let (key, value) = path("Player.Stats.Speed", json!(1.5)).unwrap();
        assert_eq!(key, "Player");
        assert_eq!(value, json!({"Stats": {"Speed": 1.5}}));

        let (key, _) = path("trailing.", json!(1)).unwrap();
        assert_eq!(key, "trailing.");
    }
}
