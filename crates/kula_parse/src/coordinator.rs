//! Parse coordinator
//!
//! Walks a JSON document member by member. For every member the
//! transmuter chain may rewrite the key/value pair first; the element (or
//! every element of an array) is then handed to the first helper that
//! accepts it. Helpers that want the members of a nested object return
//! [`ParseOutcome::Descend`] and the coordinator recurses with the
//! wrapper's depth incremented.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde_json::Value;

use crate::config::ParseConfig;
use crate::error::{ParseError, Result};

/// Parse state shared between the coordinator and its helpers
pub trait ParseWrapper {
    /// Called before each deserialize
    fn initialize(&mut self) {}

    /// Called after each deserialize, successful or not
    fn cleanup(&mut self) {}

    fn depth(&self) -> usize;

    fn increment_depth(&mut self);

    fn decrement_depth(&mut self);
}

/// One element presented to the helpers
#[derive(Debug, Clone, Copy)]
pub struct Member<'v> {
    pub key: &'v str,
    pub value: &'v Value,
    pub is_array_element: bool,
    /// Position inside the array (0 for plain members)
    pub index: usize,
}

/// Result of a successful [`ParseHelper::try_parse`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    /// The element was consumed
    Handled,
    /// Parse the members of the nested object one level deeper
    Descend,
}

/// A strategy for one kind of JSON element
pub trait ParseHelper<W: ParseWrapper> {
    /// Fresh helper with the same configuration
    fn create(&self) -> Box<dyn ParseHelper<W>>;

    /// Called before each deserialize
    fn initialize(&mut self) {}

    fn is_able_to_parse(&self, wrapper: &W, member: &Member<'_>) -> bool;

    fn try_parse(&mut self, wrapper: &mut W, member: &Member<'_>) -> Result<ParseOutcome>;

    /// Called once for every successful `try_parse`, after any descent
    fn end_parse(&mut self, _wrapper: &mut W, _member: &Member<'_>) -> Result<()> {
        Ok(())
    }
}

/// A rewrite rule applied to every member before dispatch
pub trait KeyTransmuter<W: ParseWrapper> {
    /// Fresh transmuter with the same configuration
    fn create(&self) -> Box<dyn KeyTransmuter<W>>;

    /// Called before each deserialize
    fn initialize(&mut self) {}

    fn transmute(&mut self, wrapper: &mut W, key: String, value: Value) -> Result<(String, Value)>;

    /// Called after the member is parsed, in reverse chain order
    fn end_transmutation(&mut self, _wrapper: &mut W) -> Result<()> {
        Ok(())
    }
}

/// Drives helpers and transmuters over a JSON document
pub struct ParseCoordinator<W: ParseWrapper> {
    helpers: Vec<Box<dyn ParseHelper<W>>>,
    transmuters: Vec<Box<dyn KeyTransmuter<W>>>,
    config: ParseConfig,
}

impl<W: ParseWrapper> ParseCoordinator<W> {
    /// Create a coordinator without helpers
    pub fn new(config: ParseConfig) -> Self {
        Self {
            helpers: Vec::new(),
            transmuters: Vec::new(),
            config,
        }
    }

    /// Append a helper; earlier helpers win
    pub fn add_helper(&mut self, helper: impl ParseHelper<W> + 'static) -> &mut Self {
        self.helpers.push(Box::new(helper));
        self
    }

    /// Append a transmuter to the chain
    pub fn add_transmuter(&mut self, transmuter: impl KeyTransmuter<W> + 'static) -> &mut Self {
        self.transmuters.push(Box::new(transmuter));
        self
    }

    /// Builder variant of [`add_helper`](Self::add_helper)
    pub fn with_helper(mut self, helper: impl ParseHelper<W> + 'static) -> Self {
        self.add_helper(helper);
        self
    }

    /// Builder variant of [`add_transmuter`](Self::add_transmuter)
    pub fn with_transmuter(mut self, transmuter: impl KeyTransmuter<W> + 'static) -> Self {
        self.add_transmuter(transmuter);
        self
    }

    pub fn helper_count(&self) -> usize {
        self.helpers.len()
    }

    pub fn transmuter_count(&self) -> usize {
        self.transmuters.len()
    }

    pub fn config(&self) -> &ParseConfig {
        &self.config
    }

    /// Deserialize JSON text
    pub fn deserialize_str(&mut self, wrapper: &mut W, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(ParseError::Empty);
        }
        let value: Value = serde_json::from_str(text)?;
        self.deserialize_value(wrapper, value)
    }

    /// Deserialize JSON from a reader
    pub fn deserialize_reader<R: Read>(&mut self, wrapper: &mut W, mut reader: R) -> Result<()> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        self.deserialize_str(wrapper, &text)
    }

    /// Deserialize a JSON file
    pub fn deserialize_file(&mut self, wrapper: &mut W, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        log::debug!("Deserializing {}", path.display());
        let file = File::open(path)?;
        self.deserialize_reader(wrapper, BufReader::new(file))
    }

    /// Deserialize an already parsed document
    pub fn deserialize_value(&mut self, wrapper: &mut W, value: Value) -> Result<()> {
        let Value::Object(members) = value else {
            return Err(ParseError::RootNotObject);
        };

        wrapper.initialize();
        for helper in &mut self.helpers {
            helper.initialize();
        }
        for transmuter in &mut self.transmuters {
            transmuter.initialize();
        }

        let expected = wrapper.depth();
        let result = members
            .into_iter()
            .try_for_each(|(key, value)| self.parse_member(wrapper, key, value))
            .and_then(|()| match wrapper.depth() {
                found if found == expected => Ok(()),
                found => Err(ParseError::DepthImbalance { expected, found }),
            });
        wrapper.cleanup();
        result
    }

    fn parse_member(&mut self, wrapper: &mut W, key: String, value: Value) -> Result<()> {
        let (mut key, mut value) = (key, value);
        for transmuter in &mut self.transmuters {
            (key, value) = transmuter.transmute(wrapper, key, value)?;
        }

        match &value {
            Value::Array(elements) => {
                for (index, element) in elements.iter().enumerate() {
                    let member = Member {
                        key: &key,
                        value: element,
                        is_array_element: true,
                        index,
                    };
                    self.parse_element(wrapper, &member)?;
                }
            }
            element => {
                let member = Member {
                    key: &key,
                    value: element,
                    is_array_element: false,
                    index: 0,
                };
                self.parse_element(wrapper, &member)?;
            }
        }

        for transmuter in self.transmuters.iter_mut().rev() {
            transmuter.end_transmutation(wrapper)?;
        }
        Ok(())
    }

    fn parse_element(&mut self, wrapper: &mut W, member: &Member<'_>) -> Result<()> {
        let position = self
            .helpers
            .iter()
            .position(|helper| helper.is_able_to_parse(wrapper, member))
            .ok_or_else(|| ParseError::NoHelper {
                key: member.key.to_string(),
            })?;

        if self.helpers[position].try_parse(wrapper, member)? == ParseOutcome::Descend {
            let Value::Object(nested) = member.value else {
                return Err(ParseError::NoHelper {
                    key: member.key.to_string(),
                });
            };
            // Depth is restored on every exit path
            wrapper.increment_depth();
            let result = if wrapper.depth() > self.config.max_depth {
                Err(ParseError::TooDeep(self.config.max_depth))
            } else {
                nested
                    .iter()
                    .try_for_each(|(key, value)| self.parse_member(wrapper, key.clone(), value.clone()))
            };
            wrapper.decrement_depth();
            result?;
        }

        self.helpers[position].end_parse(wrapper, member)
    }
}

/// Cloning recreates every helper and transmuter from its prototype
impl<W: ParseWrapper> Clone for ParseCoordinator<W> {
    fn clone(&self) -> Self {
        Self {
            helpers: self.helpers.iter().map(|helper| helper.create()).collect(),
            transmuters: self.transmuters.iter().map(|t| t.create()).collect(),
            config: self.config.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        depth: usize,
        numbers: Vec<i64>,
        /// Helper call count seen at each number
        calls: Vec<usize>,
    }

    impl ParseWrapper for Counter {
        fn depth(&self) -> usize {
            self.depth
        }

        fn increment_depth(&mut self) {
            self.depth += 1;
        }

        fn decrement_depth(&mut self) {
            self.depth -= 1;
        }
    }

    #[derive(Clone, Default)]
    struct NumberHelper {
        calls: usize,
    }

    impl ParseHelper<Counter> for NumberHelper {
        fn create(&self) -> Box<dyn ParseHelper<Counter>> {
            Box::new(NumberHelper::default())
        }

        fn is_able_to_parse(&self, _wrapper: &Counter, member: &Member<'_>) -> bool {
            member.value.is_i64() || member.value.is_object()
        }

        fn try_parse(&mut self, wrapper: &mut Counter, member: &Member<'_>) -> Result<ParseOutcome> {
            self.calls += 1;
            match member.value.as_i64() {
                Some(n) => {
                    wrapper.numbers.push(n);
                    wrapper.calls.push(self.calls);
                    Ok(ParseOutcome::Handled)
                }
                None => Ok(ParseOutcome::Descend),
            }
        }
    }

    struct Doubler;

    impl KeyTransmuter<Counter> for Doubler {
        fn create(&self) -> Box<dyn KeyTransmuter<Counter>> {
            Box::new(Doubler)
        }

        fn transmute(
            &mut self,
            _wrapper: &mut Counter,
            key: String,
            value: Value,
        ) -> Result<(String, Value)> {
            match value.as_i64() {
                Some(n) => Ok((key, Value::from(n * 2))),
                None => Ok((key, value)),
            }
        }
    }

    fn coordinator() -> ParseCoordinator<Counter> {
        ParseCoordinator::new(ParseConfig::default()).with_helper(NumberHelper::default())
    }

    #[test]
    fn test_nested_and_arrays() {
        let mut wrapper = Counter::default();
        coordinator()
            .deserialize_str(&mut wrapper, r#"{"a": 1, "b": {"c": [2, 3]}}"#)
            .unwrap();
        assert_eq!(wrapper.numbers, vec![1, 2, 3]);
        assert_eq!(wrapper.depth, 0);
    }

    #[test]
    fn test_transmuter_applies_before_dispatch() {
        let mut wrapper = Counter::default();
        coordinator()
            .with_transmuter(Doubler)
            .deserialize_str(&mut wrapper, r#"{"a": 1, "b": {"c": 5}}"#)
            .unwrap();
        assert_eq!(wrapper.numbers, vec![2, 10]);
    }

    #[test]
    fn test_input_errors() {
        let mut wrapper = Counter::default();
        let mut parser = coordinator();
        assert!(matches!(
            parser.deserialize_str(&mut wrapper, "  \n"),
            Err(ParseError::Empty)
        ));
        assert!(matches!(
            parser.deserialize_str(&mut wrapper, "{\"a\": "),
            Err(ParseError::Json(_))
        ));
        assert!(matches!(
            parser.deserialize_str(&mut wrapper, "[1, 2]"),
            Err(ParseError::RootNotObject)
        ));
        assert!(matches!(
            parser.deserialize_str(&mut wrapper, r#"{"a": "text"}"#),
            Err(ParseError::NoHelper { key }) if key == "a"
        ));
    }

    #[test]
    fn test_max_depth() {
        let mut wrapper = Counter::default();
        let config = ParseConfig {
            max_depth: 2,
            ..ParseConfig::default()
        };
        let mut parser = ParseCoordinator::new(config).with_helper(NumberHelper::default());
        assert!(parser
            .deserialize_str(&mut wrapper, r#"{"a": {"b": {"c": 1}}}"#)
            .is_ok());
        assert!(matches!(
            parser.deserialize_str(&mut Counter::default(), r#"{"a": {"b": {"c": {"d": 1}}}}"#),
            Err(ParseError::TooDeep(2))
        ));
    }

    #[test]
    fn test_depth_restored_after_error() {
        let config = ParseConfig {
            max_depth: 2,
            ..ParseConfig::default()
        };
        let mut parser = ParseCoordinator::new(config).with_helper(NumberHelper::default());
        let mut wrapper = Counter::default();

        assert!(matches!(
            parser.deserialize_str(&mut wrapper, r#"{"a": {"b": {"c": {"d": 1}}}}"#),
            Err(ParseError::TooDeep(2))
        ));
        assert_eq!(wrapper.depth, 0);

        assert!(matches!(
            parser.deserialize_str(&mut wrapper, r#"{"a": {"b": "text"}}"#),
            Err(ParseError::NoHelper { .. })
        ));
        assert_eq!(wrapper.depth, 0);

        parser
            .deserialize_str(&mut wrapper, r#"{"a": {"b": 1}}"#)
            .unwrap();
        assert_eq!(wrapper.numbers, vec![1]);
        assert_eq!(wrapper.depth, 0);
    }

    #[test]
    fn test_clone_recreates_helpers() {
        let mut parser = coordinator().with_transmuter(Doubler);
        let mut wrapper = Counter::default();
        parser.deserialize_str(&mut wrapper, r#"{"a": 1, "b": 2}"#).unwrap();
        assert_eq!(wrapper.calls, vec![1, 2]);

        let mut copy = parser.clone();
        assert_eq!(copy.helper_count(), 1);
        assert_eq!(copy.transmuter_count(), 1);

        let mut fresh = Counter::default();
        copy.deserialize_str(&mut fresh, r#"{"a": 1}"#).unwrap();
        assert_eq!(fresh.calls, vec![1]);
        assert_eq!(fresh.numbers, vec![2]);

        let mut again = Counter::default();
        parser.deserialize_str(&mut again, r#"{"a": 1}"#).unwrap();
        assert_eq!(again.calls, vec![3]);
    }
}
