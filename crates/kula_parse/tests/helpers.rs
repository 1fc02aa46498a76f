use kula_parse::{
    Member, ParseConfig, ParseCoordinator, ParseError, ParseHelper, ParseOutcome, ParseWrapper,
    Result,
};
use serde_json::Value;

#[derive(Default)]
struct StringsWrapper {
    name: String,
    strings: Vec<String>,
    depth: usize,
    increments: usize,
    decrements: usize,
    initialized: usize,
    cleaned_up: usize,
}

impl ParseWrapper for StringsWrapper {
    fn initialize(&mut self) {
        self.initialized += 1;
        self.name.clear();
        self.strings.clear();
    }

    fn cleanup(&mut self) {
        self.cleaned_up += 1;
    }

    fn depth(&self) -> usize {
        self.depth
    }

    fn increment_depth(&mut self) {
        self.depth += 1;
        self.increments += 1;
    }

    fn decrement_depth(&mut self) {
        self.depth -= 1;
        self.decrements += 1;
    }
}

/// Opens objects so their members are visited
#[derive(Clone, Copy)]
struct ObjectHelper;

impl ParseHelper<StringsWrapper> for ObjectHelper {
    fn create(&self) -> Box<dyn ParseHelper<StringsWrapper>> {
        Box::new(*self)
    }

    fn is_able_to_parse(&self, _wrapper: &StringsWrapper, member: &Member<'_>) -> bool {
        member.value.is_object()
    }

    fn try_parse(&mut self, _wrapper: &mut StringsWrapper, _member: &Member<'_>) -> Result<ParseOutcome> {
        Ok(ParseOutcome::Descend)
    }
}

/// Collects strings that arrive as array elements
#[derive(Clone, Default)]
struct StringArrayHelper {
    seen: usize,
}

impl ParseHelper<StringsWrapper> for StringArrayHelper {
    fn create(&self) -> Box<dyn ParseHelper<StringsWrapper>> {
        Box::new(Self::default())
    }

    fn initialize(&mut self) {
        self.seen = 0;
    }

    fn is_able_to_parse(&self, _wrapper: &StringsWrapper, member: &Member<'_>) -> bool {
        member.is_array_element && member.value.is_string()
    }

    fn try_parse(&mut self, wrapper: &mut StringsWrapper, member: &Member<'_>) -> Result<ParseOutcome> {
        if let Value::String(text) = member.value {
            wrapper.name = member.key.to_string();
            wrapper.strings.push(text.clone());
            self.seen += 1;
        }
        Ok(ParseOutcome::Handled)
    }
}

fn coordinator() -> ParseCoordinator<StringsWrapper> {
    ParseCoordinator::new(ParseConfig::default())
        .with_helper(ObjectHelper)
        .with_helper(StringArrayHelper::default())
}

#[test]
fn test_nested_string_array() {
    let mut wrapper = StringsWrapper::default();
    coordinator()
        .deserialize_str(
            &mut wrapper,
            r#"{"Mage": {"Spells": ["Magic Missile", "Fireball"]}}"#,
        )
        .unwrap();

    assert_eq!(wrapper.strings, vec!["Magic Missile", "Fireball"]);
    assert_eq!(wrapper.name, "Spells");
    assert_eq!(wrapper.increments, 1);
    assert_eq!(wrapper.decrements, 1);
    assert_eq!(wrapper.depth, 0);
    assert_eq!(wrapper.initialized, 1);
    assert_eq!(wrapper.cleaned_up, 1);
}

#[test]
fn test_unhandled_member_reports_key() {
    let mut wrapper = StringsWrapper::default();
    let result = coordinator().deserialize_str(&mut wrapper, r#"{"Mage": {"Level": 3}}"#);

    assert!(matches!(result, Err(ParseError::NoHelper { key }) if key == "Level"));
    assert_eq!(wrapper.cleaned_up, 1);
}

#[test]
fn test_root_must_be_object() {
    let mut wrapper = StringsWrapper::default();
    assert!(matches!(
        coordinator().deserialize_str(&mut wrapper, r#"["Fireball"]"#),
        Err(ParseError::RootNotObject)
    ));
    assert!(matches!(
        coordinator().deserialize_str(&mut wrapper, "   "),
        Err(ParseError::Empty)
    ));
    assert!(matches!(
        coordinator().deserialize_str(&mut wrapper, "{\"Mage\": "),
        Err(ParseError::Json(_))
    ));
}

#[test]
fn test_clone_has_fresh_helpers() {
    let original = coordinator();
    let mut copy = original.clone();
    assert_eq!(copy.helper_count(), original.helper_count());

    let mut wrapper = StringsWrapper::default();
    copy.deserialize_str(&mut wrapper, r#"{"Spells": ["Blink"]}"#)
        .unwrap();
    assert_eq!(wrapper.strings, vec!["Blink"]);
    assert_eq!(wrapper.increments, 0);
}

#[test]
fn test_reader_input() {
    let mut wrapper = StringsWrapper::default();
    let text = br#"{"Mage": {"Spells": ["Haste"]}}"#;
    coordinator()
        .deserialize_reader(&mut wrapper, &text[..])
        .unwrap();
    assert_eq!(wrapper.strings, vec!["Haste"]);
}

#[test]
fn test_depth_limit() {
    let config = ParseConfig {
        max_depth: 2,
        ..ParseConfig::default()
    };
    let mut coordinator = ParseCoordinator::new(config)
        .with_helper(ObjectHelper)
        .with_helper(StringArrayHelper::default());

    let mut wrapper = StringsWrapper::default();
    let result = coordinator.deserialize_str(&mut wrapper, r#"{"a": {"b": {"c": {}}}}"#);
    assert!(matches!(result, Err(ParseError::TooDeep(2))));
    assert_eq!(wrapper.cleaned_up, 1);
}
