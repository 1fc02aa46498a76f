//! Table population
//!
//! [`TableWrapper`] fills a [`ScopeArena`] subtree from JSON. It keeps a
//! stack of [`Frame`]s, one per open JSON object. A frame is either
//! *plain* (its members are data and become a nested scope) or
//! *keyworded* (its members are the reserved `type`, `class` and `value`
//! keys describing the member that opened it). Mixing the two in one
//! object is rejected.
//!
//! Nested scopes are created lazily, on the first plain member or when an
//! empty object closes, so that a keyworded object never leaves an empty
//! scope behind.

use kula_core::Error;
use kula_data::{DatumType, ScopeArena, ScopeId};
use serde_json::Value;

use crate::config::ParseConfig;
use crate::coordinator::{Member, ParseCoordinator, ParseHelper, ParseOutcome, ParseWrapper};
use crate::error::{ParseError, Result};
use crate::expression::Expression;
use crate::transmuter::{KeywordTransmuter, PathTransmuter};

/// Declares the element type of the enclosing member
pub const TYPE_KEY: &str = "type";
/// Declares the reflected class of the enclosing member
pub const CLASS_KEY: &str = "class";
/// Holds the value of the enclosing member
pub const VALUE_KEY: &str = "value";

/// Whether `key` is one of the reserved keywords
pub fn is_reserved(key: &str) -> bool {
    matches!(key, TYPE_KEY | CLASS_KEY | VALUE_KEY)
}

/// What the members of an open object have turned out to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Undecided,
    Keyworded,
    Plain,
}

/// One open JSON object
#[derive(Debug, Clone)]
pub struct Frame {
    /// Scope that owns the member this frame describes
    pub owner: Option<ScopeId>,
    /// Key of that member in `owner`
    pub key: String,
    /// Scope created for plain members
    pub scope: Option<ScopeId>,
    pub class: Option<String>,
    pub declared: Option<DatumType>,
    pub kind: FrameKind,
    /// A `value` member has been stored
    pub consumed: bool,
}

impl Frame {
    fn root(scope: ScopeId) -> Self {
        Self {
            owner: None,
            key: String::new(),
            scope: Some(scope),
            class: None,
            declared: None,
            kind: FrameKind::Plain,
            consumed: false,
        }
    }

    fn nested(owner: Option<ScopeId>, key: String, class: Option<String>) -> Self {
        Self {
            owner,
            key,
            scope: None,
            class,
            declared: None,
            kind: FrameKind::Undecided,
            consumed: false,
        }
    }
}

fn no_frame() -> ParseError {
    ParseError::Data(Error::InvalidStorage("no open parse frame".into()))
}

/// Wrapper that populates a scope tree
pub struct TableWrapper<'a> {
    arena: &'a mut ScopeArena,
    root: ScopeId,
    frames: Vec<Frame>,
    depth: usize,
}

impl<'a> TableWrapper<'a> {
    /// Populate `root` (and its subtree) in `arena`
    pub fn new(arena: &'a mut ScopeArena, root: ScopeId) -> Self {
        Self {
            arena,
            root,
            frames: Vec::new(),
            depth: 0,
        }
    }

    pub fn root(&self) -> ScopeId {
        self.root
    }

    pub fn arena(&self) -> &ScopeArena {
        self.arena
    }

    pub fn arena_mut(&mut self) -> &mut ScopeArena {
        self.arena
    }

    /// Innermost open frame
    pub fn frame(&self) -> Result<&Frame> {
        self.frames.last().ok_or_else(no_frame)
    }

    pub fn frame_mut(&mut self) -> Result<&mut Frame> {
        self.frames.last_mut().ok_or_else(no_frame)
    }

    /// Number of open frames, including the root
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Classify the innermost frame; a conflicting kind is an error
    pub fn mark(&mut self, kind: FrameKind) -> Result<()> {
        let frame = self.frame_mut()?;
        match frame.kind {
            FrameKind::Undecided => {
                frame.kind = kind;
                Ok(())
            }
            current if current == kind => Ok(()),
            _ => Err(ParseError::MixedKeywords(frame.key.clone())),
        }
    }

    /// Scope of the innermost frame, created on first use
    pub fn target_scope(&mut self) -> Result<ScopeId> {
        let frame = self.frames.last().ok_or_else(no_frame)?;
        if let Some(scope) = frame.scope {
            return Ok(scope);
        }
        let owner = frame.owner.ok_or_else(no_frame)?;
        let scope = match &frame.class {
            Some(class) => self.arena.append_scope_of_class(owner, &frame.key, class)?,
            None => self.arena.append_scope(owner, &frame.key)?,
        };
        log::trace!("Opened scope {} at `{}`", scope, frame.key);
        self.frame_mut()?.scope = Some(scope);
        Ok(scope)
    }

    fn push_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    /// Close the innermost frame, materializing whatever it declared
    fn finish_frame(&mut self) -> Result<()> {
        let frame = self.frames.last().ok_or_else(no_frame)?;
        match frame.kind {
            FrameKind::Undecided => {
                self.target_scope()?;
            }
            FrameKind::Keyworded if !frame.consumed => {
                let owner = frame.owner.ok_or_else(no_frame)?;
                match (&frame.class, frame.declared) {
                    (Some(class), _) => {
                        self.arena.append_scope_of_class(owner, &frame.key, class)?;
                    }
                    (None, Some(DatumType::InternalTable)) => {
                        self.arena.append_scope(owner, &frame.key)?;
                    }
                    (None, Some(ty)) => {
                        self.arena.append(owner, &frame.key)?.set_type(ty)?;
                    }
                    (None, None) => {}
                }
            }
            _ => {}
        }
        self.frames.pop();
        Ok(())
    }
}

impl ParseWrapper for TableWrapper<'_> {
    fn initialize(&mut self) {
        self.frames = vec![Frame::root(self.root)];
        self.depth = 0;
    }

    fn cleanup(&mut self) {
        self.frames.clear();
    }

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

/// Handles JSON objects
#[derive(Debug, Clone, Copy, Default)]
pub struct TableHelper;

impl<'a> ParseHelper<TableWrapper<'a>> for TableHelper {
    fn create(&self) -> Box<dyn ParseHelper<TableWrapper<'a>>> {
        Box::new(*self)
    }

    fn is_able_to_parse(&self, _wrapper: &TableWrapper<'a>, member: &Member<'_>) -> bool {
        member.value.is_object()
    }

    fn try_parse(&mut self, wrapper: &mut TableWrapper<'a>, member: &Member<'_>) -> Result<ParseOutcome> {
        let frame = match member.key {
            VALUE_KEY => {
                wrapper.mark(FrameKind::Keyworded)?;
                let outer = wrapper.frame_mut()?;
                if let Some(ty) = outer.declared.filter(|ty| *ty != DatumType::InternalTable) {
                    return Err(Error::type_mismatch(DatumType::InternalTable, ty).into());
                }
                outer.consumed = true;
                Frame::nested(outer.owner, outer.key.clone(), outer.class.clone())
            }
            key if is_reserved(key) => {
                return Err(Error::InvalidArgument(format!("`{}` expects a string", key)).into());
            }
            key => {
                wrapper.mark(FrameKind::Plain)?;
                let owner = wrapper.target_scope()?;
                Frame::nested(Some(owner), key.to_string(), None)
            }
        };
        wrapper.push_frame(frame);
        Ok(ParseOutcome::Descend)
    }

    fn end_parse(&mut self, wrapper: &mut TableWrapper<'a>, _member: &Member<'_>) -> Result<()> {
        wrapper.finish_frame()
    }
}

/// Handles numbers, strings and booleans
#[derive(Debug, Clone, Default)]
pub struct ValueHelper {
    config: ParseConfig,
}

impl ValueHelper {
    pub fn new(config: ParseConfig) -> Self {
        Self { config }
    }

    fn keyword_text<'v>(member: &Member<'v>) -> Result<&'v str> {
        member.value.as_str().ok_or_else(|| {
            Error::InvalidArgument(format!("`{}` expects a string", member.key)).into()
        })
    }

    /// Write the member's value into `scope[key]`
    fn store(
        &self,
        arena: &mut ScopeArena,
        scope: ScopeId,
        key: &str,
        declared: Option<DatumType>,
        member: &Member<'_>,
    ) -> Result<()> {
        let datum = arena.append(scope, key)?;
        let known = Some(datum.datum_type()).filter(|ty| *ty != DatumType::Unknown);
        let ty = declared.or(known).unwrap_or_else(|| infer(member.value));
        let text = match member.value {
            Value::String(s) => match self.config.expression_body(s) {
                Some(body) => Expression::compile(body)?.to_rpn(),
                None => s.clone(),
            },
            Value::Number(n) => n.to_string(),
            Value::Bool(b) if ty == DatumType::String => b.to_string(),
            Value::Bool(b) => (*b as i32).to_string(),
            _ => {
                return Err(ParseError::NoHelper {
                    key: member.key.to_string(),
                })
            }
        };
        datum.set_type(ty)?;
        datum.set_from_string(member.index, &text)?;
        Ok(())
    }
}

/// Element type of an undeclared JSON scalar
fn infer(value: &Value) -> DatumType {
    match value {
        Value::Number(n) if n.as_i64().is_some_and(|v| i32::try_from(v).is_ok()) => {
            DatumType::Integer
        }
        Value::Number(_) => DatumType::Float,
        Value::Bool(_) => DatumType::Integer,
        _ => DatumType::String,
    }
}

impl<'a> ParseHelper<TableWrapper<'a>> for ValueHelper {
    fn create(&self) -> Box<dyn ParseHelper<TableWrapper<'a>>> {
        Box::new(self.clone())
    }

    fn is_able_to_parse(&self, _wrapper: &TableWrapper<'a>, member: &Member<'_>) -> bool {
        matches!(
            member.value,
            Value::Number(_) | Value::String(_) | Value::Bool(_)
        )
    }

    fn try_parse(&mut self, wrapper: &mut TableWrapper<'a>, member: &Member<'_>) -> Result<ParseOutcome> {
        match member.key {
            TYPE_KEY => {
                wrapper.mark(FrameKind::Keyworded)?;
                let text = Self::keyword_text(member)?;
                let ty = DatumType::from_keyword(text).ok_or_else(|| {
                    ParseError::from(Error::InvalidArgument(format!("unknown type `{}`", text)))
                })?;
                wrapper.frame_mut()?.declared = Some(ty);
            }
            CLASS_KEY => {
                wrapper.mark(FrameKind::Keyworded)?;
                let class = Self::keyword_text(member)?.to_string();
                wrapper.frame_mut()?.class = Some(class);
            }
            VALUE_KEY => {
                wrapper.mark(FrameKind::Keyworded)?;
                let frame = wrapper.frame_mut()?;
                if let Some(class) = &frame.class {
                    return Err(Error::InvalidArgument(format!(
                        "class `{}` needs an object value",
                        class
                    ))
                    .into());
                }
                frame.consumed = true;
                let owner = frame.owner.ok_or_else(no_frame)?;
                let key = frame.key.clone();
                let declared = frame.declared;
                self.store(wrapper.arena_mut(), owner, &key, declared, member)?;
            }
            key => {
                wrapper.mark(FrameKind::Plain)?;
                let scope = wrapper.target_scope()?;
                self.store(wrapper.arena_mut(), scope, key, None, member)?;
            }
        }
        Ok(ParseOutcome::Handled)
    }
}

/// Coordinator configured for table population
///
/// Transmuters: dotted paths (when enabled), then keyword expansion, so an
/// annotation belongs to the last path segment (`"a.b.int c"`).
/// Helpers: objects, then scalars.
pub fn table_coordinator<'a>(config: &ParseConfig) -> ParseCoordinator<TableWrapper<'a>> {
    let mut coordinator = ParseCoordinator::new(config.clone());
    if config.split_dotted_keys {
        coordinator.add_transmuter(PathTransmuter::new());
    }
    coordinator.add_transmuter(KeywordTransmuter::new());
    coordinator
        .add_helper(TableHelper)
        .add_helper(ValueHelper::new(config.clone()));
    coordinator
}

/// Parse JSON text into `root`
pub fn parse_table(
    arena: &mut ScopeArena,
    root: ScopeId,
    text: &str,
    config: &ParseConfig,
) -> Result<()> {
    let mut wrapper = TableWrapper::new(arena, root);
    table_coordinator(config).deserialize_str(&mut wrapper, text)
}
