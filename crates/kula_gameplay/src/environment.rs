//! Expression variables backed by the scope tree

use kula_data::{Datum, DatumType, ScopeArena, ScopeId};
use kula_parse::{Environment, Operand};

/// Resolves expression variables against a scope and its ancestors
///
/// A name is looked up with [`ScopeArena::search`]; dotted names
/// (`Player.Score`) continue through the first nested scope of each
/// segment. Only integer and float datums are visible. Assigning to a name
/// that does not resolve appends it to the starting scope.
pub struct ScopeEnvironment<'a> {
    arena: &'a mut ScopeArena,
    scope: ScopeId,
}

impl<'a> ScopeEnvironment<'a> {
    pub fn new(arena: &'a mut ScopeArena, scope: ScopeId) -> Self {
        Self { arena, scope }
    }

    /// Owning scope and final key of a variable
    fn resolve(&self, name: &str) -> Option<(ScopeId, String)> {
        let mut segments = name.split('.');
        let first = segments.next()?;
        let (mut owner, mut datum) = self.arena.search(self.scope, first)?;
        let mut key = first;
        for segment in segments {
            let nested = datum.get_scope(0).ok()?;
            datum = self.arena.find(nested, segment)?;
            owner = nested;
            key = segment;
        }
        Some((owner, key.to_string()))
    }

    fn write(datum: &mut Datum, value: Operand) -> bool {
        let result = match (datum.datum_type(), value) {
            (DatumType::Integer, value) => datum.set(0, value.as_int()),
            (DatumType::Float, value) => datum.set(0, value.as_float()),
            (DatumType::Unknown, Operand::Int(v)) => datum.set(0, v),
            (DatumType::Unknown, Operand::Float(v)) => datum.set(0, v),
            _ => return false,
        };
        result.is_ok()
    }
}

impl Environment for ScopeEnvironment<'_> {
    fn load(&self, name: &str) -> Option<Operand> {
        let (owner, key) = self.resolve(name)?;
        let datum = self.arena.find(owner, &key)?;
        match datum.datum_type() {
            DatumType::Integer => datum.get_int(0).ok().map(Operand::Int),
            DatumType::Float => datum.get_float(0).ok().map(Operand::Float),
            _ => None,
        }
    }

    fn store(&mut self, name: &str, value: Operand) -> bool {
        match self.resolve(name) {
            Some((owner, key)) => match self.arena.find_mut(owner, &key) {
                Some(datum) => Self::write(datum, value),
                None => false,
            },
            None if !name.contains('.') => match self.arena.append(self.scope, name) {
                Ok(datum) => Self::write(datum, value),
                Err(_) => false,
            },
            None => false,
        }
    }
}
