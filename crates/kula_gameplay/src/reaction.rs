//! Events raised by actions and the reactions that answer them

use core::fmt;
use core::ops::ControlFlow;
use core::time::Duration;
use std::sync::Arc;

use kula_data::{Datum, Field, Reflected, ScopeId, Signature};
use kula_event::{Event, EventError, Subscriber};
use parking_lot::Mutex;

use crate::action::{object, ActionList, Action, ACTIONS_KEY};
use crate::error::Result;
use crate::world::World;

/// Payload published by [`ActionEvent`]
#[derive(Debug)]
pub struct EventMessage {
    pub subtype: String,
    /// Snapshot of the raising action's auxiliary attributes
    pub arguments: Vec<(String, Datum)>,
}

impl EventMessage {
    pub fn new(subtype: impl Into<String>) -> Self {
        Self {
            subtype: subtype.into(),
            arguments: Vec::new(),
        }
    }

    pub fn with_argument(mut self, key: impl Into<String>, value: impl Into<Datum>) -> Self {
        self.arguments.push((key.into(), value.into()));
        self
    }

    pub fn argument(&self, key: &str) -> Option<&Datum> {
        self.arguments
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, datum)| datum)
    }
}

/// Queues an [`EventMessage`] of `Subtype` to fire after `Delay` ms
///
/// Scalar auxiliary attributes travel with the message as arguments.
#[derive(Debug, Clone, Default)]
pub struct ActionEvent {
    pub action: Action,
    pub subtype: Field<String>,
    pub delay: Field<i32>,
}

impl Reflected for ActionEvent {
    const TYPE_NAME: &'static str = "ActionEvent";

    fn signatures() -> Vec<Signature> {
        vec![
            Signature::field("Subtype", 1, |a: &ActionEvent| &a.subtype),
            Signature::field("Delay", 1, |a: &ActionEvent| &a.delay),
        ]
    }

    fn base(&self) -> Option<&dyn kula_data::Attributed> {
        Some(&self.action)
    }
}

pub(crate) fn update_event(world: &mut World, id: ScopeId) -> Result<()> {
    let (subtype, delay) = {
        let raise = object::<ActionEvent>(world, id)?;
        (raise.subtype.get(), raise.delay.get())
    };

    let mut message = EventMessage::new(subtype);
    let mut failure = None;
    let flow = world.arena().for_each_auxiliary_attribute(id, |key, datum| {
        if !datum.datum_type().is_scalar() {
            return ControlFlow::Continue(());
        }
        match datum.snapshot() {
            Ok(copy) => {
                message.arguments.push((key.to_string(), copy));
                ControlFlow::Continue(())
            }
            Err(err) => {
                failure = Some(err);
                ControlFlow::Break(())
            }
        }
    })?;
    if flow.is_break() {
        if let Some(err) = failure {
            return Err(err.into());
        }
    }

    let delay = Duration::from_millis(u64::try_from(delay).unwrap_or(0));
    world.enqueue_event(message, delay);
    Ok(())
}

/// Bus endpoint of a reaction scope
///
/// Owned by the [`ReactionAttributed`] object, so it dies with the scope and
/// the bus drops it on the next publish.
#[derive(Default)]
pub struct ReactionHook {
    scope: Mutex<Option<ScopeId>>,
}

impl ReactionHook {
    pub fn bind(&self, scope: ScopeId) {
        *self.scope.lock() = Some(scope);
    }

    pub fn scope(&self) -> Option<ScopeId> {
        *self.scope.lock()
    }
}

impl fmt::Debug for ReactionHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReactionHook").field(&self.scope()).finish()
    }
}

impl Subscriber<World> for ReactionHook {
    fn notify(&self, event: &Event<World>, world: &mut World) -> kula_event::Result<()> {
        let (Some(message), Some(scope)) = (event.payload::<EventMessage>(), self.scope()) else {
            return Ok(());
        };
        react(world, scope, message).map_err(EventError::subscriber)
    }
}

/// Runs its actions when an [`EventMessage`] of matching `Subtype` arrives
///
/// The message arguments are copied into the reaction as auxiliary
/// attributes first, where the actions can read them.
#[derive(Debug, Default)]
pub struct ReactionAttributed {
    pub list: ActionList,
    pub subtype: Field<String>,
    pub hook: Arc<ReactionHook>,
}

/// Clones get an unbound hook of their own
impl Clone for ReactionAttributed {
    fn clone(&self) -> Self {
        Self {
            list: self.list.clone(),
            subtype: self.subtype.clone(),
            hook: Arc::default(),
        }
    }
}

impl Reflected for ReactionAttributed {
    const TYPE_NAME: &'static str = "ReactionAttributed";

    fn signatures() -> Vec<Signature> {
        vec![Signature::field("Subtype", 1, |r: &ReactionAttributed| &r.subtype)]
    }

    fn base(&self) -> Option<&dyn kula_data::Attributed> {
        Some(&self.list)
    }
}

fn react(world: &mut World, scope: ScopeId, message: &EventMessage) -> Result<()> {
    let Some(reaction) = world.arena().object_as::<ReactionAttributed>(scope) else {
        return Ok(());
    };
    if reaction.subtype.get() != message.subtype {
        return Ok(());
    }

    log::debug!("Reaction {} handling `{}`", scope, message.subtype);
    for (key, value) in &message.arguments {
        let target = world.arena_mut().append_auxiliary_attribute(scope, key)?;
        if target.datum_type().is_scope_reference() {
            return Err(kula_core::Error::type_mismatch(value.datum_type(), target.datum_type()).into());
        }
        *target = value.snapshot()?;
    }
    world.run_actions(scope, ACTIONS_KEY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_arguments() {
        let message = EventMessage::new("hit")
            .with_argument("Damage", 5)
            .with_argument("Source", "trap");
        assert_eq!(message.argument("Damage").unwrap().get_int(0).unwrap(), 5);
        assert_eq!(message.argument("Source").unwrap().get_string(0).unwrap(), "trap");
        assert!(message.argument("Missing").is_none());
    }

    #[test]
    fn test_clone_gets_fresh_hook() {
        let mut arena = kula_data::ScopeArena::new();
        let scope = arena.create_scope();
        let reaction = ReactionAttributed::default();
        reaction.hook.bind(scope);
        assert_eq!(reaction.hook.scope(), Some(scope));

        let copy = reaction.clone();
        assert!(!Arc::ptr_eq(&reaction.hook, &copy.hook));
        assert_eq!(copy.hook.scope(), None);
    }
}
