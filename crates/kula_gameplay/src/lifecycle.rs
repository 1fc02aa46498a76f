//! Deferred creation and destruction of actions
//!
//! Both actions only record a request; the [`World`] applies requests
//! after the update pass so no action table changes while it is walked.

use kula_data::{Field, Reflected, ScopeId, Signature};

use crate::action::{object, Action, ACTIONS_KEY};
use crate::error::Result;
use crate::world::World;

/// A scope to instantiate once the current update pass ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCreate {
    /// Scope that receives the instance
    pub container: ScopeId,
    pub key: String,
    pub class: String,
    /// Written to the instance's `Name`
    pub name: String,
}

/// Adds an `InstanceName` action of class `Prototype` next to itself
#[derive(Debug, Clone, Default)]
pub struct ActionCreateAction {
    pub action: Action,
    pub prototype: Field<String>,
    pub instance_name: Field<String>,
}

impl Reflected for ActionCreateAction {
    const TYPE_NAME: &'static str = "ActionCreateAction";

    fn signatures() -> Vec<Signature> {
        vec![
            Signature::field("Prototype", 1, |a: &ActionCreateAction| &a.prototype),
            Signature::field("InstanceName", 1, |a: &ActionCreateAction| &a.instance_name),
        ]
    }

    fn base(&self) -> Option<&dyn kula_data::Attributed> {
        Some(&self.action)
    }
}

/// Removes the sibling action named `ActionName`
#[derive(Debug, Clone, Default)]
pub struct ActionDestroyAction {
    pub action: Action,
    pub action_name: Field<String>,
}

impl Reflected for ActionDestroyAction {
    const TYPE_NAME: &'static str = "ActionDestroyAction";

    fn signatures() -> Vec<Signature> {
        vec![Signature::field("ActionName", 1, |a: &ActionDestroyAction| &a.action_name)]
    }

    fn base(&self) -> Option<&dyn kula_data::Attributed> {
        Some(&self.action)
    }
}

pub(crate) fn update_create(world: &mut World, id: ScopeId) -> Result<()> {
    let (class, name) = {
        let create = object::<ActionCreateAction>(world, id)?;
        (create.prototype.get(), create.instance_name.get())
    };
    let Some(container) = world.arena().parent(id) else {
        log::warn!("Create action {} has no container", id);
        return Ok(());
    };
    world.request_create(PendingCreate {
        container,
        key: ACTIONS_KEY.to_string(),
        class,
        name,
    });
    Ok(())
}

pub(crate) fn update_destroy(world: &mut World, id: ScopeId) -> Result<()> {
    let name = object::<ActionDestroyAction>(world, id)?.action_name.get();
    let arena = world.arena();
    let target = arena
        .parent(id)
        .and_then(|container| arena.find(container, ACTIONS_KEY))
        .and_then(|actions| {
            actions.scope_ids().iter().copied().find(|sibling| {
                arena
                    .find(*sibling, "Name")
                    .and_then(|datum| datum.get_string(0).ok())
                    .is_some_and(|sibling_name| sibling_name == name)
            })
        });

    match target {
        Some(target) => world.request_destroy(target),
        None => log::warn!("Destroy action {} found no action named `{}`", id, name),
    }
    Ok(())
}
