//! Game objects

use kula_data::{Field, Reflected, ScopeId, Signature, Vec4};

use crate::action::ACTIONS_KEY;
use crate::error::Result;
use crate::world::World;

pub const CHILDREN_KEY: &str = "Children";

/// A named, placed entity with actions and child objects
#[derive(Debug, Clone)]
pub struct GameObject {
    pub name: Field<String>,
    pub position: Field<Vec4>,
    pub rotation: Field<Vec4>,
    pub scale: Field<Vec4>,
}

impl Default for GameObject {
    fn default() -> Self {
        Self {
            name: Field::default(),
            position: Field::new(Vec4::W),
            rotation: Field::default(),
            scale: Field::new(Vec4::new(1.0, 1.0, 1.0, 0.0)),
        }
    }
}

impl Reflected for GameObject {
    const TYPE_NAME: &'static str = "GameObject";

    fn signatures() -> Vec<Signature> {
        vec![
            Signature::field("Name", 1, |g: &GameObject| &g.name),
            Signature::field("Position", 1, |g: &GameObject| &g.position),
            Signature::field("Rotation", 1, |g: &GameObject| &g.rotation),
            Signature::field("Scale", 1, |g: &GameObject| &g.scale),
            Signature::table(CHILDREN_KEY),
            Signature::table(ACTIONS_KEY),
        ]
    }
}

/// Run the object's actions, then update its children
pub(crate) fn update_game_object(world: &mut World, id: ScopeId) -> Result<()> {
    world.run_actions(id, ACTIONS_KEY)?;
    let children = world
        .arena()
        .find(id, CHILDREN_KEY)
        .map(|datum| datum.scope_ids().to_vec())
        .unwrap_or_default();
    for child in children {
        world.update_scope(child)?;
    }
    Ok(())
}
