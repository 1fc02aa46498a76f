//! Level loading

use std::path::Path;

use kula_parse::{table_coordinator, TableWrapper};

use crate::error::Result;
use crate::world::World;

/// Parse a level into the world's root and subscribe its reactions
///
/// A failed parse leaves whatever was populated before the failure.
pub fn load_level(world: &mut World, text: &str) -> Result<()> {
    let root = world.root();
    let config = world.parse_config().clone();
    {
        // The wrapper borrows the arena until the coordinator is dropped
        let mut coordinator = table_coordinator(&config);
        coordinator.deserialize_str(&mut TableWrapper::new(world.arena_mut(), root), text)?;
    }
    world.bind_reactions()?;
    Ok(())
}

pub fn load_level_file(world: &mut World, path: impl AsRef<Path>) -> Result<()> {
    let root = world.root();
    let config = world.parse_config().clone();
    {
        let mut coordinator = table_coordinator(&config);
        coordinator.deserialize_file(&mut TableWrapper::new(world.arena_mut(), root), path.as_ref())?;
    }
    let bound = world.bind_reactions()?;
    log::info!("Loaded level {} ({} reactions)", path.as_ref().display(), bound);
    Ok(())
}
