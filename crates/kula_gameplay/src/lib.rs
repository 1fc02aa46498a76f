//! # kula_gameplay - Kula Gameplay Layer
//!
//! Behavior scripted as data in the scope tree:
//! - **GameObject**: placed entity with `Actions` and `Children`
//! - **Actions**: lists, conditionals, increments, expressions, deferred
//!   create/destroy and delayed events
//! - **ReactionAttributed**: runs its actions when a matching
//!   [`EventMessage`] is published
//! - **World**: owns the tree, the clock and the event bus, and runs frames
//!
//! ## Example
//!
//! ```ignore
//! let mut world = World::new()?;
//! load_level(&mut world, r#"{"GameObject Hero": {"int Score": 0}}"#)?;
//! world.tick(Duration::from_millis(16))?;
//! ```

pub mod action;
pub mod environment;
pub mod error;
pub mod game_object;
pub mod level;
pub mod lifecycle;
pub mod reaction;
pub mod world;

pub use action::{Action, ActionExpression, ActionIncrement, ActionList, ActionListIf};
pub use environment::ScopeEnvironment;
pub use error::{GameplayError, Result};
pub use game_object::GameObject;
pub use level::{load_level, load_level_file};
pub use lifecycle::{ActionCreateAction, ActionDestroyAction, PendingCreate};
pub use reaction::{ActionEvent, EventMessage, ReactionAttributed, ReactionHook};
pub use world::{register_gameplay_types, UpdateFn, World};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{GameplayError, Result};
    pub use crate::level::{load_level, load_level_file};
    pub use crate::reaction::EventMessage;
    pub use crate::world::World;
}
