//! The game world
//!
//! [`World`] owns the scope tree and everything that drives it: game time,
//! the event bus with its delay queue, and the per-class update table. One
//! [`World::update`] call is one frame:
//!
//! 1. publish queued events whose delay has elapsed
//! 2. update the tree (game objects run their actions, then children)
//! 3. apply the creates and destroys requested during the pass

use core::any::TypeId;
use core::fmt;
use core::time::Duration;
use std::collections::HashMap;
use std::sync::Arc;

use kula_core::GameTime;
use kula_data::{Reflected, ScopeArena, ScopeId, SignatureRegistry};
use kula_event::{EventBus, EventQueue, Subscriber};
use kula_parse::ParseConfig;

use crate::action::{
    self, Action, ActionExpression, ActionIncrement, ActionList, ActionListIf,
};
use crate::error::{GameplayError, Result};
use crate::game_object::{self, GameObject};
use crate::lifecycle::{self, ActionCreateAction, ActionDestroyAction, PendingCreate};
use crate::reaction::{self, ActionEvent, EventMessage, ReactionAttributed};

/// Per-frame behavior of a reflected class
pub type UpdateFn = fn(&mut World, ScopeId) -> Result<()>;

/// Register every gameplay class with `registry`
pub fn register_gameplay_types(registry: &mut SignatureRegistry) -> kula_core::Result<()> {
    registry.register::<GameObject>();
    registry.register::<Action>();
    registry.register_with_parent::<ActionList, Action>()?;
    registry.register_with_parent::<ActionIncrement, Action>()?;
    registry.register_with_parent::<ActionListIf, Action>()?;
    registry.register_with_parent::<ActionExpression, Action>()?;
    registry.register_with_parent::<ActionCreateAction, Action>()?;
    registry.register_with_parent::<ActionDestroyAction, Action>()?;
    registry.register_with_parent::<ActionEvent, Action>()?;
    registry.register_with_parent::<ReactionAttributed, ActionList>()?;
    Ok(())
}

fn no_update(_world: &mut World, _id: ScopeId) -> Result<()> {
    Ok(())
}

pub struct World {
    arena: ScopeArena,
    root: ScopeId,
    time: GameTime,
    bus: EventBus<World>,
    queue: EventQueue<World>,
    updates: HashMap<TypeId, UpdateFn>,
    pending_creates: Vec<PendingCreate>,
    pending_destroys: Vec<ScopeId>,
    parse_config: ParseConfig,
}

impl World {
    /// World with the gameplay classes registered
    pub fn new() -> Result<Self> {
        let mut registry = SignatureRegistry::new();
        register_gameplay_types(&mut registry)?;
        Ok(Self::with_registry(Arc::new(registry)))
    }

    /// World over an existing registry
    ///
    /// The registry should already hold the gameplay classes (see
    /// [`register_gameplay_types`]) plus any custom ones.
    pub fn with_registry(registry: Arc<SignatureRegistry>) -> Self {
        let mut arena = ScopeArena::with_registry(registry);
        let root = arena.create_scope();
        let mut world = Self {
            arena,
            root,
            time: GameTime::new(),
            bus: EventBus::new(),
            queue: EventQueue::new(),
            updates: HashMap::new(),
            pending_creates: Vec::new(),
            pending_destroys: Vec::new(),
            parse_config: ParseConfig::default(),
        };
        world.register_update::<GameObject>(game_object::update_game_object);
        world.register_update::<Action>(no_update);
        world.register_update::<ActionList>(action::update_list);
        world.register_update::<ActionIncrement>(action::update_increment);
        world.register_update::<ActionListIf>(action::update_list_if);
        world.register_update::<ActionExpression>(action::update_expression);
        world.register_update::<ActionCreateAction>(lifecycle::update_create);
        world.register_update::<ActionDestroyAction>(lifecycle::update_destroy);
        world.register_update::<ActionEvent>(reaction::update_event);
        world.register_update::<ReactionAttributed>(no_update);
        world
    }

    pub fn with_parse_config(mut self, config: ParseConfig) -> Self {
        self.parse_config = config;
        self
    }

    // === Accessors ===

    pub fn arena(&self) -> &ScopeArena {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut ScopeArena {
        &mut self.arena
    }

    pub fn root(&self) -> ScopeId {
        self.root
    }

    pub fn time(&self) -> &GameTime {
        &self.time
    }

    pub fn set_time(&mut self, time: GameTime) {
        self.time = time;
    }

    /// Move game time forward by one frame step
    pub fn advance(&mut self, step: Duration) {
        self.time.advance(step);
    }

    pub fn bus(&self) -> &EventBus<World> {
        &self.bus
    }

    pub fn queue(&self) -> &EventQueue<World> {
        &self.queue
    }

    pub fn parse_config(&self) -> &ParseConfig {
        &self.parse_config
    }

    /// Set (or replace) the per-frame behavior of class `T`
    pub fn register_update<T: Reflected>(&mut self, update: UpdateFn) {
        self.updates.insert(TypeId::of::<T>(), update);
    }

    // === Frame ===

    /// Run one frame at the current game time
    pub fn update(&mut self) -> Result<()> {
        for event in self.queue.take_due(&self.time) {
            event.publish(self)?;
        }
        self.update_scope(self.root)?;
        self.apply_pending()
    }

    /// Advance by `step`, then run a frame
    pub fn tick(&mut self, step: Duration) -> Result<()> {
        self.advance(step);
        self.update()
    }

    /// Update a scope by its class, or walk into it when it is plain data
    ///
    /// Reflected classes without an update function are skipped.
    pub fn update_scope(&mut self, id: ScopeId) -> Result<()> {
        match self.arena.object(id) {
            Some(object) => match self.updates.get(&object.reflected_type_id()).copied() {
                Some(update) => update(self, id),
                None => {
                    log::trace!("No update for {} ({})", id, object.type_name());
                    Ok(())
                }
            },
            None => {
                for child in self.arena.nested_scopes(id)? {
                    self.update_scope(child)?;
                }
                Ok(())
            }
        }
    }

    /// Run a single action; its class must have an update function
    pub fn run_action(&mut self, id: ScopeId) -> Result<()> {
        let object = self
            .arena
            .object(id)
            .ok_or_else(|| GameplayError::WrongClass(id.to_string(), Action::TYPE_NAME))?;
        let update = self
            .updates
            .get(&object.reflected_type_id())
            .copied()
            .ok_or_else(|| GameplayError::NoUpdateHandler(object.type_name().to_string()))?;
        update(self, id)
    }

    /// Run every action in the `key` table of `owner`, in order
    pub fn run_actions(&mut self, owner: ScopeId, key: &str) -> Result<()> {
        let actions = self
            .arena
            .find(owner, key)
            .map(|datum| datum.scope_ids().to_vec())
            .unwrap_or_default();
        for id in actions {
            if self.arena.contains(id) {
                self.run_action(id)?;
            }
        }
        Ok(())
    }

    // === Deferred changes ===

    pub fn request_create(&mut self, create: PendingCreate) {
        self.pending_creates.push(create);
    }

    pub fn request_destroy(&mut self, id: ScopeId) {
        if !self.pending_destroys.contains(&id) {
            self.pending_destroys.push(id);
        }
    }

    pub fn pending_creates(&self) -> &[PendingCreate] {
        &self.pending_creates
    }

    pub fn pending_destroys(&self) -> &[ScopeId] {
        &self.pending_destroys
    }

    /// Apply requested creates, then destroys
    pub fn apply_pending(&mut self) -> Result<()> {
        for create in core::mem::take(&mut self.pending_creates) {
            if !self.arena.contains(create.container) {
                log::warn!("Dropping create of `{}`: container is gone", create.name);
                continue;
            }
            let id = self
                .arena
                .append_scope_of_class(create.container, &create.key, &create.class)?;
            self.arena.append(id, "Name")?.set(0, create.name)?;
            self.bind_reaction(id)?;
            log::debug!("Created {} {} in {}", create.class, id, create.container);
        }
        for id in core::mem::take(&mut self.pending_destroys) {
            if self.arena.contains(id) {
                self.arena.destroy(id)?;
                log::debug!("Destroyed {}", id);
            }
        }
        Ok(())
    }

    // === Events ===

    /// Subscribe the reaction at `id`; `false` if it is not a reaction or
    /// already subscribed
    pub fn bind_reaction(&mut self, id: ScopeId) -> Result<bool> {
        let Some(reaction) = self.arena.object_as::<ReactionAttributed>(id) else {
            return Ok(false);
        };
        reaction.hook.bind(id);
        let hook: Arc<dyn Subscriber<World>> = reaction.hook.clone();
        Ok(self.bus.subscribe::<EventMessage>(Arc::downgrade(&hook)))
    }

    /// Subscribe every reaction in the tree; returns how many were new
    pub fn bind_reactions(&mut self) -> Result<usize> {
        let mut bound = 0;
        for id in self.arena.descendants(self.root)? {
            if self.bind_reaction(id)? {
                bound += 1;
            }
        }
        log::debug!("Bound {} reactions", bound);
        Ok(bound)
    }

    /// Queue `payload` to publish once `delay` has elapsed
    pub fn enqueue_event<T: Send + Sync + 'static>(&mut self, payload: T, delay: Duration) {
        let event = self.bus.event(payload);
        self.queue.enqueue(event, &self.time, delay);
    }

    /// Publish `payload` immediately; returns how many subscribers saw it
    pub fn publish<T: Send + Sync + 'static>(&mut self, payload: T) -> Result<usize> {
        let event = self.bus.event(payload);
        Ok(event.publish(self)?)
    }

    // === Whole-tree operations ===

    /// Drop the tree contents, queued events and pending changes
    pub fn reset(&mut self) -> Result<()> {
        self.arena.clear(self.root)?;
        self.queue.clear();
        self.pending_creates.clear();
        self.pending_destroys.clear();
        self.time = GameTime::new();
        Ok(())
    }

    /// JSON rendering of the tree
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(self.arena.to_json(self.root)?)
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("root", &self.root)
            .field("scopes", &self.arena.len())
            .field("time", &self.time)
            .field("queued", &self.queue.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gameplay_types_registered() {
        let world = World::new().unwrap();
        let registry = world.arena().registry();
        for name in [
            "GameObject",
            "ActionList",
            "ActionIncrement",
            "ActionListIf",
            "ActionExpression",
            "ActionCreateAction",
            "ActionDestroyAction",
            "ActionEvent",
            "ReactionAttributed",
        ] {
            assert!(registry.contains_name(name), "{name}");
        }
    }

    #[test]
    fn test_reaction_inherits_list_layout() {
        let mut world = World::new().unwrap();
        let root = world.root();
        let reaction = world
            .arena_mut()
            .append_scope_of_class(root, "Listener", "ReactionAttributed")
            .unwrap();
        let keys: Vec<&str> = world.arena().keys(reaction).unwrap().collect();
        assert_eq!(keys, vec!["this", "Name", "Actions", "Subtype"]);
    }

    #[test]
    fn test_pending_applied_after_pass() {
        let mut world = World::new().unwrap();
        let root = world.root();
        let doomed = world.arena_mut().append_scope(root, "Doomed").unwrap();

        world.request_create(PendingCreate {
            container: root,
            key: "Actions".into(),
            class: "ActionIncrement".into(),
            name: "Spawned".into(),
        });
        world.request_destroy(doomed);
        world.request_destroy(doomed);
        assert_eq!(world.pending_destroys().len(), 1);

        world.apply_pending().unwrap();
        assert!(!world.arena().contains(doomed));
        let spawned = world.arena().at(root, "Actions").unwrap().get_scope(0).unwrap();
        assert_eq!(
            world.arena().at(spawned, "Name").unwrap().get_string(0).unwrap(),
            "Spawned"
        );
        assert!(world.pending_creates().is_empty());
    }

    #[test]
    fn test_reset() {
        let mut world = World::new().unwrap();
        let root = world.root();
        world.arena_mut().append(root, "Score").unwrap().push_back(1).unwrap();
        world.enqueue_event(EventMessage::new("x"), Duration::from_secs(1));
        world.reset().unwrap();
        assert_eq!(world.arena().size(root).unwrap(), 0);
        assert!(world.queue().is_empty());
    }
}
