//! Subscription registry
//!
//! Subscribers are held weakly, grouped by the [`TypeId`] of the payload
//! they listen for. The bus owns the registry; [`BusHandle`]s and
//! [`Event`]s only point at it, so both fail with
//! [`EventError::NotInitialized`] once the bus is dropped.

use core::any::TypeId;
use core::fmt;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::error::{EventError, Result};
use crate::event::Event;

/// Receiver of published events
///
/// `C` is the context handed to every notification (the game world, for
/// instance). Notification goes through `&self`; subscribers that keep
/// state use interior mutability.
pub trait Subscriber<C>: Send + Sync {
    fn notify(&self, event: &Event<C>, ctx: &mut C) -> Result<()>;
}

/// Live subscriber list for one payload type
pub(crate) type SubscriberList<C> = Mutex<Vec<Weak<dyn Subscriber<C>>>>;

/// Identity of a subscriber, ignoring the vtable
fn same_subscriber<C>(a: &Weak<dyn Subscriber<C>>, b: &Weak<dyn Subscriber<C>>) -> bool {
    core::ptr::eq(a.as_ptr() as *const (), b.as_ptr() as *const ())
}

pub(crate) struct Registry<C> {
    lists: Mutex<HashMap<TypeId, Arc<SubscriberList<C>>>>,
}

impl<C> Registry<C> {
    fn new() -> Self {
        Self {
            lists: Mutex::new(HashMap::new()),
        }
    }

    /// List for a payload type, created on first use
    pub(crate) fn list(&self, type_id: TypeId) -> Arc<SubscriberList<C>> {
        Arc::clone(self.lists.lock().entry(type_id).or_default())
    }

    fn subscribe(&self, type_id: TypeId, subscriber: Weak<dyn Subscriber<C>>) -> bool {
        let list = self.list(type_id);
        let mut live = list.lock();
        if live.iter().any(|existing| same_subscriber(existing, &subscriber)) {
            return false;
        }
        live.push(subscriber);
        log::trace!("Subscribed to {:?} ({} live)", type_id, live.len());
        true
    }

    fn unsubscribe(&self, type_id: TypeId, subscriber: &Weak<dyn Subscriber<C>>) -> bool {
        let Some(list) = self.lists.lock().get(&type_id).cloned() else {
            return false;
        };
        let mut live = list.lock();
        let before = live.len();
        live.retain(|existing| !same_subscriber(existing, subscriber));
        before != live.len()
    }

    fn clear(&self) {
        // Lists stay registered so outstanding events keep publishing
        for list in self.lists.lock().values() {
            list.lock().clear();
        }
        log::debug!("Cleared all event subscriptions");
    }

    fn subscriber_count(&self, type_id: TypeId) -> usize {
        self.lists
            .lock()
            .get(&type_id)
            .map(|list| {
                list.lock()
                    .iter()
                    .filter(|subscriber| subscriber.strong_count() > 0)
                    .count()
            })
            .unwrap_or(0)
    }
}

/// Owner of the subscription registry
pub struct EventBus<C> {
    registry: Arc<Registry<C>>,
}

impl<C: 'static> EventBus<C> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Registry::new()),
        }
    }

    /// Weak handle for use where the bus itself is not reachable
    pub fn handle(&self) -> BusHandle<C> {
        BusHandle {
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Subscribe to payloads of type `T`; `false` if already subscribed
    pub fn subscribe<T: 'static>(&self, subscriber: Weak<dyn Subscriber<C>>) -> bool {
        self.registry.subscribe(TypeId::of::<T>(), subscriber)
    }

    pub fn subscribe_type(&self, type_id: TypeId, subscriber: Weak<dyn Subscriber<C>>) -> bool {
        self.registry.subscribe(type_id, subscriber)
    }

    /// Remove a subscriber by identity; `false` if it was not subscribed
    pub fn unsubscribe<T: 'static>(&self, subscriber: &Weak<dyn Subscriber<C>>) -> bool {
        self.registry.unsubscribe(TypeId::of::<T>(), subscriber)
    }

    pub fn unsubscribe_type(&self, type_id: TypeId, subscriber: &Weak<dyn Subscriber<C>>) -> bool {
        self.registry.unsubscribe(type_id, subscriber)
    }

    /// Drop every subscription
    pub fn clear(&self) {
        self.registry.clear();
    }

    /// Live subscribers for payload type `T`
    pub fn subscriber_count<T: 'static>(&self) -> usize {
        self.registry.subscriber_count(TypeId::of::<T>())
    }

    /// Build an event carrying `payload`
    pub fn event<T: Send + Sync + 'static>(&self, payload: T) -> Event<C> {
        Event::new(&self.registry, payload)
    }
}

impl<C: 'static> Default for EventBus<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for EventBus<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("payload_types", &self.registry.lists.lock().len())
            .finish()
    }
}

/// Weak reference to an [`EventBus`]
pub struct BusHandle<C> {
    registry: Weak<Registry<C>>,
}

impl<C: 'static> BusHandle<C> {
    fn registry(&self) -> Result<Arc<Registry<C>>> {
        self.registry.upgrade().ok_or(EventError::NotInitialized)
    }

    /// Whether the bus is still alive
    pub fn is_alive(&self) -> bool {
        self.registry.strong_count() > 0
    }

    pub fn subscribe<T: 'static>(&self, subscriber: Weak<dyn Subscriber<C>>) -> Result<bool> {
        Ok(self.registry()?.subscribe(TypeId::of::<T>(), subscriber))
    }

    pub fn subscribe_type(&self, type_id: TypeId, subscriber: Weak<dyn Subscriber<C>>) -> Result<bool> {
        Ok(self.registry()?.subscribe(type_id, subscriber))
    }

    pub fn unsubscribe<T: 'static>(&self, subscriber: &Weak<dyn Subscriber<C>>) -> Result<bool> {
        Ok(self.registry()?.unsubscribe(TypeId::of::<T>(), subscriber))
    }

    pub fn unsubscribe_type(&self, type_id: TypeId, subscriber: &Weak<dyn Subscriber<C>>) -> Result<bool> {
        Ok(self.registry()?.unsubscribe(type_id, subscriber))
    }

    pub fn clear(&self) -> Result<()> {
        self.registry()?.clear();
        Ok(())
    }

    pub fn subscriber_count<T: 'static>(&self) -> Result<usize> {
        Ok(self.registry()?.subscriber_count(TypeId::of::<T>()))
    }

    pub fn event<T: Send + Sync + 'static>(&self, payload: T) -> Result<Event<C>> {
        let registry = self.registry()?;
        Ok(Event::new(&registry, payload))
    }
}

impl<C> Clone for BusHandle<C> {
    fn clone(&self) -> Self {
        Self {
            registry: Weak::clone(&self.registry),
        }
    }
}

impl<C> fmt::Debug for BusHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusHandle")
            .field("alive", &(self.registry.strong_count() > 0))
            .finish()
    }
}
