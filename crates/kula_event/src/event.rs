//! Published events

use core::any::{Any, TypeId};
use core::fmt;
use std::sync::{Arc, Weak};

use crate::bus::{Registry, Subscriber, SubscriberList};
use crate::error::{EventError, Result};

/// A type-erased payload bound to the subscribers of its type
pub struct Event<C> {
    payload: Arc<dyn Any + Send + Sync>,
    payload_type: TypeId,
    type_name: &'static str,
    subscribers: Weak<SubscriberList<C>>,
}

impl<C> Event<C> {
    pub(crate) fn new<T: Send + Sync + 'static>(registry: &Registry<C>, payload: T) -> Self {
        let payload_type = TypeId::of::<T>();
        Self {
            payload: Arc::new(payload),
            payload_type,
            type_name: core::any::type_name::<T>(),
            subscribers: Arc::downgrade(&registry.list(payload_type)),
        }
    }

    /// Borrow the payload if it is a `T`
    pub fn payload<T: 'static>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.payload_type == TypeId::of::<T>()
    }

    pub fn payload_type(&self) -> TypeId {
        self.payload_type
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Notify every live subscriber of the payload type
    ///
    /// The live list is snapshotted (and pruned of dropped subscribers)
    /// before the first notification, so subscribers may subscribe or
    /// unsubscribe from inside `notify`: every member of the snapshot is
    /// notified exactly once and newcomers wait for the next publish.
    /// The first subscriber error stops delivery. Returns how many
    /// subscribers were notified.
    pub fn publish(&self, ctx: &mut C) -> Result<usize> {
        let list = self.subscribers.upgrade().ok_or(EventError::NotInitialized)?;
        let snapshot: Vec<Arc<dyn Subscriber<C>>> = {
            let mut live = list.lock();
            let mut snapshot = Vec::with_capacity(live.len());
            live.retain(|subscriber| match subscriber.upgrade() {
                Some(strong) => {
                    snapshot.push(strong);
                    true
                }
                None => false,
            });
            snapshot
        };

        log::trace!("Publishing {} to {} subscribers", self.type_name, snapshot.len());
        for subscriber in &snapshot {
            subscriber.notify(self, ctx)?;
        }
        Ok(snapshot.len())
    }
}

impl<C> Clone for Event<C> {
    fn clone(&self) -> Self {
        Self {
            payload: Arc::clone(&self.payload),
            payload_type: self.payload_type,
            type_name: self.type_name,
            subscribers: Weak::clone(&self.subscribers),
        }
    }
}

impl<C> fmt::Debug for Event<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("payload", &self.type_name)
            .finish()
    }
}
