//! # kula_event - Kula Event System
//!
//! Publish/subscribe keyed by payload type:
//! - **EventBus**: weak subscriber lists per payload [`TypeId`](core::any::TypeId)
//! - **Event**: a shared payload published to a snapshot of live subscribers
//! - **EventQueue**: events held back until a delay has elapsed on the game clock
//!
//! Every subscriber receives a mutable context `C` (typically the world
//! that owns the bus) alongside the event.

pub mod bus;
pub mod error;
pub mod event;
pub mod queue;

pub use bus::{BusHandle, EventBus, Subscriber};
pub use error::{EventError, Result};
pub use event::Event;
pub use queue::{EventQueue, QueuedEvent};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::bus::{BusHandle, EventBus, Subscriber};
    pub use crate::error::EventError;
    pub use crate::event::Event;
    pub use crate::queue::EventQueue;
}
