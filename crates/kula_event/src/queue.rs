//! Delayed dispatch

use core::time::Duration;

use kula_core::GameTime;

use crate::event::Event;

/// An event waiting for its fire time
#[derive(Debug, Clone)]
pub struct QueuedEvent<C> {
    pub event: Event<C>,
    /// Game time at which the event was enqueued
    pub enqueued_at: Duration,
    pub delay: Duration,
}

impl<C> QueuedEvent<C> {
    pub fn fire_time(&self) -> Duration {
        self.enqueued_at + self.delay
    }

    pub fn is_due(&self, now: Duration) -> bool {
        now >= self.fire_time()
    }
}

/// Events held back until `delay` has elapsed on the game clock
pub struct EventQueue<C> {
    entries: Vec<QueuedEvent<C>>,
}

impl<C> EventQueue<C> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn enqueue(&mut self, event: Event<C>, time: &GameTime, delay: Duration) {
        log::trace!(
            "Queued {} at {:?} for {:?}",
            event.type_name(),
            time.total(),
            delay
        );
        self.entries.push(QueuedEvent {
            event,
            enqueued_at: time.total(),
            delay,
        });
    }

    /// Remove and return every due event, earliest fire time first
    ///
    /// Events with equal fire times keep their enqueue order.
    pub fn take_due(&mut self, time: &GameTime) -> Vec<Event<C>> {
        let now = time.total();
        let (mut due, pending): (Vec<_>, Vec<_>) = self
            .entries
            .drain(..)
            .partition(|entry| entry.is_due(now));
        self.entries = pending;
        due.sort_by_key(QueuedEvent::fire_time);
        due.into_iter().map(|entry| entry.event).collect()
    }

    /// Earliest pending fire time
    pub fn next_fire_time(&self) -> Option<Duration> {
        self.entries.iter().map(QueuedEvent::fire_time).min()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedEvent<C>> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<C> Default for EventQueue<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;

    fn at(ms: u64) -> GameTime {
        GameTime::at(Duration::from_millis(ms))
    }

    fn labels(events: &[Event<()>]) -> Vec<&'static str> {
        events
            .iter()
            .map(|event| *event.payload::<&'static str>().unwrap())
            .collect()
    }

    #[test]
    fn test_due_in_fire_order() {
        let bus = EventBus::<()>::new();
        let mut queue = EventQueue::new();
        queue.enqueue(bus.event("slow"), &at(0), Duration::from_millis(300));
        queue.enqueue(bus.event("fast"), &at(0), Duration::from_millis(100));
        queue.enqueue(bus.event("late start"), &at(50), Duration::from_millis(100));
        queue.enqueue(bus.event("tie"), &at(100), Duration::from_millis(50));

        assert!(queue.take_due(&at(99)).is_empty());
        assert_eq!(queue.next_fire_time(), Some(Duration::from_millis(100)));

        let due = queue.take_due(&at(150));
        assert_eq!(labels(&due), vec!["fast", "late start", "tie"]);
        assert_eq!(queue.len(), 1);

        let due = queue.take_due(&at(1000));
        assert_eq!(labels(&due), vec!["slow"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_zero_delay_is_due_immediately() {
        let bus = EventBus::<()>::new();
        let mut queue = EventQueue::new();
        queue.enqueue(bus.event("now"), &at(10), Duration::ZERO);
        assert_eq!(labels(&queue.take_due(&at(10))), vec!["now"]);
    }

    #[test]
    fn test_clear() {
        let bus = EventBus::<()>::new();
        let mut queue = EventQueue::new();
        queue.enqueue(bus.event("a"), &at(0), Duration::from_secs(1));
        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.next_fire_time(), None);
    }
}
