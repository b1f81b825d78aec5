//! Discrete-event simulation clock
//!
//! Events are kept in a min-heap ordered by time, then by insertion order,
//! so simultaneous events fire in the order they were scheduled.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

/// Identifier of a scheduled event
pub type EventId = u64;

/// Events dispatched by the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    /// Periodic telemetry update of one node
    TelemetryTick { node_id: u32 },
    /// End of the task currently running on a node
    TaskFinished { node_id: u32 },
}

struct Scheduled {
    id: EventId,
    time: f64,
    event: SimEvent,
}

impl Eq for Scheduled {}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Monotonic simulated-time counter with an event queue
pub struct Clock {
    now: f64,
    events: BinaryHeap<Scheduled>,
    canceled: HashSet<EventId>,
    event_count: u64,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            now: 0.0,
            events: BinaryHeap::new(),
            canceled: HashSet::new(),
            event_count: 0,
        }
    }

    /// Current simulated time in seconds
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Schedule an event `delay` simulated seconds from now.
    ///
    /// Negative delays are clamped to zero; the clock never moves backwards.
    pub fn schedule(&mut self, delay: f64, event: SimEvent) -> EventId {
        let id = self.event_count;
        self.event_count += 1;
        self.events.push(Scheduled {
            id,
            time: self.now + delay.max(0.0),
            event,
        });
        id
    }

    /// Cancel a scheduled event. Returns false if the event already fired,
    /// was already canceled or never existed.
    pub fn cancel(&mut self, id: EventId) -> bool {
        if id >= self.event_count || !self.events.iter().any(|e| e.id == id) {
            return false;
        }
        self.canceled.insert(id)
    }

    /// Time of the next live event
    pub fn peek_time(&mut self) -> Option<f64> {
        self.discard_canceled();
        self.events.peek().map(|e| e.time)
    }

    /// Pop the next live event due at or before `until`, moving the clock to
    /// its time.
    pub fn pop_until(&mut self, until: f64) -> Option<(EventId, SimEvent)> {
        self.discard_canceled();
        if self.events.peek()?.time > until {
            return None;
        }
        let next = self.events.pop()?;
        self.now = self.now.max(next.time);
        Some((next.id, next.event))
    }

    /// Move the clock forward to `time` without firing anything
    pub fn advance_to(&mut self, time: f64) {
        if time > self.now {
            self.now = time;
        }
    }

    /// Number of live scheduled events
    pub fn pending_events(&self) -> usize {
        self.events.len() - self.canceled.len()
    }

    fn discard_canceled(&mut self) {
        while let Some(head) = self.events.peek() {
            if !self.canceled.remove(&head.id) {
                break;
            }
            self.events.pop();
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(node_id: u32) -> SimEvent {
        SimEvent::TelemetryTick { node_id }
    }

    #[test]
    fn test_events_fire_in_time_order() {
        let mut clock = Clock::new();
        clock.schedule(3.0, tick(3));
        clock.schedule(1.0, tick(1));
        clock.schedule(2.0, tick(2));

        let mut fired = Vec::new();
        while let Some((_, event)) = clock.pop_until(10.0) {
            fired.push((clock.now(), event));
        }
        assert_eq!(fired, vec![(1.0, tick(1)), (2.0, tick(2)), (3.0, tick(3))]);
    }

    #[test]
    fn test_simultaneous_events_keep_insertion_order() {
        let mut clock = Clock::new();
        clock.schedule(1.0, tick(7));
        clock.schedule(1.0, SimEvent::TaskFinished { node_id: 7 });

        assert_eq!(clock.pop_until(1.0).map(|e| e.1), Some(tick(7)));
        assert_eq!(
            clock.pop_until(1.0).map(|e| e.1),
            Some(SimEvent::TaskFinished { node_id: 7 })
        );
    }

    #[test]
    fn test_pop_until_respects_horizon() {
        let mut clock = Clock::new();
        clock.schedule(5.0, tick(0));

        assert!(clock.pop_until(4.9).is_none());
        assert_eq!(clock.now(), 0.0);
        clock.advance_to(4.9);
        assert_eq!(clock.now(), 4.9);
        assert!(clock.pop_until(5.0).is_some());
        assert_eq!(clock.now(), 5.0);
    }

    #[test]
    fn test_cancel() {
        let mut clock = Clock::new();
        let first = clock.schedule(1.0, tick(0));
        clock.schedule(2.0, tick(1));

        assert!(clock.cancel(first));
        assert!(!clock.cancel(first));
        assert!(!clock.cancel(99));
        assert_eq!(clock.pending_events(), 1);
        assert_eq!(clock.peek_time(), Some(2.0));
        assert_eq!(clock.pop_until(10.0).map(|e| e.1), Some(tick(1)));
        assert!(clock.pop_until(10.0).is_none());
    }

    #[test]
    fn test_clock_is_monotonic() {
        let mut clock = Clock::new();
        clock.advance_to(10.0);
        clock.advance_to(4.0);
        assert_eq!(clock.now(), 10.0);

        clock.schedule(-3.0, tick(0));
        clock.pop_until(10.0);
        assert_eq!(clock.now(), 10.0);
    }
}
