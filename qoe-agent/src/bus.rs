//! Ordered, synchronous fan-out to a set of listeners.
//!
//! The bus is generic over the listener type so the same bookkeeping backs
//! the view's monitor pipeline and the player's outbound listeners. Owners
//! that need to act between listeners (the view processes feedback events
//! depth-first) drive a [`Round`] themselves; everyone else uses
//! [`EventBus::dispatch`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

use tracing::warn;

pub type ListenerId = u64;

pub struct EventBus<L: ?Sized> {
    listeners: BTreeMap<ListenerId, Box<L>>,
    once: BTreeSet<ListenerId>,
    next_id: ListenerId,
}

/// Listener ids captured when a dispatch starts.
#[derive(Debug)]
pub struct Round {
    ids: Vec<ListenerId>,
}

impl Round {
    pub fn ids(&self) -> &[ListenerId] {
        &self.ids
    }
}

impl<L: ?Sized> Default for EventBus<L> {
    fn default() -> Self {
        Self {
            listeners: BTreeMap::new(),
            once: BTreeSet::new(),
            next_id: 0,
        }
    }
}

impl<L: ?Sized> EventBus<L> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&mut self, listener: Box<L>) -> ListenerId {
        let id = self.next_id;
        self.next_id += 1;
        self.listeners.insert(id, listener);
        id
    }

    /// Registers a listener removed after the first dispatch that reaches it.
    pub fn add_listener_once(&mut self, listener: Box<L>) -> ListenerId {
        let id = self.add_listener(listener);
        self.once.insert(id);
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> Option<Box<L>> {
        self.once.remove(&id);
        self.listeners.remove(&id)
    }

    pub fn remove_all_listeners(&mut self) {
        self.listeners.clear();
        self.once.clear();
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn get_mut(&mut self, id: ListenerId) -> Option<&mut L> {
        self.listeners.get_mut(&id).map(|listener| &mut **listener)
    }

    /// Snapshots the listeners registered so far, in ascending id order.
    /// Listeners added after this call are not part of the round.
    pub fn begin_round(&self) -> Round {
        Round {
            ids: self
                .listeners
                .keys()
                .copied()
                .filter(|id| *id < self.next_id)
                .collect(),
        }
    }

    /// Drops the fire-once listeners the round reached.
    pub fn end_round(&mut self, round: Round) {
        for id in round.ids {
            if self.once.remove(&id) {
                self.listeners.remove(&id);
            }
        }
    }

    /// Delivers to every listener in order. A failing listener is logged and
    /// does not stop delivery to the rest. Returns how many were called.
    pub fn dispatch<E, F>(&mut self, mut deliver: F) -> usize
    where
        E: Display,
        F: FnMut(&mut L) -> Result<(), E>,
    {
        let round = self.begin_round();
        let mut delivered = 0;
        for &id in round.ids() {
            let Some(listener) = self.get_mut(id) else {
                continue;
            };
            delivered += 1;
            if let Err(e) = deliver(listener) {
                warn!(listener = id, error = %e, "Listener failed to handle event");
            }
        }
        self.end_round(round);
        delivered
    }

    /// Visits every listener, e.g. to make it drain buffered work.
    pub fn flush(&mut self, mut drain: impl FnMut(&mut L)) {
        for listener in self.listeners.values_mut() {
            drain(listener);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Recorder {
        fn record(&mut self, event: &str) -> Result<(), String>;
        fn seen(&self) -> Vec<String>;
    }

    struct Log {
        name: &'static str,
        seen: Vec<String>,
        fail: bool,
    }

    impl Log {
        fn boxed(name: &'static str) -> Box<dyn Recorder> {
            Box::new(Self {
                name,
                seen: Vec::new(),
                fail: false,
            })
        }
    }

    impl Recorder for Log {
        fn record(&mut self, event: &str) -> Result<(), String> {
            self.seen.push(format!("{}:{event}", self.name));
            if self.fail {
                Err(format!("{} failed", self.name))
            } else {
                Ok(())
            }
        }

        fn seen(&self) -> Vec<String> {
            self.seen.clone()
        }
    }

    #[test]
    fn delivers_in_registration_order() {
        let mut bus: EventBus<dyn Recorder> = EventBus::new();
        let a = bus.add_listener(Log::boxed("a"));
        let b = bus.add_listener(Log::boxed("b"));
        assert!(a < b);
        assert_eq!(bus.dispatch(|l| l.record("play")), 2);
        assert_eq!(bus.get_mut(a).unwrap().seen(), ["a:play"]);
        assert_eq!(bus.get_mut(b).unwrap().seen(), ["b:play"]);
    }

    #[test]
    fn once_listeners_fire_a_single_time() {
        let mut bus: EventBus<dyn Recorder> = EventBus::new();
        bus.add_listener(Log::boxed("keep"));
        let once = bus.add_listener_once(Log::boxed("once"));
        bus.dispatch(|l| l.record("one"));
        assert!(bus.get_mut(once).is_none());
        assert_eq!(bus.dispatch(|l| l.record("two")), 1);
    }

    #[test]
    fn listeners_added_mid_round_wait_for_next_dispatch() {
        let mut bus: EventBus<dyn Recorder> = EventBus::new();
        bus.add_listener(Log::boxed("first"));
        let round = bus.begin_round();
        let late = bus.add_listener(Log::boxed("late"));
        for &id in round.ids() {
            bus.get_mut(id).unwrap().record("x").unwrap();
        }
        bus.end_round(round);
        assert!(bus.get_mut(late).unwrap().seen().is_empty());
    }

    #[test]
    fn failing_listener_does_not_stop_delivery() {
        let mut bus: EventBus<dyn Recorder> = EventBus::new();
        bus.add_listener(Box::new(Log {
            name: "bad",
            seen: Vec::new(),
            fail: true,
        }));
        let good = bus.add_listener(Log::boxed("good"));
        assert_eq!(bus.dispatch(|l| l.record("evt")), 2);
        assert_eq!(bus.get_mut(good).unwrap().seen(), ["good:evt"]);
    }

    #[test]
    fn removal_and_flush() {
        let mut bus: EventBus<dyn Recorder> = EventBus::new();
        let a = bus.add_listener(Log::boxed("a"));
        bus.add_listener(Log::boxed("b"));
        assert!(bus.remove_listener(a).is_some());
        let mut visited = 0;
        bus.flush(|_| visited += 1);
        assert_eq!(visited, 1);
        bus.remove_all_listeners();
        assert!(bus.is_empty());
    }
}
