//! Typed publish/subscribe for simulation events
//!
//! Listeners register for one `EventKind` and receive the matching `SimEvent`
//! variant. Renderers and UI hook in here instead of the simulation knowing
//! about them.

use std::collections::HashMap;
use std::fmt;

use super::train::Strategy;
use super::types::{PassengerId, SegmentId, StationId, TrainId};

/// Every kind of event the simulation emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PassengerSpawned,
    PassengerPickedUp,
    PassengerDelivered,
    PassengerGaveUp,
    TrainArrived,
    TrainDeparted,
    TrainSelected,
    StrategyChanged,
    DeadEnd,
    Collision,
}

/// An event together with its payload
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    PassengerSpawned {
        passenger: PassengerId,
        station: StationId,
        destination: StationId,
    },
    PassengerPickedUp {
        passenger: PassengerId,
        train: TrainId,
        station: StationId,
    },
    PassengerDelivered {
        passenger: PassengerId,
        train: TrainId,
        station: StationId,
    },
    PassengerGaveUp {
        passenger: PassengerId,
        station: StationId,
    },
    TrainArrived {
        train: TrainId,
        station: StationId,
        passengers_handled: usize,
        dwell_ms: f64,
    },
    TrainDeparted {
        train: TrainId,
        station: StationId,
    },
    TrainSelected {
        train: TrainId,
    },
    StrategyChanged {
        train: TrainId,
        strategy: Strategy,
    },
    DeadEnd {
        train: TrainId,
        segment: SegmentId,
    },
    Collision {
        first: TrainId,
        second: TrainId,
    },
}

impl SimEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            SimEvent::PassengerSpawned { .. } => EventKind::PassengerSpawned,
            SimEvent::PassengerPickedUp { .. } => EventKind::PassengerPickedUp,
            SimEvent::PassengerDelivered { .. } => EventKind::PassengerDelivered,
            SimEvent::PassengerGaveUp { .. } => EventKind::PassengerGaveUp,
            SimEvent::TrainArrived { .. } => EventKind::TrainArrived,
            SimEvent::TrainDeparted { .. } => EventKind::TrainDeparted,
            SimEvent::TrainSelected { .. } => EventKind::TrainSelected,
            SimEvent::StrategyChanged { .. } => EventKind::StrategyChanged,
            SimEvent::DeadEnd { .. } => EventKind::DeadEnd,
            SimEvent::Collision { .. } => EventKind::Collision,
        }
    }
}

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(usize);

type Listener = Box<dyn FnMut(&SimEvent)>;

/// Dispatches events to the listeners registered for their kind
#[derive(Default)]
pub struct EventDispatcher {
    listeners: HashMap<EventKind, Vec<(ListenerId, Listener)>>,
    next_id: usize,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, kind: EventKind, listener: F) -> ListenerId
    where
        F: FnMut(&SimEvent) + 'static,
    {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners
            .entry(kind)
            .or_default()
            .push((id, Box::new(listener)));
        id
    }

    /// Returns whether the listener was registered
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let mut removed = false;
        for listeners in self.listeners.values_mut() {
            let before = listeners.len();
            listeners.retain(|(listener_id, _)| *listener_id != id);
            removed |= listeners.len() != before;
        }
        removed
    }

    /// Calls every listener of the event's kind, in subscription order
    pub fn dispatch(&mut self, event: &SimEvent) {
        if let Some(listeners) = self.listeners.get_mut(&event.kind()) {
            for (_, listener) in listeners.iter_mut() {
                listener(event);
            }
        }
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.get(&kind).map_or(0, Vec::len)
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<&EventKind, usize> = self
            .listeners
            .iter()
            .map(|(kind, listeners)| (kind, listeners.len()))
            .collect();
        f.debug_struct("EventDispatcher")
            .field("listeners", &counts)
            .finish()
    }
}
