//! Simulation state for a running network
//!
//! Owns the trains, the passengers waiting at each station and the counters
//! that describe how the run is going. The network itself is borrowed on
//! every update so the editor stays the only owner of the track.

use anyhow::{bail, Result};
use log::{debug, info, trace, warn};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet, VecDeque};
use std::mem;

use super::controller::{ControlEvent, Controller};
use super::events::{EventDispatcher, EventKind, ListenerId, SimEvent};
use super::navigation::is_network_coherent;
use super::network::Network;
use super::segment::TrainStartPosition;
use super::station::Passenger;
use super::train::{Strategy, TickContext, Train, TrainConfig};
use super::types::{PassengerId, Point, SegmentId, SimId, StationId, TrainId, COLLISION_DISTANCE};

/// Settings for a simulation run
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub train: TrainConfig,

    /// Expected passengers per station per second
    pub passenger_spawn_rate: f64,

    /// How long passengers wait before giving up, in milliseconds
    pub passenger_patience_ms: Option<f64>,

    /// Trains closer than this collide
    pub collision_distance: f64,

    /// Seed for reproducible runs. `None` seeds from the OS.
    pub seed: Option<u64>,

    /// Junction policy trains start with
    pub default_strategy: Strategy,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            train: TrainConfig::default(),
            passenger_spawn_rate: 0.05,
            passenger_patience_ms: None,
            collision_distance: COLLISION_DISTANCE,
            seed: None,
            default_strategy: Strategy::default(),
        }
    }
}

/// What a renderer needs to draw one train
#[derive(Debug, Clone, PartialEq)]
pub struct TrainSnapshot {
    pub id: TrainId,
    pub position: Point,
    pub heading: f64,
    pub passengers: usize,
    pub car_positions: Vec<Point>,
    pub strategy: Strategy,
    pub selected: bool,
}

/// What a renderer needs to draw one station
#[derive(Debug, Clone, PartialEq)]
pub struct StationSnapshot {
    pub id: StationId,
    pub name: String,
    pub position: Point,
    pub waiting: usize,
}

/// Read-only view of the simulation after a tick
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationSnapshot {
    pub trains: Vec<TrainSnapshot>,
    pub stations: Vec<StationSnapshot>,
    pub collision: bool,
    pub time_ms: f64,
}

pub struct GameState {
    /// All trains, in spawn order
    pub trains: Vec<Train>,

    /// Index into `trains` of the train the controller steers
    pub selected_train: Option<usize>,

    /// Whether any two trains were in collision range on the last tick
    pub collision: bool,

    /// Simulated time in milliseconds
    pub time_ms: f64,

    /// Passengers that reached their destination
    pub delivered_passengers: usize,

    /// Passengers lost to collisions or impatience
    pub lost_passengers: usize,

    pub config: SimulationConfig,

    /// Passengers waiting at each station, oldest first
    waiting: HashMap<StationId, VecDeque<Passenger>>,

    /// Pairs in collision range on the last tick, lower id first
    colliding_pairs: HashSet<(TrainId, TrainId)>,

    pending_events: Vec<SimEvent>,

    dispatcher: EventDispatcher,

    controller: Option<Box<dyn Controller>>,

    rng: StdRng,

    next_id: usize,
}

impl GameState {
    pub fn new(config: SimulationConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Self {
            trains: Vec::new(),
            selected_train: None,
            collision: false,
            time_ms: 0.0,
            delivered_passengers: 0,
            lost_passengers: 0,
            config,
            waiting: HashMap::new(),
            colliding_pairs: HashSet::new(),
            pending_events: Vec::new(),
            dispatcher: EventDispatcher::new(),
            controller: None,
            rng,
            next_id: 0,
        }
    }

    pub fn with_controller(mut self, controller: Box<dyn Controller>) -> Self {
        self.controller = Some(controller);
        self
    }

    pub fn set_controller(&mut self, controller: Box<dyn Controller>) {
        self.controller = Some(controller);
    }

    pub fn subscribe<F>(&mut self, kind: EventKind, listener: F) -> ListenerId
    where
        F: FnMut(&SimEvent) + 'static,
    {
        self.dispatcher.subscribe(kind, listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.dispatcher.unsubscribe(id)
    }

    fn next_sim_id(&mut self) -> SimId {
        let id = SimId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Creates one train per start position in the network.
    ///
    /// Fails when some part of the network cannot be reached from the rest.
    pub fn initialize_trains(&mut self, network: &Network) -> Result<()> {
        if !is_network_coherent(network) {
            bail!("Cannot start the simulation: the network is not coherent");
        }

        self.trains.clear();
        self.waiting.clear();
        self.colliding_pairs.clear();
        self.collision = false;
        for station in network.stations() {
            self.waiting.insert(station.id, VecDeque::new());
        }

        let starts: Vec<(SegmentId, TrainStartPosition)> = network
            .segments()
            .flat_map(|segment| {
                segment
                    .train_start_positions()
                    .iter()
                    .map(move |start| (segment.id(), *start))
            })
            .collect();
        for (segment, start) in starts {
            self.spawn_train(network, segment, start)?;
        }

        self.selected_train = if self.trains.is_empty() { None } else { Some(0) };
        info!(
            "Initialized {} trains on {} segments with {} stations",
            self.trains.len(),
            network.segment_count(),
            network.station_count()
        );
        Ok(())
    }

    pub fn spawn_train(
        &mut self,
        network: &Network,
        segment: SegmentId,
        start: TrainStartPosition,
    ) -> Result<TrainId> {
        let id = TrainId(self.next_sim_id());
        let train = Train::new(
            id,
            network,
            segment,
            start,
            self.config.train,
            self.config.default_strategy,
        )?;
        debug!("Spawned train {:?} on segment {}", id, segment);
        self.trains.push(train);
        Ok(id)
    }

    pub fn train(&self, id: TrainId) -> Option<&Train> {
        self.trains.iter().find(|train| train.id == id)
    }

    pub fn selected(&self) -> Option<&Train> {
        self.selected_train.and_then(|index| self.trains.get(index))
    }

    pub fn waiting_count(&self, station: StationId) -> usize {
        self.waiting.get(&station).map_or(0, VecDeque::len)
    }

    pub fn total_waiting(&self) -> usize {
        self.waiting.values().map(VecDeque::len).sum()
    }

    pub fn passengers_on_trains(&self) -> usize {
        self.trains.iter().map(|train| train.passengers.len()).sum()
    }

    /// Queues a passenger at `station` outside the random spawn process
    pub fn add_waiting_passenger(&mut self, station: StationId, destination: StationId) -> PassengerId {
        let id = PassengerId(self.next_sim_id());
        let passenger = Passenger {
            id,
            origin: station,
            destination,
            patience: self.config.passenger_patience_ms,
            spawned_at_ms: self.time_ms,
        };
        self.waiting.entry(station).or_default().push_back(passenger);
        id
    }

    /// Advances the whole simulation by `delta_ms`
    pub fn update(&mut self, network: &Network, delta_ms: f64) {
        if delta_ms <= 0.0 {
            return;
        }

        let controls = self
            .controller
            .as_mut()
            .map(|controller| controller.drain())
            .unwrap_or_default();
        for control in controls {
            self.apply_control(control);
        }

        self.time_ms += delta_ms;
        let mut events = mem::take(&mut self.pending_events);

        self.spawn_passengers(network, delta_ms, &mut events);
        self.expire_passengers(&mut events);

        let mut ctx = TickContext {
            network,
            waiting: &mut self.waiting,
            rng: &mut self.rng,
            events: &mut events,
        };
        for train in &mut self.trains {
            train.update(delta_ms, &mut ctx);
        }

        self.detect_collisions(&mut events);

        self.pending_events = events;
        self.flush_events();
    }

    /// Applies one control command right away
    pub fn handle_control(&mut self, control: ControlEvent) {
        self.apply_control(control);
        self.flush_events();
    }

    fn apply_control(&mut self, control: ControlEvent) {
        let count = self.trains.len();
        if count == 0 {
            return;
        }

        match control {
            ControlEvent::NextTrain | ControlEvent::PreviousTrain => {
                let index = match (control, self.selected_train) {
                    (ControlEvent::NextTrain, Some(index)) => (index + 1) % count,
                    (ControlEvent::NextTrain, None) => 0,
                    (_, Some(index)) => (index + count - 1) % count,
                    (_, None) => count - 1,
                };
                self.selected_train = Some(index);
                self.pending_events.push(SimEvent::TrainSelected {
                    train: self.trains[index].id,
                });
            }
            ControlEvent::TurnLeft | ControlEvent::TurnRight => {
                let strategy = if control == ControlEvent::TurnLeft {
                    Strategy::TurnLeft
                } else {
                    Strategy::TurnRight
                };
                let Some(train) = self
                    .selected_train
                    .and_then(|index| self.trains.get_mut(index))
                else {
                    return;
                };
                train.strategy = strategy;
                debug!("Train {:?} now uses {:?}", train.id, strategy);
                self.pending_events.push(SimEvent::StrategyChanged {
                    train: train.id,
                    strategy,
                });
            }
        }
    }

    /// Each station independently produces a passenger with probability
    /// `1 - exp(-rate * dt)` and sends it to some other station
    fn spawn_passengers(&mut self, network: &Network, delta_ms: f64, events: &mut Vec<SimEvent>) {
        let rate = self.config.passenger_spawn_rate;
        if rate <= 0.0 || network.station_count() < 2 {
            return;
        }

        let probability = 1.0 - (-rate * delta_ms / 1000.0).exp();
        let stations: Vec<StationId> = network.stations().map(|station| station.id).collect();

        for &origin in &stations {
            if self.rng.random::<f64>() >= probability {
                continue;
            }
            let others: Vec<StationId> = stations
                .iter()
                .copied()
                .filter(|station| *station != origin)
                .collect();
            let Some(&destination) = others.choose(&mut self.rng) else {
                continue;
            };
            let passenger = self.add_waiting_passenger(origin, destination);
            trace!(
                "Passenger {:?} waits at {:?} for {:?}",
                passenger,
                origin,
                destination
            );
            events.push(SimEvent::PassengerSpawned {
                passenger,
                station: origin,
                destination,
            });
        }
    }

    fn expire_passengers(&mut self, events: &mut Vec<SimEvent>) {
        let now = self.time_ms;
        for (station, queue) in self.waiting.iter_mut() {
            let station = *station;
            queue.retain(|passenger| {
                if passenger.has_given_up(now) {
                    events.push(SimEvent::PassengerGaveUp {
                        passenger: passenger.id,
                        station,
                    });
                    false
                } else {
                    true
                }
            });
        }
    }

    /// Trains in range of each other lose their passengers. The event fires
    /// only when a pair comes into range, not on every tick it stays there.
    fn detect_collisions(&mut self, events: &mut Vec<SimEvent>) {
        let threshold = self.config.collision_distance;
        let mut in_range = HashSet::new();
        let mut involved = HashSet::new();

        for (index, first) in self.trains.iter().enumerate() {
            for (offset, second) in self.trains[index + 1..].iter().enumerate() {
                if first.position.distance(&second.position) < threshold {
                    let pair = if first.id <= second.id {
                        (first.id, second.id)
                    } else {
                        (second.id, first.id)
                    };
                    in_range.insert(pair);
                    involved.insert(index);
                    involved.insert(index + 1 + offset);
                }
            }
        }

        for index in involved {
            let train = &mut self.trains[index];
            self.lost_passengers += train.passengers.len();
            train.passengers.clear();
        }

        for pair in &in_range {
            if !self.colliding_pairs.contains(pair) {
                warn!("Trains {:?} and {:?} collided", pair.0, pair.1);
                events.push(SimEvent::Collision {
                    first: pair.0,
                    second: pair.1,
                });
            }
        }

        self.collision = !in_range.is_empty();
        self.colliding_pairs = in_range;
    }

    fn flush_events(&mut self) {
        for event in mem::take(&mut self.pending_events) {
            match event {
                SimEvent::PassengerDelivered { .. } => self.delivered_passengers += 1,
                SimEvent::PassengerGaveUp { .. } => self.lost_passengers += 1,
                _ => {}
            }
            self.dispatcher.dispatch(&event);
        }
    }

    pub fn snapshot(&self, network: &Network) -> SimulationSnapshot {
        let trains = self
            .trains
            .iter()
            .enumerate()
            .map(|(index, train)| TrainSnapshot {
                id: train.id,
                position: train.position,
                heading: train.heading,
                passengers: train.passengers.len(),
                car_positions: train.car_positions(),
                strategy: train.strategy,
                selected: self.selected_train == Some(index),
            })
            .collect();

        let stations = network
            .stations()
            .filter_map(|station| {
                Some(StationSnapshot {
                    id: station.id,
                    name: station.name.clone(),
                    position: network.station_position(station.id)?,
                    waiting: self.waiting_count(station.id),
                })
            })
            .collect();

        SimulationSnapshot {
            trains,
            stations,
            collision: self.collision,
            time_ms: self.time_ms,
        }
    }
}
