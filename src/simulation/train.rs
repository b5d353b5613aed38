//! Trains and how they move
//!
//! The authoritative state of a train is its `TrackLocation`. Position and
//! heading are derived from it after every update. All movement consumes
//! virtual time in a loop, so one long update and many short ones end in the
//! same place.

use anyhow::{Context, Result};
use log::{debug, trace, warn};
use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use std::collections::{HashMap, VecDeque};

use super::events::SimEvent;
use super::navigation::{entry_reversing, exit_endpoint, exit_neighbors, TrackLocation};
use super::network::Network;
use super::segment::{TrackSegment, TrainStartPosition};
use super::station::Passenger;
use super::types::{
    normalize_angle, Point, SegmentId, StationId, TrainId, CAR_SPACING, JUNCTION_LOOKAHEAD,
};

/// Safety net against a tick that never runs out of time
const MAX_STEPS: usize = 10_000;

/// Leftover time below this is treated as zero
const TIME_EPSILON: f64 = 1e-9;

const DISTANCE_EPSILON: f64 = 1e-9;

/// Upper bound on how many upstream segments are walked when seeding history
const MAX_SEED_HOPS: usize = 64;

/// Tunable train parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainConfig {
    /// Cruising speed in units per second
    pub speed: f64,
    /// Seconds of cruising distance over which the train brakes for a station
    pub slowdown: f64,
    /// Base dwell at a station, in milliseconds
    pub wait_time: f64,
    /// Extra dwell per passenger boarding or alighting, in milliseconds
    pub wait_time_per_passenger: f64,
    pub following_car_count: usize,
    pub capacity: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            speed: 60.0,
            slowdown: 0.5,
            wait_time: 2000.0,
            wait_time_per_passenger: 500.0,
            following_car_count: 2,
            capacity: 6,
        }
    }
}

/// How a train picks its way through a junction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Strategy {
    TurnLeft,
    #[default]
    TurnRight,
    Random,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrainState {
    Moving,
    Dwelling { station: StationId, remaining_ms: f64 },
}

/// A trailing car, placed along the path the lead car already travelled
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FollowingCar {
    pub location: TrackLocation,
    pub position: Point,
    pub heading: f64,
}

/// A segment the train left behind, with the direction it was travelled in
#[derive(Debug, Clone, Copy, PartialEq)]
struct PathEntry {
    segment: SegmentId,
    reversing: bool,
}

/// Everything a train touches outside itself during an update
pub struct TickContext<'a> {
    pub network: &'a Network,
    pub waiting: &'a mut HashMap<StationId, VecDeque<Passenger>>,
    pub rng: &'a mut StdRng,
    pub events: &'a mut Vec<SimEvent>,
}

#[derive(Debug, Clone)]
pub struct Train {
    pub id: TrainId,
    pub location: TrackLocation,
    pub position: Point,
    pub heading: f64,
    pub passengers: Vec<Passenger>,
    pub following_cars: Vec<FollowingCar>,
    pub config: TrainConfig,
    pub strategy: Strategy,
    pub state: TrainState,

    /// Station the train last stopped at on its current segment
    served_station: Option<StationId>,

    /// Segments travelled before the current one, most recent first
    history: VecDeque<PathEntry>,

    at_dead_end: bool,
}

impl Train {
    /// Places a train on `segment` at a start position
    pub fn new(
        id: TrainId,
        network: &Network,
        segment_id: SegmentId,
        start: TrainStartPosition,
        config: TrainConfig,
        strategy: Strategy,
    ) -> Result<Self> {
        let segment = network
            .segment(segment_id)
            .with_context(|| format!("Segment {} not found", segment_id))?;
        let length = segment.length();
        let distance = start.distance_along.clamp(0.0, length);
        let travelled = if start.reverse {
            length - distance
        } else {
            distance
        };

        let mut train = Self {
            id,
            location: TrackLocation::new(segment_id, travelled, start.reverse),
            position: Point::default(),
            heading: 0.0,
            passengers: Vec::new(),
            following_cars: Vec::new(),
            config,
            strategy,
            state: TrainState::Moving,
            served_station: None,
            history: VecDeque::new(),
            at_dead_end: false,
        };
        train.seed_history(network);
        train.refresh(network);
        Ok(train)
    }

    pub fn is_dwelling(&self) -> bool {
        matches!(self.state, TrainState::Dwelling { .. })
    }

    pub fn is_at_dead_end(&self) -> bool {
        self.at_dead_end
    }

    pub fn car_positions(&self) -> Vec<Point> {
        self.following_cars.iter().map(|car| car.position).collect()
    }

    /// Speed in units per millisecond
    fn speed_per_ms(&self) -> f64 {
        self.config.speed / 1000.0
    }

    /// Distance before a station at which braking starts
    fn braking_distance(&self) -> f64 {
        (self.config.speed * self.config.slowdown).max(0.0)
    }

    /// Advances the train by `delta_ms` of simulated time
    pub fn update(&mut self, delta_ms: f64, ctx: &mut TickContext<'_>) {
        let mut remaining = delta_ms;
        let mut steps = 0;

        while remaining > TIME_EPSILON {
            steps += 1;
            if steps > MAX_STEPS {
                warn!("Train {:?} gave up on {:.3}ms it could not use", self.id, remaining);
                break;
            }

            match self.state {
                TrainState::Dwelling {
                    station,
                    remaining_ms,
                } => {
                    if remaining_ms > remaining {
                        self.state = TrainState::Dwelling {
                            station,
                            remaining_ms: remaining_ms - remaining,
                        };
                        remaining = 0.0;
                    } else {
                        remaining -= remaining_ms;
                        self.state = TrainState::Moving;
                        debug!("Train {:?} departs station {:?}", self.id, station);
                        ctx.events.push(SimEvent::TrainDeparted {
                            train: self.id,
                            station,
                        });
                    }
                }
                TrainState::Moving => {
                    if self.at_dead_end {
                        break;
                    }
                    remaining = self.advance(remaining, ctx);
                }
            }
        }

        self.refresh(ctx.network);
    }

    /// Moves until the time runs out or something happens (braking starts, a
    /// station is reached, a segment ends). Returns the unused time.
    fn advance(&mut self, time: f64, ctx: &mut TickContext<'_>) -> f64 {
        let network = ctx.network;
        let Some(segment) = network.segment(self.location.segment) else {
            warn!(
                "Train {:?} is on unknown segment {}, holding",
                self.id, self.location.segment
            );
            self.at_dead_end = true;
            return 0.0;
        };

        let speed = self.speed_per_ms();
        if speed <= 0.0 {
            return 0.0;
        }

        let position = self.location.distance_along;
        match self.next_stop(segment) {
            Some((station, stop_at)) => {
                let gap = (stop_at - position).max(0.0);
                let braking = self.braking_distance();

                if gap - braking > DISTANCE_EPSILON {
                    let cruise = gap - braking;
                    let needed = cruise / speed;
                    if needed > time {
                        self.location.distance_along += speed * time;
                        return 0.0;
                    }
                    self.location.distance_along = stop_at - braking;
                    return time - needed;
                }

                if braking <= DISTANCE_EPSILON {
                    let needed = gap / speed;
                    if needed > time {
                        self.location.distance_along += speed * time;
                        return 0.0;
                    }
                    self.location.distance_along = stop_at;
                    self.arrive(station, ctx);
                    return time - needed;
                }

                // Constant deceleration: speed falls with the square root of the
                // gap, so sqrt(gap) shrinks linearly in time
                let rate = speed / (2.0 * braking.sqrt());
                let root = gap.sqrt();
                let needed = root / rate;
                if needed > time {
                    let left = root - rate * time;
                    self.location.distance_along = stop_at - left * left;
                    return 0.0;
                }
                self.location.distance_along = stop_at;
                self.arrive(station, ctx);
                time - needed
            }
            None => {
                let length = segment.length();
                let to_end = (length - position).max(0.0);
                let needed = to_end / speed;
                if needed > time {
                    self.location.distance_along += speed * time;
                    return 0.0;
                }
                self.location.distance_along = length;
                self.cross_boundary(segment, ctx);
                time - needed
            }
        }
    }

    /// Nearest station still ahead on the current segment, with its distance
    /// in travel coordinates
    fn next_stop(&self, segment: &TrackSegment) -> Option<(StationId, f64)> {
        let length = segment.length();
        let position = self.location.distance_along;
        segment
            .stations()
            .filter(|(_, id)| Some(*id) != self.served_station)
            .map(|(distance, id)| {
                let travel = if self.location.reversing {
                    length - distance
                } else {
                    distance
                };
                (id, travel)
            })
            .filter(|(_, travel)| *travel >= position - DISTANCE_EPSILON)
            .min_by_key(|(_, travel)| OrderedFloat(*travel))
    }

    fn arrive(&mut self, station: StationId, ctx: &mut TickContext<'_>) {
        let mut handled = 0;

        let (delivered, riding): (Vec<Passenger>, Vec<Passenger>) = self
            .passengers
            .drain(..)
            .partition(|passenger| passenger.destination == station);
        self.passengers = riding;
        for passenger in delivered {
            handled += 1;
            ctx.events.push(SimEvent::PassengerDelivered {
                passenger: passenger.id,
                train: self.id,
                station,
            });
        }

        if self.passengers.len() < self.config.capacity {
            if let Some(passenger) = ctx
                .waiting
                .get_mut(&station)
                .and_then(|queue| queue.pop_front())
            {
                handled += 1;
                ctx.events.push(SimEvent::PassengerPickedUp {
                    passenger: passenger.id,
                    train: self.id,
                    station,
                });
                self.passengers.push(passenger);
            }
        }

        let dwell_ms =
            self.config.wait_time + self.config.wait_time_per_passenger * handled as f64;
        debug!(
            "Train {:?} stops at station {:?}, {} passengers handled, dwelling {:.0}ms",
            self.id, station, handled, dwell_ms
        );

        self.served_station = Some(station);
        self.state = TrainState::Dwelling {
            station,
            remaining_ms: dwell_ms,
        };
        ctx.events.push(SimEvent::TrainArrived {
            train: self.id,
            station,
            passengers_handled: handled,
            dwell_ms,
        });
    }

    fn cross_boundary(&mut self, segment: &TrackSegment, ctx: &mut TickContext<'_>) {
        let network = ctx.network;
        let junction = segment.endpoint(self.location.exit_endpoint());
        let candidates = exit_neighbors(segment, self.location.reversing);

        let next_id = match candidates {
            [] => None,
            [only] => Some(*only),
            _ => self.choose_branch(network, segment, &junction, candidates, ctx.rng),
        };

        let Some(next) = next_id.and_then(|id| network.segment(id)) else {
            warn!(
                "Train {:?} reached a dead end on segment {}",
                self.id,
                segment.id()
            );
            self.at_dead_end = true;
            ctx.events.push(SimEvent::DeadEnd {
                train: self.id,
                segment: segment.id(),
            });
            return;
        };

        self.history.push_front(PathEntry {
            segment: self.location.segment,
            reversing: self.location.reversing,
        });
        self.location = TrackLocation::new(next.id(), 0.0, entry_reversing(next, &junction));
        self.served_station = None;
        self.trim_history(network);
        trace!(
            "Train {:?} enters segment {} (reversing: {})",
            self.id,
            next.id(),
            self.location.reversing
        );
    }

    /// Picks among several outgoing segments according to the strategy.
    ///
    /// The turn of each candidate is the signed angle between the heading at
    /// the junction and the direction to a point a little way onto it.
    fn choose_branch(
        &self,
        network: &Network,
        segment: &TrackSegment,
        junction: &Point,
        candidates: &[SegmentId],
        rng: &mut StdRng,
    ) -> Option<SegmentId> {
        if self.strategy == Strategy::Random {
            return candidates.choose(rng).copied();
        }

        let heading = segment.angle_along(segment.length(), self.location.reversing);
        let turns = candidates.iter().filter_map(|id| {
            let candidate = network.segment(*id)?;
            let reversing = entry_reversing(candidate, junction);
            let ahead = candidate
                .position_along(JUNCTION_LOOKAHEAD.min(candidate.length()), reversing)
                .point;
            let turn = normalize_angle(junction.angle_to(&ahead) - heading);
            Some((*id, turn))
        });

        let choice = match self.strategy {
            Strategy::TurnLeft => turns.max_by_key(|(_, turn)| OrderedFloat(*turn)),
            _ => turns.min_by_key(|(_, turn)| OrderedFloat(*turn)),
        };
        choice.map(|(id, _)| id)
    }

    /// How far behind the lead car the last car sits
    fn trailing_length(&self) -> f64 {
        CAR_SPACING * self.config.following_car_count as f64
    }

    /// Drops history entries no car can reach anymore
    fn trim_history(&mut self, network: &Network) {
        let needed = self.trailing_length() - self.location.distance_along;
        let mut covered = 0.0;
        let mut keep = 0;
        for entry in &self.history {
            if covered >= needed {
                break;
            }
            covered += network
                .segment(entry.segment)
                .map_or(0.0, |segment| segment.length());
            keep += 1;
        }
        self.history.truncate(keep);
    }

    /// Fills the history with the segments leading into the start segment,
    /// so trailing cars have somewhere to sit before the train has moved
    fn seed_history(&mut self, network: &Network) {
        let mut needed = self.trailing_length() - self.location.distance_along;
        let mut current = self.location.segment;
        let mut reversing = self.location.reversing;

        for _ in 0..MAX_SEED_HOPS {
            if needed <= 0.0 {
                break;
            }
            let Some(segment) = network.segment(current) else {
                break;
            };
            let entry = exit_endpoint(reversing).opposite();
            let junction = segment.endpoint(entry);
            let Some(previous) = segment
                .neighbors(entry)
                .first()
                .and_then(|id| network.segment(*id))
            else {
                break;
            };

            // Travelling towards the junction
            let previous_reversing =
                previous.start().distance(&junction) < previous.end().distance(&junction);
            self.history.push_back(PathEntry {
                segment: previous.id(),
                reversing: previous_reversing,
            });
            needed -= previous.length();
            current = previous.id();
            reversing = previous_reversing;
        }
    }

    /// Recomputes the derived position and heading of the train and its cars
    fn refresh(&mut self, network: &Network) {
        let Some(segment) = network.segment(self.location.segment) else {
            return;
        };
        self.position = segment
            .position_along(self.location.distance_along, self.location.reversing)
            .point;
        self.heading = segment.angle_along(self.location.distance_along, self.location.reversing);

        self.following_cars = (0..self.config.following_car_count)
            .map(|index| self.trailing_car(network, CAR_SPACING * (index + 1) as f64))
            .collect();
    }

    /// Walks `behind` units back along the travelled path
    fn trailing_car(&self, network: &Network, behind: f64) -> FollowingCar {
        let mut remaining = behind;
        let mut location = self.location;

        if remaining > location.distance_along {
            remaining -= location.distance_along;
            let mut placed = false;
            for entry in &self.history {
                let Some(segment) = network.segment(entry.segment) else {
                    break;
                };
                let length = segment.length();
                location = TrackLocation::new(entry.segment, 0.0, entry.reversing);
                if remaining <= length {
                    location.distance_along = length - remaining;
                    placed = true;
                    break;
                }
                remaining -= length;
            }
            if !placed {
                // Ran out of track behind the train; park at the oldest known point
                location.distance_along = 0.0;
            }
        } else {
            location.distance_along -= remaining;
        }

        match network.segment(location.segment) {
            Some(segment) => FollowingCar {
                location,
                position: segment
                    .position_along(location.distance_along, location.reversing)
                    .point,
                heading: segment.angle_along(location.distance_along, location.reversing),
            },
            None => FollowingCar {
                location,
                position: self.position,
                heading: self.heading,
            },
        }
    }
}
