//! Stations and the passengers travelling between them

use super::types::{Alignment, PassengerId, SegmentId, StationId};

/// A stop placed on a segment
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    pub id: StationId,
    /// The segment the station belongs to
    pub segment: SegmentId,
    /// Distance from the segment's start
    pub distance_along: f64,
    /// Platform side relative to the segment's direction of travel
    pub alignment: Alignment,
    pub name: String,
}

/// A passenger waiting at a station or riding a train
#[derive(Debug, Clone, PartialEq)]
pub struct Passenger {
    pub id: PassengerId,
    pub origin: StationId,
    pub destination: StationId,
    /// How long the passenger is willing to wait, in milliseconds. `None` waits forever.
    pub patience: Option<f64>,
    /// Simulation time at which the passenger appeared
    pub spawned_at_ms: f64,
}

impl Passenger {
    pub fn has_given_up(&self, now_ms: f64) -> bool {
        match self.patience {
            Some(patience) => now_ms - self.spawned_at_ms > patience,
            None => false,
        }
    }
}
