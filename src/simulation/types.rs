//! Core types for the rail simulation
//!
//! Points, identifiers, angle helpers and the constants shared by the
//! geometry and the train logic.

use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};
use std::fmt;
use std::ops::{Add, Sub};
use uuid::Uuid;

/// A unique identifier for simulation entities
/// This is a simple wrapper around a usize for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SimId(pub usize);

/// A wrapper type for station IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StationId(pub SimId);

/// A wrapper type for train IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrainId(pub SimId);

/// A wrapper type for passenger IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassengerId(pub SimId);

/// Stable identifier of a track segment.
///
/// Segments keep their id for their whole life, and the id is what the JSON
/// exchange format refers to in `atStart`/`atEnd`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SegmentId(pub Uuid);

impl SegmentId {
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(Self(Uuid::parse_str(text)?))
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A 2D position in the simulation (y axis pointing up)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn lerp(&self, other: &Point, t: f64) -> Point {
        Point {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    /// Angle of the vector from this point to another, in radians
    pub fn angle_to(&self, other: &Point) -> f64 {
        (other.y - self.y).atan2(other.x - self.x)
    }

    /// Point reached by walking `distance` from here in direction `angle`
    pub fn offset(&self, angle: f64, distance: f64) -> Point {
        Point {
            x: self.x + angle.cos() * distance,
            y: self.y + angle.sin() * distance,
        }
    }

    pub fn is_near(&self, other: &Point) -> bool {
        self.distance(other) <= POSITION_TOLERANCE
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Side of the track relative to the direction of travel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Alignment {
    Left,
    Right,
}

impl Alignment {
    /// Sideways direction for this side, given the heading of the track
    pub fn normal_angle(self, heading: f64) -> f64 {
        match self {
            Alignment::Left => heading + PI / 2.0,
            Alignment::Right => heading - PI / 2.0,
        }
    }
}

/// One of the two ends of a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Start,
    End,
}

impl Endpoint {
    pub fn opposite(self) -> Endpoint {
        match self {
            Endpoint::Start => Endpoint::End,
            Endpoint::End => Endpoint::Start,
        }
    }
}

/// Normalizes an angle into (-π, π]
pub fn normalize_angle(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Compares two angles modulo a full turn
pub fn angles_equal(a: f64, b: f64) -> bool {
    normalize_angle(a - b).abs() <= ANGLE_TOLERANCE
}

/// Two endpoints closer than this are considered the same point
pub const POSITION_TOLERANCE: f64 = 1e-4;

/// Two headings closer than this (after wraparound) are considered continuous
pub const ANGLE_TOLERANCE: f64 = 1e-4;

/// Trains closer than this collide
pub const COLLISION_DISTANCE: f64 = 10.0;

/// Arc length between consecutive cars of a train
pub const CAR_SPACING: f64 = 12.0;

/// Sideways distance between the track and a station's platform
pub const STATION_OFFSET: f64 = 8.0;

/// How far onto each candidate a train looks when picking a turn
pub const JUNCTION_LOOKAHEAD: f64 = 10.0;
