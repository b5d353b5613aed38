//! Track segments
//!
//! A segment is either straight or a circular arc. Both kinds answer the same
//! geometric questions (length, position and heading at a distance, closest
//! point, rectangle overlap), and `TrackSegment` adds identity, connections
//! and the things attached to the track.

use anyhow::{bail, Result};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use sorted_vec::SortedVec;
use std::f64::consts::PI;

use super::circular::CircularSegment;
use super::linear::LinearSegment;
use super::types::{
    normalize_angle, Alignment, Endpoint, Point, SegmentId, StationId, POSITION_TOLERANCE,
};

/// Result of walking a distance along a segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionAlong {
    pub point: Point,
    /// Distance that did not fit on the segment, to be carried onto the next one
    pub excess: f64,
}

/// Closest point on a segment to some query point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestPoint {
    pub point: Point,
    /// Distance between the query and `point`
    pub distance: f64,
    /// Progress along the segment at `point`, from 0 to 1
    pub distance_along: f64,
    /// Side of the track the query lies on
    pub alignment: Alignment,
}

/// Axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Point,
    pub max: Point,
}

impl Bounds {
    /// Rectangle spanned by two opposite corners given in any order
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            min: Point::new(a.x.min(b.x), a.y.min(b.y)),
            max: Point::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    pub fn contains(&self, point: &Point) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            min: Point::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Point::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }
}

/// Where a train is placed when the simulation starts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainStartPosition {
    /// Measured from the segment's start, whatever the direction of travel
    pub distance_along: f64,
    pub reverse: bool,
}

/// The shape of a segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentGeometry {
    Linear(LinearSegment),
    Circular(CircularSegment),
}

impl SegmentGeometry {
    pub fn start(&self) -> Point {
        match self {
            SegmentGeometry::Linear(linear) => linear.start,
            SegmentGeometry::Circular(arc) => arc.start,
        }
    }

    pub fn end(&self) -> Point {
        match self {
            SegmentGeometry::Linear(linear) => linear.end,
            SegmentGeometry::Circular(arc) => arc.end,
        }
    }

    pub fn endpoint(&self, endpoint: Endpoint) -> Point {
        match endpoint {
            Endpoint::Start => self.start(),
            Endpoint::End => self.end(),
        }
    }

    pub fn length(&self) -> f64 {
        match self {
            SegmentGeometry::Linear(linear) => linear.length(),
            SegmentGeometry::Circular(arc) => arc.length(),
        }
    }

    /// Direction of travel at the start
    pub fn initial_angle(&self) -> f64 {
        match self {
            SegmentGeometry::Linear(linear) => linear.angle(),
            SegmentGeometry::Circular(arc) => normalize_angle(arc.initial_angle()),
        }
    }

    /// Direction of travel at the end
    pub fn final_angle(&self) -> f64 {
        match self {
            SegmentGeometry::Linear(linear) => linear.angle(),
            SegmentGeometry::Circular(arc) => normalize_angle(arc.final_angle()),
        }
    }

    pub fn endpoint_angle(&self, endpoint: Endpoint) -> f64 {
        match endpoint {
            Endpoint::Start => self.initial_angle(),
            Endpoint::End => self.final_angle(),
        }
    }

    fn point_at(&self, distance: f64) -> Point {
        match self {
            SegmentGeometry::Linear(linear) => linear.point_at(distance),
            SegmentGeometry::Circular(arc) => arc.point_at(distance),
        }
    }

    /// Point `distance` along the segment, measured from the travel start
    /// (the segment's end when `reverse` is set).
    ///
    /// Distances outside `[0, length]` clamp to the nearest travel endpoint and
    /// report how far they overshot in `excess`: `distance - length` past the
    /// end, `-distance` before the start.
    pub fn position_along(&self, distance: f64, reverse: bool) -> PositionAlong {
        let length = self.length();

        if distance > length {
            let point = if reverse { self.start() } else { self.end() };
            return PositionAlong {
                point,
                excess: distance - length,
            };
        }
        if distance < 0.0 {
            let point = if reverse { self.end() } else { self.start() };
            return PositionAlong {
                point,
                excess: -distance,
            };
        }

        let forward = if reverse { length - distance } else { distance };
        PositionAlong {
            point: self.point_at(forward),
            excess: 0.0,
        }
    }

    /// Heading at `distance` along the segment, in (-π, π]
    pub fn angle_along(&self, distance: f64, reverse: bool) -> f64 {
        let length = self.length();
        let clamped = distance.clamp(0.0, length);
        let forward = if reverse { length - clamped } else { clamped };
        let heading = match self {
            SegmentGeometry::Linear(linear) => linear.angle(),
            SegmentGeometry::Circular(arc) => arc.heading_at(forward),
        };
        if reverse {
            normalize_angle(heading + PI)
        } else {
            normalize_angle(heading)
        }
    }

    pub fn distance_to_position(&self, position: &Point) -> ClosestPoint {
        match self {
            SegmentGeometry::Linear(linear) => linear.distance_to_position(position),
            SegmentGeometry::Circular(arc) => arc.distance_to_position(position),
        }
    }

    /// Whether any part of the track lies inside the rectangle spanned by two corners
    pub fn is_within_rectangle(&self, corner_a: Point, corner_b: Point) -> bool {
        let rect = Bounds::from_corners(corner_a, corner_b);
        match self {
            SegmentGeometry::Linear(linear) => linear.is_within_rectangle(&rect),
            SegmentGeometry::Circular(arc) => arc.is_within_rectangle(&rect),
        }
    }

    pub fn bounds(&self) -> Bounds {
        match self {
            SegmentGeometry::Linear(linear) => linear.bounds(),
            SegmentGeometry::Circular(arc) => arc.bounds(),
        }
    }

    /// Cuts the geometry in two at `distance` from its start
    pub fn split_at(&self, distance: f64) -> Result<(SegmentGeometry, SegmentGeometry)> {
        let length = self.length();
        if distance <= 0.0 || distance >= length {
            bail!(
                "Split distance {} is outside the segment (length {})",
                distance,
                length
            );
        }
        let middle = self.point_at(distance);

        Ok(match self {
            SegmentGeometry::Linear(linear) => (
                SegmentGeometry::Linear(LinearSegment::new(linear.start, middle)),
                SegmentGeometry::Linear(LinearSegment::new(middle, linear.end)),
            ),
            SegmentGeometry::Circular(arc) => (
                SegmentGeometry::Circular(CircularSegment::new(
                    arc.start,
                    middle,
                    arc.center,
                    arc.counter_clockwise,
                )?),
                SegmentGeometry::Circular(CircularSegment::new(
                    middle,
                    arc.end,
                    arc.center,
                    arc.counter_clockwise,
                )?),
            ),
        })
    }

    /// Same shape with one endpoint moved. Arcs keep their center and winding,
    /// so the new point must lie on the arc's circle.
    pub fn with_endpoint(&self, endpoint: Endpoint, point: Point) -> Result<SegmentGeometry> {
        Ok(match (self, endpoint) {
            (SegmentGeometry::Linear(linear), Endpoint::Start) => {
                SegmentGeometry::Linear(LinearSegment::new(point, linear.end))
            }
            (SegmentGeometry::Linear(linear), Endpoint::End) => {
                SegmentGeometry::Linear(LinearSegment::new(linear.start, point))
            }
            (SegmentGeometry::Circular(arc), Endpoint::Start) => SegmentGeometry::Circular(
                CircularSegment::new(point, arc.end, arc.center, arc.counter_clockwise)?,
            ),
            (SegmentGeometry::Circular(arc), Endpoint::End) => SegmentGeometry::Circular(
                CircularSegment::new(arc.start, point, arc.center, arc.counter_clockwise)?,
            ),
        })
    }

    pub fn translated(&self, dx: f64, dy: f64) -> SegmentGeometry {
        let shift = Point::new(dx, dy);
        match self {
            SegmentGeometry::Linear(linear) => {
                SegmentGeometry::Linear(LinearSegment::new(linear.start + shift, linear.end + shift))
            }
            SegmentGeometry::Circular(arc) => SegmentGeometry::Circular(CircularSegment {
                start: arc.start + shift,
                end: arc.end + shift,
                center: arc.center + shift,
                counter_clockwise: arc.counter_clockwise,
            }),
        }
    }
}

/// A piece of track in a network
#[derive(Debug, Clone)]
pub struct TrackSegment {
    id: SegmentId,
    geometry: SegmentGeometry,
    pub(crate) at_start: Vec<SegmentId>,
    pub(crate) at_end: Vec<SegmentId>,
    /// Stations ordered by their distance from the start
    pub(crate) stations: SortedVec<(OrderedFloat<f64>, StationId)>,
    pub(crate) train_start_positions: Vec<TrainStartPosition>,
}

impl TrackSegment {
    pub fn new(geometry: SegmentGeometry) -> Self {
        Self::with_id(SegmentId::new_random(), geometry)
    }

    pub fn with_id(id: SegmentId, geometry: SegmentGeometry) -> Self {
        Self {
            id,
            geometry,
            at_start: Vec::new(),
            at_end: Vec::new(),
            stations: SortedVec::new(),
            train_start_positions: Vec::new(),
        }
    }

    pub fn linear(start: Point, end: Point) -> Self {
        Self::new(SegmentGeometry::Linear(LinearSegment::new(start, end)))
    }

    pub fn circular(start: Point, end: Point, center: Point, counter_clockwise: bool) -> Result<Self> {
        Ok(Self::new(SegmentGeometry::Circular(CircularSegment::new(
            start,
            end,
            center,
            counter_clockwise,
        )?)))
    }

    pub fn id(&self) -> SegmentId {
        self.id
    }

    pub fn geometry(&self) -> &SegmentGeometry {
        &self.geometry
    }

    pub(crate) fn set_geometry(&mut self, geometry: SegmentGeometry) {
        self.geometry = geometry;
    }

    pub fn is_circular(&self) -> bool {
        matches!(self.geometry, SegmentGeometry::Circular(_))
    }

    pub fn start(&self) -> Point {
        self.geometry.start()
    }

    pub fn end(&self) -> Point {
        self.geometry.end()
    }

    pub fn endpoint(&self, endpoint: Endpoint) -> Point {
        self.geometry.endpoint(endpoint)
    }

    pub fn length(&self) -> f64 {
        self.geometry.length()
    }

    pub fn initial_angle(&self) -> f64 {
        self.geometry.initial_angle()
    }

    pub fn final_angle(&self) -> f64 {
        self.geometry.final_angle()
    }

    pub fn position_along(&self, distance: f64, reverse: bool) -> PositionAlong {
        self.geometry.position_along(distance, reverse)
    }

    pub fn angle_along(&self, distance: f64, reverse: bool) -> f64 {
        self.geometry.angle_along(distance, reverse)
    }

    pub fn distance_to_position(&self, position: &Point) -> ClosestPoint {
        self.geometry.distance_to_position(position)
    }

    pub fn is_within_rectangle(&self, corner_a: Point, corner_b: Point) -> bool {
        self.geometry.is_within_rectangle(corner_a, corner_b)
    }

    pub fn bounds(&self) -> Bounds {
        self.geometry.bounds()
    }

    pub fn at_start(&self) -> &[SegmentId] {
        &self.at_start
    }

    pub fn at_end(&self) -> &[SegmentId] {
        &self.at_end
    }

    /// Segments connected at the given endpoint
    pub fn neighbors(&self, endpoint: Endpoint) -> &[SegmentId] {
        match endpoint {
            Endpoint::Start => &self.at_start,
            Endpoint::End => &self.at_end,
        }
    }

    pub(crate) fn neighbors_mut(&mut self, endpoint: Endpoint) -> &mut Vec<SegmentId> {
        match endpoint {
            Endpoint::Start => &mut self.at_start,
            Endpoint::End => &mut self.at_end,
        }
    }

    /// Adds a link unless it already exists
    pub(crate) fn link(&mut self, endpoint: Endpoint, other: SegmentId) -> bool {
        let neighbors = self.neighbors_mut(endpoint);
        if neighbors.contains(&other) {
            return false;
        }
        neighbors.push(other);
        true
    }

    /// Removes every link to `other`
    pub(crate) fn unlink(&mut self, other: SegmentId) -> bool {
        let before = self.at_start.len() + self.at_end.len();
        self.at_start.retain(|id| *id != other);
        self.at_end.retain(|id| *id != other);
        before != self.at_start.len() + self.at_end.len()
    }

    /// Whether either endpoint has a connection
    pub fn is_connected(&self) -> bool {
        !self.at_start.is_empty() || !self.at_end.is_empty()
    }

    pub fn all_neighbors(&self) -> impl Iterator<Item = SegmentId> + '_ {
        self.at_start.iter().chain(self.at_end.iter()).copied()
    }

    /// Stations on this segment as `(distance from start, id)`, nearest the start first
    pub fn stations(&self) -> impl Iterator<Item = (f64, StationId)> + '_ {
        self.stations
            .iter()
            .map(|(distance, id)| (distance.into_inner(), *id))
    }

    pub fn train_start_positions(&self) -> &[TrainStartPosition] {
        &self.train_start_positions
    }

    /// Endpoint lying at `point`, preferring the closer one when both do
    pub fn endpoint_at(&self, point: &Point) -> Option<Endpoint> {
        let to_start = self.start().distance(point);
        let to_end = self.end().distance(point);
        if to_start <= POSITION_TOLERANCE && to_start <= to_end {
            Some(Endpoint::Start)
        } else if to_end <= POSITION_TOLERANCE {
            Some(Endpoint::End)
        } else {
            None
        }
    }
}
