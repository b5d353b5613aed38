//! Track network
//!
//! Segments live in an arena keyed by their `SegmentId`, and connections are
//! stored as id lists on each segment. Every operation that touches two
//! segments goes through the network so both sides stay in step.

use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use ordered_float::OrderedFloat;
use sorted_vec::SortedVec;
use std::collections::{BTreeMap, HashMap};
use std::f64::consts::PI;

use super::segment::{Bounds, ClosestPoint, SegmentGeometry, TrackSegment, TrainStartPosition};
use super::station::Station;
use super::types::{
    angles_equal, Alignment, Endpoint, Point, SegmentId, SimId, StationId, POSITION_TOLERANCE,
    STATION_OFFSET,
};

const ENDPOINTS: [Endpoint; 2] = [Endpoint::Start, Endpoint::End];

/// Adjacency lists of one segment, used to undo connection edits
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Adjacency {
    pub at_start: Vec<SegmentId>,
    pub at_end: Vec<SegmentId>,
}

/// A collection of segments and the stations placed on them
#[derive(Debug, Clone, Default)]
pub struct Network {
    segments: HashMap<SegmentId, TrackSegment>,

    /// Insertion order of the segments
    order: Vec<SegmentId>,

    stations: BTreeMap<StationId, Station>,

    next_id: usize,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_station_id(&mut self) -> StationId {
        let id = StationId(SimId(self.next_id));
        self.next_id += 1;
        id
    }

    /// Adds a segment and returns its id. The segment keeps whatever links it
    /// already carries, so callers are responsible for their reciprocity.
    pub fn add_segment(&mut self, segment: TrackSegment) -> Result<SegmentId> {
        let id = segment.id();
        if self.segments.contains_key(&id) {
            bail!("Segment {} is already part of the network", id);
        }
        self.segments.insert(id, segment);
        self.order.push(id);
        Ok(id)
    }

    pub fn segment(&self, id: SegmentId) -> Option<&TrackSegment> {
        self.segments.get(&id)
    }

    pub(crate) fn segment_mut(&mut self, id: SegmentId) -> Option<&mut TrackSegment> {
        self.segments.get_mut(&id)
    }

    pub fn contains_segment(&self, id: SegmentId) -> bool {
        self.segments.contains_key(&id)
    }

    /// Segments in insertion order
    pub fn segments(&self) -> impl Iterator<Item = &TrackSegment> {
        self.order.iter().filter_map(|id| self.segments.get(id))
    }

    pub fn segment_ids(&self) -> &[SegmentId] {
        &self.order
    }

    pub fn segment_count(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Links `first` and `second` at every pair of coincident endpoints whose
    /// directions of travel line up (or at every coincident pair when
    /// `ignore_angles` is set).
    ///
    /// Meeting start-to-start or end-to-end only continues the track when the
    /// two segments face opposite ways. With `mutual` unset only `first`
    /// records the link. Returns whether any endpoint pair matched.
    pub fn connect(
        &mut self,
        first: SegmentId,
        second: SegmentId,
        ignore_angles: bool,
        mutual: bool,
    ) -> Result<bool> {
        if first == second {
            return Ok(false);
        }
        let a = self
            .segments
            .get(&first)
            .with_context(|| format!("Segment {} not found", first))?;
        let b = self
            .segments
            .get(&second)
            .with_context(|| format!("Segment {} not found", second))?;

        let mut pairs = Vec::new();
        for end_a in ENDPOINTS {
            for end_b in ENDPOINTS {
                if !a.endpoint(end_a).is_near(&b.endpoint(end_b)) {
                    continue;
                }
                if ignore_angles || is_continuous(a, end_a, b, end_b) {
                    pairs.push((end_a, end_b));
                }
            }
        }

        for &(end_a, end_b) in &pairs {
            if let Some(a) = self.segments.get_mut(&first) {
                a.link(end_a, second);
            }
            if mutual {
                if let Some(b) = self.segments.get_mut(&second) {
                    b.link(end_b, first);
                }
            }
        }

        Ok(!pairs.is_empty())
    }

    /// Removes the links between two segments on both sides.
    /// Returns whether anything was linked.
    pub fn disconnect(&mut self, first: SegmentId, second: SegmentId) -> bool {
        let mut changed = false;
        if let Some(a) = self.segments.get_mut(&first) {
            changed |= a.unlink(second);
        }
        if let Some(b) = self.segments.get_mut(&second) {
            changed |= b.unlink(first);
        }
        changed
    }

    /// Removes every link of a segment, on both sides
    pub fn disconnect_all(&mut self, id: SegmentId) {
        let neighbors: Vec<SegmentId> = match self.segments.get(&id) {
            Some(segment) => segment.all_neighbors().collect(),
            None => return,
        };
        for neighbor in neighbors {
            self.disconnect(id, neighbor);
        }
    }

    /// Connects every pair of segments that geometrically meet.
    ///
    /// Connections are derived from positions alone, so running this again
    /// never adds anything new.
    pub fn auto_connect(&mut self, ignore_angles: bool) -> usize {
        let ids = self.order.clone();
        let mut connected = 0;
        for (index, first) in ids.iter().enumerate() {
            for second in &ids[index + 1..] {
                if let Ok(true) = self.connect(*first, *second, ignore_angles, true) {
                    connected += 1;
                }
            }
        }
        debug!(
            "Auto-connect linked {} segment pairs out of {} segments",
            connected,
            ids.len()
        );
        connected
    }

    /// Axis-aligned box around every segment, or `None` for an empty network
    pub fn get_bounds(&self) -> Option<Bounds> {
        self.segments()
            .map(|segment| segment.bounds())
            .reduce(|acc, bounds| acc.union(&bounds))
    }

    /// Whether every link is recorded on both sides
    pub fn is_connection_symmetric(&self) -> bool {
        self.segments().all(|segment| {
            segment.all_neighbors().all(|neighbor| {
                self.segments
                    .get(&neighbor)
                    .is_some_and(|other| other.all_neighbors().any(|id| id == segment.id()))
            })
        })
    }

    /// Adds the missing half of one-sided links. Returns how many were added.
    pub fn repair_reciprocal_links(&mut self) -> usize {
        let mut missing = Vec::new();
        for segment in self.segments() {
            for endpoint in ENDPOINTS {
                let point = segment.endpoint(endpoint);
                for neighbor_id in segment.neighbors(endpoint) {
                    let Some(neighbor) = self.segments.get(neighbor_id) else {
                        continue;
                    };
                    if neighbor.all_neighbors().any(|id| id == segment.id()) {
                        continue;
                    }
                    let neighbor_end = neighbor.endpoint_at(&point).unwrap_or_else(|| {
                        if neighbor.start().distance(&point) <= neighbor.end().distance(&point) {
                            Endpoint::Start
                        } else {
                            Endpoint::End
                        }
                    });
                    missing.push((*neighbor_id, neighbor_end, segment.id()));
                }
            }
        }

        let count = missing.len();
        for (id, endpoint, other) in missing {
            if let Some(segment) = self.segments.get_mut(&id) {
                warn!("Segment {} was missing its link back to {}", id, other);
                segment.link(endpoint, other);
            }
        }
        count
    }

    pub fn adjacency(&self, id: SegmentId) -> Option<Adjacency> {
        self.segments.get(&id).map(|segment| Adjacency {
            at_start: segment.at_start.clone(),
            at_end: segment.at_end.clone(),
        })
    }

    /// Overwrites a segment's adjacency lists as they are, without touching neighbors
    pub(crate) fn set_adjacency(&mut self, id: SegmentId, adjacency: Adjacency) -> Result<()> {
        let segment = self
            .segments
            .get_mut(&id)
            .with_context(|| format!("Segment {} not found", id))?;
        segment.at_start = adjacency.at_start;
        segment.at_end = adjacency.at_end;
        Ok(())
    }

    /// Links `id` at `endpoint` to `other`, and `other` back at whichever of
    /// its endpoints touches the same point.
    pub(crate) fn link_mutually(&mut self, id: SegmentId, endpoint: Endpoint, other: SegmentId) -> Result<()> {
        let point = self
            .segments
            .get(&id)
            .with_context(|| format!("Segment {} not found", id))?
            .endpoint(endpoint);
        let other_segment = self
            .segments
            .get_mut(&other)
            .with_context(|| format!("Segment {} not found", other))?;
        let other_end = other_segment
            .endpoint_at(&point)
            .with_context(|| format!("Segment {} does not touch segment {}", other, id))?;
        other_segment.link(other_end, id);
        if let Some(segment) = self.segments.get_mut(&id) {
            segment.link(endpoint, other);
        }
        Ok(())
    }

    /// Moves one endpoint of a segment.
    ///
    /// Refused (returns `Ok(false)` and changes nothing) while the segment has
    /// any connection, since moving it would silently break a neighbor.
    pub fn move_endpoint(&mut self, id: SegmentId, endpoint: Endpoint, point: Point) -> Result<bool> {
        let segment = self
            .segments
            .get(&id)
            .with_context(|| format!("Segment {} not found", id))?;
        if segment.is_connected() {
            debug!("Refusing to move an endpoint of connected segment {}", id);
            return Ok(false);
        }
        let geometry = segment.geometry().with_endpoint(endpoint, point)?;
        self.replace_geometry(id, geometry)?;
        Ok(true)
    }

    /// Shifts a whole segment. Refused while the segment has any connection.
    pub fn translate_segment(&mut self, id: SegmentId, dx: f64, dy: f64) -> Result<bool> {
        let segment = self
            .segments
            .get(&id)
            .with_context(|| format!("Segment {} not found", id))?;
        if segment.is_connected() {
            debug!("Refusing to move connected segment {}", id);
            return Ok(false);
        }
        let geometry = segment.geometry().translated(dx, dy);
        self.replace_geometry(id, geometry)?;
        Ok(true)
    }

    /// Swaps the geometry and pulls stations and start positions back onto the track
    fn replace_geometry(&mut self, id: SegmentId, geometry: SegmentGeometry) -> Result<()> {
        let length = geometry.length();
        let segment = self
            .segments
            .get_mut(&id)
            .with_context(|| format!("Segment {} not found", id))?;
        segment.set_geometry(geometry);
        for start in &mut segment.train_start_positions {
            start.distance_along = start.distance_along.min(length);
        }

        let station_ids: Vec<StationId> = segment.stations().map(|(_, station)| station).collect();
        segment.stations = SortedVec::new();
        for station_id in station_ids {
            if let Some(station) = self.stations.get_mut(&station_id) {
                station.distance_along = station.distance_along.min(length);
                segment
                    .stations
                    .insert((OrderedFloat(station.distance_along), station_id));
            }
        }
        Ok(())
    }

    /// Removes a segment, its connections and the stations on it
    pub fn remove_segment(&mut self, id: SegmentId) -> Result<TrackSegment> {
        if !self.segments.contains_key(&id) {
            bail!("Segment {} not found", id);
        }
        self.disconnect_all(id);
        let segment = self
            .segments
            .remove(&id)
            .with_context(|| format!("Segment {} not found", id))?;
        self.order.retain(|other| *other != id);
        for (_, station) in segment.stations() {
            self.stations.remove(&station);
        }
        debug!("Removed segment {}", id);
        Ok(segment)
    }

    /// Replaces a segment by two halves meeting at `distance` from its start.
    ///
    /// Outer connections move to the matching half, the halves are linked to
    /// each other, and stations and train start positions go to the half that
    /// now holds them (second-half distances re-based to the split point).
    pub fn split_segment(&mut self, id: SegmentId, distance: f64) -> Result<(SegmentId, SegmentId)> {
        let original = self
            .segments
            .get(&id)
            .with_context(|| format!("Segment {} not found", id))?
            .clone();
        let (first_geometry, second_geometry) = original.geometry().split_at(distance)?;

        let mut first = TrackSegment::new(first_geometry);
        let mut second = TrackSegment::new(second_geometry);
        let first_id = first.id();
        let second_id = second.id();

        first.at_start = original.at_start.clone();
        second.at_end = original.at_end.clone();
        first.link(Endpoint::End, second_id);
        second.link(Endpoint::Start, first_id);

        for start in original.train_start_positions() {
            if start.distance_along < distance {
                first.train_start_positions.push(*start);
            } else {
                second.train_start_positions.push(TrainStartPosition {
                    distance_along: start.distance_along - distance,
                    reverse: start.reverse,
                });
            }
        }

        for (station_distance, station_id) in original.stations() {
            let Some(station) = self.stations.get_mut(&station_id) else {
                continue;
            };
            if station_distance < distance {
                station.segment = first_id;
                first.stations.insert((OrderedFloat(station_distance), station_id));
            } else {
                station.segment = second_id;
                station.distance_along = station_distance - distance;
                second
                    .stations
                    .insert((OrderedFloat(station.distance_along), station_id));
            }
        }

        // Point the outer neighbors at the new halves
        let neighbors: Vec<SegmentId> = original.all_neighbors().collect();
        for neighbor_id in neighbors {
            let Some(neighbor) = self.segments.get_mut(&neighbor_id) else {
                continue;
            };
            for endpoint in ENDPOINTS {
                if !neighbor.neighbors(endpoint).contains(&id) {
                    continue;
                }
                let point = neighbor.endpoint(endpoint);
                neighbor.neighbors_mut(endpoint).retain(|other| *other != id);
                let mut replaced = false;
                if original.at_start.contains(&neighbor_id) && point.is_near(&original.start()) {
                    neighbor.link(endpoint, first_id);
                    replaced = true;
                }
                if original.at_end.contains(&neighbor_id) && point.is_near(&original.end()) {
                    neighbor.link(endpoint, second_id);
                    replaced = true;
                }
                if !replaced {
                    warn!(
                        "Dropped link from {} to split segment {}: endpoints do not meet",
                        neighbor_id, id
                    );
                }
            }
        }

        let index = self
            .order
            .iter()
            .position(|other| *other == id)
            .context("Segment missing from network order")?;
        self.order[index] = first_id;
        self.order.insert(index + 1, second_id);
        self.segments.remove(&id);
        self.segments.insert(first_id, first);
        self.segments.insert(second_id, second);

        debug!("Split segment {} into {} and {}", id, first_id, second_id);
        Ok((first_id, second_id))
    }

    /// Places a station `distance_along` from the segment's start
    pub fn add_station(
        &mut self,
        segment_id: SegmentId,
        distance_along: f64,
        alignment: Alignment,
        name: impl Into<String>,
    ) -> Result<StationId> {
        let length = self
            .segments
            .get(&segment_id)
            .with_context(|| format!("Segment {} not found", segment_id))?
            .length();
        if distance_along < 0.0 || distance_along > length + POSITION_TOLERANCE {
            bail!(
                "Station distance {} is outside segment {} (length {})",
                distance_along,
                segment_id,
                length
            );
        }
        let distance_along = distance_along.min(length);

        let id = self.next_station_id();
        let station = Station {
            id,
            segment: segment_id,
            distance_along,
            alignment,
            name: name.into(),
        };
        if let Some(segment) = self.segments.get_mut(&segment_id) {
            segment.stations.insert((OrderedFloat(distance_along), id));
        }
        info!("Added station '{}' on segment {}", station.name, segment_id);
        self.stations.insert(id, station);
        Ok(id)
    }

    pub fn remove_station(&mut self, id: StationId) -> Result<Station> {
        let station = self
            .stations
            .remove(&id)
            .with_context(|| format!("Station {:?} not found", id))?;
        if let Some(segment) = self.segments.get_mut(&station.segment) {
            segment
                .stations
                .remove_item(&(OrderedFloat(station.distance_along), id));
        }
        Ok(station)
    }

    pub fn station(&self, id: StationId) -> Option<&Station> {
        self.stations.get(&id)
    }

    /// Stations in creation order
    pub fn stations(&self) -> impl Iterator<Item = &Station> {
        self.stations.values()
    }

    pub fn station_count(&self) -> usize {
        self.stations.len()
    }

    /// Stations on one segment, nearest its start first
    pub fn stations_on(&self, segment_id: SegmentId) -> Vec<&Station> {
        self.segments
            .get(&segment_id)
            .map(|segment| {
                segment
                    .stations()
                    .filter_map(|(_, id)| self.stations.get(&id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Where the station's platform sits: beside the track, on its alignment side
    pub fn station_position(&self, id: StationId) -> Option<Point> {
        let station = self.stations.get(&id)?;
        let segment = self.segments.get(&station.segment)?;
        let on_track = segment.position_along(station.distance_along, false).point;
        let heading = segment.angle_along(station.distance_along, false);
        Some(on_track.offset(station.alignment.normal_angle(heading), STATION_OFFSET))
    }

    pub fn add_train_start_position(
        &mut self,
        segment_id: SegmentId,
        distance_along: f64,
        reverse: bool,
    ) -> Result<()> {
        let segment = self
            .segments
            .get_mut(&segment_id)
            .with_context(|| format!("Segment {} not found", segment_id))?;
        let length = segment.length();
        if distance_along < 0.0 || distance_along > length + POSITION_TOLERANCE {
            bail!(
                "Train start distance {} is outside segment {} (length {})",
                distance_along,
                segment_id,
                length
            );
        }
        segment.train_start_positions.push(TrainStartPosition {
            distance_along: distance_along.min(length),
            reverse,
        });
        Ok(())
    }

    /// Segment nearest to a point
    pub fn find_closest_segment(&self, point: &Point) -> Option<(SegmentId, ClosestPoint)> {
        self.segments()
            .map(|segment| (segment.id(), segment.distance_to_position(point)))
            .min_by_key(|(_, closest)| OrderedFloat(closest.distance))
    }

    /// Segments overlapping the rectangle spanned by two corners
    pub fn segments_in_rectangle(&self, corner_a: Point, corner_b: Point) -> Vec<SegmentId> {
        self.segments()
            .filter(|segment| segment.is_within_rectangle(corner_a, corner_b))
            .map(|segment| segment.id())
            .collect()
    }
}

/// Whether travel continues smoothly from `a` into `b` through the given endpoints
fn is_continuous(a: &TrackSegment, end_a: Endpoint, b: &TrackSegment, end_b: Endpoint) -> bool {
    let angle_a = a.geometry().endpoint_angle(end_a);
    let angle_b = b.geometry().endpoint_angle(end_b);
    if end_a == end_b {
        angles_equal(angle_a, angle_b + PI)
    } else {
        angles_equal(angle_a, angle_b)
    }
}
