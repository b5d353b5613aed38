//! JSON exchange format for networks
//!
//! A network is stored as a flat array of segment records. Connections refer
//! to other segments by id, so loading happens in two passes: every segment
//! is created first, then the `atStart`/`atEnd` lists are resolved.

use anyhow::{bail, Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::circular::CircularSegment;
use super::linear::LinearSegment;
use super::network::Network;
use super::segment::{SegmentGeometry, TrackSegment, TrainStartPosition};
use super::types::{Alignment, Endpoint, Point, SegmentId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationRecord {
    pub distance_along: f64,
    pub alignment: Alignment,
    pub name: String,
}

/// One segment as it appears in the JSON file. A `center` makes it an arc.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentRecord {
    pub id: String,
    pub start: Point,
    pub end: Point,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center: Option<Point>,
    #[serde(
        rename = "counterClockWise",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub counter_clockwise: Option<bool>,
    pub at_start: Vec<String>,
    pub at_end: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stations: Vec<StationRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub train_start_positions: Vec<TrainStartPosition>,
}

pub fn segment_to_record(network: &Network, segment: &TrackSegment) -> SegmentRecord {
    let (center, counter_clockwise) = match segment.geometry() {
        SegmentGeometry::Linear(_) => (None, None),
        SegmentGeometry::Circular(arc) => (Some(arc.center), Some(arc.counter_clockwise)),
    };

    let stations = segment
        .stations()
        .filter_map(|(_, id)| network.station(id))
        .map(|station| StationRecord {
            distance_along: station.distance_along,
            alignment: station.alignment,
            name: station.name.clone(),
        })
        .collect();

    SegmentRecord {
        id: segment.id().to_string(),
        start: segment.start(),
        end: segment.end(),
        center,
        counter_clockwise,
        at_start: segment.at_start().iter().map(|id| id.to_string()).collect(),
        at_end: segment.at_end().iter().map(|id| id.to_string()).collect(),
        stations,
        train_start_positions: segment.train_start_positions().to_vec(),
    }
}

pub fn network_to_records(network: &Network) -> Vec<SegmentRecord> {
    network
        .segments()
        .map(|segment| segment_to_record(network, segment))
        .collect()
}

pub fn network_to_json(network: &Network) -> Result<String> {
    serde_json::to_string_pretty(&network_to_records(network)).context("Failed to serialize network")
}

fn parse_id(text: &str) -> Result<SegmentId> {
    SegmentId::parse(text).with_context(|| format!("Malformed segment id '{}'", text))
}

fn geometry_from_record(record: &SegmentRecord) -> Result<SegmentGeometry> {
    Ok(match record.center {
        Some(center) => SegmentGeometry::Circular(
            CircularSegment::new(
                record.start,
                record.end,
                center,
                record.counter_clockwise.unwrap_or(false),
            )
            .with_context(|| format!("Invalid arc in segment {}", record.id))?,
        ),
        None => SegmentGeometry::Linear(LinearSegment::new(record.start, record.end)),
    })
}

/// Adds the segment, its stations and its start positions, without links.
/// On failure the network is left as it was.
fn add_unlinked(network: &mut Network, record: &SegmentRecord) -> Result<SegmentId> {
    let id = parse_id(&record.id)?;
    let segment = TrackSegment::with_id(id, geometry_from_record(record)?);
    network.add_segment(segment)?;

    if let Err(err) = attach_to_segment(network, id, record) {
        network.remove_segment(id)?;
        return Err(err);
    }
    Ok(id)
}

fn attach_to_segment(network: &mut Network, id: SegmentId, record: &SegmentRecord) -> Result<()> {
    for station in &record.stations {
        network
            .add_station(id, station.distance_along, station.alignment, station.name.clone())
            .with_context(|| format!("Invalid station '{}'", station.name))?;
    }
    for start in &record.train_start_positions {
        network.add_train_start_position(id, start.distance_along, start.reverse)?;
    }
    Ok(())
}

/// Builds a network from records, failing on the first inconsistency
pub fn records_to_network(records: &[SegmentRecord]) -> Result<Network> {
    let mut network = Network::new();

    let mut ids = Vec::with_capacity(records.len());
    for record in records {
        ids.push(add_unlinked(&mut network, record)?);
    }

    for (record, id) in records.iter().zip(ids) {
        for (endpoint, neighbors) in [
            (Endpoint::Start, &record.at_start),
            (Endpoint::End, &record.at_end),
        ] {
            for text in neighbors {
                let other = parse_id(text)?;
                if !network.contains_segment(other) {
                    bail!("Segment {} refers to unknown segment {}", id, other);
                }
                if let Some(segment) = network.segment_mut(id) {
                    segment.link(endpoint, other);
                }
            }
        }
    }

    let repaired = network.repair_reciprocal_links();
    if repaired > 0 {
        warn!("Repaired {} one-sided connections while loading", repaired);
    }
    Ok(network)
}

pub fn load_network_from_json(json: &str) -> Result<Network> {
    let records: Vec<SegmentRecord> =
        serde_json::from_str(json).context("Failed to parse network JSON")?;
    let network = records_to_network(&records)?;
    info!(
        "Loaded network with {} segments and {} stations",
        network.segment_count(),
        network.station_count()
    );
    Ok(network)
}

pub fn load_network_from_file(path: impl AsRef<Path>) -> Result<Network> {
    let path = path.as_ref();
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read network file {}", path.display()))?;
    load_network_from_json(&json).with_context(|| format!("Failed to load {}", path.display()))
}

pub fn save_network_to_file(network: &Network, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, network_to_json(network)?)
        .with_context(|| format!("Failed to write network file {}", path.display()))?;
    info!("Saved network to {}", path.display());
    Ok(())
}

/// Puts a previously exported segment back into a live network and relinks
/// it to whichever of its recorded neighbors still exist.
///
/// Fails without changing the network when one of those neighbors no longer
/// touches the segment.
pub fn insert_record(network: &mut Network, record: &SegmentRecord) -> Result<SegmentId> {
    let mut links = Vec::new();
    for (endpoint, neighbors) in [
        (Endpoint::Start, &record.at_start),
        (Endpoint::End, &record.at_end),
    ] {
        let point = match endpoint {
            Endpoint::Start => record.start,
            Endpoint::End => record.end,
        };
        for text in neighbors {
            let other = parse_id(text)?;
            let Some(neighbor) = network.segment(other) else {
                continue;
            };
            if neighbor.endpoint_at(&point).is_none() {
                bail!(
                    "Segment {} no longer touches segment {}",
                    other,
                    record.id
                );
            }
            links.push((endpoint, other));
        }
    }

    let id = add_unlinked(network, record)?;
    for (endpoint, other) in links {
        network.link_mutually(id, endpoint, other)?;
    }
    Ok(id)
}
