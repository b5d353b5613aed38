//! Walking the connection graph
//!
//! Whole-network reachability and the simple preview stepper. Trains use the
//! same location type and entry rules but make their own turn decisions.

use log::trace;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::Bfs;
use std::collections::HashMap;

use super::network::Network;
use super::segment::TrackSegment;
use super::types::{Endpoint, Point, SegmentId};

/// Upper bound on segment hops in a single walk
const MAX_HOPS: usize = 10_000;

/// A place on the network, as seen by something travelling along it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackLocation {
    pub segment: SegmentId,
    /// Distance travelled on the segment, from the end it was entered at
    pub distance_along: f64,
    /// Whether the segment is travelled from its end towards its start
    pub reversing: bool,
}

impl TrackLocation {
    pub fn new(segment: SegmentId, distance_along: f64, reversing: bool) -> Self {
        Self {
            segment,
            distance_along,
            reversing,
        }
    }

    /// Endpoint the segment is left through
    pub fn exit_endpoint(&self) -> Endpoint {
        exit_endpoint(self.reversing)
    }

    /// Endpoint the segment was entered through
    pub fn entry_endpoint(&self) -> Endpoint {
        exit_endpoint(self.reversing).opposite()
    }
}

pub fn exit_endpoint(reversing: bool) -> Endpoint {
    if reversing {
        Endpoint::Start
    } else {
        Endpoint::End
    }
}

/// Segments reachable when leaving `segment` in the given direction
pub fn exit_neighbors(segment: &TrackSegment, reversing: bool) -> &[SegmentId] {
    segment.neighbors(exit_endpoint(reversing))
}

/// Direction in which `next` is travelled when entered at `junction`:
/// entering at its end means travelling it in reverse.
pub fn entry_reversing(next: &TrackSegment, junction: &Point) -> bool {
    next.end().distance(junction) < next.start().distance(junction)
}

/// Whether every segment can be reached from every other one.
///
/// Runs a breadth-first search from the first segment. An empty network, or
/// one with a segment that has no connection at all, is not coherent.
pub fn is_network_coherent(network: &Network) -> bool {
    let mut graph: UnGraph<SegmentId, ()> = UnGraph::new_undirected();
    let mut nodes: HashMap<SegmentId, NodeIndex> = HashMap::new();

    for segment in network.segments() {
        nodes.insert(segment.id(), graph.add_node(segment.id()));
    }

    for segment in network.segments() {
        let from = nodes[&segment.id()];
        for neighbor in segment.all_neighbors() {
            if let Some(&to) = nodes.get(&neighbor) {
                graph.update_edge(from, to, ());
            }
        }
    }

    let Some(first) = network.segments().next() else {
        return false;
    };

    if graph
        .node_indices()
        .any(|node| graph.neighbors(node).next().is_none())
    {
        return false;
    }

    let mut bfs = Bfs::new(&graph, nodes[&first.id()]);
    let mut reached = 0;
    while bfs.next(&graph).is_some() {
        reached += 1;
    }

    reached == graph.node_count()
}

/// Point reached by travelling `distance` from `distance_along` on a segment.
///
/// This is the naive preview stepper: whenever the walk runs off a segment it
/// continues onto the FIRST segment connected at that end, without any turn
/// choice. Returns `None` when the walk runs into a dead end or an unknown
/// segment.
pub fn easy_navigate(
    network: &Network,
    segment: SegmentId,
    distance_along: f64,
    reverse: bool,
    distance: f64,
) -> Option<Point> {
    let mut current = network.segment(segment)?;
    let mut reverse = reverse;
    let mut remaining = distance_along + distance;

    for _ in 0..MAX_HOPS {
        let step = current.position_along(remaining, reverse);
        if step.excess == 0.0 || remaining < 0.0 {
            return Some(step.point);
        }

        remaining -= current.length();
        let next_id = *exit_neighbors(current, reverse).first()?;
        let next = network.segment(next_id)?;
        reverse = entry_reversing(next, &step.point);
        trace!(
            "Preview step from {} onto {} with {:.3} left",
            current.id(),
            next_id,
            remaining
        );
        current = next;
    }

    None
}
