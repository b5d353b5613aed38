//! Network editing and connectivity

use rail_sim::simulation::{Alignment, Endpoint, Network, Point, SegmentId, TrackSegment};

const EPSILON: f64 = 1e-6;

fn line(network: &mut Network, from: (f64, f64), to: (f64, f64)) -> SegmentId {
    network
        .add_segment(TrackSegment::linear(
            Point::new(from.0, from.1),
            Point::new(to.0, to.1),
        ))
        .unwrap()
}

#[test]
fn test_connect_is_symmetric() {
    let mut network = Network::new();
    let a = line(&mut network, (0.0, 0.0), (10.0, 0.0));
    let b = line(&mut network, (10.0, 0.0), (20.0, 0.0));

    assert!(network.connect(a, b, false, true).unwrap());

    let first = network.segment(a).unwrap();
    let second = network.segment(b).unwrap();
    assert_eq!(first.at_end(), &[b]);
    assert!(first.at_start().is_empty());
    assert_eq!(second.at_start(), &[a]);
    assert!(second.at_end().is_empty());
    assert!(network.is_connection_symmetric());
}

#[test]
fn test_one_sided_connect() {
    let mut network = Network::new();
    let a = line(&mut network, (0.0, 0.0), (10.0, 0.0));
    let b = line(&mut network, (10.0, 0.0), (20.0, 0.0));

    assert!(network.connect(a, b, false, false).unwrap());
    assert_eq!(network.segment(a).unwrap().at_end(), &[b]);
    assert!(network.segment(b).unwrap().at_start().is_empty());
    assert!(!network.is_connection_symmetric());

    assert_eq!(network.repair_reciprocal_links(), 1);
    assert!(network.is_connection_symmetric());
}

#[test]
fn test_connect_requires_matching_angles() {
    let mut network = Network::new();
    let a = line(&mut network, (0.0, 0.0), (10.0, 0.0));
    let b = line(&mut network, (10.0, 0.0), (10.0, 10.0));

    assert!(!network.connect(a, b, false, true).unwrap());
    assert!(!network.segment(a).unwrap().is_connected());

    assert!(network.connect(a, b, true, true).unwrap());
    assert_eq!(network.segment(a).unwrap().at_end(), &[b]);
    assert_eq!(network.segment(b).unwrap().at_start(), &[a]);
}

#[test]
fn test_connect_start_to_start_needs_opposite_headings() {
    let mut network = Network::new();
    let a = line(&mut network, (0.0, 0.0), (10.0, 0.0));
    let opposite = line(&mut network, (0.0, 0.0), (-10.0, 0.0));
    let same = line(&mut network, (0.0, 0.0), (10.0, 5.0));

    assert!(network.connect(a, opposite, false, true).unwrap());
    assert_eq!(network.segment(a).unwrap().at_start(), &[opposite]);
    assert_eq!(network.segment(opposite).unwrap().at_start(), &[a]);

    assert!(!network.connect(a, same, false, true).unwrap());
}

#[test]
fn test_connect_arc_to_line() {
    let mut network = Network::new();
    let straight = line(&mut network, (0.0, 0.0), (10.0, 0.0));
    let curve = network
        .add_segment(
            TrackSegment::circular(
                Point::new(10.0, 0.0),
                Point::new(20.0, 10.0),
                Point::new(10.0, 10.0),
                true,
            )
            .unwrap(),
        )
        .unwrap();

    assert!(network.connect(straight, curve, false, true).unwrap());
    assert_eq!(network.segment(curve).unwrap().at_start(), &[straight]);
}

#[test]
fn test_connect_unknown_segment_fails() {
    let mut network = Network::new();
    let a = line(&mut network, (0.0, 0.0), (10.0, 0.0));
    assert!(network.connect(a, SegmentId::new_random(), false, true).is_err());
}

#[test]
fn test_auto_connect_is_idempotent() {
    let mut network = Network::new();
    let a = line(&mut network, (0.0, 0.0), (10.0, 0.0));
    let b = line(&mut network, (10.0, 0.0), (20.0, 0.0));
    let c = line(&mut network, (20.0, 0.0), (30.0, 0.0));
    // Touches b's end at a right angle: not a continuation
    let d = line(&mut network, (20.0, 0.0), (20.0, 10.0));

    assert_eq!(network.auto_connect(false), 2);
    let before: Vec<_> = [a, b, c, d]
        .iter()
        .map(|id| network.adjacency(*id).unwrap())
        .collect();

    network.auto_connect(false);
    let after: Vec<_> = [a, b, c, d]
        .iter()
        .map(|id| network.adjacency(*id).unwrap())
        .collect();

    assert_eq!(before, after);
    assert_eq!(network.segment(b).unwrap().at_end(), &[c]);
    assert!(!network.segment(d).unwrap().is_connected());
    assert!(network.is_connection_symmetric());
}

#[test]
fn test_disconnect_removes_both_sides() {
    let mut network = Network::new();
    let a = line(&mut network, (0.0, 0.0), (10.0, 0.0));
    let b = line(&mut network, (10.0, 0.0), (20.0, 0.0));
    network.auto_connect(false);

    assert!(network.disconnect(a, b));
    assert!(!network.segment(a).unwrap().is_connected());
    assert!(!network.segment(b).unwrap().is_connected());
    assert!(!network.disconnect(a, b));
}

#[test]
fn test_get_bounds() {
    let mut network = Network::new();
    assert!(network.get_bounds().is_none());

    line(&mut network, (0.0, 0.0), (10.0, 5.0));
    line(&mut network, (-3.0, 2.0), (4.0, 8.0));

    let bounds = network.get_bounds().unwrap();
    assert!((bounds.min.x + 3.0).abs() < EPSILON);
    assert!(bounds.min.y.abs() < EPSILON);
    assert!((bounds.max.x - 10.0).abs() < EPSILON);
    assert!((bounds.max.y - 8.0).abs() < EPSILON);
}

#[test]
fn test_move_endpoint_refused_while_connected() {
    let mut network = Network::new();
    let a = line(&mut network, (0.0, 0.0), (10.0, 0.0));
    let b = line(&mut network, (10.0, 0.0), (20.0, 0.0));
    let loose = line(&mut network, (0.0, 50.0), (10.0, 50.0));
    network.auto_connect(false);

    assert!(!network
        .move_endpoint(a, Endpoint::Start, Point::new(-5.0, 0.0))
        .unwrap());
    assert_eq!(network.segment(a).unwrap().start(), Point::new(0.0, 0.0));
    assert!(!network.translate_segment(b, 1.0, 1.0).unwrap());

    assert!(network
        .move_endpoint(loose, Endpoint::End, Point::new(20.0, 50.0))
        .unwrap());
    assert!((network.segment(loose).unwrap().length() - 20.0).abs() < EPSILON);
}

#[test]
fn test_moving_a_segment_keeps_stations_on_it() {
    let mut network = Network::new();
    let a = line(&mut network, (0.0, 0.0), (100.0, 0.0));
    let station = network.add_station(a, 80.0, Alignment::Left, "Far").unwrap();

    assert!(network
        .move_endpoint(a, Endpoint::End, Point::new(50.0, 0.0))
        .unwrap());
    assert!((network.station(station).unwrap().distance_along - 50.0).abs() < EPSILON);
}

#[test]
fn test_split_preserves_stations_and_start_positions() {
    let mut network = Network::new();
    let before = line(&mut network, (-10.0, 0.0), (0.0, 0.0));
    let target = line(&mut network, (0.0, 0.0), (100.0, 0.0));
    let after = line(&mut network, (100.0, 0.0), (110.0, 0.0));
    network.auto_connect(false);

    let s20 = network.add_station(target, 20.0, Alignment::Left, "Twenty").unwrap();
    let s60 = network.add_station(target, 60.0, Alignment::Right, "Sixty").unwrap();
    let s80 = network.add_station(target, 80.0, Alignment::Left, "Eighty").unwrap();
    network.add_train_start_position(target, 10.0, false).unwrap();
    network.add_train_start_position(target, 70.0, true).unwrap();

    let (first, second) = network.split_segment(target, 50.0).unwrap();

    assert!(!network.contains_segment(target));
    assert_eq!(network.segment_count(), 4);
    assert_eq!(network.segment_ids(), &[before, first, second, after]);

    let first_segment = network.segment(first).unwrap();
    let second_segment = network.segment(second).unwrap();
    assert!((first_segment.length() - 50.0).abs() < EPSILON);
    assert!((second_segment.length() - 50.0).abs() < EPSILON);

    // Stations
    let first_stations: Vec<_> = first_segment.stations().collect();
    assert_eq!(first_stations.len(), 1);
    assert!((first_stations[0].0 - 20.0).abs() < EPSILON);
    assert_eq!(first_stations[0].1, s20);

    let second_stations: Vec<_> = second_segment.stations().collect();
    assert_eq!(second_stations.len(), 2);
    assert!((second_stations[0].0 - 10.0).abs() < EPSILON);
    assert!((second_stations[1].0 - 30.0).abs() < EPSILON);
    assert_eq!(second_stations[0].1, s60);
    assert_eq!(second_stations[1].1, s80);

    assert_eq!(network.station(s20).unwrap().segment, first);
    assert_eq!(network.station(s60).unwrap().segment, second);
    assert!((network.station(s80).unwrap().distance_along - 30.0).abs() < EPSILON);
    assert_eq!(network.station(s60).unwrap().alignment, Alignment::Right);

    // Start positions
    let first_starts = first_segment.train_start_positions();
    assert_eq!(first_starts.len(), 1);
    assert!((first_starts[0].distance_along - 10.0).abs() < EPSILON);
    assert!(!first_starts[0].reverse);

    let second_starts = second_segment.train_start_positions();
    assert_eq!(second_starts.len(), 1);
    assert!((second_starts[0].distance_along - 20.0).abs() < EPSILON);
    assert!(second_starts[0].reverse);

    // Connections
    assert_eq!(first_segment.at_start(), &[before]);
    assert_eq!(first_segment.at_end(), &[second]);
    assert_eq!(second_segment.at_start(), &[first]);
    assert_eq!(second_segment.at_end(), &[after]);
    assert_eq!(network.segment(before).unwrap().at_end(), &[first]);
    assert_eq!(network.segment(after).unwrap().at_start(), &[second]);
    assert!(network.is_connection_symmetric());
}

#[test]
fn test_split_outside_segment_fails() {
    let mut network = Network::new();
    let a = line(&mut network, (0.0, 0.0), (100.0, 0.0));
    assert!(network.split_segment(a, 0.0).is_err());
    assert!(network.split_segment(a, 150.0).is_err());
    assert!(network.contains_segment(a));
}

#[test]
fn test_remove_segment_cleans_up() {
    let mut network = Network::new();
    let a = line(&mut network, (0.0, 0.0), (10.0, 0.0));
    let b = line(&mut network, (10.0, 0.0), (20.0, 0.0));
    network.auto_connect(false);
    network.add_station(b, 5.0, Alignment::Left, "Gone").unwrap();

    network.remove_segment(b).unwrap();

    assert!(!network.contains_segment(b));
    assert!(!network.segment(a).unwrap().is_connected());
    assert_eq!(network.station_count(), 0);
    assert!(network.remove_segment(b).is_err());
}

#[test]
fn test_station_placement() {
    let mut network = Network::new();
    let a = line(&mut network, (0.0, 0.0), (100.0, 0.0));

    assert!(network.add_station(a, 120.0, Alignment::Left, "Nowhere").is_err());
    assert!(network.add_station(a, -1.0, Alignment::Left, "Nowhere").is_err());

    let left = network.add_station(a, 50.0, Alignment::Left, "North").unwrap();
    let right = network.add_station(a, 25.0, Alignment::Right, "South").unwrap();

    let north = network.station_position(left).unwrap();
    assert!((north.x - 50.0).abs() < EPSILON);
    assert!(north.y > 0.0);
    let south = network.station_position(right).unwrap();
    assert!(south.y < 0.0);

    let names: Vec<_> = network.stations_on(a).iter().map(|s| s.name.clone()).collect();
    assert_eq!(names, vec!["South".to_string(), "North".to_string()]);

    network.remove_station(right).unwrap();
    assert_eq!(network.stations_on(a).len(), 1);
}

#[test]
fn test_find_closest_segment_and_rectangle_selection() {
    let mut network = Network::new();
    let low = line(&mut network, (0.0, 0.0), (100.0, 0.0));
    let high = line(&mut network, (0.0, 50.0), (100.0, 50.0));

    let (closest, hit) = network.find_closest_segment(&Point::new(40.0, 40.0)).unwrap();
    assert_eq!(closest, high);
    assert!((hit.distance - 10.0).abs() < EPSILON);

    assert_eq!(
        network.segments_in_rectangle(Point::new(-5.0, -5.0), Point::new(5.0, 5.0)),
        vec![low]
    );
    assert_eq!(
        network
            .segments_in_rectangle(Point::new(-5.0, -5.0), Point::new(5.0, 55.0))
            .len(),
        2
    );
}
