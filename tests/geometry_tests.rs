//! Geometry of individual track segments
//!
//! Lengths, positions, headings and closest points of straight and curved
//! segments.

use std::f64::consts::PI;

use rail_sim::simulation::{angles_equal, Alignment, Endpoint, Point, TrackSegment};

const EPSILON: f64 = 1e-6;

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < EPSILON,
        "expected {}, got {}",
        expected,
        actual
    );
}

fn assert_point(actual: Point, expected: Point) {
    assert!(
        actual.distance(&expected) < EPSILON,
        "expected ({}, {}), got ({}, {})",
        expected.x,
        expected.y,
        actual.x,
        actual.y
    );
}

fn assert_angle(actual: f64, expected: f64) {
    assert!(
        angles_equal(actual, expected),
        "expected angle {}, got {}",
        expected,
        actual
    );
}

fn quarter_arc(counter_clockwise: bool) -> TrackSegment {
    TrackSegment::circular(
        Point::new(10.0, 0.0),
        Point::new(0.0, 10.0),
        Point::new(0.0, 0.0),
        counter_clockwise,
    )
    .unwrap()
}

#[test]
fn test_linear_length_and_heading() {
    let segment = TrackSegment::linear(Point::new(0.0, 0.0), Point::new(30.0, 40.0));
    assert_close(segment.length(), 50.0);
    assert_close(segment.initial_angle(), (40.0f64).atan2(30.0));
    assert_close(segment.final_angle(), segment.initial_angle());
}

#[test]
fn test_arc_length_short_way() {
    // 90 degrees counter-clockwise at radius 10
    let arc = quarter_arc(true);
    assert_close(arc.length(), 10.0 * PI / 2.0);
}

#[test]
fn test_arc_length_long_way() {
    // Same endpoints clockwise goes the other way round: 270 degrees
    let arc = quarter_arc(false);
    assert_close(arc.length(), 10.0 * 3.0 * PI / 2.0);
}

#[test]
fn test_arc_with_coincident_endpoints_is_full_circle() {
    let arc = TrackSegment::circular(
        Point::new(10.0, 0.0),
        Point::new(10.0, 0.0),
        Point::new(0.0, 0.0),
        true,
    )
    .unwrap();
    assert_close(arc.length(), 2.0 * PI * 10.0);
}

#[test]
fn test_arc_zero_radius_rejected() {
    let result = TrackSegment::circular(
        Point::new(5.0, 5.0),
        Point::new(10.0, 5.0),
        Point::new(5.0, 5.0),
        true,
    );
    assert!(result.is_err());
}

#[test]
fn test_arc_endpoints_must_share_radius() {
    let result = TrackSegment::circular(
        Point::new(10.0, 0.0),
        Point::new(0.0, 12.0),
        Point::new(0.0, 0.0),
        true,
    );
    assert!(result.is_err());

    // Moving an arc endpoint off the circle is refused as well
    let arc = quarter_arc(true);
    assert!(arc
        .geometry()
        .with_endpoint(Endpoint::End, Point::new(0.0, 12.0))
        .is_err());
    assert!(arc
        .geometry()
        .with_endpoint(Endpoint::End, Point::new(-10.0, 0.0))
        .is_ok());
}

#[test]
fn test_arc_headings() {
    let arc = quarter_arc(true);
    assert_angle(arc.initial_angle(), PI / 2.0);
    assert_angle(arc.final_angle(), PI);

    let clockwise = quarter_arc(false);
    assert_angle(clockwise.initial_angle(), -PI / 2.0);
    assert_angle(clockwise.final_angle(), 0.0);
}

#[test]
fn test_position_along_arc() {
    let arc = quarter_arc(true);
    let half = arc.length() / 2.0;
    let middle = arc.position_along(half, false);
    let diagonal = 10.0 / 2.0f64.sqrt();
    assert_point(middle.point, Point::new(diagonal, diagonal));
    assert_eq!(middle.excess, 0.0);
}

#[test]
fn test_reverse_symmetry() {
    let segments = [
        TrackSegment::linear(Point::new(-5.0, 3.0), Point::new(20.0, 17.0)),
        quarter_arc(true),
        quarter_arc(false),
    ];

    for segment in &segments {
        let length = segment.length();
        for fraction in [0.0, 0.1, 0.37, 0.5, 0.9, 1.0] {
            let distance = length * fraction;
            let reversed = segment.position_along(distance, true).point;
            let forward = segment.position_along(length - distance, false).point;
            assert_point(reversed, forward);
        }
    }
}

#[test]
fn test_reverse_heading_is_opposite() {
    let segment = TrackSegment::linear(Point::new(0.0, 0.0), Point::new(10.0, 0.0));
    assert_angle(segment.angle_along(3.0, false), 0.0);
    assert_angle(segment.angle_along(3.0, true), PI);
}

#[test]
fn test_position_along_reports_excess() {
    let segment = TrackSegment::linear(Point::new(0.0, 0.0), Point::new(100.0, 0.0));

    let past_end = segment.position_along(130.0, false);
    assert_point(past_end.point, Point::new(100.0, 0.0));
    assert_close(past_end.excess, 30.0);

    let before_start = segment.position_along(-5.0, false);
    assert_point(before_start.point, Point::new(0.0, 0.0));
    assert_close(before_start.excess, 5.0);

    // Reversed travel runs out at the segment's start
    let past_start = segment.position_along(120.0, true);
    assert_point(past_start.point, Point::new(0.0, 0.0));
    assert_close(past_start.excess, 20.0);
}

#[test]
fn test_closest_point_on_line() {
    let segment = TrackSegment::linear(Point::new(0.0, 0.0), Point::new(10.0, 0.0));

    let above = segment.distance_to_position(&Point::new(5.0, 3.0));
    assert_point(above.point, Point::new(5.0, 0.0));
    assert_close(above.distance, 3.0);
    assert_close(above.distance_along, 0.5);
    assert_eq!(above.alignment, Alignment::Left);

    let below = segment.distance_to_position(&Point::new(5.0, -3.0));
    assert_eq!(below.alignment, Alignment::Right);

    let beyond = segment.distance_to_position(&Point::new(14.0, 3.0));
    assert_point(beyond.point, Point::new(10.0, 0.0));
    assert_close(beyond.distance, 5.0);
    assert_close(beyond.distance_along, 1.0);
}

#[test]
fn test_closest_point_on_arc() {
    let arc = quarter_arc(true);
    let diagonal = 10.0 / 2.0f64.sqrt();

    let outside = arc.distance_to_position(&Point::new(20.0, 20.0));
    assert_point(outside.point, Point::new(diagonal, diagonal));
    assert_close(outside.distance, 20.0 * 2.0f64.sqrt() - 10.0);
    assert_close(outside.distance_along, 0.5);
    // Travelling counter-clockwise, the outside of the curve is on the right
    assert_eq!(outside.alignment, Alignment::Right);

    let inside = arc.distance_to_position(&Point::new(1.0, 1.0));
    assert_eq!(inside.alignment, Alignment::Left);

    // Outside the arc's span the nearer endpoint wins
    let behind = arc.distance_to_position(&Point::new(12.0, -8.0));
    assert_point(behind.point, Point::new(10.0, 0.0));
    assert_close(behind.distance_along, 0.0);
}

#[test]
fn test_line_rectangle_overlap() {
    let segment = TrackSegment::linear(Point::new(0.0, 0.0), Point::new(10.0, 10.0));
    assert!(segment.is_within_rectangle(Point::new(4.0, -1.0), Point::new(6.0, 20.0)));
    // Corners may come in any order
    assert!(segment.is_within_rectangle(Point::new(6.0, 20.0), Point::new(4.0, -1.0)));
    assert!(!segment.is_within_rectangle(Point::new(20.0, 20.0), Point::new(30.0, 30.0)));
    assert!(!segment.is_within_rectangle(Point::new(6.0, 0.0), Point::new(10.0, 3.0)));
}

#[test]
fn test_arc_rectangle_overlap() {
    let arc = quarter_arc(true);
    // The curve passes through this box without either endpoint inside it
    assert!(arc.is_within_rectangle(Point::new(6.0, 6.0), Point::new(8.0, 8.0)));
    // Same box mirrored into the part of the circle the arc does not cover
    assert!(!arc.is_within_rectangle(Point::new(-8.0, -8.0), Point::new(-6.0, -6.0)));
    // Box inside the circle, away from the track
    assert!(!arc.is_within_rectangle(Point::new(-2.0, -2.0), Point::new(2.0, 2.0)));
    // Box around an endpoint
    assert!(arc.is_within_rectangle(Point::new(9.0, -1.0), Point::new(11.0, 1.0)));
}

#[test]
fn test_split_arc_keeps_total_length() {
    let arc = quarter_arc(false);
    let (first, second) = arc.geometry().split_at(5.0).unwrap();
    assert_close(first.length() + second.length(), arc.length());
    assert_close(first.length(), 5.0);
    assert_point(first.end(), second.start());
}
