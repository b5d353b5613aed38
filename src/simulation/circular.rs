//! Circular arc track pieces
//!
//! An arc is defined by its two endpoints, its center and its winding. The
//! subtended angle is always derived from those, never stored, so the arc can
//! not disagree with its own endpoints.

use anyhow::{bail, Result};
use std::f64::consts::{FRAC_PI_2, TAU};

use super::segment::{Bounds, ClosestPoint};
use super::types::{Alignment, Point, ANGLE_TOLERANCE, POSITION_TOLERANCE};

/// A circular arc travelled from `start` to `end` around `center`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircularSegment {
    pub start: Point,
    pub end: Point,
    pub center: Point,
    pub counter_clockwise: bool,
}

impl CircularSegment {
    /// Fails when the start coincides with the center, or when the end is not
    /// on the circle through the start.
    pub fn new(start: Point, end: Point, center: Point, counter_clockwise: bool) -> Result<Self> {
        let radius = start.distance(&center);
        if radius <= POSITION_TOLERANCE {
            bail!(
                "Circular segment has zero radius (start ({}, {}) is on its center)",
                start.x,
                start.y
            );
        }
        let end_radius = end.distance(&center);
        if (end_radius - radius).abs() > POSITION_TOLERANCE {
            bail!(
                "Circular segment endpoints are at different radii ({} and {})",
                radius,
                end_radius
            );
        }
        Ok(Self {
            start,
            end,
            center,
            counter_clockwise,
        })
    }

    pub fn radius(&self) -> f64 {
        self.start.distance(&self.center)
    }

    pub fn start_angle(&self) -> f64 {
        self.center.angle_to(&self.start)
    }

    pub fn end_angle(&self) -> f64 {
        self.center.angle_to(&self.end)
    }

    /// +1 for counter-clockwise travel, -1 for clockwise
    fn winding(&self) -> f64 {
        if self.counter_clockwise {
            1.0
        } else {
            -1.0
        }
    }

    /// How far `angle` lies past the start angle, in the direction of travel, in [0, 2π)
    fn angular_offset(&self, angle: f64) -> f64 {
        ((angle - self.start_angle()) * self.winding()).rem_euclid(TAU)
    }

    /// Angle subtended by the arc. Coincident endpoints make a full circle.
    pub fn theta(&self) -> f64 {
        if self.start.is_near(&self.end) {
            return TAU;
        }
        self.angular_offset(self.end_angle())
    }

    pub fn length(&self) -> f64 {
        self.radius() * self.theta()
    }

    /// Whether a direction from the center falls inside the arc's angular span
    pub fn contains_angle(&self, angle: f64) -> bool {
        let offset = self.angular_offset(angle);
        offset <= self.theta() + ANGLE_TOLERANCE || offset >= TAU - ANGLE_TOLERANCE
    }

    pub(crate) fn point_at(&self, distance: f64) -> Point {
        let radius = self.radius();
        let angle = self.start_angle() + self.winding() * distance / radius;
        self.center.offset(angle, radius)
    }

    pub(crate) fn heading_at(&self, distance: f64) -> f64 {
        self.start_angle() + self.winding() * (distance / self.radius() + FRAC_PI_2)
    }

    pub fn initial_angle(&self) -> f64 {
        self.start_angle() + self.winding() * FRAC_PI_2
    }

    pub fn final_angle(&self) -> f64 {
        self.end_angle() + self.winding() * FRAC_PI_2
    }

    pub fn distance_to_position(&self, position: &Point) -> ClosestPoint {
        let radius = self.radius();
        let from_center = position.distance(&self.center);
        let query_angle = self.center.angle_to(position);
        let inside = from_center < radius;
        let alignment = if inside == self.counter_clockwise {
            Alignment::Left
        } else {
            Alignment::Right
        };

        if self.contains_angle(query_angle) {
            let theta = self.theta();
            let mut offset = self.angular_offset(query_angle);
            if offset > theta {
                // Just behind the start, within tolerance
                offset = 0.0;
            }
            return ClosestPoint {
                point: self.center.offset(query_angle, radius),
                distance: (from_center - radius).abs(),
                distance_along: offset / theta,
                alignment,
            };
        }

        let to_start = position.distance(&self.start);
        let to_end = position.distance(&self.end);
        if to_start <= to_end {
            ClosestPoint {
                point: self.start,
                distance: to_start,
                distance_along: 0.0,
                alignment,
            }
        } else {
            ClosestPoint {
                point: self.end,
                distance: to_end,
                distance_along: 1.0,
                alignment,
            }
        }
    }

    /// Exact overlap between the arc and the rectangle
    pub fn is_within_rectangle(&self, rect: &Bounds) -> bool {
        if rect.contains(&self.start) || rect.contains(&self.end) {
            return true;
        }

        // No endpoint inside, so the arc overlaps only if it crosses an edge
        let radius = self.radius();
        let c = self.center;

        for y in [rect.min.y, rect.max.y] {
            let dy = y - c.y;
            if dy.abs() > radius {
                continue;
            }
            let dx = (radius * radius - dy * dy).max(0.0).sqrt();
            for x in [c.x - dx, c.x + dx] {
                if x >= rect.min.x && x <= rect.max.x && self.contains_angle(dy.atan2(x - c.x)) {
                    return true;
                }
            }
        }

        for x in [rect.min.x, rect.max.x] {
            let dx = x - c.x;
            if dx.abs() > radius {
                continue;
            }
            let dy = (radius * radius - dx * dx).max(0.0).sqrt();
            for y in [c.y - dy, c.y + dy] {
                if y >= rect.min.y && y <= rect.max.y && self.contains_angle((y - c.y).atan2(dx)) {
                    return true;
                }
            }
        }

        false
    }

    /// Bounding box of the whole circle
    pub fn bounds(&self) -> Bounds {
        let radius = self.radius();
        Bounds {
            min: Point::new(self.center.x - radius, self.center.y - radius),
            max: Point::new(self.center.x + radius, self.center.y + radius),
        }
    }
}
