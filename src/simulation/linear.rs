//! Straight track pieces

use super::segment::{Bounds, ClosestPoint};
use super::types::{Alignment, Point};

/// A straight segment travelled from `start` to `end`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearSegment {
    pub start: Point,
    pub end: Point,
}

impl LinearSegment {
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    pub fn length(&self) -> f64 {
        self.start.distance(&self.end)
    }

    /// Heading of the whole segment. Zero-length segments report 0.
    pub fn angle(&self) -> f64 {
        self.start.angle_to(&self.end)
    }

    pub(crate) fn point_at(&self, distance: f64) -> Point {
        let length = self.length();
        if length == 0.0 {
            return self.start;
        }
        self.start.lerp(&self.end, distance / length)
    }

    pub fn distance_to_position(&self, position: &Point) -> ClosestPoint {
        let dx = self.end.x - self.start.x;
        let dy = self.end.y - self.start.y;
        let length_sq = dx * dx + dy * dy;
        let px = position.x - self.start.x;
        let py = position.y - self.start.y;

        let t = if length_sq == 0.0 {
            0.0
        } else {
            ((px * dx + py * dy) / length_sq).clamp(0.0, 1.0)
        };

        let point = Point::new(self.start.x + t * dx, self.start.y + t * dy);
        let cross = dx * py - dy * px;

        ClosestPoint {
            point,
            distance: position.distance(&point),
            distance_along: t,
            alignment: if cross > 0.0 {
                Alignment::Left
            } else {
                Alignment::Right
            },
        }
    }

    /// Liang–Barsky clipping of the segment against the rectangle
    pub fn is_within_rectangle(&self, rect: &Bounds) -> bool {
        let dx = self.end.x - self.start.x;
        let dy = self.end.y - self.start.y;
        let checks = [
            (-dx, self.start.x - rect.min.x),
            (dx, rect.max.x - self.start.x),
            (-dy, self.start.y - rect.min.y),
            (dy, rect.max.y - self.start.y),
        ];

        let mut t_enter: f64 = 0.0;
        let mut t_exit: f64 = 1.0;
        for (p, q) in checks {
            if p == 0.0 {
                // Parallel to this slab
                if q < 0.0 {
                    return false;
                }
                continue;
            }
            let r = q / p;
            if p < 0.0 {
                if r > t_exit {
                    return false;
                }
                t_enter = t_enter.max(r);
            } else {
                if r < t_enter {
                    return false;
                }
                t_exit = t_exit.min(r);
            }
        }
        t_enter <= t_exit
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::from_corners(self.start, self.end)
    }
}
