//! Containment predicates over projected points.
//!
//! # Invariants
//! - Boundaries are inclusive for both shapes.
//! - Rectangles are axis-aligned in the projected plane, not by true bearing.

use crate::geo::projection::ProjectedPoint;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Rejected shape dimensions.
#[derive(Debug, Clone, PartialEq)]
pub enum AreaError {
    /// Radius is negative, NaN or infinite.
    InvalidRadius(f64),
    /// Width or height is negative, NaN or infinite.
    InvalidDimensions { width: f64, height: f64 },
}

impl Display for AreaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRadius(radius) => {
                write!(f, "radius must be a finite non-negative number, got {radius}")
            }
            Self::InvalidDimensions { width, height } => write!(
                f,
                "width and height must be finite non-negative numbers, got width={width} height={height}"
            ),
        }
    }
}

impl Error for AreaError {}

/// Shape that can decide membership for one projected point.
pub trait SpatialArea {
    fn contains(&self, point: &ProjectedPoint) -> bool;
}

/// Circle with a metric radius around a projected center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircleArea {
    center: ProjectedPoint,
    radius_m: f64,
}

impl CircleArea {
    pub fn new(center: ProjectedPoint, radius_m: f64) -> Result<Self, AreaError> {
        if !is_non_negative_finite(radius_m) {
            return Err(AreaError::InvalidRadius(radius_m));
        }
        Ok(Self { center, radius_m })
    }
}

impl SpatialArea for CircleArea {
    fn contains(&self, point: &ProjectedPoint) -> bool {
        point.distance_squared(&self.center) <= self.radius_m * self.radius_m
    }
}

/// Axis-aligned box of `width` x `height` meters centered on a projected point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectangleArea {
    min_x: f64,
    max_x: f64,
    min_y: f64,
    max_y: f64,
}

impl RectangleArea {
    pub fn new(center: ProjectedPoint, width_m: f64, height_m: f64) -> Result<Self, AreaError> {
        if !is_non_negative_finite(width_m) || !is_non_negative_finite(height_m) {
            return Err(AreaError::InvalidDimensions {
                width: width_m,
                height: height_m,
            });
        }

        let half_width = width_m / 2.0;
        let half_height = height_m / 2.0;
        Ok(Self {
            min_x: center.x - half_width,
            max_x: center.x + half_width,
            min_y: center.y - half_height,
            max_y: center.y + half_height,
        })
    }
}

impl SpatialArea for RectangleArea {
    fn contains(&self, point: &ProjectedPoint) -> bool {
        (self.min_x..=self.max_x).contains(&point.x) && (self.min_y..=self.max_y).contains(&point.y)
    }
}

fn is_non_negative_finite(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

#[cfg(test)]
mod tests {
    use super::{AreaError, CircleArea, RectangleArea, SpatialArea};
    use crate::geo::projection::{project, ProjectedPoint};

    fn point(x: f64, y: f64) -> ProjectedPoint {
        ProjectedPoint { x, y }
    }

    #[test]
    fn circle_includes_exact_radius_and_excludes_beyond() {
        let circle = CircleArea::new(point(0.0, 0.0), 5.0).unwrap();
        assert!(circle.contains(&point(3.0, 4.0)));
        assert!(circle.contains(&point(0.0, -5.0)));
        assert!(!circle.contains(&point(0.0, 5.000_001)));
        assert!(!circle.contains(&point(3.0, 4.001)));
    }

    #[test]
    fn zero_radius_matches_only_center() {
        let center = project(55.7558, 37.6176).unwrap();
        let circle = CircleArea::new(center, 0.0).unwrap();
        assert!(circle.contains(&project(55.7558, 37.6176).unwrap()));
        assert!(!circle.contains(&point(center.x + 0.001, center.y)));
    }

    #[test]
    fn circle_rejects_negative_and_nan_radius() {
        assert_eq!(
            CircleArea::new(point(0.0, 0.0), -1.0).unwrap_err(),
            AreaError::InvalidRadius(-1.0)
        );
        assert!(CircleArea::new(point(0.0, 0.0), f64::NAN).is_err());
    }

    #[test]
    fn rectangle_edges_are_inclusive() {
        let rect = RectangleArea::new(point(100.0, 200.0), 20.0, 10.0).unwrap();
        assert!(rect.contains(&point(90.0, 200.0)));
        assert!(rect.contains(&point(110.0, 205.0)));
        assert!(rect.contains(&point(100.0, 195.0)));

        assert!(!rect.contains(&point(89.0, 200.0)));
        assert!(!rect.contains(&point(111.0, 200.0)));
        assert!(!rect.contains(&point(100.0, 194.0)));
        assert!(!rect.contains(&point(100.0, 206.0)));
    }

    #[test]
    fn degenerate_rectangle_is_a_line_or_point() {
        let rect = RectangleArea::new(point(0.0, 0.0), 0.0, 4.0).unwrap();
        assert!(rect.contains(&point(0.0, 2.0)));
        assert!(!rect.contains(&point(0.1, 0.0)));
    }

    #[test]
    fn rectangle_rejects_negative_dimensions() {
        let err = RectangleArea::new(point(0.0, 0.0), 10.0, -0.5).unwrap_err();
        assert!(matches!(err, AreaError::InvalidDimensions { .. }));
    }
}
