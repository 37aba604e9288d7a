//! Spherical pseudo-Mercator projection (web-map tiling plane).
//!
//! # Invariants
//! - Latitude must be within `[-90, 90]` and longitude within `[-180, 180]`.
//! - Distances in the projected plane approximate meters near the equator and
//!   stretch by `1/cos(lat)` elsewhere. This distortion is accepted.
//! - Both poles (`|lat| == 90`) are valid coordinates but `Unprojectable`.
//! - `unproject` snaps results that overshoot a degree bound by rounding
//!   error back onto the bound.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::f64::consts::FRAC_PI_4;
use std::fmt::{Display, Formatter};

/// Earth's equatorial radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

pub const MIN_LATITUDE: f64 = -90.0;
pub const MAX_LATITUDE: f64 = 90.0;
pub const MIN_LONGITUDE: f64 = -180.0;
pub const MAX_LONGITUDE: f64 = 180.0;

/// Overshoot past a degree bound still treated as rounding error in `unproject`.
const BOUND_SNAP_DEG: f64 = 1e-9;

pub type GeoResult<T> = Result<T, GeoError>;

/// Errors from coordinate validation and projection.
#[derive(Debug, Clone, PartialEq)]
pub enum GeoError {
    /// Latitude/longitude is NaN, infinite or outside its degree range.
    InvalidCoordinate { latitude: f64, longitude: f64 },
    /// Coordinate is valid but has no finite plane point (either pole).
    Unprojectable { latitude: f64, longitude: f64 },
    /// Planar input is NaN or infinite.
    InvalidProjectedPoint { x: f64, y: f64 },
}

impl Display for GeoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCoordinate {
                latitude,
                longitude,
            } => write!(
                f,
                "invalid coordinate: latitude={latitude} longitude={longitude}"
            ),
            Self::Unprojectable {
                latitude,
                longitude,
            } => write!(
                f,
                "coordinate cannot be projected: latitude={latitude} longitude={longitude}"
            ),
            Self::InvalidProjectedPoint { x, y } => {
                write!(f, "invalid projected point: x={x} y={y}")
            }
        }
    }
}

impl Error for GeoError {}

/// Geographic point in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Creates a validated point.
    pub fn new(latitude: f64, longitude: f64) -> GeoResult<Self> {
        let point = Self {
            latitude,
            longitude,
        };
        point.validate()?;
        Ok(point)
    }

    /// Checks degree ranges. NaN never passes.
    pub fn validate(&self) -> GeoResult<()> {
        let latitude_ok = (MIN_LATITUDE..=MAX_LATITUDE).contains(&self.latitude);
        let longitude_ok = (MIN_LONGITUDE..=MAX_LONGITUDE).contains(&self.longitude);
        if latitude_ok && longitude_ok {
            Ok(())
        } else {
            Err(GeoError::InvalidCoordinate {
                latitude: self.latitude,
                longitude: self.longitude,
            })
        }
    }

    /// Projects this point into the planar metric system.
    pub fn project(&self) -> GeoResult<ProjectedPoint> {
        project(self.latitude, self.longitude)
    }
}

/// Planar point in pseudo-Mercator meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedPoint {
    pub x: f64,
    pub y: f64,
}

impl ProjectedPoint {
    /// Squared Euclidean distance in the projected plane.
    pub fn distance_squared(&self, other: &ProjectedPoint) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

/// Projects `(lat, lon)` degrees into `(x, y)` meters.
///
/// # Errors
/// - `InvalidCoordinate` when input is outside the WGS84 ranges or NaN.
/// - `Unprojectable` at either pole or when the result is not finite.
pub fn project(latitude: f64, longitude: f64) -> GeoResult<ProjectedPoint> {
    GeoPoint {
        latitude,
        longitude,
    }
    .validate()?;
    // tan(pi/2) is finite in f64, so the north pole must be caught explicitly.
    if latitude.abs() == MAX_LATITUDE {
        return Err(GeoError::Unprojectable {
            latitude,
            longitude,
        });
    }

    let x = EARTH_RADIUS_M * longitude.to_radians();
    let y = EARTH_RADIUS_M * (FRAC_PI_4 + latitude.to_radians() / 2.0).tan().ln();
    if !x.is_finite() || !y.is_finite() {
        return Err(GeoError::Unprojectable {
            latitude,
            longitude,
        });
    }
    Ok(ProjectedPoint { x, y })
}

/// Inverse of [`project`].
pub fn unproject(x: f64, y: f64) -> GeoResult<GeoPoint> {
    if !x.is_finite() || !y.is_finite() {
        return Err(GeoError::InvalidProjectedPoint { x, y });
    }

    let longitude = (x / EARTH_RADIUS_M).to_degrees();
    let latitude = (2.0 * (y / EARTH_RADIUS_M).exp().atan() - 2.0 * FRAC_PI_4).to_degrees();
    GeoPoint::new(
        snap_to_range(latitude, MIN_LATITUDE, MAX_LATITUDE),
        snap_to_range(longitude, MIN_LONGITUDE, MAX_LONGITUDE),
    )
}

/// Pulls `value` onto `[min, max]` when it overshoots by no more than
/// [`BOUND_SNAP_DEG`]. Larger overshoots are left for validation to reject.
fn snap_to_range(value: f64, min: f64, max: f64) -> f64 {
    if value > max && value - max <= BOUND_SNAP_DEG {
        max
    } else if value < min && min - value <= BOUND_SNAP_DEG {
        min
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::{project, unproject, GeoError, GeoPoint, EARTH_RADIUS_M};

    const TOLERANCE_DEG: f64 = 1e-6;

    #[test]
    fn origin_projects_to_origin() {
        let point = project(0.0, 0.0).unwrap();
        assert!(point.x.abs() < 1e-9);
        assert!(point.y.abs() < 1e-9);
    }

    #[test]
    fn antimeridian_maps_to_half_circumference() {
        let point = project(0.0, 180.0).unwrap();
        let expected = EARTH_RADIUS_M * std::f64::consts::PI;
        assert!((point.x - expected).abs() < 1e-6);
    }

    #[test]
    fn round_trip_stays_within_tolerance() {
        let samples = [
            (55.7558, 37.6176),
            (-33.8688, 151.2093),
            (0.0, -180.0),
            (85.0, 179.999),
            (-89.5, -12.25),
            (40.7128, -74.006),
        ];
        for (latitude, longitude) in samples {
            let projected = project(latitude, longitude).unwrap();
            let back = unproject(projected.x, projected.y).unwrap();
            assert!(
                (back.latitude - latitude).abs() < TOLERANCE_DEG,
                "latitude drift for ({latitude}, {longitude}): {}",
                back.latitude
            );
            assert!(
                (back.longitude - longitude).abs() < TOLERANCE_DEG,
                "longitude drift for ({latitude}, {longitude}): {}",
                back.longitude
            );
        }
    }

    #[test]
    fn rejects_out_of_range_and_nan_without_clamping() {
        for (latitude, longitude) in [
            (90.0001, 0.0),
            (-91.0, 0.0),
            (0.0, 180.5),
            (0.0, -181.0),
            (f64::NAN, 0.0),
            (0.0, f64::INFINITY),
        ] {
            let err = project(latitude, longitude).unwrap_err();
            assert!(matches!(err, GeoError::InvalidCoordinate { .. }));
        }
    }

    #[test]
    fn poles_are_valid_but_unprojectable() {
        for latitude in [-90.0, 90.0] {
            assert!(GeoPoint::new(latitude, 0.0).is_ok());
            let err = project(latitude, 0.0).unwrap_err();
            assert!(
                matches!(err, GeoError::Unprojectable { .. }),
                "latitude {latitude}: {err}"
            );
        }
    }

    #[test]
    fn antimeridian_round_trips_at_every_latitude() {
        for longitude in [-180.0, 180.0, -179.9999999, 179.9999999] {
            for latitude in [-89.9, -45.0, 0.0, 12.5, 45.0, 89.9] {
                let projected = project(latitude, longitude).unwrap();
                let back = unproject(projected.x, projected.y)
                    .unwrap_or_else(|err| panic!("({latitude}, {longitude}): {err}"));
                assert!((back.latitude - latitude).abs() < TOLERANCE_DEG);
                assert!((back.longitude - longitude).abs() < TOLERANCE_DEG);
                assert!(back.validate().is_ok());
            }
        }
    }

    #[test]
    fn unproject_rejects_points_beyond_the_antimeridian() {
        let half_circumference = EARTH_RADIUS_M * std::f64::consts::PI;
        for x in [half_circumference + 1.0, -half_circumference - 1.0] {
            let err = unproject(x, 0.0).unwrap_err();
            assert!(matches!(err, GeoError::InvalidCoordinate { .. }));
        }
    }

    #[test]
    fn unproject_rejects_non_finite_input() {
        let err = unproject(f64::NAN, 0.0).unwrap_err();
        assert!(matches!(err, GeoError::InvalidProjectedPoint { .. }));
    }
}
