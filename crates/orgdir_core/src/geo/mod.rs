//! Geospatial primitives for proximity queries.
//!
//! # Responsibility
//! - Convert WGS84 degrees into planar pseudo-Mercator meters and back.
//! - Evaluate circle/rectangle containment over projected points.
//!
//! # Invariants
//! - Projection never clamps: out-of-range input is rejected.
//! - Predicates are pure and O(1) per point; scanning lives in `store`.

pub mod predicate;
pub mod projection;
