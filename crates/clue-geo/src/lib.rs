//! # clue-geo
//!
//! Geodesy primitives for the clue region search.
//!
//! Map clients hand us bounding boxes in GCJ-02 (the datum mandated for
//! published maps in mainland China) while the store indexes project
//! locations as WGS-84 `geography` points. This crate provides:
//!
//! - [`GeoPoint`], a latitude/longitude pair tagged with its datum at the
//!   type level so source and target coordinates cannot be mixed silently
//! - [`CoordinateTransformer`], the GCJ-02 → WGS-84 correction
//! - [`BoundingBox`] and [`RegionPolygonBuilder`], which turn four corner
//!   scalars into a closed WGS-84 [`Polygon`] ring ready for a containment
//!   predicate
//!
//! Everything here is pure: no I/O, no shared state.
//!
//! ## Example
//!
//! ```
//! use clue_geo::{BoundingBox, RegionPolygonBuilder};
//!
//! let bbox = BoundingBox::new(30.194992169502903, 122.35404968261719,
//!                             29.919827938891753, 121.9207763671875).unwrap();
//! let ring = RegionPolygonBuilder::default().build_ring(&bbox).unwrap();
//!
//! assert_eq!(ring.points().len(), 5);
//! assert_eq!(ring.points()[0], ring.points()[4]);
//! ```

pub mod error;
pub mod point;
pub mod region;
pub mod transform;

pub use error::{Axis, GeoError, Result};
pub use point::{Datum, GeoPoint, Gcj02, Wgs84};
pub use region::{BoundingBox, Polygon, RegionPolygonBuilder};
pub use transform::{
    gcj02_to_wgs84_rough, in_coverage, wgs84_to_gcj02, CoordinateTransformer,
    DEFAULT_MAX_REFINEMENTS, REFINEMENT_TOLERANCE_DEG,
};
