//! Bounding boxes and the closed polygon rings built from them.

use std::str::FromStr;

use serde::{Serialize, Serializer};
use tracing::debug;

use crate::error::{Axis, GeoError, Result};
use crate::point::{GeoPoint, Gcj02, Wgs84};
use crate::transform::CoordinateTransformer;

/// Points closer than this are treated as lying on a ring edge.
const EDGE_EPSILON: f64 = 1e-12;

/// An axis-aligned rectangle in GCJ-02 lat/lng space, given by its
/// north-east and south-west corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub ne_lat: f64,
    pub ne_lng: f64,
    pub sw_lat: f64,
    pub sw_lng: f64,
}

impl BoundingBox {
    /// Build a box, rejecting NaN and infinite corners.
    pub fn new(ne_lat: f64, ne_lng: f64, sw_lat: f64, sw_lng: f64) -> Result<Self> {
        for (field, value) in [
            ("ne_lat", ne_lat),
            ("ne_lng", ne_lng),
            ("sw_lat", sw_lat),
            ("sw_lng", sw_lng),
        ] {
            if !value.is_finite() {
                return Err(GeoError::NonFiniteCoordinate { field, value });
            }
        }
        Ok(Self {
            ne_lat,
            ne_lng,
            sw_lat,
            sw_lng,
        })
    }

    /// The region-search path takes its four scalars in this exact order.
    pub fn from_path_params(ne_lat: f64, ne_lng: f64, sw_lat: f64, sw_lng: f64) -> Result<Self> {
        Self::new(ne_lat, ne_lng, sw_lat, sw_lng)
    }

    /// Swap corners where needed so that NE holds the maximum of each axis.
    pub fn normalized(&self) -> Self {
        Self {
            ne_lat: self.ne_lat.max(self.sw_lat),
            ne_lng: self.ne_lng.max(self.sw_lng),
            sw_lat: self.ne_lat.min(self.sw_lat),
            sw_lng: self.ne_lng.min(self.sw_lng),
        }
    }

    /// Fails when either extent is zero.
    pub fn ensure_area(&self) -> Result<()> {
        if self.ne_lat == self.sw_lat {
            return Err(GeoError::DegenerateRegion {
                axis: Axis::Latitude,
                value: self.ne_lat,
            });
        }
        if self.ne_lng == self.sw_lng {
            return Err(GeoError::DegenerateRegion {
                axis: Axis::Longitude,
                value: self.ne_lng,
            });
        }
        Ok(())
    }

    pub fn north_east(&self) -> GeoPoint<Gcj02> {
        GeoPoint::new(self.ne_lat, self.ne_lng)
    }

    pub fn north_west(&self) -> GeoPoint<Gcj02> {
        GeoPoint::new(self.ne_lat, self.sw_lng)
    }

    pub fn south_west(&self) -> GeoPoint<Gcj02> {
        GeoPoint::new(self.sw_lat, self.sw_lng)
    }

    pub fn south_east(&self) -> GeoPoint<Gcj02> {
        GeoPoint::new(self.sw_lat, self.ne_lng)
    }

    /// Corners in ring order: NE, NW, SW, SE.
    pub fn corners(&self) -> [GeoPoint<Gcj02>; 4] {
        [
            self.north_east(),
            self.north_west(),
            self.south_west(),
            self.south_east(),
        ]
    }
}

impl FromStr for BoundingBox {
    type Err = GeoError;

    /// Parses `"ne_lat,ne_lng,sw_lat,sw_lng"`.
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(GeoError::Parse(format!(
                "expected 4 comma-separated values, got {}",
                parts.len()
            )));
        }
        let mut values = [0.0f64; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| GeoError::Parse(format!("not a number: '{}'", part)))?;
        }
        Self::new(values[0], values[1], values[2], values[3])
    }
}

/// A closed WGS-84 ring: at least four distinct corners, first point repeated
/// as the last.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    points: Vec<GeoPoint<Wgs84>>,
}

impl Polygon {
    /// Close a ring over four corners, rejecting coincident corners.
    pub fn from_corners(corners: [GeoPoint<Wgs84>; 4]) -> Result<Self> {
        let mut distinct: Vec<(u64, u64)> = Vec::with_capacity(4);
        for c in &corners {
            let key = (c.lat.to_bits(), c.lng.to_bits());
            if !distinct.contains(&key) {
                distinct.push(key);
            }
        }
        if distinct.len() < 4 {
            return Err(GeoError::CollapsedRing {
                distinct: distinct.len(),
            });
        }

        let mut points = corners.to_vec();
        points.push(corners[0]);
        Ok(Self { points })
    }

    /// All ring points including the closing one.
    pub fn points(&self) -> &[GeoPoint<Wgs84>] {
        &self.points
    }

    /// Ring points without the closing duplicate.
    pub fn corners(&self) -> &[GeoPoint<Wgs84>] {
        &self.points[..self.points.len() - 1]
    }

    /// GeoJSON positions, `[lng, lat]` per point.
    pub fn coordinates(&self) -> Vec<[f64; 2]> {
        self.points.iter().map(GeoPoint::position).collect()
    }

    /// Render as a GeoJSON `Polygon` geometry with a single exterior ring.
    pub fn to_geojson(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "Polygon",
            "coordinates": [self.coordinates()],
        })
    }

    /// Shoelace area in (lng, lat) degrees². Positive for counter-clockwise.
    pub fn signed_area(&self) -> f64 {
        self.points
            .windows(2)
            .map(|w| w[0].lng * w[1].lat - w[1].lng * w[0].lat)
            .sum::<f64>()
            / 2.0
    }

    /// Planar point-in-polygon test. Points on an edge count as inside,
    /// matching a distance-zero containment predicate.
    pub fn contains(&self, point: &GeoPoint<Wgs84>) -> bool {
        let (px, py) = (point.lng, point.lat);
        let mut inside = false;
        for edge in self.points.windows(2) {
            let (ax, ay) = (edge[0].lng, edge[0].lat);
            let (bx, by) = (edge[1].lng, edge[1].lat);

            let cross = (bx - ax) * (py - ay) - (by - ay) * (px - ax);
            if cross.abs() <= EDGE_EPSILON
                && px >= ax.min(bx) - EDGE_EPSILON
                && px <= ax.max(bx) + EDGE_EPSILON
                && py >= ay.min(by) - EDGE_EPSILON
                && py <= ay.max(by) + EDGE_EPSILON
            {
                return true;
            }

            if (ay > py) != (by > py) {
                let x_at = ax + (py - ay) * (bx - ax) / (by - ay);
                if px < x_at {
                    inside = !inside;
                }
            }
        }
        inside
    }
}

impl Serialize for Polygon {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_geojson().serialize(serializer)
    }
}

/// Turns GCJ-02 bounding boxes into WGS-84 rings.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegionPolygonBuilder {
    transformer: CoordinateTransformer,
}

impl RegionPolygonBuilder {
    pub fn new(transformer: CoordinateTransformer) -> Self {
        Self { transformer }
    }

    pub fn transformer(&self) -> &CoordinateTransformer {
        &self.transformer
    }

    /// Build the closed ring NE, NW, SW, SE, NE (counter-clockwise in
    /// lng/lat) from the transformed corners of `bbox`.
    pub fn build_ring(&self, bbox: &BoundingBox) -> Result<Polygon> {
        bbox.ensure_area()?;
        let bbox = bbox.normalized();

        let corners = bbox.corners().map(|c| self.transformer.transform(c));
        let ring = Polygon::from_corners(corners)?;

        debug!(
            subsystem = "geo",
            component = "region",
            op = "build_ring",
            ne_lat = bbox.ne_lat,
            ne_lng = bbox.ne_lng,
            sw_lat = bbox.sw_lat,
            sw_lng = bbox.sw_lng,
            "Built WGS-84 search ring"
        );
        Ok(ring)
    }
}
