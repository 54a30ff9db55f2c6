//! Datum-tagged geographic points.

use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::error::{GeoError, Result};

/// A geodetic datum a [`GeoPoint`] can be expressed in.
pub trait Datum: Copy + fmt::Debug + PartialEq + Send + Sync + 'static {
    /// Short human-readable name.
    const NAME: &'static str;
}

/// GCJ-02, the obfuscated datum used by map tiles published in mainland China.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Gcj02;

impl Datum for Gcj02 {
    const NAME: &'static str = "GCJ-02";
}

/// WGS-84 (EPSG:4326), the datum of the store's spatial index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Wgs84;

impl Datum for Wgs84 {
    const NAME: &'static str = "WGS-84";
}

/// A latitude/longitude pair in degrees, tagged with its datum.
///
/// Points of different datums are different types; the only way to move
/// between them is through [`crate::CoordinateTransformer`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct GeoPoint<D: Datum> {
    pub lat: f64,
    pub lng: f64,
    #[serde(skip)]
    datum: PhantomData<D>,
}

impl<D: Datum> GeoPoint<D> {
    /// Create a point without validation.
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self {
            lat,
            lng,
            datum: PhantomData,
        }
    }

    /// Create a point, rejecting NaN and infinite coordinates.
    pub fn try_new(lat: f64, lng: f64) -> Result<Self> {
        if !lat.is_finite() {
            return Err(GeoError::NonFiniteCoordinate {
                field: "lat",
                value: lat,
            });
        }
        if !lng.is_finite() {
            return Err(GeoError::NonFiniteCoordinate {
                field: "lng",
                value: lng,
            });
        }
        Ok(Self::new(lat, lng))
    }

    /// Name of the datum this point is expressed in.
    pub fn datum_name(&self) -> &'static str {
        D::NAME
    }

    /// GeoJSON position order: `[lng, lat]`.
    pub fn position(&self) -> [f64; 2] {
        [self.lng, self.lat]
    }

    /// Render as a GeoJSON `Point` geometry.
    pub fn to_geojson(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "Point",
            "coordinates": self.position(),
        })
    }

    /// Largest per-axis difference to `other`, in degrees.
    pub fn max_abs_diff(&self, other: &Self) -> f64 {
        (self.lat - other.lat).abs().max((self.lng - other.lng).abs())
    }

    /// Re-tag the same numbers with another datum. Only the transformer may
    /// do this, for points outside the correction envelope.
    pub(crate) const fn retag<E: Datum>(self) -> GeoPoint<E> {
        GeoPoint::new(self.lat, self.lng)
    }
}

impl<D: Datum> fmt::Display for GeoPoint<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}) {}", self.lat, self.lng, D::NAME)
    }
}
