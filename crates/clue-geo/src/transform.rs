//! GCJ-02 ↔ WGS-84 datum correction.
//!
//! GCJ-02 is WGS-84 plus a deterministic, position-dependent offset defined
//! over the Krasovsky 1940 ellipsoid. The forward direction is the published
//! closed-form formula; the reverse direction has no closed form, so
//! [`CoordinateTransformer`] refines the customary one-step estimate by
//! fixed-point iteration against the forward formula.
//!
//! Outside the coverage envelope both directions are the identity.

use std::f64::consts::PI;

use tracing::debug;

use crate::point::{GeoPoint, Gcj02, Wgs84};

/// Semi-major axis of the Krasovsky 1940 ellipsoid, in metres.
const SEMI_MAJOR_AXIS: f64 = 6_378_245.0;

/// First eccentricity squared of the Krasovsky 1940 ellipsoid.
const ECCENTRICITY_SQ: f64 = 0.006_693_421_622_965_943_23;

/// Coverage envelope, open bounds.
const MIN_LNG: f64 = 73.66;
const MAX_LNG: f64 = 135.05;
const MIN_LAT: f64 = 3.86;
const MAX_LAT: f64 = 53.55;

/// Upper bound on refinement steps for the exact inverse.
pub const DEFAULT_MAX_REFINEMENTS: u32 = 10;

/// Refinement stops once the forward image is this close to the input.
pub const REFINEMENT_TOLERANCE_DEG: f64 = 1e-10;

/// Whether `(lat, lng)` lies inside the envelope where the GCJ-02 offset is
/// defined.
pub fn in_coverage(lat: f64, lng: f64) -> bool {
    lng > MIN_LNG && lng < MAX_LNG && lat > MIN_LAT && lat < MAX_LAT
}

fn offset_lat(x: f64, y: f64) -> f64 {
    let mut ret = -100.0 + 2.0 * x + 3.0 * y + 0.2 * y * y + 0.1 * x * y + 0.2 * x.abs().sqrt();
    ret += (20.0 * (6.0 * x * PI).sin() + 20.0 * (2.0 * x * PI).sin()) * 2.0 / 3.0;
    ret += (20.0 * (y * PI).sin() + 40.0 * (y / 3.0 * PI).sin()) * 2.0 / 3.0;
    ret += (160.0 * (y / 12.0 * PI).sin() + 320.0 * (y * PI / 30.0).sin()) * 2.0 / 3.0;
    ret
}

fn offset_lng(x: f64, y: f64) -> f64 {
    let mut ret = 300.0 + x + 2.0 * y + 0.1 * x * x + 0.1 * x * y + 0.1 * x.abs().sqrt();
    ret += (20.0 * (6.0 * x * PI).sin() + 20.0 * (2.0 * x * PI).sin()) * 2.0 / 3.0;
    ret += (20.0 * (x * PI).sin() + 40.0 * (x / 3.0 * PI).sin()) * 2.0 / 3.0;
    ret += (150.0 * (x / 12.0 * PI).sin() + 300.0 * (x / 30.0 * PI).sin()) * 2.0 / 3.0;
    ret
}

/// GCJ-02 minus WGS-84 at `(lat, lng)`, in degrees, as `(dlat, dlng)`.
///
/// The operation order matches the published formula so results are
/// bit-for-bit reproducible.
fn offsets(lat: f64, lng: f64) -> (f64, f64) {
    let x = lng - 105.0;
    let y = lat - 35.0;
    let mut dlat = offset_lat(x, y);
    let mut dlng = offset_lng(x, y);

    let radlat = lat / 180.0 * PI;
    let mut magic = radlat.sin();
    magic = 1.0 - ECCENTRICITY_SQ * magic * magic;
    let sqrtmagic = magic.sqrt();

    dlat = (dlat * 180.0)
        / ((SEMI_MAJOR_AXIS * (1.0 - ECCENTRICITY_SQ)) / (magic * sqrtmagic) * PI);
    dlng = (dlng * 180.0) / (SEMI_MAJOR_AXIS / sqrtmagic * radlat.cos() * PI);
    (dlat, dlng)
}

/// WGS-84 → GCJ-02, the published forward formula.
pub fn wgs84_to_gcj02(point: GeoPoint<Wgs84>) -> GeoPoint<Gcj02> {
    if !in_coverage(point.lat, point.lng) {
        return point.retag();
    }
    let (dlat, dlng) = offsets(point.lat, point.lng);
    GeoPoint::new(point.lat + dlat, point.lng + dlng)
}

/// GCJ-02 → WGS-84 by a single subtraction of the offset evaluated at the
/// input. Accurate to roughly 1e-5 degrees.
pub fn gcj02_to_wgs84_rough(point: GeoPoint<Gcj02>) -> GeoPoint<Wgs84> {
    if !in_coverage(point.lat, point.lng) {
        return point.retag();
    }
    let (dlat, dlng) = offsets(point.lat, point.lng);
    GeoPoint::new(point.lat * 2.0 - (point.lat + dlat), point.lng * 2.0 - (point.lng + dlng))
}

/// Converts caller-supplied GCJ-02 points into the WGS-84 datum of the
/// spatial index.
///
/// `transform` is pure and deterministic. Inside the coverage envelope it
/// starts from the rough inverse and applies at most `max_refinements`
/// fixed-point steps `w -= forward(w) - g`. Outside the envelope the input
/// is returned unchanged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateTransformer {
    max_refinements: u32,
    tolerance: f64,
}

impl Default for CoordinateTransformer {
    fn default() -> Self {
        Self {
            max_refinements: DEFAULT_MAX_REFINEMENTS,
            tolerance: REFINEMENT_TOLERANCE_DEG,
        }
    }
}

impl CoordinateTransformer {
    /// Transformer with a custom refinement budget.
    pub fn new(max_refinements: u32, tolerance: f64) -> Self {
        Self {
            max_refinements,
            tolerance,
        }
    }

    /// Transformer matching the one-step published inverse.
    pub fn rough() -> Self {
        Self::new(0, REFINEMENT_TOLERANCE_DEG)
    }

    pub fn max_refinements(&self) -> u32 {
        self.max_refinements
    }

    /// GCJ-02 → WGS-84.
    pub fn transform(&self, point: GeoPoint<Gcj02>) -> GeoPoint<Wgs84> {
        if !in_coverage(point.lat, point.lng) {
            debug!(
                lat = point.lat,
                lng = point.lng,
                "Point outside GCJ-02 coverage, passing through"
            );
            return point.retag();
        }

        let mut estimate = gcj02_to_wgs84_rough(point);
        for _ in 0..self.max_refinements {
            // Offsets are applied unconditionally here; the estimate may sit a
            // hair outside the envelope while its image is inside.
            let (dlat, dlng) = offsets(estimate.lat, estimate.lng);
            let err_lat = estimate.lat + dlat - point.lat;
            let err_lng = estimate.lng + dlng - point.lng;
            if err_lat.abs() < self.tolerance && err_lng.abs() < self.tolerance {
                break;
            }
            estimate = GeoPoint::new(estimate.lat - err_lat, estimate.lng - err_lng);
        }
        estimate
    }

    /// WGS-84 → GCJ-02. Provided for round-trip checks and for rendering
    /// stored locations on GCJ-02 map tiles.
    pub fn inverse(&self, point: GeoPoint<Wgs84>) -> GeoPoint<Gcj02> {
        wgs84_to_gcj02(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn hangzhou_bay() -> Vec<GeoPoint<Gcj02>> {
        vec![
            GeoPoint::new(30.194992169502903, 122.35404968261719),
            GeoPoint::new(30.194992169502903, 121.9207763671875),
            GeoPoint::new(29.919827938891753, 121.9207763671875),
            GeoPoint::new(29.919827938891753, 122.35404968261719),
        ]
    }

    #[test]
    fn test_coverage_envelope_is_open() {
        assert!(in_coverage(30.0, 120.0));
        assert!(!in_coverage(30.0, MIN_LNG));
        assert!(!in_coverage(30.0, MAX_LNG));
        assert!(!in_coverage(MIN_LAT, 120.0));
        assert!(!in_coverage(MAX_LAT, 120.0));
    }

    #[test]
    fn test_pass_through_outside_envelope_is_exact() {
        let t = CoordinateTransformer::default();
        for (lat, lng) in [(48.8566, 2.3522), (-33.8688, 151.2093), (60.0, 100.0), (0.0, 0.0)] {
            let out = t.transform(GeoPoint::new(lat, lng));
            assert_eq!(out.lat, lat);
            assert_eq!(out.lng, lng);

            let back = t.inverse(GeoPoint::new(lat, lng));
            assert_eq!(back.lat, lat);
            assert_eq!(back.lng, lng);
        }
    }

    #[test]
    fn test_forward_offset_is_hundreds_of_metres() {
        // Offsets in eastern China are a few hundred metres, i.e. a few
        // thousandths of a degree.
        let w = GeoPoint::<Wgs84>::new(30.0, 122.0);
        let g = wgs84_to_gcj02(w);
        let dlat = (g.lat - w.lat).abs();
        let dlng = (g.lng - w.lng).abs();
        assert!(dlat > 1e-4 && dlat < 1e-2, "dlat = {}", dlat);
        assert!(dlng > 1e-4 && dlng < 1e-2, "dlng = {}", dlng);
    }

    #[test]
    fn test_transform_inverts_forward_within_tolerance() {
        let t = CoordinateTransformer::default();
        let samples = [(30.0, 122.0), (39.9042, 116.4074), (22.5431, 114.0579), (45.75, 126.65)];
        for (lat, lng) in samples {
            let w = GeoPoint::<Wgs84>::new(lat, lng);
            let round = t.transform(t.inverse(w));
            assert!(round.max_abs_diff(&w) < EPS, "{} -> {}", w, round);
        }
    }

    #[test]
    fn test_transform_then_forward_recovers_input() {
        let t = CoordinateTransformer::default();
        for g in hangzhou_bay() {
            let back = t.inverse(t.transform(g));
            assert!(back.max_abs_diff(&g) < EPS, "{} -> {}", g, back);
        }
    }

    #[test]
    fn test_refinement_beats_rough_inverse() {
        let exact = CoordinateTransformer::default();
        let rough = CoordinateTransformer::rough();
        let w = GeoPoint::<Wgs84>::new(30.0, 122.0);
        let g = wgs84_to_gcj02(w);

        let exact_err = exact.transform(g).max_abs_diff(&w);
        let rough_err = rough.transform(g).max_abs_diff(&w);
        assert!(exact_err <= rough_err);
        assert!(exact_err < 1e-9);
        assert_eq!(rough.transform(g), gcj02_to_wgs84_rough(g));
    }

    #[test]
    fn test_rough_inverse_matches_published_formula() {
        let ne = hangzhou_bay()[0];
        let rough = gcj02_to_wgs84_rough(ne);
        assert_eq!(rough.lat.to_bits(), 30.197280196095743_f64.to_bits());
        assert_eq!(rough.lng.to_bits(), 122.349767924313_f64.to_bits());

        let refined = CoordinateTransformer::default().transform(ne);
        assert!((refined.lat - 30.19728730906811).abs() < 1e-12);
        assert!((refined.lng - 122.34977587451267).abs() < 1e-12);
    }

    #[test]
    fn test_transform_is_deterministic() {
        let t = CoordinateTransformer::default();
        let g = GeoPoint::<Gcj02>::new(31.2304, 121.4737);
        let a = t.transform(g);
        let b = t.transform(g);
        assert_eq!(a.lat.to_bits(), b.lat.to_bits());
        assert_eq!(a.lng.to_bits(), b.lng.to_bits());
    }
}
