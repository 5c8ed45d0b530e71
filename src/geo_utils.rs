//! # Geographic Utilities
//!
//! Distance and containment predicates over raw WGS84 coordinates and geozone geometry.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two coordinates |
//! | [`point_in_circle`] | Is a point within `radius` meters of a center |
//! | [`point_in_polygon`] | Even-odd ray casting over a polygon ring |
//! | [`circle_bounds`] | Bounding box enclosing a circular geozone |
//! | [`ring_bounds`] | Bounding box of a polygon ring |
//! | [`polygon_centroid`] | Area centroid of a polygon ring |
//!
//! ## Example
//!
//! ```rust
//! use zone_logbook::{Coordinate, geo_utils};
//!
//! let depot = Coordinate::new(47.4979, 19.0402);
//! let gate = Coordinate::new(47.4985, 19.0410);
//!
//! let dist = geo_utils::haversine_distance(&depot, &gate);
//! assert!(dist < 100.0);
//! assert!(geo_utils::point_in_circle(&gate, &depot, 150.0));
//! ```
//!
//! ## Algorithm Notes
//!
//! ### Haversine Formula
//!
//! Distances use a spherical Earth with a fixed radius of 6 371 000 m. Zone radii
//! in fleet data are configured against that radius, so the slightly larger mean
//! radius used by general-purpose geodesy crates is not used here.
//!
//! ### Boundary Behavior
//!
//! Circle containment is inclusive (`distance <= radius`). Polygon containment uses
//! the classic even-odd ray casting test; a point lying exactly on an edge or a
//! vertex may be reported inside or outside depending on which edges the ray
//! crosses. Exact boundary hits are rare in GPS data and are left as they fall.

use geo::{Area, BoundingRect, Centroid, LineString, Polygon};

use crate::{Bounds, Coordinate};

/// Earth radius used for all distance calculations, in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Added to the edge latitude span so horizontal edges never divide by zero.
const HORIZONTAL_EDGE_EPSILON: f64 = 1e-15;

// =============================================================================
// Distance Functions
// =============================================================================

/// Great-circle distance between two coordinates in meters (haversine).
///
/// Degenerate input that would produce `NaN` (rounding on identical or
/// antipodal points) yields `0.0`.
///
/// # Example
///
/// ```rust
/// use zone_logbook::{Coordinate, geo_utils};
///
/// let budapest = Coordinate::new(47.4979, 19.0402);
/// let vienna = Coordinate::new(48.2082, 16.3738);
///
/// let distance = geo_utils::haversine_distance(&budapest, &vienna);
/// assert!((distance - 214_000.0).abs() < 2_000.0);
/// ```
#[inline]
pub fn haversine_distance(p1: &Coordinate, p2: &Coordinate) -> f64 {
    let phi1 = p1.latitude.to_radians();
    let phi2 = p2.latitude.to_radians();
    let d_phi = (p2.latitude - p1.latitude).to_radians();
    let d_lambda = (p2.longitude - p1.longitude).to_radians();

    let a = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let distance = 2.0 * EARTH_RADIUS_M * a.clamp(0.0, 1.0).sqrt().asin();

    if distance.is_nan() {
        0.0
    } else {
        distance
    }
}

// =============================================================================
// Containment Predicates
// =============================================================================

/// True iff `point` lies within `radius` meters of `center` (inclusive).
///
/// A non-finite or negative radius matches nothing.
pub fn point_in_circle(point: &Coordinate, center: &Coordinate, radius: f64) -> bool {
    if !radius.is_finite() || radius < 0.0 {
        return false;
    }
    haversine_distance(point, center) <= radius
}

/// Even-odd ray casting test of `point` against a polygon ring.
///
/// Ring coordinates are `x = longitude`, `y = latitude`. The ring may or may not
/// repeat its first vertex at the end; both forms give the same answer. An empty
/// ring contains nothing.
///
/// # Example
///
/// ```rust
/// use geo::LineString;
/// use zone_logbook::{Coordinate, geo_utils};
///
/// let square = LineString::from(vec![(19.0, 47.0), (19.1, 47.0), (19.1, 47.1), (19.0, 47.1)]);
/// assert!(geo_utils::point_in_polygon(&Coordinate::new(47.05, 19.05), &square));
/// assert!(!geo_utils::point_in_polygon(&Coordinate::new(47.2, 19.05), &square));
/// ```
pub fn point_in_polygon(point: &Coordinate, ring: &LineString<f64>) -> bool {
    let coords = &ring.0;
    let n = coords.len();
    if n == 0 {
        return false;
    }

    let (x, y) = (point.longitude, point.latitude);
    let mut inside = false;

    for i in 0..n {
        let a = coords[i];
        let b = coords[(i + 1) % n];
        let spans = (a.y > y) != (b.y > y);
        if spans && x < (b.x - a.x) * (y - a.y) / (b.y - a.y + HORIZONTAL_EDGE_EPSILON) + a.x {
            inside = !inside;
        }
    }

    inside
}

// =============================================================================
// Bounding Box Functions
// =============================================================================

/// Bounding box that encloses every point within `radius` meters of `center`.
///
/// Uses the exact spherical bound for the longitude span. When the circle reaches
/// a pole or crosses the antimeridian the longitude span widens to the full
/// `[-180, 180]` range, so the box never under-covers.
pub fn circle_bounds(center: &Coordinate, radius: f64) -> Bounds {
    let angular = (radius.max(0.0) / EARTH_RADIUS_M).to_degrees();
    let min_lat = center.latitude - angular;
    let max_lat = center.latitude + angular;

    if min_lat <= -90.0 || max_lat >= 90.0 {
        return Bounds {
            min_lat: min_lat.max(-90.0),
            max_lat: max_lat.min(90.0),
            min_lng: -180.0,
            max_lng: 180.0,
        };
    }

    let sin_angular = angular.to_radians().sin();
    let cos_lat = center.latitude.to_radians().cos();
    if sin_angular >= cos_lat {
        return Bounds { min_lat, max_lat, min_lng: -180.0, max_lng: 180.0 };
    }

    let d_lng = (sin_angular / cos_lat).asin().to_degrees();
    let min_lng = center.longitude - d_lng;
    let max_lng = center.longitude + d_lng;

    if min_lng < -180.0 || max_lng > 180.0 {
        Bounds { min_lat, max_lat, min_lng: -180.0, max_lng: 180.0 }
    } else {
        Bounds { min_lat, max_lat, min_lng, max_lng }
    }
}

/// Bounding box of a polygon ring, `None` for an empty ring.
pub fn ring_bounds(ring: &LineString<f64>) -> Option<Bounds> {
    ring.bounding_rect().map(|rect| Bounds {
        min_lat: rect.min().y,
        max_lat: rect.max().y,
        min_lng: rect.min().x,
        max_lng: rect.max().x,
    })
}

// =============================================================================
// Center/Centroid Functions
// =============================================================================

/// Area centroid of a polygon ring.
///
/// An open ring is closed implicitly. A zero-area ring (such as a single vertex)
/// falls back to its first vertex; an empty ring returns `None`.
pub fn polygon_centroid(ring: &LineString<f64>) -> Option<Coordinate> {
    let first = *ring.0.first()?;
    let polygon = Polygon::new(ring.clone(), vec![]);

    if polygon.signed_area() == 0.0 {
        return Some(Coordinate::new(first.y, first.x));
    }

    polygon
        .centroid()
        .map(|c| Coordinate::new(c.y(), c.x()))
}

// =============================================================================
// Unit Tests
// =============================================================================
