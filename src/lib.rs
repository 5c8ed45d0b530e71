//! # Zone Logbook
//!
//! Turns a vehicle's raw trip records into a reviewable travel log annotated with
//! the named geozones the vehicle departed from and arrived at.
//!
//! This library provides:
//! - Point-in-geozone containment for circular and polygonal zones
//! - Merging of short or closely spaced trips into single movements
//! - Zone-to-zone segment aggregation with distance, duration and dwell time
//! - Optional fleet API and reverse-geocoding clients
//!
//! ## Features
//!
//! - **`serde`** - Serialize domain types and decode fleet API JSON
//! - **`parallel`** - Build logbooks for many vehicles in parallel with rayon
//! - **`http`** - Enable the fleet API client and the reverse geocoder
//! - **`cli`** - Build the `logbook-cli` debug tool
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use zone_logbook::{Coordinate, Geozone, Trip, TripPoint, LogbookConfig, build_logbook};
//!
//! let depot = Coordinate::new(47.50, 19.04);
//! let client = Coordinate::new(47.60, 19.20);
//! let geozones = vec![
//!     Geozone::circle("Depot", depot, 300.0),
//!     Geozone::circle("Client", client, 300.0),
//! ];
//!
//! let trips = vec![Trip::new(
//!     TripPoint::new(Some(depot), Some("2024-03-01T08:00:00Z")),
//!     TripPoint::new(Some(client), Some("2024-03-01T08:40:00Z")),
//!     21_500.0,
//!     2_400,
//! )];
//!
//! let logbook = build_logbook(&trips, &geozones, &LogbookConfig::default()).unwrap();
//! assert_eq!(logbook.segments.len(), 1);
//! assert_eq!(logbook.segments[0].departure, "Depot");
//! assert_eq!(logbook.segments[0].arrival, "Client");
//! assert_eq!(logbook.segments[0].duration, "00:40:00");
//! ```
//!
//! All core operations are pure and synchronous. Every call owns its state, so
//! separate vehicles can be processed from separate threads.

use chrono::{DateTime, FixedOffset};
use geo::LineString;
use log::info;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{LogbookError, Result};

// Distance and containment predicates
pub mod geo_utils;

// Point-to-geozone lookup
pub mod zones;
pub use zones::{filter_geozones, map_center, zones_containing, GeozoneIndex, ZoneLookup};

// Timestamp normalization
pub mod timestamp;
pub use timestamp::parse_timestamp;

// Trip merging
pub mod merge;
pub use merge::merge_short_trips;

// Zone-to-zone segment aggregation
pub mod segments;
pub use segments::{format_hms, trips_to_zone_segments, trips_to_zone_segments_with};

// Postal addresses
pub mod address;
pub use address::{format_address, Address};

// Explicit list cache for fetched objects and geozones
pub mod cache;
pub use cache::ListCache;

// Fleet API JSON decoding
#[cfg(feature = "serde")]
pub mod wire;

#[cfg(feature = "serde")]
pub use wire::{parse_geozones, parse_trips, VehicleObject};

// HTTP clients for the fleet API and reverse geocoding
#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::{FmClient, ReverseGeocoder};

// ============================================================================
// Core Types
// ============================================================================

/// A WGS84 coordinate with latitude and longitude in degrees.
///
/// # Example
/// ```
/// use zone_logbook::Coordinate;
/// let point = Coordinate::new(47.4979, 19.0402); // Budapest
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Create a new coordinate.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check if the coordinate is finite and within WGS84 ranges.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// Axis-aligned bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

/// One end of a trip: where and when, plus the formatted address.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TripPoint {
    /// Position, absent when the tracker reported none
    pub coordinate: Option<Coordinate>,
    /// Raw timestamp as delivered by the data source
    pub datetime: Option<String>,
    /// Single-line address, empty when unknown
    pub address: String,
}

impl TripPoint {
    pub fn new(coordinate: Option<Coordinate>, datetime: Option<&str>) -> Self {
        Self {
            coordinate,
            datetime: datetime.map(str::to_string),
            address: String::new(),
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }
}

/// One recorded vehicle movement.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Trip {
    pub start: TripPoint,
    pub end: TripPoint,
    /// Distance driven in meters
    pub mileage: f64,
    /// Duration in seconds
    pub duration: i64,
    /// Source-defined type tag
    pub trip_type: Option<String>,
}

impl Trip {
    pub fn new(start: TripPoint, end: TripPoint, mileage: f64, duration: i64) -> Self {
        Self {
            start,
            end,
            mileage,
            duration,
            trip_type: None,
        }
    }

    pub fn with_type(mut self, trip_type: impl Into<String>) -> Self {
        self.trip_type = Some(trip_type.into());
        self
    }
}

/// Geometry of a geozone. A zone has exactly one kind.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum GeozoneShape {
    /// Everything within `radius` meters of `center`
    Circle { center: Coordinate, radius: f64 },
    /// First ring of a polygon, `x = longitude`, `y = latitude`; holes are not kept
    Polygon { ring: LineString<f64> },
}

/// A named area used to classify trip endpoints.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Geozone {
    /// Identifier assigned by the data source, if any
    pub id: Option<String>,
    pub name: String,
    /// `None` when the source geometry was missing or malformed; matches nothing
    pub shape: Option<GeozoneShape>,
}

impl Geozone {
    /// Create a circular geozone.
    pub fn circle(name: impl Into<String>, center: Coordinate, radius: f64) -> Self {
        Self {
            id: None,
            name: name.into(),
            shape: Some(GeozoneShape::Circle { center, radius }),
        }
    }

    /// Create a polygonal geozone from its outer ring.
    ///
    /// ```
    /// use zone_logbook::Geozone;
    /// let yard = Geozone::polygon("Yard", vec![(19.0, 47.0), (19.1, 47.0), (19.1, 47.1)]);
    /// assert_eq!(yard.name, "Yard");
    /// ```
    pub fn polygon(name: impl Into<String>, ring: impl Into<LineString<f64>>) -> Self {
        Self {
            id: None,
            name: name.into(),
            shape: Some(GeozoneShape::Polygon { ring: ring.into() }),
        }
    }

    /// A zone whose geometry could not be resolved.
    pub fn unresolved(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            shape: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Does this zone contain the point. Invalid coordinates are in no zone.
    pub fn contains(&self, point: &Coordinate) -> bool {
        if !point.is_valid() {
            return false;
        }
        match &self.shape {
            Some(GeozoneShape::Circle { center, radius }) => {
                geo_utils::point_in_circle(point, center, *radius)
            }
            Some(GeozoneShape::Polygon { ring }) => geo_utils::point_in_polygon(point, ring),
            None => false,
        }
    }

    /// Bounding box of the zone, `None` if it can contain nothing.
    pub fn bounds(&self) -> Option<Bounds> {
        match &self.shape {
            Some(GeozoneShape::Circle { center, radius }) if *radius >= 0.0 => {
                Some(geo_utils::circle_bounds(center, *radius))
            }
            Some(GeozoneShape::Circle { .. }) => None,
            Some(GeozoneShape::Polygon { ring }) => geo_utils::ring_bounds(ring),
            None => None,
        }
    }

    /// Representative point for labels: circle center or polygon centroid.
    pub fn anchor(&self) -> Option<Coordinate> {
        match &self.shape {
            Some(GeozoneShape::Circle { center, .. }) => Some(*center),
            Some(GeozoneShape::Polygon { ring }) => geo_utils::polygon_centroid(ring),
            None => None,
        }
    }
}

/// One reportable zone-to-zone row.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ZoneSegment {
    /// Departure zone names joined with ", "
    pub departure: String,
    pub departure_address: String,
    pub departure_at: Option<DateTime<FixedOffset>>,
    /// Arrival zone names joined with ", "
    pub arrival: String,
    pub arrival_address: String,
    pub arrival_at: Option<DateTime<FixedOffset>>,
    /// Summed mileage in kilometers, rounded to 3 decimals
    pub distance_km: f64,
    /// Summed duration in seconds
    pub duration_seconds: i64,
    /// `duration_seconds` as `HH:MM:SS`
    pub duration: String,
    /// Time from arrival until the next trip started, when known and positive
    pub stay_seconds: Option<i64>,
    /// `stay_seconds` as `HH:MM:SS`, empty when unknown
    pub stay: String,
}

/// Configuration for building a logbook.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LogbookConfig {
    /// Trips shorter than this join the preceding run. 0 disables the rule.
    /// Default: 0
    pub min_trip_minutes: u32,

    /// Trips starting within this many minutes of the previous trip's end join
    /// its run. With 0 only touching or overlapping trips merge.
    /// Default: 0
    pub max_gap_minutes: u32,

    /// Run the merge pass before segment aggregation.
    /// Default: true
    pub merge_trips: bool,

    /// Geozone names ignored during containment checks.
    /// Default: empty
    pub excluded_zones: Vec<String>,
}

impl Default for LogbookConfig {
    fn default() -> Self {
        Self {
            min_trip_minutes: 0,
            max_gap_minutes: 0,
            merge_trips: true,
            excluded_zones: Vec::new(),
        }
    }
}

/// Output of [`build_logbook`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Logbook {
    /// Trips after merging, in start order
    pub trips: Vec<Trip>,
    /// Zone-to-zone rows
    pub segments: Vec<ZoneSegment>,
}

/// Trips of one vehicle, input to [`build_logbooks_parallel`].
#[derive(Debug, Clone)]
pub struct VehicleTrips {
    pub vehicle_id: String,
    pub trips: Vec<Trip>,
}

/// Per-vehicle result of [`build_logbooks_parallel`].
#[derive(Debug)]
pub struct VehicleLogbook {
    pub vehicle_id: String,
    pub logbook: Result<Logbook>,
}

// ============================================================================
// Pipeline
// ============================================================================

/// Build a logbook: drop excluded zones, merge trips, aggregate zone segments.
///
/// Fails only when a trip carries a timestamp that cannot be parsed.
pub fn build_logbook(trips: &[Trip], geozones: &[Geozone], config: &LogbookConfig) -> Result<Logbook> {
    let index = GeozoneIndex::new(filter_geozones(geozones, &config.excluded_zones));
    logbook_with_lookup(trips, &index, config)
}

/// Build logbooks for several vehicles in parallel.
///
/// The geozone index is shared read-only; each vehicle runs its own merge and
/// aggregation, so one vehicle's bad input does not affect the others.
#[cfg(feature = "parallel")]
pub fn build_logbooks_parallel(
    vehicles: &[VehicleTrips],
    geozones: &[Geozone],
    config: &LogbookConfig,
) -> Vec<VehicleLogbook> {
    use rayon::prelude::*;

    let start = std::time::Instant::now();
    let index = GeozoneIndex::new(filter_geozones(geozones, &config.excluded_zones));

    let logbooks: Vec<VehicleLogbook> = vehicles
        .par_iter()
        .map(|vehicle| VehicleLogbook {
            vehicle_id: vehicle.vehicle_id.clone(),
            logbook: logbook_with_lookup(&vehicle.trips, &index, config),
        })
        .collect();

    info!(
        "[Logbook] Built {} logbooks in parallel in {:?}",
        logbooks.len(),
        start.elapsed()
    );

    logbooks
}

fn logbook_with_lookup<L: ZoneLookup + ?Sized>(
    trips: &[Trip],
    lookup: &L,
    config: &LogbookConfig,
) -> Result<Logbook> {
    let start = std::time::Instant::now();

    let merged = if config.merge_trips {
        merge_short_trips(trips, config.min_trip_minutes, config.max_gap_minutes)?
    } else {
        trips.to_vec()
    };
    let segments = trips_to_zone_segments_with(&merged, lookup)?;

    info!(
        "[Logbook] {} trips -> {} merged -> {} segments in {:?}",
        trips.len(),
        merged.len(),
        segments.len(),
        start.elapsed()
    );

    Ok(Logbook {
        trips: merged,
        segments,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn depot() -> Coordinate {
        Coordinate::new(47.50, 19.04)
    }

    fn client() -> Coordinate {
        Coordinate::new(47.60, 19.20)
    }

    fn geozones() -> Vec<Geozone> {
        vec![
            Geozone::circle("Depot", depot(), 300.0),
            Geozone::circle("Client", client(), 300.0),
        ]
    }

    fn trip(from: Option<Coordinate>, start: &str, to: Option<Coordinate>, end: &str, m: f64, s: i64) -> Trip {
        Trip::new(
            TripPoint::new(from, Some(start)),
            TripPoint::new(to, Some(end)),
            m,
            s,
        )
    }

    #[test]
    fn test_coordinate_validation() {
        assert!(Coordinate::new(47.5, 19.0).is_valid());
        assert!(!Coordinate::new(91.0, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, 181.0).is_valid());
        assert!(!Coordinate::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_geozone_contains_dispatch() {
        let circle = Geozone::circle("C", depot(), 100.0);
        let square = Geozone::polygon("P", vec![(19.0, 47.0), (19.1, 47.0), (19.1, 47.1), (19.0, 47.1)]);
        let unresolved = Geozone::unresolved("U");

        assert!(circle.contains(&depot()));
        assert!(square.contains(&Coordinate::new(47.05, 19.05)));
        assert!(!unresolved.contains(&depot()));
        assert!(!circle.contains(&Coordinate::new(f64::NAN, f64::NAN)));
        assert!(!square.contains(&Coordinate::new(47.05, f64::INFINITY)));
        assert!(unresolved.bounds().is_none());
    }

    #[test]
    fn test_geozone_anchor() {
        let square = Geozone::polygon("P", vec![(19.0, 47.0), (19.2, 47.0), (19.2, 47.2), (19.0, 47.2)]);
        let anchor = square.anchor().unwrap();
        assert!((anchor.latitude - 47.1).abs() < 1e-9);
        assert!((anchor.longitude - 19.1).abs() < 1e-9);
        assert_eq!(Geozone::circle("C", depot(), 10.0).anchor(), Some(depot()));
    }

    #[test]
    fn test_build_logbook_depot_to_client() {
        let trips = vec![
            trip(Some(depot()), "2024-03-01T08:00:00Z", None, "2024-03-01T08:20:00Z", 5000.0, 1200),
            trip(None, "2024-03-01T09:00:00Z", Some(client()), "2024-03-01T09:10:00Z", 3000.0, 600),
        ];

        let logbook = build_logbook(&trips, &geozones(), &LogbookConfig::default()).unwrap();
        assert_eq!(logbook.trips.len(), 2);
        assert_eq!(logbook.segments.len(), 1);
        assert_eq!(logbook.segments[0].distance_km, 8.0);
        assert_eq!(logbook.segments[0].duration, "00:30:00");
    }

    #[test]
    fn test_build_logbook_excluded_zone() {
        let trips = vec![trip(
            Some(depot()),
            "2024-03-01T08:00:00Z",
            Some(client()),
            "2024-03-01T08:40:00Z",
            21_500.0,
            2400,
        )];
        let config = LogbookConfig {
            excluded_zones: vec!["Client".to_string()],
            ..Default::default()
        };

        let logbook = build_logbook(&trips, &geozones(), &config).unwrap();
        assert!(logbook.segments.is_empty());
    }

    #[test]
    fn test_build_logbook_merge_disabled_keeps_touching_trips() {
        let trips = vec![
            trip(Some(depot()), "2024-03-01T08:00:00Z", None, "2024-03-01T08:20:00Z", 5000.0, 1200),
            trip(None, "2024-03-01T08:20:00Z", Some(client()), "2024-03-01T08:30:00Z", 3000.0, 600),
        ];

        let merged = build_logbook(&trips, &geozones(), &LogbookConfig::default()).unwrap();
        assert_eq!(merged.trips.len(), 1);

        let config = LogbookConfig {
            merge_trips: false,
            ..Default::default()
        };
        let raw = build_logbook(&trips, &geozones(), &config).unwrap();
        assert_eq!(raw.trips.len(), 2);
        assert_eq!(raw.segments, merged.segments);
    }

    #[test]
    fn test_build_logbook_propagates_bad_timestamp() {
        let trips = vec![trip(Some(depot()), "not a time", None, "2024-03-01T08:20:00Z", 1.0, 1)];
        let err = build_logbook(&trips, &geozones(), &LogbookConfig::default()).unwrap_err();
        assert!(matches!(err, LogbookError::InvalidTimestamp { .. }));
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_build_logbooks_parallel_isolates_vehicles() {
        let good = VehicleTrips {
            vehicle_id: "truck-1".to_string(),
            trips: vec![trip(
                Some(depot()),
                "2024-03-01T08:00:00Z",
                Some(client()),
                "2024-03-01T08:40:00Z",
                21_500.0,
                2400,
            )],
        };
        let bad = VehicleTrips {
            vehicle_id: "truck-2".to_string(),
            trips: vec![trip(Some(depot()), "garbage", None, "garbage", 1.0, 1)],
        };

        let results = build_logbooks_parallel(&[good, bad], &geozones(), &LogbookConfig::default());
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].vehicle_id, "truck-1");
        assert_eq!(results[0].logbook.as_ref().unwrap().segments.len(), 1);
        assert!(results[1].logbook.is_err());
    }
}
