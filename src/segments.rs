//! Zone-to-zone segment aggregation.
//!
//! Walks trips in start order and turns them into [`ZoneSegment`] rows. The walk
//! is a two-state machine:
//!
//! - **Idle**: no departure recorded. A trip starting inside a zone opens a segment.
//! - **Open**: a departure zone, time and address plus running distance and
//!   duration totals. Every trip seen while open adds its full mileage and
//!   duration, including the trip that opened the segment.
//!
//! While open, a trip ending inside a zone closes the segment and emits a row.
//! A trip that does not close it but starts inside a zone replaces the departure
//! and restarts the totals from that trip alone. A segment still open when the
//! trips run out is dropped.
//!
//! When a point lies in several overlapping zones, all their names are joined
//! into one label rather than producing one row per zone.

use chrono::{DateTime, FixedOffset};
use log::debug;

use crate::error::Result;
use crate::timestamp::parse_timestamp;
use crate::zones::{ZoneLookup, ZoneMatchSet};
use crate::{Geozone, Trip, ZoneSegment};

const ZONE_SEPARATOR: &str = ", ";

/// A trip resolved against the zones and with parsed timestamps.
struct PreparedTrip<'a> {
    trip: &'a Trip,
    start_at: Option<DateTime<FixedOffset>>,
    end_at: Option<DateTime<FixedOffset>>,
    start_zones: ZoneMatchSet,
    end_zones: ZoneMatchSet,
}

/// Departure side of a segment under construction.
#[derive(Debug, Clone)]
struct Departure {
    zones: String,
    address: String,
    at: Option<DateTime<FixedOffset>>,
}

impl Departure {
    fn from_start(prepared: &PreparedTrip) -> Self {
        Self {
            zones: prepared.start_zones.join(ZONE_SEPARATOR),
            address: prepared.trip.start.address.clone(),
            at: prepared.start_at,
        }
    }
}

#[derive(Debug, Clone)]
enum SegmentState {
    Idle,
    Open {
        departure: Departure,
        meters: f64,
        seconds: i64,
    },
}

/// Aggregate trips into zone-to-zone segments using a linear zone scan.
///
/// Fails only on an unparsable timestamp.
pub fn trips_to_zone_segments(trips: &[Trip], geozones: &[Geozone]) -> Result<Vec<ZoneSegment>> {
    trips_to_zone_segments_with(trips, geozones)
}

/// Aggregate trips into zone-to-zone segments with any [`ZoneLookup`].
pub fn trips_to_zone_segments_with<L: ZoneLookup + ?Sized>(
    trips: &[Trip],
    lookup: &L,
) -> Result<Vec<ZoneSegment>> {
    let mut prepared = trips
        .iter()
        .map(|trip| {
            Ok(PreparedTrip {
                trip,
                start_at: parse_timestamp(trip.start.datetime.as_deref())?,
                end_at: parse_timestamp(trip.end.datetime.as_deref())?,
                start_zones: lookup.zones_containing(trip.start.coordinate.as_ref()),
                end_zones: lookup.zones_containing(trip.end.coordinate.as_ref()),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    prepared.sort_by_key(|p| p.start_at);

    let mut segments = Vec::new();
    let mut state = SegmentState::Idle;

    for (idx, current) in prepared.iter().enumerate() {
        let starts_in_zone = !current.start_zones.is_empty();
        let ends_in_zone = !current.end_zones.is_empty();

        if matches!(state, SegmentState::Idle) && starts_in_zone {
            state = SegmentState::Open {
                departure: Departure::from_start(current),
                meters: 0.0,
                seconds: 0,
            };
        }

        let SegmentState::Open { departure, meters, seconds } = &mut state else {
            continue;
        };

        *meters += current.trip.mileage;
        *seconds = seconds.saturating_add(current.trip.duration);

        if ends_in_zone {
            let stay_seconds = prepared
                .get(idx + 1)
                .and_then(|next| stay_between(current.end_at, next.start_at));

            segments.push(close_segment(departure, current, *meters, *seconds, stay_seconds));
            state = SegmentState::Idle;
        } else if starts_in_zone {
            *departure = Departure::from_start(current);
            *meters = current.trip.mileage;
            *seconds = current.trip.duration;
        }
    }

    if let SegmentState::Open { departure, .. } = &state {
        debug!("[Segments] Dropping open segment from '{}' with no arrival", departure.zones);
    }

    debug!("[Segments] {} trips -> {} segments", prepared.len(), segments.len());

    Ok(segments)
}

/// Positive whole seconds between an arrival and the next departure.
fn stay_between(
    arrived: Option<DateTime<FixedOffset>>,
    next_start: Option<DateTime<FixedOffset>>,
) -> Option<i64> {
    let seconds = (next_start? - arrived?).num_seconds();
    (seconds > 0).then_some(seconds)
}

fn close_segment(
    departure: &Departure,
    arrival: &PreparedTrip,
    meters: f64,
    seconds: i64,
    stay_seconds: Option<i64>,
) -> ZoneSegment {
    ZoneSegment {
        departure: departure.zones.clone(),
        departure_address: departure.address.clone(),
        departure_at: departure.at,
        arrival: arrival.end_zones.join(ZONE_SEPARATOR),
        arrival_address: arrival.trip.end.address.clone(),
        arrival_at: arrival.end_at,
        distance_km: meters_to_km(meters),
        duration_seconds: seconds,
        duration: format_hms(seconds),
        stay_seconds,
        stay: stay_seconds.map(format_hms).unwrap_or_default(),
    }
}

/// Meters to kilometers rounded to 3 decimals.
fn meters_to_km(meters: f64) -> f64 {
    meters.round() / 1000.0
}

/// Seconds as zero-padded `HH:MM:SS`. Hours are not wrapped at 24; negative input is 0.
///
/// ```
/// use zone_logbook::format_hms;
/// assert_eq!(format_hms(0), "00:00:00");
/// assert_eq!(format_hms(3_725), "01:02:05");
/// assert_eq!(format_hms(100 * 3_600), "100:00:00");
/// ```
pub fn format_hms(total_seconds: i64) -> String {
    let s = total_seconds.max(0);
    format!("{:02}:{:02}:{:02}", s / 3600, (s % 3600) / 60, s % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Coordinate, TripPoint};

    fn depot() -> Coordinate {
        Coordinate::new(47.50, 19.04)
    }

    fn client() -> Coordinate {
        Coordinate::new(47.60, 19.20)
    }

    fn market() -> Coordinate {
        Coordinate::new(47.45, 19.30)
    }

    fn nowhere() -> Coordinate {
        Coordinate::new(47.70, 18.80)
    }

    fn geozones() -> Vec<Geozone> {
        vec![
            Geozone::circle("Depot", depot(), 300.0),
            Geozone::circle("Client", client(), 300.0),
            Geozone::circle("Market", market(), 300.0),
        ]
    }

    fn trip(from: Coordinate, start: &str, to: Coordinate, end: &str, mileage: f64, duration: i64) -> Trip {
        Trip::new(
            TripPoint::new(Some(from), Some(start)).with_address(format!("from {start}")),
            TripPoint::new(Some(to), Some(end)).with_address(format!("to {end}")),
            mileage,
            duration,
        )
    }

    #[test]
    fn test_format_hms() {
        assert_eq!(format_hms(59), "00:00:59");
        assert_eq!(format_hms(600), "00:10:00");
        assert_eq!(format_hms(86_400 + 1), "24:00:01");
        assert_eq!(format_hms(-5), "00:00:00");
    }

    #[test]
    fn test_meters_to_km_rounding() {
        assert_eq!(meters_to_km(10_000.0), 10.0);
        assert_eq!(meters_to_km(1_234.5678), 1.235);
        assert_eq!(meters_to_km(0.4), 0.0);
    }

    #[test]
    fn test_depot_to_client_across_three_trips() {
        let trips = vec![
            trip(depot(), "2024-03-01T08:00:00Z", nowhere(), "2024-03-01T08:05:00Z", 5000.0, 300),
            trip(nowhere(), "2024-03-01T08:05:00Z", nowhere(), "2024-03-01T08:08:20Z", 3000.0, 200),
            trip(nowhere(), "2024-03-01T08:08:20Z", client(), "2024-03-01T08:10:00Z", 2000.0, 100),
        ];

        let segments = trips_to_zone_segments(&trips, &geozones()).unwrap();
        assert_eq!(segments.len(), 1);

        let seg = &segments[0];
        assert_eq!(seg.departure, "Depot");
        assert_eq!(seg.departure_address, "from 2024-03-01T08:00:00Z");
        assert_eq!(seg.arrival, "Client");
        assert_eq!(seg.arrival_address, "to 2024-03-01T08:10:00Z");
        assert_eq!(seg.distance_km, 10.0);
        assert_eq!(seg.duration, "00:10:00");
        assert_eq!(seg.stay_seconds, None);
        assert_eq!(seg.stay, "");
    }

    #[test]
    fn test_stay_until_next_trip() {
        let trips = vec![
            trip(depot(), "2024-03-01T08:00:00Z", client(), "2024-03-01T08:30:00Z", 20_000.0, 1800),
            trip(client(), "2024-03-01T09:45:30Z", depot(), "2024-03-01T10:15:00Z", 20_000.0, 1770),
        ];

        let segments = trips_to_zone_segments(&trips, &geozones()).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].stay_seconds, Some(4530));
        assert_eq!(segments[0].stay, "01:15:30");
        assert_eq!(segments[1].departure, "Client");
        assert_eq!(segments[1].stay, "");
    }

    #[test]
    fn test_non_positive_stay_is_empty() {
        let trips = vec![
            trip(depot(), "2024-03-01T08:00:00Z", client(), "2024-03-01T08:30:00Z", 1.0, 1800),
            trip(client(), "2024-03-01T08:30:00Z", depot(), "2024-03-01T09:00:00Z", 1.0, 1800),
        ];
        let segments = trips_to_zone_segments(&trips, &geozones()).unwrap();
        assert_eq!(segments[0].stay_seconds, None);
        assert_eq!(segments[0].stay, "");
    }

    #[test]
    fn test_trips_before_any_zone_are_ignored() {
        let trips = vec![
            trip(nowhere(), "2024-03-01T07:00:00Z", nowhere(), "2024-03-01T07:30:00Z", 9_000.0, 1800),
            trip(nowhere(), "2024-03-01T07:40:00Z", client(), "2024-03-01T07:50:00Z", 1_000.0, 600),
            trip(depot(), "2024-03-01T08:00:00Z", client(), "2024-03-01T08:30:00Z", 20_000.0, 1800),
        ];
        let segments = trips_to_zone_segments(&trips, &geozones()).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].distance_km, 20.0);
    }

    #[test]
    fn test_re_departure_restarts_totals() {
        let trips = vec![
            trip(depot(), "2024-03-01T08:00:00Z", nowhere(), "2024-03-01T08:30:00Z", 10_000.0, 1800),
            trip(market(), "2024-03-01T09:00:00Z", nowhere(), "2024-03-01T09:20:00Z", 4_000.0, 1200),
            trip(nowhere(), "2024-03-01T09:30:00Z", client(), "2024-03-01T09:40:00Z", 2_500.0, 600),
        ];
        let segments = trips_to_zone_segments(&trips, &geozones()).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].departure, "Market");
        assert_eq!(segments[0].departure_at, parse_timestamp(Some("2024-03-01T09:00:00Z")).unwrap());
        assert_eq!(segments[0].distance_km, 6.5);
        assert_eq!(segments[0].duration_seconds, 1800);
    }

    #[test]
    fn test_open_segment_without_arrival_is_dropped() {
        let trips = vec![
            trip(depot(), "2024-03-01T08:00:00Z", client(), "2024-03-01T08:30:00Z", 1.0, 1),
            trip(client(), "2024-03-01T09:00:00Z", nowhere(), "2024-03-01T09:30:00Z", 1.0, 1),
        ];
        let segments = trips_to_zone_segments(&trips, &geozones()).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].arrival, "Client");
    }

    #[test]
    fn test_overlapping_zones_are_joined() {
        let mut zones = geozones();
        zones.push(Geozone::circle("Depot Gate", depot(), 50.0));
        let trips = vec![trip(depot(), "2024-03-01T08:00:00Z", client(), "2024-03-01T08:30:00Z", 1.0, 1)];
        let segments = trips_to_zone_segments(&trips, &zones).unwrap();
        assert_eq!(segments[0].departure, "Depot, Depot Gate");
    }

    #[test]
    fn test_absent_coordinates_match_no_zone() {
        let trips = vec![Trip::new(
            TripPoint::new(None, Some("2024-03-01T08:00:00Z")),
            TripPoint::new(Some(client()), Some("2024-03-01T08:30:00Z")),
            1.0,
            1,
        )];
        assert!(trips_to_zone_segments(&trips, &geozones()).unwrap().is_empty());
    }

    #[test]
    fn test_huge_durations_saturate() {
        let trips = vec![
            trip(depot(), "2024-03-01T08:00:00Z", nowhere(), "2024-03-01T08:30:00Z", 1_000.0, i64::MAX),
            trip(nowhere(), "2024-03-01T09:00:00Z", client(), "2024-03-01T09:30:00Z", 1_000.0, i64::MAX),
        ];
        let segments = trips_to_zone_segments(&trips, &geozones()).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].duration_seconds, i64::MAX);
        assert_eq!(segments[0].distance_km, 2.0);
    }

    #[test]
    fn test_processing_follows_start_order() {
        let trips = vec![
            trip(nowhere(), "2024-03-01T09:00:00Z", client(), "2024-03-01T09:30:00Z", 3_000.0, 1800),
            trip(depot(), "2024-03-01T08:00:00Z", nowhere(), "2024-03-01T08:30:00Z", 2_000.0, 1800),
        ];
        let segments = trips_to_zone_segments(&trips, &geozones()).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].distance_km, 5.0);
        assert_eq!(segments[0].duration, "01:00:00");
    }

    #[test]
    fn test_empty_input() {
        assert!(trips_to_zone_segments(&[], &geozones()).unwrap().is_empty());
    }
}
