//! Trip merging.
//!
//! Collapses short trips and trips separated by short stops into single logical
//! movements. Trips are walked in start order while a run of trips is kept open;
//! a trip joins the run when either
//!
//! - its own duration is below `min_duration_minutes` (strict), or
//! - the gap from the previous trip's end to its start is at most `max_gap_minutes`.
//!
//! The gap rule only applies when both timestamps are present. With
//! `max_gap_minutes = 0` touching and overlapping trips still merge.

use chrono::{DateTime, FixedOffset};
use log::debug;

use crate::error::Result;
use crate::timestamp::parse_timestamp;
use crate::Trip;

/// Type tag of a combined trip when no member carries one.
pub const MERGED_TRIP_TYPE: &str = "merged";

/// A trip with its parsed timestamps.
struct TimedTrip<'a> {
    trip: &'a Trip,
    start: Option<DateTime<FixedOffset>>,
    end: Option<DateTime<FixedOffset>>,
}

impl<'a> TimedTrip<'a> {
    fn parse(trip: &'a Trip) -> Result<Self> {
        Ok(Self {
            trip,
            start: parse_timestamp(trip.start.datetime.as_deref())?,
            end: parse_timestamp(trip.end.datetime.as_deref())?,
        })
    }
}

/// Merge adjacent trips per the duration and gap thresholds.
///
/// Output is in start order; trips without a start timestamp sort first. A run
/// of one trip is emitted unchanged. Mileage and duration are conserved.
///
/// # Example
/// ```
/// use zone_logbook::{Trip, TripPoint, merge_short_trips};
///
/// let trips = vec![
///     Trip::new(
///         TripPoint::new(None, Some("2024-03-01T08:00:00Z")),
///         TripPoint::new(None, Some("2024-03-01T08:02:00Z")),
///         800.0, 120,
///     ),
///     Trip::new(
///         TripPoint::new(None, Some("2024-03-01T08:30:00Z")),
///         TripPoint::new(None, Some("2024-03-01T08:31:00Z")),
///         300.0, 60,
///     ),
/// ];
///
/// let merged = merge_short_trips(&trips, 5, 0).unwrap();
/// assert_eq!(merged.len(), 1);
/// assert_eq!(merged[0].duration, 180);
/// ```
pub fn merge_short_trips(
    trips: &[Trip],
    min_duration_minutes: u32,
    max_gap_minutes: u32,
) -> Result<Vec<Trip>> {
    if trips.is_empty() {
        return Ok(Vec::new());
    }

    let min_duration_s = i64::from(min_duration_minutes) * 60;
    let max_gap_s = i64::from(max_gap_minutes) * 60;

    let mut timed = trips
        .iter()
        .map(TimedTrip::parse)
        .collect::<Result<Vec<_>>>()?;
    // Stable: equal starts keep input order
    timed.sort_by_key(|t| t.start);

    let mut merged = Vec::with_capacity(timed.len());
    let mut run: Vec<&TimedTrip> = Vec::new();

    for current in &timed {
        let Some(previous) = run.last() else {
            run.push(current);
            continue;
        };

        let short = current.trip.duration < min_duration_s;
        let close = match (previous.end, current.start) {
            (Some(end), Some(start)) => (start - end).num_seconds() <= max_gap_s,
            _ => false,
        };

        if short || close {
            run.push(current);
        } else {
            merged.push(combine(&run));
            run.clear();
            run.push(current);
        }
    }

    if !run.is_empty() {
        merged.push(combine(&run));
    }

    debug!(
        "[Merge] {} trips -> {} (min {} min, gap {} min)",
        trips.len(),
        merged.len(),
        min_duration_minutes,
        max_gap_minutes
    );

    Ok(merged)
}

/// Fold a run into one trip: first start, last end, summed totals.
fn combine(run: &[&TimedTrip]) -> Trip {
    if let [single] = run {
        return single.trip.clone();
    }

    // Callers never pass an empty run
    let first = run[0].trip;
    let last = run[run.len() - 1].trip;

    let trip_type = run
        .iter()
        .rev()
        .filter_map(|t| t.trip.trip_type.as_deref())
        .find(|tag| !tag.is_empty())
        .unwrap_or(MERGED_TRIP_TYPE)
        .to_string();

    Trip {
        start: first.start.clone(),
        end: last.end.clone(),
        mileage: run.iter().map(|t| t.trip.mileage).sum(),
        duration: run
            .iter()
            .fold(0i64, |total, t| total.saturating_add(t.trip.duration)),
        trip_type: Some(trip_type),
    }
}
