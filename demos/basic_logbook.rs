//! Basic example: one vehicle's day turned into zone-to-zone rows.
//!
//! Run with: cargo run --example basic_logbook

use zone_logbook::{
    build_logbook, merge_short_trips, Coordinate, Geozone, LogbookConfig, Trip, TripPoint,
};

fn main() {
    let depot = Coordinate::new(47.4979, 19.0402);
    let client = Coordinate::new(47.5316, 19.1520);
    let somewhere = Coordinate::new(47.5100, 19.0900);

    let geozones = vec![
        Geozone::circle("Depot", depot, 250.0),
        Geozone::polygon(
            "Client",
            vec![(19.150, 47.530), (19.154, 47.530), (19.154, 47.533), (19.150, 47.533)],
        ),
    ];

    // Depot -> (fuel stop) -> (traffic stop) -> Client, then back later
    let trips = vec![
        Trip::new(
            TripPoint::new(Some(depot), Some("2024-03-01T08:00:00Z")).with_address("Depot yard"),
            TripPoint::new(Some(somewhere), Some("2024-03-01T08:05:00Z")),
            5000.0,
            300,
        ),
        Trip::new(
            TripPoint::new(Some(somewhere), Some("2024-03-01T08:20:00Z")),
            TripPoint::new(Some(somewhere), Some("2024-03-01T08:23:20Z")),
            3000.0,
            200,
        ),
        Trip::new(
            TripPoint::new(Some(somewhere), Some("2024-03-01T08:40:00Z")),
            TripPoint::new(Some(client), Some("2024-03-01T08:41:40Z"))
                .with_address("Client gate 2"),
            2000.0,
            100,
        ),
        Trip::new(
            TripPoint::new(Some(client), Some("2024-03-01T12:00:00Z")),
            TripPoint::new(Some(depot), Some("2024-03-01T12:25:00+00:00")),
            10400.0,
            1500,
        ),
    ];

    println!("Zone Logbook Example\n");

    let config = LogbookConfig::default();
    let logbook = match build_logbook(&trips, &geozones, &config) {
        Ok(logbook) => logbook,
        Err(e) => {
            eprintln!("Failed to build logbook: {}", e);
            return;
        }
    };

    println!("{} trips -> {} segments\n", trips.len(), logbook.segments.len());
    for segment in &logbook.segments {
        println!("{} -> {}", segment.departure, segment.arrival);
        println!("  from: {}", segment.departure_address);
        println!("  to:   {}", segment.arrival_address);
        println!("  distance: {:.3} km", segment.distance_km);
        println!("  driving:  {}", segment.duration);
        println!("  stay:     {}\n", if segment.stay.is_empty() { "-" } else { segment.stay.as_str() });
    }

    // Merging: two short back-to-back trips become one
    let short = vec![
        Trip::new(
            TripPoint::new(Some(depot), Some("2024-03-01T07:00:00Z")),
            TripPoint::new(Some(somewhere), Some("2024-03-01T07:02:00Z")),
            900.0,
            120,
        ),
        Trip::new(
            TripPoint::new(Some(somewhere), Some("2024-03-01T07:02:00Z")),
            TripPoint::new(Some(somewhere), Some("2024-03-01T07:03:00Z")),
            400.0,
            60,
        ),
    ];

    match merge_short_trips(&short, 5, 0) {
        Ok(merged) => println!(
            "Merged {} short trips into {} ({}s, {:.0} m)",
            short.len(),
            merged.len(),
            merged[0].duration,
            merged[0].mileage
        ),
        Err(e) => eprintln!("Merge failed: {}", e),
    }
}
