//! Example of building logbooks for a whole fleet in parallel.
//!
//! Run with: cargo run --example fleet_logbooks --features parallel

use std::time::Instant;
use zone_logbook::{
    build_logbooks_parallel, Coordinate, Geozone, LogbookConfig, Trip, TripPoint, VehicleTrips,
};

fn main() {
    println!("Fleet Logbook Example\n");

    let sites = [
        ("Depot North", Coordinate::new(47.560, 19.060)),
        ("Depot South", Coordinate::new(47.420, 19.080)),
        ("Warehouse", Coordinate::new(47.480, 19.250)),
        ("Harbour", Coordinate::new(47.510, 18.950)),
    ];

    let geozones: Vec<Geozone> = sites
        .iter()
        .enumerate()
        .map(|(i, (name, center))| Geozone::circle(*name, *center, 400.0).with_id(format!("zone-{}", i)))
        .collect();

    // Each vehicle shuttles between two sites a few times a day
    let vehicles: Vec<VehicleTrips> = (0..200)
        .map(|v| {
            let a = sites[v % sites.len()].1;
            let b = sites[(v + 1) % sites.len()].1;
            let trips = (0..8)
                .map(|i| {
                    let (from, to) = if i % 2 == 0 { (a, b) } else { (b, a) };
                    let hour = 6 + i;
                    Trip::new(
                        TripPoint::new(Some(from), Some(&format!("2024-03-01T{:02}:00:00Z", hour))),
                        TripPoint::new(Some(to), Some(&format!("2024-03-01T{:02}:35:00Z", hour))),
                        15_000.0 + (v % 7) as f64 * 500.0,
                        35 * 60,
                    )
                })
                .collect();
            VehicleTrips {
                vehicle_id: format!("truck-{:03}", v),
                trips,
            }
        })
        .collect();

    let config = LogbookConfig {
        min_trip_minutes: 3,
        max_gap_minutes: 2,
        ..Default::default()
    };

    let start = Instant::now();
    let logbooks = build_logbooks_parallel(&vehicles, &geozones, &config);
    let elapsed = start.elapsed();

    let segments: usize = logbooks
        .iter()
        .filter_map(|v| v.logbook.as_ref().ok())
        .map(|l| l.segments.len())
        .sum();
    let failed = logbooks.iter().filter(|v| v.logbook.is_err()).count();

    println!("Vehicles: {}", logbooks.len());
    println!("Segments: {}", segments);
    println!("Failed:   {}", failed);
    println!("Time:     {:?}\n", elapsed);

    if let Some(first) = logbooks.first() {
        if let Ok(logbook) = &first.logbook {
            println!("{}:", first.vehicle_id);
            for s in &logbook.segments {
                println!("  {} -> {}  {:.1} km  {}  stay {}", s.departure, s.arrival, s.distance_km, s.duration, s.stay);
            }
        }
    }
}
