//! logbook-cli - Debug tool for zone logbooks
//!
//! Usage:
//!   logbook-cli report --trips <file> --geozones <file> [--json]
//!   logbook-cli fetch --api-key <key> --vehicle <id> --from <date> --to <date>
//!
//! `report` works on exported JSON files, `fetch` pulls trips and geozones from
//! the fleet API first. Both print the merged trips and the zone segments.

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use zone_logbook::{
    build_logbook, http::DEFAULT_PAGE_LIMIT, parse_geozones, parse_timestamp, parse_trips,
    FmClient, Geozone, Logbook, LogbookConfig, ReverseGeocoder, Trip,
};

#[derive(Parser)]
#[command(name = "logbook-cli")]
#[command(about = "Debug tool for geozone-annotated trip logbooks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a logbook from exported JSON files
    Report {
        /// Trips JSON (a list or a `{"trips": [...]}` page)
        #[arg(long)]
        trips: PathBuf,

        /// Geozones JSON (a list or an `{"items": [...]}` page)
        #[arg(long)]
        geozones: PathBuf,

        #[command(flatten)]
        options: LogbookArgs,
    },

    /// Fetch one vehicle's trips from the fleet API and build its logbook
    Fetch {
        /// Fleet API key
        #[arg(long, env = "FM_API_KEY", hide_env_values = true)]
        api_key: String,

        /// Vehicle (object) id
        #[arg(long)]
        vehicle: String,

        /// Period start, e.g. 2024-03-01 or 2024-03-01T06:00:00Z
        #[arg(long)]
        from: String,

        /// Period end
        #[arg(long)]
        to: String,

        /// Reverse-geocode endpoints that have no address
        #[arg(long)]
        geocode: bool,

        #[command(flatten)]
        options: LogbookArgs,
    },
}

#[derive(Args)]
struct LogbookArgs {
    /// Trips shorter than this many minutes join the previous one
    #[arg(long, default_value = "0")]
    min_trip_minutes: u32,

    /// Trips starting within this many minutes of the previous end join it
    #[arg(long, default_value = "0")]
    max_gap_minutes: u32,

    /// Skip the merge pass
    #[arg(long)]
    no_merge: bool,

    /// Geozone name to ignore (repeatable)
    #[arg(long = "exclude")]
    excluded: Vec<String>,

    /// Print the logbook as JSON instead of a table
    #[arg(long)]
    json: bool,
}

impl LogbookArgs {
    fn config(&self) -> LogbookConfig {
        LogbookConfig {
            min_trip_minutes: self.min_trip_minutes,
            max_gap_minutes: self.max_gap_minutes,
            merge_trips: !self.no_merge,
            excluded_zones: self.excluded.clone(),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    let result = match cli.command {
        Commands::Report {
            trips,
            geozones,
            options,
        } => run_report(&trips, &geozones, &options),
        Commands::Fetch {
            api_key,
            vehicle,
            from,
            to,
            geocode,
            options,
        } => run_fetch(&api_key, &vehicle, &from, &to, geocode, &options),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn run_report(trips_path: &Path, geozones_path: &Path, options: &LogbookArgs) -> CliResult {
    let trips = parse_trips(&fs::read_to_string(trips_path)?)?;
    let geozones = parse_geozones(&fs::read_to_string(geozones_path)?)?;

    print_inputs(&trips, &geozones);
    let logbook = build_logbook(&trips, &geozones, &options.config())?;
    print_logbook(&logbook, options.json)
}

fn run_fetch(
    api_key: &str,
    vehicle: &str,
    from: &str,
    to: &str,
    geocode: bool,
    options: &LogbookArgs,
) -> CliResult {
    let from = parse_utc(from)?;
    let to = parse_utc(to)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let (trips, geozones) = runtime.block_on(async {
        let client = FmClient::new(api_key)?;
        let geozones = client.list_geozones(DEFAULT_PAGE_LIMIT).await?;
        let mut trips = client.find_trips(from, to, vehicle, DEFAULT_PAGE_LIMIT).await?;

        if geocode {
            let geocoder = ReverseGeocoder::new()?;
            geocoder.fill_missing_addresses(&mut trips).await;
        }

        Ok::<_, zone_logbook::LogbookError>((trips, geozones))
    })?;

    print_inputs(&trips, &geozones);
    let logbook = build_logbook(&trips, &geozones, &options.config())?;
    print_logbook(&logbook, options.json)
}

fn parse_utc(raw: &str) -> Result<DateTime<Utc>, Box<dyn std::error::Error>> {
    match parse_timestamp(Some(raw))? {
        Some(at) => Ok(at.with_timezone(&Utc)),
        None => Err(format!("empty date: '{}'", raw).into()),
    }
}

fn print_inputs(trips: &[Trip], geozones: &[Geozone]) {
    let unresolved = geozones.iter().filter(|z| z.shape.is_none()).count();
    println!("\n{}", "=".repeat(60));
    println!("Loaded {} trips and {} geozones", trips.len(), geozones.len());
    if unresolved > 0 {
        println!("  {} geozones have no geometry and match nothing", unresolved);
    }
    println!("{}", "=".repeat(60));
}

fn print_logbook(logbook: &Logbook, json: bool) -> CliResult {
    if json {
        println!("{}", serde_json::to_string_pretty(logbook)?);
        return Ok(());
    }

    println!("\nTrips after merging: {}", logbook.trips.len());
    for (i, trip) in logbook.trips.iter().enumerate() {
        println!(
            "  {:>3}. {} -> {}  {:.3} km  {}  {}",
            i + 1,
            trip.start.datetime.as_deref().unwrap_or("?"),
            trip.end.datetime.as_deref().unwrap_or("?"),
            trip.mileage / 1000.0,
            zone_logbook::format_hms(trip.duration),
            trip.trip_type.as_deref().unwrap_or(""),
        );
    }

    println!("\nZone segments: {}", logbook.segments.len());
    for segment in &logbook.segments {
        let at = |t: &Option<DateTime<chrono::FixedOffset>>| {
            t.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "?".to_string())
        };
        println!(
            "  {} [{}] -> {} [{}]",
            segment.departure,
            at(&segment.departure_at),
            segment.arrival,
            at(&segment.arrival_at)
        );
        if !segment.departure_address.is_empty() || !segment.arrival_address.is_empty() {
            println!(
                "      from: {}\n      to:   {}",
                segment.departure_address, segment.arrival_address
            );
        }
        println!(
            "      {:.3} km  driving {}  stay {}",
            segment.distance_km,
            segment.duration,
            if segment.stay.is_empty() { "-" } else { segment.stay.as_str() }
        );
    }

    Ok(())
}
