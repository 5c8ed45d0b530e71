//! HTTP clients for the fleet-management API and for reverse geocoding.
//!
//! This module provides:
//! - Paginated retrieval of vehicles, geozones and trips
//! - Retry with exponential backoff on 429
//! - A dispatch-rate-limited reverse geocoder (Nominatim usage policy: 1 req/s)
//!
//! None of this is needed by the core; it feeds [`crate::build_logbook`].

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::cache::ListCache;
use crate::error::{LogbookError, Result};
use crate::wire::{VehicleObject, WireGeozone, WireTrip};
use crate::{Address, Coordinate, Geozone, Trip};

const FM_API_BASE: &str = "https://api.fm-track.com";
const FM_API_VERSION: &str = "1";
const FM_TIMEOUT_SECS: u64 = 60;

/// Page size used when the caller has no preference.
pub const DEFAULT_PAGE_LIMIT: u32 = 500;

const NOMINATIM_REVERSE_URL: &str = "https://nominatim.openstreetmap.org/reverse";
const GEOCODER_USER_AGENT: &str = concat!("zone-logbook/", env!("CARGO_PKG_VERSION"));
const GEOCODER_TIMEOUT_SECS: u64 = 10;
// Nominatim allows one request per second per client
const GEOCODER_DISPATCH_INTERVAL_MS: u64 = 1000;
const GEOCODER_CONCURRENCY: usize = 4;

const MAX_RETRIES: u32 = 3;

// ============================================================================
// Rate limiting
// ============================================================================

/// Dispatch rate limiter - spaces out when requests START.
///
/// Each caller reserves the next free slot, `interval` after the previous one,
/// and sleeps until it arrives.
struct DispatchRateLimiter {
    interval: Duration,
    next_dispatch: Mutex<Instant>,
    dispatched_count: AtomicU32,
    consecutive_429s: AtomicU32,
}

impl DispatchRateLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_dispatch: Mutex::new(Instant::now()),
            dispatched_count: AtomicU32::new(0),
            consecutive_429s: AtomicU32::new(0),
        }
    }

    /// Wait for our dispatch slot. Returns the 1-based dispatch number.
    async fn wait_for_dispatch_slot(&self) -> u32 {
        let (wait_duration, dispatch_num) = {
            let mut next = self.next_dispatch.lock().await;
            let now = Instant::now();

            let dispatch_at = if *next > now { *next } else { now };
            *next = dispatch_at + self.interval;

            let num = self.dispatched_count.fetch_add(1, Ordering::Relaxed) + 1;
            let wait = dispatch_at.saturating_duration_since(now);

            (wait, num)
        };

        // Wait outside the lock
        if wait_duration > Duration::from_millis(5) {
            debug!("[Dispatch #{}] Waiting {:?} for slot", dispatch_num, wait_duration);
            tokio::time::sleep(wait_duration).await;
        }

        dispatch_num
    }

    fn record_success(&self) {
        self.consecutive_429s.store(0, Ordering::Relaxed);
    }

    fn record_429(&self) -> Duration {
        let count = self.consecutive_429s.fetch_add(1, Ordering::Relaxed) + 1;
        let backoff = retry_backoff(count);
        warn!("[DispatchRateLimiter] Got 429! Consecutive: {}, backing off {:?}", count, backoff);
        backoff
    }
}

/// Exponential backoff: 1s, 2s, 4s, capped at 4s.
fn retry_backoff(attempt: u32) -> Duration {
    Duration::from_millis(500 * (1 << attempt.clamp(1, 3)))
}

// ============================================================================
// Fleet API client
// ============================================================================

/// Pagination cursor. The geozone endpoint uses integers, trips use strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ContinuationToken {
    Number(i64),
    Text(String),
}

impl ContinuationToken {
    fn is_set(&self) -> bool {
        match self {
            Self::Number(n) => *n != 0,
            Self::Text(s) => !s.is_empty(),
        }
    }

    fn as_param(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeozonePage {
    #[serde(default)]
    items: Option<Vec<WireGeozone>>,
    #[serde(default)]
    continuation_token: Option<ContinuationToken>,
}

#[derive(Debug, Deserialize)]
struct TripPage {
    #[serde(default)]
    trips: Option<Vec<WireTrip>>,
    #[serde(default)]
    continuation_token: Option<ContinuationToken>,
}

/// Client for the fleet-management REST API.
pub struct FmClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl FmClient {
    /// Create a client for the production API.
    pub fn new(api_key: &str) -> Result<Self> {
        Self::with_base_url(api_key, FM_API_BASE)
    }

    /// Create a client against another base URL (staging, mocks).
    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(FM_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// List the account's vehicles.
    pub async fn list_objects(&self, limit: u32) -> Result<Vec<VehicleObject>> {
        let data: Value = self
            .get_json("objects", &[("limit", limit.to_string())])
            .await?;

        if !data.is_array() {
            return Err(LogbookError::UnexpectedResponse(
                "objects response is not a list".to_string(),
            ));
        }

        let objects: Vec<VehicleObject> = serde_json::from_value(data)?;
        info!("[FmClient] Listed {} objects", objects.len());
        Ok(objects)
    }

    /// List every geozone with its geometry, following continuation tokens.
    pub async fn list_geozones(&self, limit: u32) -> Result<Vec<Geozone>> {
        let start = Instant::now();
        let mut zones = Vec::new();
        let mut token = ContinuationToken::Number(0);
        let mut pages = 0;

        loop {
            let params = [
                ("limit", limit.to_string()),
                ("continuation_token", token.as_param()),
                ("include_geometry", "1".to_string()),
            ];
            let page: GeozonePage = self.get_json("geozones", &params).await?;
            pages += 1;

            let items = page.items.unwrap_or_default();
            let page_len = items.len();
            zones.extend(items.into_iter().map(Geozone::from));

            match page.continuation_token {
                Some(next) if next.is_set() && page_len > 0 => token = next,
                _ => break,
            }
        }

        info!(
            "[FmClient] Listed {} geozones in {} pages ({:?})",
            zones.len(),
            pages,
            start.elapsed()
        );
        Ok(zones)
    }

    /// Trips of one vehicle between `from` and `to`, following continuation tokens.
    pub async fn find_trips(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        object_id: &str,
        limit: u32,
    ) -> Result<Vec<Trip>> {
        let start = Instant::now();
        let endpoint = format!("objects/{}/trips", object_id);
        let mut trips = Vec::new();
        let mut token: Option<ContinuationToken> = None;
        let mut pages = 0;

        loop {
            let mut params = vec![
                ("from_datetime", from.format("%Y-%m-%dT%H:%M:%SZ").to_string()),
                ("to_datetime", to.format("%Y-%m-%dT%H:%M:%SZ").to_string()),
                ("limit", limit.to_string()),
            ];
            if let Some(ref t) = token {
                params.push(("continuation_token", t.as_param()));
            }

            let page: TripPage = self.get_json(&endpoint, &params).await?;
            pages += 1;
            trips.extend(page.trips.unwrap_or_default().into_iter().map(Trip::from));

            match page.continuation_token {
                Some(next) if next.is_set() => token = Some(next),
                _ => break,
            }
        }

        info!(
            "[FmClient] Fetched {} trips for {} in {} pages ({:?})",
            trips.len(),
            object_id,
            pages,
            start.elapsed()
        );
        Ok(trips)
    }

    /// Vehicles from `cache`, fetched on a miss.
    pub async fn objects_cached<'c>(
        &self,
        cache: &'c mut ListCache<VehicleObject>,
        limit: u32,
    ) -> Result<&'c [VehicleObject]> {
        if cache.get().is_none() {
            cache.set(self.list_objects(limit).await?);
        }
        Ok(cache.get().unwrap_or(&[]))
    }

    /// Geozones from `cache`, fetched on a miss.
    pub async fn geozones_cached<'c>(
        &self,
        cache: &'c mut ListCache<Geozone>,
        limit: u32,
    ) -> Result<&'c [Geozone]> {
        if cache.get().is_none() {
            cache.set(self.list_geozones(limit).await?);
        }
        Ok(cache.get().unwrap_or(&[]))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let mut retries = 0;

        loop {
            let req_start = Instant::now();
            let resp = self
                .client
                .get(&url)
                .query(&[("api_key", self.api_key.as_str()), ("version", FM_API_VERSION)])
                .query(params)
                .header(CONTENT_TYPE, "application/json;charset=UTF-8")
                .send()
                .await?;

            let status = resp.status();

            if status == StatusCode::TOO_MANY_REQUESTS && retries < MAX_RETRIES {
                retries += 1;
                let wait = retry_backoff(retries);
                warn!(
                    "[FmClient] {} 429 Too Many Requests, retry {} after {:?}",
                    endpoint, retries, wait
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            if status != StatusCode::OK {
                let body = resp.text().await.unwrap_or_default();
                return Err(LogbookError::Api {
                    endpoint: endpoint.to_string(),
                    status: status.as_u16(),
                    body,
                });
            }

            let bytes = resp.bytes().await?;
            debug!(
                "[FmClient] GET {} -> {:.1}KB in {:?}",
                endpoint,
                bytes.len() as f64 / 1024.0,
                req_start.elapsed()
            );

            return Ok(serde_json::from_slice(&bytes)?);
        }
    }
}

// ============================================================================
// Reverse geocoder
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NominatimAddress {
    country: Option<String>,
    state: Option<String>,
    region: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    municipality: Option<String>,
    road: Option<String>,
    pedestrian: Option<String>,
    footway: Option<String>,
    path: Option<String>,
    house_number: Option<String>,
    postcode: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NominatimResponse {
    address: Option<NominatimAddress>,
}

fn first_non_empty(candidates: [Option<String>; 4]) -> Option<String> {
    candidates.into_iter().flatten().find(|s| !s.is_empty())
}

impl From<NominatimAddress> for Address {
    fn from(a: NominatimAddress) -> Self {
        Address {
            country: a.country,
            region: first_non_empty([a.state, a.region, None, None]),
            locality: first_non_empty([a.city, a.town, a.village, a.municipality]),
            street: first_non_empty([a.road, a.pedestrian, a.footway, a.path]),
            house_number: a.house_number,
            zip: a.postcode,
        }
    }
}

/// Reverse geocoder backed by a Nominatim-compatible endpoint.
pub struct ReverseGeocoder {
    client: Client,
    url: String,
    rate_limiter: Arc<DispatchRateLimiter>,
}

impl ReverseGeocoder {
    /// Geocoder for the public Nominatim instance.
    pub fn new() -> Result<Self> {
        Self::with_url(NOMINATIM_REVERSE_URL)
    }

    /// Geocoder for another Nominatim-compatible `reverse` endpoint.
    pub fn with_url(url: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(GEOCODER_USER_AGENT)
            .timeout(Duration::from_secs(GEOCODER_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            url: url.to_string(),
            rate_limiter: Arc::new(DispatchRateLimiter::new(Duration::from_millis(
                GEOCODER_DISPATCH_INTERVAL_MS,
            ))),
        })
    }

    /// Structured address for a point. Failures degrade to an empty address.
    pub async fn reverse(&self, point: &Coordinate) -> Address {
        match self.try_reverse(point).await {
            Ok(address) => address,
            Err(e) => {
                warn!(
                    "[Geocoder] Reverse lookup failed for ({:.5}, {:.5}): {}",
                    point.latitude, point.longitude, e
                );
                Address::default()
            }
        }
    }

    /// Structured address for a point, surfacing errors.
    pub async fn try_reverse(&self, point: &Coordinate) -> Result<Address> {
        let mut retries = 0;

        loop {
            self.rate_limiter.wait_for_dispatch_slot().await;

            let resp = self
                .client
                .get(&self.url)
                .query(&[
                    ("lat", point.latitude.to_string()),
                    ("lon", point.longitude.to_string()),
                    ("format", "json".to_string()),
                    ("zoom", "18".to_string()),
                    ("addressdetails", "1".to_string()),
                    ("accept-language", "en".to_string()),
                ])
                .send()
                .await?;

            let status = resp.status();
            if status == StatusCode::TOO_MANY_REQUESTS && retries < MAX_RETRIES {
                retries += 1;
                let wait = self.rate_limiter.record_429();
                tokio::time::sleep(wait).await;
                continue;
            }
            self.rate_limiter.record_success();

            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(LogbookError::Api {
                    endpoint: "reverse".to_string(),
                    status: status.as_u16(),
                    body,
                });
            }

            let data: NominatimResponse = resp.json().await?;
            return Ok(data.address.map(Address::from).unwrap_or_default());
        }
    }

    /// Fill empty endpoint addresses of trips that carry coordinates.
    ///
    /// Identical coordinates are looked up once. Returns the number of
    /// endpoints that received a non-empty address.
    pub async fn fill_missing_addresses(&self, trips: &mut [Trip]) -> usize {
        use futures::stream::{self, StreamExt};

        let start = Instant::now();
        let mut pending: Vec<Coordinate> = Vec::new();
        let mut seen: HashSet<(u64, u64)> = HashSet::new();

        for point in trips.iter().flat_map(|t| [&t.start, &t.end]) {
            if !point.address.is_empty() {
                continue;
            }
            if let Some(c) = point.coordinate {
                if seen.insert(coordinate_key(&c)) {
                    pending.push(c);
                }
            }
        }

        if pending.is_empty() {
            return 0;
        }

        info!("[Geocoder] Looking up {} distinct points", pending.len());

        let lines: HashMap<(u64, u64), String> = stream::iter(pending)
            .map(|c| async move { (coordinate_key(&c), self.reverse(&c).await.to_line()) })
            .buffer_unordered(GEOCODER_CONCURRENCY)
            .collect()
            .await;

        let mut filled = 0;
        for point in trips.iter_mut().flat_map(|t| [&mut t.start, &mut t.end]) {
            if !point.address.is_empty() {
                continue;
            }
            let Some(line) = point
                .coordinate
                .and_then(|c| lines.get(&coordinate_key(&c)))
                .filter(|line| !line.is_empty())
            else {
                continue;
            };
            point.address = line.clone();
            filled += 1;
        }

        info!(
            "[Geocoder] Filled {} endpoint addresses in {:.2}s",
            filled,
            start.elapsed().as_secs_f64()
        );
        filled
    }
}

fn coordinate_key(c: &Coordinate) -> (u64, u64) {
    (c.latitude.to_bits(), c.longitude.to_bits())
}
