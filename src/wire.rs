//! Fleet API JSON shapes and their conversion into domain types.
//!
//! The API is loose about absent fields: endpoints may lack coordinates or a
//! timestamp, mileage and duration may be null, geozones may lack geometry.
//! None of that is an error here. Missing numbers become zero and unusable
//! geometry becomes a zone that matches nothing.

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::{Address, Coordinate, Geozone, GeozoneShape, Trip, TripPoint};

/// A tracked vehicle as listed by the fleet API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleObject {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireAddress {
    Structured(Address),
    Line(String),
}

impl WireAddress {
    fn to_line(&self) -> String {
        match self {
            Self::Structured(address) => address.to_line(),
            Self::Line(line) => line.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireTripPoint {
    datetime: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    address: Option<WireAddress>,
}

impl WireTripPoint {
    fn into_trip_point(self) -> TripPoint {
        let coordinate = match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some(Coordinate::new(lat, lng)).filter(Coordinate::is_valid),
            _ => None,
        };
        TripPoint {
            coordinate,
            datetime: self.datetime,
            address: self.address.as_ref().map(WireAddress::to_line).unwrap_or_default(),
        }
    }
}

/// Trip record as returned by `/objects/{id}/trips`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WireTrip {
    trip_start: Option<WireTripPoint>,
    trip_end: Option<WireTripPoint>,
    mileage: Option<f64>,
    trip_duration: Option<f64>,
    trip_type: Option<String>,
}

impl From<WireTrip> for Trip {
    fn from(wire: WireTrip) -> Self {
        Trip {
            start: wire.trip_start.unwrap_or_default().into_trip_point(),
            end: wire.trip_end.unwrap_or_default().into_trip_point(),
            mileage: wire.mileage.unwrap_or(0.0),
            // Whole seconds, fractional durations truncate
            duration: wire.trip_duration.unwrap_or(0.0) as i64,
            trip_type: wire.trip_type,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireCircle {
    latitude: Option<f64>,
    longitude: Option<f64>,
    radius: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireGeometry {
    coordinates: Option<Vec<Vec<Vec<f64>>>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireFeature {
    geometry: Option<WireGeometry>,
}

/// Geozone record as returned by `/geozones?include_geometry=1`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WireGeozone {
    id: Option<Value>,
    name: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    circle: Option<WireCircle>,
    feature: Option<WireFeature>,
}

impl From<WireGeozone> for Geozone {
    fn from(wire: WireGeozone) -> Self {
        let name = wire.name.unwrap_or_default();
        let shape = match wire.kind.as_deref() {
            Some("POINT") => wire.circle.and_then(circle_shape),
            Some("POLYGON") => wire.feature.and_then(polygon_shape),
            _ => None,
        };

        if shape.is_none() {
            warn!(
                "[Wire] Geozone '{}' ({:?}) has no usable geometry; it will match nothing",
                name, wire.kind
            );
        }

        Geozone {
            id: wire.id.as_ref().map(value_to_id),
            name,
            shape,
        }
    }
}

fn circle_shape(circle: WireCircle) -> Option<GeozoneShape> {
    let center = Some(Coordinate::new(circle.latitude?, circle.longitude?))
        .filter(Coordinate::is_valid)?;
    let radius = circle.radius?;
    (radius >= 0.0).then_some(GeozoneShape::Circle { center, radius })
}

fn polygon_shape(feature: WireFeature) -> Option<GeozoneShape> {
    let rings = feature.geometry?.coordinates?;
    let outer = rings.into_iter().next()?;
    let ring: Vec<(f64, f64)> = outer
        .into_iter()
        .filter(|position| position.len() >= 2)
        .map(|position| (position[0], position[1]))
        .collect();

    if ring.is_empty() {
        return None;
    }
    Some(GeozoneShape::Polygon { ring: ring.into() })
}

fn value_to_id(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn id_as_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(|v| value_to_id(&v))
}

/// Either a bare list or one API page wrapping it.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListOrPage<T> {
    List(Vec<T>),
    Trips { trips: Vec<T> },
    Items { items: Vec<T> },
}

impl<T> ListOrPage<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Self::List(items) | Self::Trips { trips: items } | Self::Items { items } => items,
        }
    }
}

/// Decode trips from a JSON list or a `{"trips": [...]}` page.
pub fn parse_trips(json: &str) -> Result<Vec<Trip>> {
    let page: ListOrPage<WireTrip> = serde_json::from_str(json)?;
    Ok(page.into_vec().into_iter().map(Trip::from).collect())
}

/// Decode geozones from a JSON list or an `{"items": [...]}` page.
pub fn parse_geozones(json: &str) -> Result<Vec<Geozone>> {
    let page: ListOrPage<WireGeozone> = serde_json::from_str(json)?;
    Ok(page.into_vec().into_iter().map(Geozone::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trip_page() {
        let json = r#"{
            "trips": [{
                "trip_start": {
                    "datetime": "2024-03-01T08:00:00Z",
                    "latitude": 47.5, "longitude": 19.04,
                    "address": {"country": "Hungary", "locality": "Budapest", "zip": "1061"}
                },
                "trip_end": {"datetime": "2024-03-01T08:30:00Z", "latitude": null, "longitude": 19.2},
                "mileage": 12345.6,
                "trip_duration": 1800,
                "trip_type": "BUSINESS"
            }],
            "continuation_token": null
        }"#;

        let trips = parse_trips(json).unwrap();
        assert_eq!(trips.len(), 1);
        let trip = &trips[0];
        assert_eq!(trip.start.coordinate, Some(Coordinate::new(47.5, 19.04)));
        assert_eq!(trip.start.address, "Hungary, Budapest, 1061");
        assert_eq!(trip.end.coordinate, None);
        assert_eq!(trip.end.address, "");
        assert_eq!(trip.mileage, 12345.6);
        assert_eq!(trip.duration, 1800);
        assert_eq!(trip.trip_type.as_deref(), Some("BUSINESS"));
    }

    #[test]
    fn test_missing_numbers_default_to_zero() {
        let trips = parse_trips(r#"[{"trip_start": null, "mileage": null}]"#).unwrap();
        assert_eq!(trips[0].mileage, 0.0);
        assert_eq!(trips[0].duration, 0);
        assert_eq!(trips[0].start, TripPoint::default());
    }

    #[test]
    fn test_parse_geozones() {
        let json = r#"{"items": [
            {"id": "g-1", "name": "Depot", "type": "POINT",
             "circle": {"latitude": 47.5, "longitude": 19.04, "radius": 250}},
            {"id": 7, "name": "Yard", "type": "POLYGON",
             "feature": {"geometry": {"type": "Polygon", "coordinates": [
                [[19.0, 47.0], [19.1, 47.0, 120.0], [19.1, 47.1], [19.0, 47.0]],
                [[19.02, 47.02], [19.03, 47.02], [19.03, 47.03]]
             ]}}},
            {"name": "No radius", "type": "POINT", "circle": {"latitude": 1.0, "longitude": 2.0}},
            {"name": "Empty ring", "type": "POLYGON", "feature": {"geometry": {"coordinates": [[]]}}},
            {"name": "Route", "type": "LINE"}
        ], "continuation_token": 0}"#;

        let zones = parse_geozones(json).unwrap();
        assert_eq!(zones.len(), 5);

        assert_eq!(zones[0].id.as_deref(), Some("g-1"));
        assert_eq!(
            zones[0].shape,
            Some(GeozoneShape::Circle { center: Coordinate::new(47.5, 19.04), radius: 250.0 })
        );

        assert_eq!(zones[1].id.as_deref(), Some("7"));
        match &zones[1].shape {
            Some(GeozoneShape::Polygon { ring }) => assert_eq!(ring.0.len(), 4),
            other => panic!("expected polygon, got {:?}", other),
        }
        // Hole is ignored: a point inside it is still inside the zone
        assert!(zones[1].contains(&Coordinate::new(47.022, 19.028)));

        assert!(zones[2..].iter().all(|z| z.shape.is_none()));
    }

    #[test]
    fn test_parse_vehicle_objects() {
        let objects: Vec<VehicleObject> =
            serde_json::from_str(r#"[{"id": 42, "name": "Truck"}, {"id": "abc"}]"#).unwrap();
        assert_eq!(objects[0].id, "42");
        assert_eq!(objects[1].name, "");
    }

    #[test]
    fn test_out_of_range_coordinates_are_dropped() {
        let trips = parse_trips(
            r#"[{"trip_start": {"latitude": 95.0, "longitude": 19.0},
                 "trip_end": {"latitude": 47.5, "longitude": 190.0}}]"#,
        )
        .unwrap();
        assert_eq!(trips[0].start.coordinate, None);
        assert_eq!(trips[0].end.coordinate, None);

        let zones = parse_geozones(
            r#"[{"name": "Bad", "type": "POINT", "circle": {"latitude": -91.0, "longitude": 0.0, "radius": 10}}]"#,
        )
        .unwrap();
        assert!(zones[0].shape.is_none());
    }

    #[test]
    fn test_huge_durations_do_not_abort_the_logbook() {
        let json = r#"[
            {"trip_start": {"datetime": "2024-03-01T08:00:00Z", "latitude": 47.5, "longitude": 19.04},
             "trip_end": {"datetime": "2024-03-01T08:10:00Z"}, "mileage": 10, "trip_duration": 1e300},
            {"trip_start": {"datetime": "2024-03-01T08:10:00Z"},
             "trip_end": {"datetime": "2024-03-01T08:20:00Z", "latitude": 47.5, "longitude": 19.04},
             "mileage": 10, "trip_duration": 1e300}
        ]"#;
        let trips = parse_trips(json).unwrap();
        assert_eq!(trips[0].duration, i64::MAX);

        let zones = vec![Geozone::circle("Depot", Coordinate::new(47.5, 19.04), 100.0)];
        let logbook = crate::build_logbook(&trips, &zones, &crate::LogbookConfig::default()).unwrap();
        assert_eq!(logbook.trips.len(), 1);
        assert_eq!(logbook.trips[0].duration, i64::MAX);
        assert_eq!(logbook.segments[0].duration_seconds, i64::MAX);
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(parse_trips("{not json").is_err());
    }
}
