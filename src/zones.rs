//! Point-to-geozone lookup.
//!
//! [`zones_containing`] is the reference linear scan. [`GeozoneIndex`] answers the
//! same question through an R-tree of zone bounding boxes and is what the logbook
//! pipeline uses; both return names in geozone list order.

use log::debug;
use rstar::{RTree, RTreeObject, AABB};

use crate::{Bounds, Coordinate, Geozone, GeozoneShape};

/// Names of the geozones containing a point, in geozone list order.
pub type ZoneMatchSet = Vec<String>;

/// Fallback map center when no geozone has geometry (Romania).
pub const DEFAULT_MAP_CENTER: Coordinate = Coordinate {
    latitude: 45.9432,
    longitude: 24.9668,
};

/// Anything that can say which zones contain a point.
pub trait ZoneLookup {
    /// Names of every zone containing `point`; empty when the point is absent.
    fn zones_containing(&self, point: Option<&Coordinate>) -> ZoneMatchSet;
}

impl ZoneLookup for [Geozone] {
    fn zones_containing(&self, point: Option<&Coordinate>) -> ZoneMatchSet {
        zones_containing(point, self)
    }
}

impl ZoneLookup for Vec<Geozone> {
    fn zones_containing(&self, point: Option<&Coordinate>) -> ZoneMatchSet {
        zones_containing(point, self)
    }
}

/// Names of every geozone containing `point`, in input order.
///
/// An absent point matches nothing. Overlapping zones all match; there is no
/// short-circuit on the first hit.
///
/// # Example
/// ```
/// use zone_logbook::{Coordinate, Geozone, zones_containing};
///
/// let here = Coordinate::new(47.50, 19.04);
/// let zones = vec![
///     Geozone::circle("Site", here, 500.0),
///     Geozone::circle("Gate", here, 50.0),
///     Geozone::circle("Elsewhere", Coordinate::new(48.0, 20.0), 50.0),
/// ];
///
/// assert_eq!(zones_containing(Some(&here), &zones), vec!["Site", "Gate"]);
/// assert!(zones_containing(None, &zones).is_empty());
/// ```
pub fn zones_containing(point: Option<&Coordinate>, geozones: &[Geozone]) -> ZoneMatchSet {
    let Some(point) = point else {
        return Vec::new();
    };

    geozones
        .iter()
        .filter(|zone| zone.contains(point))
        .map(|zone| zone.name.clone())
        .collect()
}

/// Drop geozones whose name is in `excluded`.
pub fn filter_geozones(geozones: &[Geozone], excluded: &[String]) -> Vec<Geozone> {
    if excluded.is_empty() {
        return geozones.to_vec();
    }

    let kept: Vec<Geozone> = geozones
        .iter()
        .filter(|zone| !excluded.contains(&zone.name))
        .cloned()
        .collect();

    debug!(
        "[Zones] Excluded {} of {} geozones",
        geozones.len() - kept.len(),
        geozones.len()
    );

    kept
}

/// Initial map center for a set of geozones.
///
/// Uses the first zone with usable geometry: a circle's center, or a polygon's
/// first vertex. Falls back to [`DEFAULT_MAP_CENTER`].
pub fn map_center(geozones: &[Geozone]) -> Coordinate {
    geozones
        .iter()
        .find_map(|zone| match &zone.shape {
            Some(GeozoneShape::Circle { center, .. }) => Some(*center),
            Some(GeozoneShape::Polygon { ring }) => ring
                .0
                .first()
                .map(|c| Coordinate::new(c.y, c.x)),
            None => None,
        })
        .unwrap_or(DEFAULT_MAP_CENTER)
}

// ============================================================================
// Spatial index
// ============================================================================

/// Bounding box of one geozone, keyed by its position in the zone list.
#[derive(Debug, Clone)]
struct ZoneEnvelope {
    position: usize,
    bounds: Bounds,
}

impl RTreeObject for ZoneEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bounds.min_lng, self.bounds.min_lat],
            [self.bounds.max_lng, self.bounds.max_lat],
        )
    }
}

/// Geozones with an R-tree over their bounding boxes.
///
/// Candidates from the tree are re-checked with the exact circle/polygon
/// predicate, so results are identical to [`zones_containing`] over the same list.
#[derive(Debug)]
pub struct GeozoneIndex {
    zones: Vec<Geozone>,
    tree: RTree<ZoneEnvelope>,
}

impl GeozoneIndex {
    /// Index a geozone list. Zones that can contain nothing are not inserted.
    pub fn new(zones: Vec<Geozone>) -> Self {
        let envelopes: Vec<ZoneEnvelope> = zones
            .iter()
            .enumerate()
            .filter_map(|(position, zone)| {
                zone.bounds().map(|bounds| ZoneEnvelope { position, bounds })
            })
            .collect();

        debug!(
            "[Zones] Indexed {} of {} geozones",
            envelopes.len(),
            zones.len()
        );

        Self {
            zones,
            tree: RTree::bulk_load(envelopes),
        }
    }

    /// The indexed zones, in their original order.
    pub fn zones(&self) -> &[Geozone] {
        &self.zones
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

impl ZoneLookup for GeozoneIndex {
    fn zones_containing(&self, point: Option<&Coordinate>) -> ZoneMatchSet {
        let Some(point) = point else {
            return Vec::new();
        };

        let query = AABB::from_point([point.longitude, point.latitude]);
        let mut positions: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&query)
            .map(|envelope| envelope.position)
            .collect();
        positions.sort_unstable();

        positions
            .into_iter()
            .map(|position| &self.zones[position])
            .filter(|zone| zone.contains(point))
            .map(|zone| zone.name.clone())
            .collect()
    }
}
