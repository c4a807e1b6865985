//! Resolving coordinates to country and city names.
//!
//! Regions come from GeoJSON FeatureCollections of Polygon/MultiPolygon
//! features. Lookup is a bounding-box reject followed by even-odd ray
//! casting against the outer ring and holes.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value as Json};
use std::path::Path;

/// A decimal WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coord {
    pub lat: f64,
    pub lng: f64,
}

/// Maps a coordinate to lower-cased place names.
pub trait GeoResolver {
    fn country(&self, at: Coord) -> Option<String>;
    fn city(&self, at: Coord) -> Option<String>;
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Option<Map<String, Json>>,
    #[serde(default)]
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum Geometry {
    Polygon { coordinates: Vec<Vec<Vec<f64>>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Vec<f64>>>> },
    #[serde(other)]
    Unsupported,
}

type Ring = Vec<(f64, f64)>;

#[derive(Debug, Clone)]
struct Polygon {
    exterior: Ring,
    holes: Vec<Ring>,
}

impl Polygon {
    fn from_rings(rings: Vec<Vec<Vec<f64>>>) -> Option<Self> {
        let mut rings = rings.into_iter().map(|ring| {
            ring.into_iter()
                .filter(|p| p.len() >= 2)
                .map(|p| (p[0], p[1]))
                .collect::<Ring>()
        });
        let exterior = rings.next().filter(|r| r.len() >= 3)?;
        // Degenerate holes cover no area
        let holes = rings.filter(|r| r.len() >= 3).collect();
        Some(Self { exterior, holes })
    }

    fn contains(&self, x: f64, y: f64) -> bool {
        ring_contains(&self.exterior, x, y) && !self.holes.iter().any(|h| ring_contains(h, x, y))
    }
}

fn ring_contains(ring: &[(f64, f64)], x: f64, y: f64) -> bool {
    let Some(mut j) = ring.len().checked_sub(1) else {
        return false;
    };
    let mut inside = false;
    for i in 0..ring.len() {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

#[derive(Debug, Clone)]
struct Region {
    name: String,
    polygons: Vec<Polygon>,
    // min_x, min_y, max_x, max_y
    bbox: (f64, f64, f64, f64),
}

impl Region {
    fn contains(&self, at: Coord) -> bool {
        let (x, y) = (at.lng, at.lat);
        let (min_x, min_y, max_x, max_y) = self.bbox;
        if x < min_x || x > max_x || y < min_y || y > max_y {
            return false;
        }
        self.polygons.iter().any(|p| p.contains(x, y))
    }
}

fn load_regions(geojson: &str, name_property: &str) -> Result<Vec<Region>, serde_json::Error> {
    let collection: FeatureCollection = serde_json::from_str(geojson)?;
    let mut regions = Vec::new();

    for feature in collection.features {
        let name = match feature
            .properties
            .as_ref()
            .and_then(|p| p.get(name_property))
            .and_then(Json::as_str)
        {
            Some(name) => name.to_lowercase(),
            None => continue,
        };

        let polygons: Vec<Polygon> = match feature.geometry {
            Some(Geometry::Polygon { coordinates }) => {
                Polygon::from_rings(coordinates).into_iter().collect()
            }
            Some(Geometry::MultiPolygon { coordinates }) => coordinates
                .into_iter()
                .filter_map(Polygon::from_rings)
                .collect(),
            _ => continue,
        };
        if polygons.is_empty() {
            continue;
        }

        let bbox = polygons
            .iter()
            .flat_map(|p| p.exterior.iter())
            .fold(
                (f64::MAX, f64::MAX, f64::MIN, f64::MIN),
                |(min_x, min_y, max_x, max_y), &(x, y)| {
                    (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
                },
            );
        regions.push(Region {
            name,
            polygons,
            bbox,
        });
    }

    Ok(regions)
}

/// Country and city lookup over GeoJSON polygons.
#[derive(Debug, Clone)]
pub struct GeoLookup {
    countries: Vec<Region>,
    cities: Vec<Region>,
}

impl GeoLookup {
    /// Build from GeoJSON text. Countries are named by their `name`
    /// property, cities by `NAME`.
    pub fn from_geojson(countries: &str, cities: &str) -> Result<Self, serde_json::Error> {
        Ok(Self {
            countries: load_regions(countries, "name")?,
            cities: load_regions(cities, "NAME")?,
        })
    }

    pub fn load(countries_path: &Path, cities_path: &Path) -> Result<Self> {
        let countries = std::fs::read_to_string(countries_path)
            .with_context(|| format!("Failed to read {:?}", countries_path))?;
        let cities = std::fs::read_to_string(cities_path)
            .with_context(|| format!("Failed to read {:?}", cities_path))?;
        let lookup = Self::from_geojson(&countries, &cities).context("Failed to parse GeoJSON")?;
        tracing::info!(
            countries = lookup.countries.len(),
            cities = lookup.cities.len(),
            "Geo data loaded"
        );
        Ok(lookup)
    }

    fn find(regions: &[Region], at: Coord) -> Option<String> {
        regions.iter().find(|r| r.contains(at)).map(|r| r.name.clone())
    }
}

impl GeoResolver for GeoLookup {
    fn country(&self, at: Coord) -> Option<String> {
        Self::find(&self.countries, at)
    }

    fn city(&self, at: Coord) -> Option<String> {
        Self::find(&self.cities, at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COUNTRIES: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"name": "Squareland"},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [
                        [[0, 0], [10, 0], [10, 10], [0, 10], [0, 0]],
                        [[4, 4], [6, 4], [6, 6], [4, 6], [4, 4]]
                    ]
                }
            },
            {
                "type": "Feature",
                "properties": {"name": "Islands"},
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [
                        [[[20, 0], [22, 0], [22, 2], [20, 2], [20, 0]]],
                        [[[30, 0], [32, 0], [32, 2], [30, 2], [30, 0]]]
                    ]
                }
            },
            {
                "type": "Feature",
                "properties": {"name": "Pointless"},
                "geometry": {"type": "Point", "coordinates": [50, 50]}
            }
        ]
    }"#;

    const CITIES: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"NAME": "Cornerton"},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[1, 1], [3, 1], [3, 3], [1, 3], [1, 1]]]
                }
            }
        ]
    }"#;

    fn lookup() -> GeoLookup {
        GeoLookup::from_geojson(COUNTRIES, CITIES).unwrap()
    }

    #[test]
    fn test_country_and_city_are_lower_cased() {
        let at = Coord { lat: 2.0, lng: 2.0 };
        assert_eq!(lookup().country(at).as_deref(), Some("squareland"));
        assert_eq!(lookup().city(at).as_deref(), Some("cornerton"));
    }

    #[test]
    fn test_hole_is_excluded() {
        assert_eq!(lookup().country(Coord { lat: 5.0, lng: 5.0 }), None);
    }

    #[test]
    fn test_multipolygon() {
        assert_eq!(
            lookup().country(Coord { lat: 1.0, lng: 31.0 }).as_deref(),
            Some("islands")
        );
        assert_eq!(lookup().country(Coord { lat: 1.0, lng: 26.0 }), None);
    }

    #[test]
    fn test_outside_everything() {
        let at = Coord { lat: -40.0, lng: 100.0 };
        assert_eq!(lookup().country(at), None);
        assert_eq!(lookup().city(at), None);
    }

    #[test]
    fn test_degenerate_holes_are_ignored() {
        let countries = r#"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {"name": "Holey"},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [
                        [[0, 0], [10, 0], [10, 10], [0, 10], [0, 0]],
                        [],
                        [[2, 2], [3, 3]]
                    ]
                }
            }]
        }"#;
        let lookup = GeoLookup::from_geojson(countries, CITIES).unwrap();
        assert_eq!(lookup.countries[0].polygons[0].holes.len(), 0);
        assert_eq!(
            lookup.country(Coord { lat: 5.0, lng: 5.0 }).as_deref(),
            Some("holey")
        );
    }

    #[test]
    fn test_empty_ring_contains_nothing() {
        assert!(!ring_contains(&[], 0.0, 0.0));
    }

    #[test]
    fn test_unsupported_geometry_is_skipped() {
        assert_eq!(lookup().countries.len(), 2);
    }
}
