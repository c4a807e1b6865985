//! Vertex and edge kinds stored in the photo graph.
//!
//! Each kind lists its own properties in [`GraphElement::properties`]; that
//! table is what the query builder binds. Optional fields that are unset
//! are left out of the table, so they are never written as nulls.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value as Json;
use std::collections::BTreeMap;

use super::value::{ElementId, Scalar};

/// Coarse sharding hint attached to every vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionKey {
    Photo,
    Category,
}

impl PartitionKey {
    /// Name of the partition key property on the store.
    pub const PROPERTY: &'static str = "pk";

    pub fn as_str(&self) -> &'static str {
        match self {
            PartitionKey::Photo => "photo",
            PartitionKey::Category => "category",
        }
    }
}

/// Anything that can be written to the graph.
pub trait GraphElement {
    fn label(&self) -> &'static str;

    /// Field name to value table for every set field, excluding the label
    /// and the partition key.
    fn properties(&self) -> Vec<(&'static str, Scalar)>;

    /// Value of a single field, if set.
    fn property(&self, field: &str) -> Option<Scalar> {
        self.properties()
            .into_iter()
            .find(|(name, _)| *name == field)
            .map(|(_, value)| value)
    }
}

/// A vertex kind with a fixed partition and a natural identity field.
pub trait Vertex: GraphElement {
    const PARTITION: PartitionKey;
    const KEY: &'static str;
}

/// Format a timestamp the way every date property is stored.
pub fn iso_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhotoVertex {
    pub name: String,
    pub path: String,
    pub captured_at: Option<DateTime<Utc>>,
    pub hash: String,
}

impl GraphElement for PhotoVertex {
    fn label(&self) -> &'static str {
        "photo"
    }

    fn properties(&self) -> Vec<(&'static str, Scalar)> {
        let mut props = vec![
            ("name", Scalar::from(&self.name)),
            ("path", Scalar::from(&self.path)),
        ];
        if let Some(ref at) = self.captured_at {
            props.push(("capturedAt", Scalar::from(iso_timestamp(at))));
        }
        props.push(("hash", Scalar::from(&self.hash)));
        props
    }
}

impl Vertex for PhotoVertex {
    const PARTITION: PartitionKey = PartitionKey::Photo;
    const KEY: &'static str = "path";
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceVertex {
    pub name: String,
}

impl GraphElement for DeviceVertex {
    fn label(&self) -> &'static str {
        "device"
    }

    fn properties(&self) -> Vec<(&'static str, Scalar)> {
        vec![("name", Scalar::from(&self.name))]
    }
}

impl Vertex for DeviceVertex {
    const PARTITION: PartitionKey = PartitionKey::Category;
    const KEY: &'static str = "name";
}

#[derive(Debug, Clone, PartialEq)]
pub struct CountryVertex {
    pub name: String,
}

impl GraphElement for CountryVertex {
    fn label(&self) -> &'static str {
        "country"
    }

    fn properties(&self) -> Vec<(&'static str, Scalar)> {
        vec![("name", Scalar::from(&self.name))]
    }
}

impl Vertex for CountryVertex {
    const PARTITION: PartitionKey = PartitionKey::Category;
    const KEY: &'static str = "name";
}

/// City names are only unique within a country, so the identity is the
/// composite `"<country> > <city>"`.
#[derive(Debug, Clone, PartialEq)]
pub struct CityVertex {
    pub name: String,
    pub unique_name: String,
}

impl CityVertex {
    pub fn new(country: &str, city: &str) -> Self {
        Self {
            name: city.to_string(),
            unique_name: format!("{} > {}", country, city),
        }
    }
}

impl GraphElement for CityVertex {
    fn label(&self) -> &'static str {
        "city"
    }

    fn properties(&self) -> Vec<(&'static str, Scalar)> {
        vec![
            ("name", Scalar::from(&self.name)),
            ("uniqueName", Scalar::from(&self.unique_name)),
        ]
    }
}

impl Vertex for CityVertex {
    const PARTITION: PartitionKey = PartitionKey::Category;
    const KEY: &'static str = "uniqueName";
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlbumVertex {
    pub name: String,
    pub unique_name: String,
    pub place: String,
    pub days: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl AlbumVertex {
    pub fn new(
        name: String,
        place: &str,
        days: i64,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
    ) -> Self {
        Self {
            name,
            unique_name: format!("{} @ {}", place, iso_timestamp(&started_at)),
            place: place.to_string(),
            days,
            started_at,
            ended_at,
        }
    }
}

impl GraphElement for AlbumVertex {
    fn label(&self) -> &'static str {
        "album"
    }

    fn properties(&self) -> Vec<(&'static str, Scalar)> {
        vec![
            ("name", Scalar::from(&self.name)),
            ("uniqueName", Scalar::from(&self.unique_name)),
            ("place", Scalar::from(&self.place)),
            ("days", Scalar::from(self.days)),
            ("startedAt", Scalar::from(iso_timestamp(&self.started_at))),
            ("endedAt", Scalar::from(iso_timestamp(&self.ended_at))),
        ]
    }
}

impl Vertex for AlbumVertex {
    const PARTITION: PartitionKey = PartitionKey::Category;
    const KEY: &'static str = "uniqueName";
}

/// Relationship kinds. Edges carry no business properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    DeviceTookPhoto,
    CountryContainsCity,
    CityLocationOfPhoto,
    PhotoInAlbum,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::DeviceTookPhoto => "device_took_photo",
            EdgeKind::CountryContainsCity => "country_contains_city",
            EdgeKind::CityLocationOfPhoto => "city_location_of_photo",
            EdgeKind::PhotoInAlbum => "photo_in_album",
        }
    }
}

/// An edge as written: its kind plus the id of the vertex it points at,
/// kept on the edge so existence checks never visit the target.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRecord<'a> {
    pub kind: EdgeKind,
    pub target: &'a ElementId,
}

impl EdgeRecord<'_> {
    pub const TARGET_PROPERTY: &'static str = "targetId";
}

impl GraphElement for EdgeRecord<'_> {
    fn label(&self) -> &'static str {
        self.kind.as_str()
    }

    fn properties(&self) -> Vec<(&'static str, Scalar)> {
        vec![
            ("name", Scalar::from(self.kind.as_str())),
            (Self::TARGET_PROPERTY, Scalar::from(self.target)),
        ]
    }
}

/// A vertex or edge read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub id: ElementId,
    pub label: String,
    pub properties: BTreeMap<String, Json>,
}

impl Element {
    pub fn get(&self, key: &str) -> Option<&Json> {
        self.properties.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Json::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Json::as_i64)
    }

    pub fn get_datetime(&self, key: &str) -> Option<DateTime<Utc>> {
        self.get_str(key)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_photo_omits_missing_capture_time() {
        let photo = PhotoVertex {
            name: "a.jpg".to_string(),
            path: "/photos/a.jpg".to_string(),
            captured_at: None,
            hash: "sha256+00".to_string(),
        };
        let fields: Vec<&str> = photo.properties().iter().map(|(k, _)| *k).collect();
        assert_eq!(fields, vec!["name", "path", "hash"]);
        assert_eq!(photo.property("path"), Some(Scalar::from("/photos/a.jpg")));
        assert_eq!(photo.property("capturedAt"), None);
    }

    #[test]
    fn test_city_unique_name() {
        let city = CityVertex::new("france", "paris");
        assert_eq!(city.name, "paris");
        assert_eq!(city.unique_name, "france > paris");
        assert_eq!(city.property(CityVertex::KEY), Some(Scalar::from("france > paris")));
    }

    #[test]
    fn test_album_identity_includes_start() {
        let start = Utc.with_ymd_and_hms(2019, 6, 1, 9, 30, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2019, 6, 4, 18, 0, 0).unwrap();
        let album = AlbumVertex::new("4 days in paris".to_string(), "paris", 4, start, end);
        assert_eq!(album.unique_name, "paris @ 2019-06-01T09:30:00.000Z");
        assert_eq!(album.property("days"), Some(Scalar::Int(4)));
    }

    #[test]
    fn test_edge_record_carries_target() {
        let target = ElementId::Int(42);
        let edge = EdgeRecord {
            kind: EdgeKind::CityLocationOfPhoto,
            target: &target,
        };
        assert_eq!(edge.label(), "city_location_of_photo");
        assert_eq!(edge.property("targetId"), Some(Scalar::Int(42)));
        assert_eq!(edge.property("name"), Some(Scalar::from("city_location_of_photo")));
    }
}
