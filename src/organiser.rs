//! Building albums from bursts of photos taken in the same city.

use chrono::{DateTime, Duration, Utc};

use crate::cluster::{find_clusters, ClusterOptions, TimePoint};
use crate::config::OrganiserConfig;
use crate::error::GraphError;
use crate::graph::{AlbumVertex, EdgeKind, ElementId, GraphDb, Vertex};
use crate::importer::UNKNOWN_PLACE;

impl From<&OrganiserConfig> for ClusterOptions {
    fn from(config: &OrganiserConfig) -> Self {
        Self {
            max_gap: Duration::days(config.max_gap_days as i64),
            min_span: Duration::days(config.min_span_days as i64),
            min_size: config.min_photos,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrganiseSummary {
    pub cities: usize,
    pub albums: usize,
    pub photos: usize,
}

fn span_in_days(span: Duration) -> f64 {
    span.num_milliseconds() as f64 / Duration::days(1).num_milliseconds() as f64
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("{} {}", count, unit)
    } else {
        format!("{} {}s", count, unit)
    }
}

/// Approximate, human-sized duration: days under six days, weeks under a
/// month, months beyond. Always rounded up.
pub fn format_duration(span: Duration) -> String {
    let days = span_in_days(span);
    if days < 6.0 {
        plural(days.ceil() as i64, "day")
    } else if days < 30.0 {
        plural((days / 7.0).ceil() as i64, "week")
    } else {
        plural((days / 30.0).ceil() as i64, "month")
    }
}

/// Where an album was taken: the city, or the country when the city is
/// not known.
pub fn album_place<'a>(country: &'a str, city: &'a str) -> &'a str {
    if city == UNKNOWN_PLACE {
        country
    } else {
        city
    }
}

pub struct PhotoOrganiser<'a> {
    db: &'a mut GraphDb,
    options: ClusterOptions,
}

impl<'a> PhotoOrganiser<'a> {
    pub fn new(db: &'a mut GraphDb, options: ClusterOptions) -> Self {
        Self { db, options }
    }

    /// Walk every country and city, turning each burst of photos into an
    /// album. Re-running over an unchanged graph changes nothing.
    pub async fn sync(&mut self) -> Result<OrganiseSummary, GraphError> {
        let mut summary = OrganiseSummary::default();

        let countries = self.db.vertices_by_label("country").await?;
        for country in countries {
            let country_name = country.get_str("name").unwrap_or(UNKNOWN_PLACE).to_string();
            let cities = self
                .db
                .related_out(&country.id, EdgeKind::CountryContainsCity)
                .await?;

            for city in cities {
                summary.cities += 1;
                let city_name = city.get_str("name").unwrap_or(UNKNOWN_PLACE).to_string();
                let photos = self
                    .db
                    .related_out(&city.id, EdgeKind::CityLocationOfPhoto)
                    .await?;

                let points: Vec<TimePoint<ElementId>> = photos
                    .into_iter()
                    .filter_map(|photo| {
                        let at = photo.get_datetime("capturedAt")?;
                        Some(TimePoint { item: photo.id, at })
                    })
                    .collect();

                if points.len() < self.options.min_size {
                    tracing::debug!(
                        country = %country_name,
                        city = %city_name,
                        dated_photos = points.len(),
                        "Too few dated photos for an album"
                    );
                    continue;
                }

                let place = album_place(&country_name, &city_name).to_string();
                for cluster in find_clusters(points, &self.options) {
                    let (Some(started_at), Some(ended_at)) = (cluster.start(), cluster.end()) else {
                        continue;
                    };
                    let photo_ids: Vec<ElementId> = cluster.items().cloned().collect();
                    self.add_album(&place, started_at, ended_at, &photo_ids).await?;
                    summary.albums += 1;
                    summary.photos += photo_ids.len();
                }
            }
        }

        Ok(summary)
    }

    async fn add_album(
        &mut self,
        place: &str,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        photo_ids: &[ElementId],
    ) -> Result<ElementId, GraphError> {
        let span = ended_at - started_at;
        let name = format!("{} in {}", format_duration(span), place);
        let days = span_in_days(span).ceil() as i64;

        let album = AlbumVertex::new(name, place, days, started_at, ended_at);
        let album_id = self.db.upsert_vertex(&album, AlbumVertex::KEY).await?;
        for photo_id in photo_ids {
            self.db
                .ensure_edge(&album_id, photo_id, EdgeKind::PhotoInAlbum)
                .await?;
        }

        tracing::info!(album = %album.name, size = photo_ids.len(), "Created album");
        Ok(album_id)
    }
}
