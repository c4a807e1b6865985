//! Importing photos into the graph.
//!
//! Each photo becomes a `photo` vertex keyed by its path, linked to the
//! device that took it and to the city (within a country) it was taken in.
//! Shared vertices are created with [`GraphDb::ensure_vertex`], so several
//! importers can run against the same store without duplicating them.

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use crate::error::{GraphError, ImportError};
use crate::geo::GeoResolver;
use crate::graph::{
    CityVertex, CountryVertex, DeviceVertex, EdgeKind, ElementId, GraphDb, PhotoVertex, Vertex,
};
use crate::photo::{content_hash, discover_photos, read_metadata, PhotoMetadata};

/// Stand-in name for a country or city that could not be resolved.
pub const UNKNOWN_PLACE: &str = "unknown";

/// The only content type accepted for single-file imports.
pub const SUPPORTED_CONTENT_TYPE: &str = "image/jpeg";

/// Ids already resolved during one run, keyed by the vertex's identity
/// value. Only an optimisation: every write is idempotent without it.
#[derive(Debug, Default)]
pub struct VisitedIds {
    devices: HashMap<String, ElementId>,
    countries: HashMap<String, ElementId>,
    cities: HashMap<String, ElementId>,
}

impl VisitedIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.devices.len() + self.countries.len() + self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub found: usize,
    pub imported: usize,
    pub skipped: usize,
}

/// Reject anything but JPEG before reading it.
pub fn check_content_type(content_type: &str) -> Result<(), ImportError> {
    if content_type.eq_ignore_ascii_case(SUPPORTED_CONTENT_TYPE) {
        Ok(())
    } else {
        Err(ImportError::UnsupportedContentType(content_type.to_string()))
    }
}

/// Best guess at a content type from a file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "tif" | "tiff" => "image/tiff",
        "gif" => "image/gif",
        "heic" => "image/heic",
        _ => "application/octet-stream",
    }
}

/// Import one file in a session of its own: open, import, close.
///
/// The session is closed whatever the outcome. Input errors (unsupported
/// content type, unreadable file) are logged and reported as `Ok(None)`;
/// only graph failures are returned as errors.
pub async fn import_single<G: GeoResolver>(
    db: &mut GraphDb,
    geo: &G,
    path: &Path,
    content_type: &str,
) -> Result<Option<ElementId>, ImportError> {
    if let Err(e) = check_content_type(content_type) {
        tracing::warn!(path = %path.display(), "{}, skipping", e);
        return Ok(None);
    }

    db.ready().await?;
    let mut visited = VisitedIds::new();
    let result = PhotoImporter::new(geo, db, &mut visited)
        .import_file(path, content_type)
        .await;
    if let Err(e) = db.close().await {
        tracing::warn!("Failed to close graph connection: {}", e);
    }

    match result {
        Ok(id) => Ok(Some(id)),
        Err(e) if e.is_input_error() => {
            tracing::warn!(path = %path.display(), error = %e, "Skipping photo");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

pub struct PhotoImporter<'a, G: GeoResolver> {
    geo: &'a G,
    db: &'a mut GraphDb,
    visited: &'a mut VisitedIds,
}

impl<'a, G: GeoResolver> PhotoImporter<'a, G> {
    pub fn new(geo: &'a G, db: &'a mut GraphDb, visited: &'a mut VisitedIds) -> Self {
        Self { geo, db, visited }
    }

    /// Read and import a single file after checking its content type.
    pub async fn import_file(
        &mut self,
        path: &Path,
        content_type: &str,
    ) -> Result<ElementId, ImportError> {
        check_content_type(content_type)?;
        let bytes = tokio::fs::read(path).await.map_err(|source| ImportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.add_photo(path, &bytes).await
    }

    /// Import an already-read photo.
    pub async fn add_photo(&mut self, path: &Path, bytes: &[u8]) -> Result<ElementId, ImportError> {
        let hash = content_hash(bytes);
        let metadata = read_metadata(bytes);
        tracing::debug!(
            path = %path.display(),
            device = ?metadata.device,
            captured_at = ?metadata.captured_at,
            location = ?metadata.location,
            "Read photo metadata"
        );
        Ok(self.add_photo_with_metadata(path, hash, &metadata).await?)
    }

    pub async fn add_photo_with_metadata(
        &mut self,
        path: &Path,
        hash: String,
        metadata: &PhotoMetadata,
    ) -> Result<ElementId, GraphError> {
        let photo = PhotoVertex {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            path: path.to_string_lossy().to_string(),
            captured_at: metadata.captured_at,
            hash,
        };
        let photo_id = self.db.upsert_vertex(&photo, PhotoVertex::KEY).await?;

        if let Some(ref device) = metadata.device {
            let device_id = self.device_id(device).await?;
            self.db
                .ensure_edge(&device_id, &photo_id, EdgeKind::DeviceTookPhoto)
                .await?;
        }

        if let Some(location) = metadata.location {
            let country = self
                .geo
                .country(location)
                .unwrap_or_else(|| UNKNOWN_PLACE.to_string());
            let city = self
                .geo
                .city(location)
                .unwrap_or_else(|| UNKNOWN_PLACE.to_string());

            let country_id = self.country_id(&country).await?;
            let city_id = self.city_id(&country_id, &country, &city).await?;
            self.db
                .ensure_edge(&city_id, &photo_id, EdgeKind::CityLocationOfPhoto)
                .await?;
        }

        Ok(photo_id)
    }

    async fn device_id(&mut self, name: &str) -> Result<ElementId, GraphError> {
        if let Some(id) = self.visited.devices.get(name) {
            return Ok(id.clone());
        }
        let device = DeviceVertex {
            name: name.to_string(),
        };
        let id = self.db.ensure_vertex(&device, DeviceVertex::KEY).await?;
        self.visited.devices.insert(name.to_string(), id.clone());
        Ok(id)
    }

    async fn country_id(&mut self, name: &str) -> Result<ElementId, GraphError> {
        if let Some(id) = self.visited.countries.get(name) {
            return Ok(id.clone());
        }
        let country = CountryVertex {
            name: name.to_string(),
        };
        let id = self.db.ensure_vertex(&country, CountryVertex::KEY).await?;
        self.visited.countries.insert(name.to_string(), id.clone());
        Ok(id)
    }

    /// The city is linked to its country the first time it is seen in a run.
    async fn city_id(
        &mut self,
        country_id: &ElementId,
        country: &str,
        city: &str,
    ) -> Result<ElementId, GraphError> {
        let vertex = CityVertex::new(country, city);
        if let Some(id) = self.visited.cities.get(&vertex.unique_name) {
            return Ok(id.clone());
        }
        let id = self.db.ensure_vertex(&vertex, CityVertex::KEY).await?;
        self.db
            .ensure_edge(country_id, &id, EdgeKind::CountryContainsCity)
            .await?;
        self.visited.cities.insert(vertex.unique_name, id.clone());
        Ok(id)
    }

    /// Import every photo under `directory`. Files that cannot be read are
    /// skipped; a graph failure ends the run.
    pub async fn sync(
        &mut self,
        directory: &Path,
        extensions: &[String],
        limit: usize,
    ) -> Result<ImportSummary, ImportError> {
        let paths = discover_photos(directory, extensions, limit);
        let mut summary = ImportSummary {
            found: paths.len(),
            ..Default::default()
        };
        tracing::info!(directory = %directory.display(), found = summary.found, "Importing photos");

        for (index, path) in paths.iter().enumerate() {
            let started = Instant::now();
            let bytes = match tokio::fs::read(path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable photo");
                    summary.skipped += 1;
                    continue;
                }
            };

            match self.add_photo(path, &bytes).await {
                Ok(id) => {
                    summary.imported += 1;
                    tracing::info!(
                        "[{}/{}] Added {} ({}, {}ms)",
                        index + 1,
                        summary.found,
                        path.display(),
                        id,
                        started.elapsed().as_millis()
                    );
                }
                Err(e) if e.is_input_error() => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping photo");
                    summary.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(summary)
    }
}
