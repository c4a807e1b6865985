use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::graph::Credentials;

/// Environment variable holding the graph store key. Takes precedence over
/// the config file so the secret can stay out of it.
pub const GRAPH_KEY_ENV: &str = "PHOGRAPH_GRAPH_KEY";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub graph: GraphConfig,

    #[serde(default)]
    pub scanner: ScannerConfig,

    #[serde(default)]
    pub geo: GeoConfig,

    #[serde(default)]
    pub organiser: OrganiserConfig,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GraphBackend {
    #[default]
    Gremlin,
    /// In-process graph, discarded at exit. Useful for dry runs.
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    #[serde(default)]
    pub backend: GraphBackend,

    #[serde(default = "default_graph_url")]
    pub url: String,

    /// Database and collection the credential is scoped to.
    #[serde(default)]
    pub database: Option<String>,

    #[serde(default)]
    pub collection: Option<String>,

    /// Explicit SASL username; defaults to `/dbs/<database>/colls/<collection>`.
    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub key: Option<String>,

    #[serde(default = "default_traversal_source")]
    pub traversal_source: String,
}

fn default_graph_url() -> String {
    "ws://localhost:8182/gremlin".to_string()
}

fn default_traversal_source() -> String {
    "g".to_string()
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            backend: GraphBackend::default(),
            url: default_graph_url(),
            database: None,
            collection: None,
            username: None,
            key: None,
            traversal_source: default_traversal_source(),
        }
    }
}

impl GraphConfig {
    /// Credentials for the handshake, if a key is configured.
    pub fn credentials(&self) -> Option<Credentials> {
        let key = std::env::var(GRAPH_KEY_ENV)
            .ok()
            .filter(|k| !k.is_empty())
            .or_else(|| self.key.clone())?;
        self.credentials_with_key(&key)
    }

    fn credentials_with_key(&self, key: &str) -> Option<Credentials> {
        if let Some(ref username) = self.username {
            return Some(Credentials {
                username: username.clone(),
                password: key.to_string(),
            });
        }
        match (&self.database, &self.collection) {
            (Some(database), Some(collection)) => {
                Some(Credentials::for_collection(database, collection, key))
            }
            _ => {
                tracing::warn!(
                    "Graph key configured without database/collection or username, ignoring it"
                );
                None
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScannerConfig {
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,

    /// Stop a directory import after this many photos.
    #[serde(default = "default_photo_limit")]
    pub photo_limit: usize,
}

fn default_image_extensions() -> Vec<String> {
    vec![
        "jpg".to_string(),
        "jpeg".to_string(),
        "png".to_string(),
        "tiff".to_string(),
    ]
}

fn default_photo_limit() -> usize {
    100_000
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            image_extensions: default_image_extensions(),
            photo_limit: default_photo_limit(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeoConfig {
    /// GeoJSON FeatureCollection of country polygons (`name` property).
    #[serde(default = "default_countries_path")]
    pub countries_path: PathBuf,

    /// GeoJSON FeatureCollection of city polygons (`NAME` property).
    #[serde(default = "default_cities_path")]
    pub cities_path: PathBuf,
}

fn geojson_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("phograph")
        .join("geojson")
}

fn default_countries_path() -> PathBuf {
    geojson_dir().join("countries.geojson")
}

fn default_cities_path() -> PathBuf {
    geojson_dir().join("cities.geojson")
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            countries_path: default_countries_path(),
            cities_path: default_cities_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrganiserConfig {
    /// Largest gap between consecutive photos of one album.
    #[serde(default = "default_one_day")]
    pub max_gap_days: u32,

    /// Albums spanning less than this are dropped.
    #[serde(default = "default_one_day")]
    pub min_span_days: u32,

    #[serde(default = "default_min_photos")]
    pub min_photos: usize,
}

fn default_one_day() -> u32 {
    1
}

fn default_min_photos() -> usize {
    5
}

impl Default for OrganiserConfig {
    fn default() -> Self {
        Self {
            max_gap_days: default_one_day(),
            min_span_days: default_one_day(),
            min_photos: default_min_photos(),
        }
    }
}

impl Config {
    /// Load from the default location, falling back to defaults when the
    /// file does not exist.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", config_path);
            Ok(Config::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        Ok(config)
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("phograph")
    }

    /// `PHOGRAPH_CONFIG` if set, else `$XDG_CONFIG_HOME/phograph/config.toml`.
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("PHOGRAPH_CONFIG") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }
}
