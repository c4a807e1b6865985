//! Photo graph: imports photos into a property graph of devices, countries
//! and cities, then groups bursts of photos into albums.

pub mod cluster;
pub mod config;
pub mod error;
pub mod geo;
pub mod graph;
pub mod importer;
pub mod logging;
pub mod organiser;
pub mod photo;
