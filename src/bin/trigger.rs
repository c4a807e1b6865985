//! Single-photo import, meant to be run once per new file by whatever
//! watches the photo store (a storage event hook, inotify, a cron job).
//!
//! ## Usage
//!
//! ```bash
//! phograph-trigger /photos/2019/IMG_0001.jpg
//! phograph-trigger --content-type image/jpeg /tmp/upload-1234
//! ```

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

use phograph::config::Config;
use phograph::geo::GeoLookup;
use phograph::graph::GraphDb;
use phograph::importer::{check_content_type, content_type_for, import_single};
use phograph::logging;

struct TriggerArgs {
    path: PathBuf,
    content_type: Option<String>,
    config_path: Option<PathBuf>,
}

fn parse_args() -> TriggerArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut path = None;
    let mut content_type = None;
    let mut config_path = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--content-type" | "-t" => {
                if i + 1 < args.len() {
                    content_type = Some(args[i + 1].clone());
                    i += 1;
                } else {
                    eprintln!("Error: --content-type requires a value");
                    std::process::exit(1);
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            arg if !arg.starts_with('-') && path.is_none() => {
                path = Some(PathBuf::from(arg));
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let Some(path) = path else {
        eprintln!("Error: a photo path is required");
        print_help();
        std::process::exit(1);
    };

    TriggerArgs {
        path,
        content_type,
        config_path,
    }
}

fn print_help() {
    println!(
        r#"phograph-trigger - import a single photo into the graph

USAGE:
    phograph-trigger [OPTIONS] <PATH>

OPTIONS:
    --content-type, -t TYPE   Content type of the file (default: guessed from extension)
    --config, -c PATH         Path to config file
    --help, -h                Show this help message

Only image/jpeg is imported; anything else is skipped with a warning and
exits successfully.

ENVIRONMENT:
    PHOGRAPH_CONFIG       Path to config file (overrides default location)
    PHOGRAPH_GRAPH_KEY    Graph store key (overrides the config file)
    PHOGRAPH_LOG          Log level (trace, debug, info, warn, error)
"#
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args();
    let _ = logging::init(Some(logging::default_log_dir()));

    let content_type = args
        .content_type
        .clone()
        .unwrap_or_else(|| content_type_for(&args.path).to_string());
    info!(path = %args.path.display(), content_type = %content_type, "Processing photo");

    if let Err(e) = check_content_type(&content_type) {
        warn!("{}. Exiting.", e);
        return Ok(());
    }

    let config = match args.config_path {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    // Loaded before connecting; import_single opens and closes the session
    info!("Loading geo data...");
    let started = Instant::now();
    let geo = GeoLookup::load(&config.geo.countries_path, &config.geo.cities_path)
        .context("Failed to load geo data")?;
    info!("Loading geo data... Done ({}ms)", started.elapsed().as_millis());

    info!("Adding photo...");
    let started = Instant::now();
    let mut db = GraphDb::connect(&config.graph);
    let imported = import_single(&mut db, &geo, &args.path, &content_type)
        .await
        .with_context(|| format!("Failed to import {:?}", args.path))?;

    match imported {
        Some(id) => info!("Adding photo... Done ({}, {}ms)", id, started.elapsed().as_millis()),
        None => warn!("Photo skipped. Exiting."),
    }
    Ok(())
}
