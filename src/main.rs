use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Instant;

use phograph::cluster::ClusterOptions;
use phograph::config::{Config, GraphBackend};
use phograph::geo::GeoLookup;
use phograph::graph::GraphDb;
use phograph::importer::{PhotoImporter, VisitedIds};
use phograph::logging;
use phograph::organiser::PhotoOrganiser;

struct Args {
    directory: Option<PathBuf>,
    config_path: Option<PathBuf>,
    skip_import: bool,
    skip_albums: bool,
    dry_run: bool,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args {
        directory: None,
        config_path: None,
        skip_import: false,
        skip_albums: false,
        dry_run: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("phograph {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    parsed.config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--albums-only" => parsed.skip_import = true,
            "--no-albums" => parsed.skip_albums = true,
            "--dry-run" => parsed.dry_run = true,
            arg if !arg.starts_with('-') && parsed.directory.is_none() => {
                parsed.directory = Some(PathBuf::from(arg));
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    parsed
}

fn print_help() {
    println!(
        r#"phograph - import photos into a graph of devices, places and albums

USAGE:
    phograph [OPTIONS] <DIRECTORY>
    phograph --albums-only [OPTIONS]

OPTIONS:
    --config, -c PATH   Path to config file
    --albums-only       Skip the import, only rebuild albums
    --no-albums         Import only, do not build albums
    --dry-run           Use an in-memory graph instead of the configured store
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    PHOGRAPH_CONFIG     Path to config file (overrides default location)
    PHOGRAPH_GRAPH_KEY  Graph store key (overrides the config file)
    PHOGRAPH_LOG        Log level (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/phograph/config.toml

See also: phograph-trigger --help"#
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args();

    // Initialize logging (uses journald on Linux, file fallback otherwise)
    let _ = logging::init(Some(logging::default_log_dir()));

    let mut config = match args.config_path {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if args.dry_run {
        config.graph.backend = GraphBackend::Memory;
    }

    let directory = match (args.skip_import, args.directory) {
        (true, _) => None,
        (false, Some(directory)) => Some(directory),
        (false, None) => {
            eprintln!("Error: a photo directory is required unless --albums-only is given");
            print_help();
            std::process::exit(1);
        }
    };

    let started = Instant::now();
    tracing::info!("Connecting to graph store...");
    let mut db = GraphDb::connect(&config.graph);
    db.ready().await.context("Failed to connect to graph store")?;

    let result = run(&config, &mut db, directory, !args.skip_albums).await;

    if let Err(e) = db.close().await {
        tracing::warn!("Failed to close graph connection: {}", e);
    }
    result?;

    tracing::info!("Done ({}ms)", started.elapsed().as_millis());
    Ok(())
}

async fn run(
    config: &Config,
    db: &mut GraphDb,
    directory: Option<PathBuf>,
    build_albums: bool,
) -> Result<()> {
    if let Some(directory) = directory {
        let geo_started = Instant::now();
        let geo = GeoLookup::load(&config.geo.countries_path, &config.geo.cities_path)
            .context("Failed to load geo data")?;
        tracing::info!("Loading geo data... Done ({}ms)", geo_started.elapsed().as_millis());

        let import_started = Instant::now();
        let mut visited = VisitedIds::new();
        let summary = PhotoImporter::new(&geo, db, &mut visited)
            .sync(
                &directory,
                &config.scanner.image_extensions,
                config.scanner.photo_limit,
            )
            .await
            .with_context(|| format!("Import of {:?} failed", directory))?;
        tracing::info!(
            found = summary.found,
            imported = summary.imported,
            skipped = summary.skipped,
            "Import done ({}ms)",
            import_started.elapsed().as_millis()
        );
    }

    if build_albums {
        let albums_started = Instant::now();
        let summary = PhotoOrganiser::new(db, ClusterOptions::from(&config.organiser))
            .sync()
            .await
            .context("Failed to build albums")?;
        tracing::info!(
            cities = summary.cities,
            albums = summary.albums,
            photos = summary.photos,
            "Albums done ({}ms)",
            albums_started.elapsed().as_millis()
        );
    }

    let counts = db.summary().await.context("Failed to summarise graph")?;
    println!("Graph contents:");
    for (label, count) in &counts {
        println!("  {:<10} {}", label, count);
    }

    Ok(())
}
