use std::path::Path;
use std::time::SystemTime;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;

use floodmap::codec;
use floodmap::export::write_distances_csv;
use floodmap::osm::{load_pbf, MissingPolicy};
use floodmap::render::{render, ImageSize};
use floodmap::{DistanceField, FillAlgorithm, Graph, NodeId, Position, Profile, TagSelector};

#[derive(Parser, Debug)]
#[command(name = "floodmap")]
#[command(about = "Build a graph from an OSM .pbf (or a previous export) and flood-fill distances from source nodes.", long_about = None)]
struct Cli {
    /// Path to the .osm.pbf file
    #[arg(short, long, conflicts_with = "import")]
    pbf: Option<String>,

    /// Previously exported graph (JSON). May be repeated; later files win.
    #[arg(short, long)]
    import: Vec<String>,

    /// Source node id to fill from. May be repeated.
    #[arg(short, long)]
    source: Vec<NodeId>,

    /// Latitude of the start position; the nearest node becomes the source
    #[arg(long, requires = "lon", allow_negative_numbers = true)]
    lat: Option<f64>,

    /// Longitude of the start position
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    lon: Option<f64>,

    #[arg(short, long, default_value_t = FillAlgorithm::Spfa)]
    algorithm: FillAlgorithm,

    /// Output CSV (node_id, distance_m). If omitted, prints a summary to stdout.
    #[arg(short, long)]
    out: Option<String>,

    /// Include unreachable nodes in output with infinite distance
    #[arg(long, default_value_t = false)]
    include_unreachable: bool,

    /// Write the filled graph as JSON for later --import. Only the first source is stored as center.
    #[arg(short, long)]
    export: Option<String>,

    /// Render the distance field to this PPM image
    #[arg(long)]
    image: Option<String>,

    /// Image width in pixels (give width or height, not both)
    #[arg(short = 'W', long)]
    width: Option<u32>,

    /// Image height in pixels
    #[arg(short = 'H', long)]
    height: Option<u32>,

    /// Select roads drivable by car
    #[arg(long)]
    car: bool,

    /// Select pedestrian ways and roads with sidewalks
    #[arg(long)]
    pedestrian: bool,

    /// Select cycleways and roads with cycle lanes
    #[arg(long)]
    bicycle: bool,

    /// Extra selector, `key=value` or `key` for any value. May be repeated.
    #[arg(long)]
    add_selector: Vec<String>,

    /// Drop way nodes missing from the extract instead of failing
    #[arg(long, default_value_t = false)]
    prune_missing: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn selector(&self) -> Result<TagSelector> {
        let mut selector = TagSelector::new();
        for (enabled, profile) in [
            (self.car, Profile::Car),
            (self.pedestrian, Profile::Pedestrian),
            (self.bicycle, Profile::Bicycle),
        ] {
            if enabled {
                selector.add_profile(profile);
            }
        }
        for rule in &self.add_selector {
            selector.add_rule(rule)?;
        }
        if selector.is_empty() {
            selector.add_key("highway");
        }
        Ok(selector)
    }

    fn image_size(&self) -> Result<Option<ImageSize>> {
        if self.image.is_none() {
            return Ok(None);
        }
        Ok(Some(ImageSize::from_options(self.width, self.height)?))
    }
}

/// Explicit source ids, else the node nearest to --lat/--lon, else the center
/// stored in an imported graph.
fn resolve_sources(cli: &Cli, graph: &Graph, center: Option<NodeId>) -> Vec<NodeId> {
    if !cli.source.is_empty() {
        return cli.source.clone();
    }
    if let (Some(lat), Some(lon)) = (cli.lat, cli.lon) {
        let nearest = graph.nearest_node(Position::new(lat, lon));
        if let Some(id) = nearest {
            info!("Nearest node to ({lat}, {lon}) is {id}");
        }
        return nearest.into_iter().collect();
    }
    center.into_iter().collect()
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    // Validate output options before the expensive part.
    let image_size = cli.image_size()?;
    if let (Some(lat), Some(lon)) = (cli.lat, cli.lon) {
        Position::new(lat, lon).validate()?;
    }

    let (mut graph, center) = if let Some(pbf) = &cli.pbf {
        let policy = if cli.prune_missing {
            MissingPolicy::Prune
        } else {
            MissingPolicy::Fail
        };
        let graph = load_pbf(Path::new(pbf), cli.selector()?, policy)
            .with_context(|| format!("building graph from {pbf}"))?;
        (graph, None)
    } else if !cli.import.is_empty() {
        codec::read_graphs(&cli.import).context("importing graph")?
    } else {
        bail!("no input given, use --pbf or --import");
    };
    if graph.is_empty() {
        bail!("graph is empty, no routable ways selected");
    }

    let sources = resolve_sources(&cli, &graph, center);
    let field = DistanceField::new(sources.iter().copied()).with_algorithm(cli.algorithm);

    let now = SystemTime::now();
    let stats = field.compute(&mut graph).context("computing distance field")?;
    if let Ok(elapsed) = now.elapsed() {
        info!("Fill took {} s", elapsed.as_secs_f64());
    }

    if let Some(path) = &cli.export {
        // The document holds a single center; other sources survive only as
        // zero distances.
        if sources.len() > 1 {
            info!(
                "Export records {} as center; sources {:?} are stored by distance only",
                sources[0],
                &sources[1..]
            );
        }
        codec::write_graph(path, &graph, sources.first().copied().or(center))
            .with_context(|| format!("exporting {path}"))?;
    }

    if let (Some(path), Some(size)) = (&cli.image, image_size) {
        let raster = render(&graph, size).context("rendering")?;
        raster
            .save_ppm(path)
            .with_context(|| format!("writing image {path}"))?;
        println!("Drew {}x{} image to {}", raster.width, raster.height, path);
    }

    if let Some(out_path) = &cli.out {
        let written = write_distances_csv(out_path, &graph, cli.include_unreachable)
            .with_context(|| format!("creating CSV {out_path}"))?;
        println!("Wrote distances for {written} nodes to {out_path}");
    } else {
        println!("Nodes: {}", graph.len());
        println!("Reachable from {:?}: {}", sources, stats.reachable);
        if let Some(maxd) = graph.max_finite_dist() {
            println!("Max finite distance (m): {:.2}", maxd);
        }
    }

    Ok(())
}
