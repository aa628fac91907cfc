//! `.osm.pbf` loading.
//!
//! The file is read twice: pass 1 feeds routable ways to the builder, pass 2
//! attaches coordinates to the nodes those ways reference.

use std::fs::File;
use std::path::Path;

use log::{info, warn};
use osmpbfreader::{OsmObj, OsmPbfReader};

use crate::builder::{GraphBuilder, NodeRecord, WayRecord};
use crate::error::{FloodError, Result};
use crate::graph::Graph;
use crate::selector::WaySelector;

/// What to do with way nodes whose coordinates are not in the extract.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum MissingPolicy {
    /// Fail with `MissingPosition`.
    #[default]
    Fail,
    /// Drop those nodes and their edges, logging how many were removed.
    Prune,
}

fn open(path: &Path) -> Result<OsmPbfReader<File>> {
    Ok(OsmPbfReader::new(File::open(path)?))
}

fn osm_err<E: std::fmt::Display>(e: E) -> FloodError {
    FloodError::Osm(e.to_string())
}

pub fn load_pbf<S: WaySelector>(path: &Path, selector: S, missing: MissingPolicy) -> Result<Graph> {
    let mut builder = GraphBuilder::new(selector);

    // Pass 1: way topology
    let mut pbf = open(path)?;
    for obj in pbf.iter() {
        if let OsmObj::Way(w) = obj.map_err(osm_err)? {
            let way = WayRecord {
                id: w.id.0,
                nodes: w.nodes.iter().map(|n| n.0).collect(),
                tags: w
                    .tags
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            };
            builder.add_way_counted(&way);
        }
    }
    let stats = builder.way_stats();
    info!(
        "Collected {} routable ways ({} skipped as malformed); {} unique node refs",
        stats.included,
        stats.malformed,
        builder.node_count()
    );

    // Pass 2: coordinates for needed nodes
    let mut pbf = open(path)?;
    let mut attached = 0;
    for obj in pbf.iter() {
        if let OsmObj::Node(n) = obj.map_err(osm_err)? {
            let record = NodeRecord {
                id: n.id.0,
                lat: n.lat(),
                lon: n.lon(),
            };
            if builder.attach_position(&record)? {
                attached += 1;
            }
        }
    }
    info!("Loaded coordinates for {attached} nodes actually present");

    if missing == MissingPolicy::Prune {
        let removed = builder.prune_unpositioned();
        if !removed.is_empty() {
            warn!(
                "Pruned {} nodes without coordinates (first: {})",
                removed.len(),
                removed[0]
            );
        }
    }
    builder.finish()
}
