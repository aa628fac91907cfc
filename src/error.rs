use thiserror::Error;

use crate::graph::NodeId;

/// Errors produced while building, filling, persisting or rendering a graph.
#[derive(Debug, Error)]
pub enum FloodError {
    #[error("invalid coordinate (lat {lat}, lon {lon})")]
    InvalidCoordinate { lat: f64, lon: f64 },

    #[error("node {node} has no position ({missing} node(s) without coordinates)")]
    MissingPosition { node: NodeId, missing: usize },

    #[error("source node {0} not found in graph")]
    UnknownSource(NodeId),

    #[error("way {way} is malformed: {reason}")]
    MalformedWay { way: i64, reason: String },

    #[error("no source given and no node carries a finite distance")]
    NoReachableSource,

    #[error("edge {from} -> {to} has invalid weight {weight}")]
    InvalidWeight { from: NodeId, to: NodeId, weight: f64 },

    #[error("node {node} references unknown neighbor {neighbor}")]
    DanglingNeighbor { node: NodeId, neighbor: NodeId },

    #[error("exactly one of width or height must be given")]
    InvalidImageSize,

    #[error("graph has no drawable extent")]
    EmptyExtent,

    #[error("invalid way selector {0:?}, expected key or key=value")]
    InvalidSelector(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("OSM parse error: {0}")]
    Osm(String),
}

pub type Result<T> = std::result::Result<T, FloodError>;
