//! Road-network distance fields from OpenStreetMap data.
//!
//! Ways selected by a [`WaySelector`] are turned into a [`Graph`] by the
//! [`GraphBuilder`], whose edges carry WGS-84 geodesic lengths. A
//! [`DistanceField`] then floods the graph from one or more source nodes,
//! leaving every node labelled with its distance to the nearest source.

pub mod builder;
pub mod codec;
pub mod error;
pub mod export;
pub mod flood;
pub mod geo;
pub mod graph;
pub mod osm;
pub mod render;
pub mod selector;

pub use builder::{build_graph, GraphBuilder, NodeRecord, WayRecord};
pub use error::{FloodError, Result};
pub use flood::{DistanceField, FillAlgorithm, FillStats};
pub use geo::{distance, Position};
pub use graph::{Cost, Edge, Graph, Node, NodeId};
pub use selector::{Profile, TagSelector, WaySelector};
