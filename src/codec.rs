//! JSON persistence of a filled graph.
//!
//! The document names the center node and lists every node with its distance,
//! position and weighted neighbors, so a reloaded graph needs no geodesic
//! recomputation. Unreachable distances are stored as `null`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use fnv::{FnvHashMap, FnvHashSet};
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{FloodError, Result};
use crate::geo::Position;
use crate::graph::{Cost, Edge, Graph, Node, NodeId};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    pub center: Option<NodeId>,
    pub nodes: Vec<NodeEntry>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeEntry {
    pub id: NodeId,
    pub dist: Option<Cost>,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub neighbors: Vec<NeighborEntry>,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NeighborEntry {
    pub id: NodeId,
    pub dist: Cost,
}

impl GraphDocument {
    pub fn from_graph(graph: &Graph, center: Option<NodeId>) -> Self {
        let nodes = graph
            .nodes()
            .map(|node| NodeEntry {
                id: node.id,
                dist: node.is_reachable().then_some(node.dist),
                lat: node.pos.lat,
                lon: node.pos.lon,
                neighbors: node
                    .edges
                    .iter()
                    .map(|e| NeighborEntry {
                        id: e.target,
                        dist: e.weight,
                    })
                    .collect(),
            })
            .collect();
        Self { center, nodes }
    }

    /// Folds `other` into `self`. Nodes with the same id are replaced; a
    /// center in `other` overrides this one.
    pub fn merge(&mut self, other: GraphDocument) {
        let mut slots: FnvHashMap<NodeId, usize> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(slot, n)| (n.id, slot))
            .collect();
        for entry in other.nodes {
            match slots.get(&entry.id) {
                Some(&slot) => self.nodes[slot] = entry,
                None => {
                    slots.insert(entry.id, self.nodes.len());
                    self.nodes.push(entry);
                }
            }
        }
        if other.center.is_some() {
            self.center = other.center;
        }
    }

    /// Rebuilds the graph, checking coordinates, weights and neighbor
    /// references.
    pub fn into_graph(self) -> Result<(Graph, Option<NodeId>)> {
        let known: FnvHashSet<NodeId> = self.nodes.iter().map(|n| n.id).collect();
        if let Some(center) = self.center {
            if !known.contains(&center) {
                return Err(FloodError::UnknownSource(center));
            }
        }

        let mut graph = Graph::with_capacity(self.nodes.len());
        for entry in self.nodes {
            let pos = Position::new(entry.lat, entry.lon).validate()?;
            let mut edges = Vec::with_capacity(entry.neighbors.len());
            for neigh in entry.neighbors {
                if !known.contains(&neigh.id) {
                    return Err(FloodError::DanglingNeighbor {
                        node: entry.id,
                        neighbor: neigh.id,
                    });
                }
                if !(neigh.dist.is_finite() && neigh.dist >= 0.0) {
                    return Err(FloodError::InvalidWeight {
                        from: entry.id,
                        to: neigh.id,
                        weight: neigh.dist,
                    });
                }
                edges.push(Edge {
                    target: neigh.id,
                    weight: neigh.dist,
                });
            }
            let mut node = Node::new(entry.id, pos, edges);
            node.dist = entry.dist.unwrap_or(Cost::INFINITY);
            graph.insert(node);
        }
        Ok((graph, self.center))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(BufReader::new(reader))?)
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = BufWriter::new(writer);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}

pub fn write_graph<P: AsRef<Path>>(path: P, graph: &Graph, center: Option<NodeId>) -> Result<()> {
    let file = File::create(path.as_ref())?;
    GraphDocument::from_graph(graph, center).to_writer(file)?;
    info!("Exported {} nodes to {}", graph.len(), path.as_ref().display());
    Ok(())
}

pub fn read_graph<P: AsRef<Path>>(path: P) -> Result<(Graph, Option<NodeId>)> {
    read_graphs(std::iter::once(path))
}

/// Loads and merges several documents; later files win on shared node ids.
pub fn read_graphs<I, P>(paths: I) -> Result<(Graph, Option<NodeId>)>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut merged = GraphDocument::default();
    for path in paths {
        let doc = GraphDocument::from_reader(File::open(path.as_ref())?)?;
        info!("Imported {} nodes from {}", doc.nodes.len(), path.as_ref().display());
        merged.merge(doc);
    }
    merged.into_graph()
}
