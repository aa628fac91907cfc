//! Two-phase graph construction.
//!
//! Ways are scanned first, because a node only belongs to the graph once an
//! included way references it. Positions are attached afterwards, in any
//! order, and edge weights are resolved last when every position is known.

use fnv::FnvHashMap;
use log::{debug, info};

use crate::error::{FloodError, Result};
use crate::geo::{self, Position};
use crate::graph::{Edge, Graph, Node, NodeId};
use crate::selector::WaySelector;

/// A way as read from the map: ordered node references plus tags.
#[derive(Clone, Debug, Default)]
pub struct WayRecord {
    pub id: i64,
    pub nodes: Vec<NodeId>,
    pub tags: Vec<(String, String)>,
}

impl WayRecord {
    pub fn new(id: i64, nodes: Vec<NodeId>, tags: &[(&str, &str)]) -> Self {
        Self {
            id,
            nodes,
            tags: tags
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

/// A node coordinate record.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NodeRecord {
    pub id: NodeId,
    pub lat: f64,
    pub lon: f64,
}

/// Which edges a way contributes, relative to its node order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Both,
    Forward,
    Backward,
}

/// Routability and direction of a way. `None` when the selector rejects
/// every tag.
pub fn way_direction<S: WaySelector>(selector: &S, tags: &[(String, String)]) -> Option<Direction> {
    if !tags.iter().any(|(k, v)| selector.includes(k, v)) {
        return None;
    }
    // Reverse and explicit two-way values decide on their own; any other
    // oneway value is judged alongside the remaining tags.
    if let Some((_, v)) = tags.iter().find(|(k, _)| k == "oneway") {
        match v.as_str() {
            "-1" => return Some(Direction::Backward),
            "no" | "false" | "0" => return Some(Direction::Both),
            _ => {}
        }
    }
    if tags.iter().any(|(k, v)| selector.is_one_way(k, v)) {
        Some(Direction::Forward)
    } else {
        Some(Direction::Both)
    }
}

#[derive(Debug, Default)]
struct PendingNode {
    pos: Option<Position>,
    neighbors: Vec<NodeId>,
}

impl PendingNode {
    fn add(&mut self, target: NodeId) {
        if !self.neighbors.contains(&target) {
            self.neighbors.push(target);
        }
    }
}

/// Counters reported after the way phase.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct WayStats {
    pub included: usize,
    pub ignored: usize,
    pub malformed: usize,
}

pub struct GraphBuilder<S> {
    selector: S,
    nodes: FnvHashMap<NodeId, PendingNode>,
    order: Vec<NodeId>,
    stats: WayStats,
}

impl<S: WaySelector> GraphBuilder<S> {
    pub fn new(selector: S) -> Self {
        Self {
            selector,
            nodes: FnvHashMap::default(),
            order: Vec::new(),
            stats: WayStats::default(),
        }
    }

    pub fn node_count(&self) -> usize {
        self.order.len()
    }

    pub fn way_stats(&self) -> WayStats {
        self.stats
    }

    /// Whether `id` is referenced by an included way.
    pub fn wanted(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    fn ensure(&mut self, id: NodeId) -> &mut PendingNode {
        let order = &mut self.order;
        self.nodes.entry(id).or_insert_with(|| {
            order.push(id);
            PendingNode::default()
        })
    }

    /// Adds the topology of one way. Returns `Ok(false)` if the selector
    /// rejects it and `MalformedWay` if it has fewer than two distinct nodes.
    pub fn add_way(&mut self, way: &WayRecord) -> Result<bool> {
        let Some(direction) = way_direction(&self.selector, &way.tags) else {
            return Ok(false);
        };
        let first = way.nodes.first().copied();
        if first.map_or(true, |f| way.nodes.iter().all(|&n| n == f)) {
            return Err(FloodError::MalformedWay {
                way: way.id,
                reason: format!("{} node reference(s), need 2 distinct", way.nodes.len()),
            });
        }

        for pair in way.nodes.windows(2) {
            let (prev, next) = (pair[0], pair[1]);
            if prev == next {
                continue;
            }
            self.ensure(next);
            let prev_node = self.ensure(prev);
            if direction != Direction::Backward {
                prev_node.add(next);
            }
            if direction != Direction::Forward {
                self.ensure(next).add(prev);
            }
        }
        Ok(true)
    }

    /// Feeds every way through [`add_way`](Self::add_way); malformed ways are
    /// skipped and counted.
    pub fn add_ways<I: IntoIterator<Item = WayRecord>>(&mut self, ways: I) -> WayStats {
        for way in ways {
            self.add_way_counted(&way);
        }
        self.stats
    }

    pub(crate) fn add_way_counted(&mut self, way: &WayRecord) {
        match self.add_way(way) {
            Ok(true) => self.stats.included += 1,
            Ok(false) => self.stats.ignored += 1,
            Err(e) => {
                debug!("skipping {e}");
                self.stats.malformed += 1;
            }
        }
    }

    /// Sets the position of a node referenced by an included way. Records for
    /// other ids are ignored and return `Ok(false)`.
    pub fn attach_position(&mut self, record: &NodeRecord) -> Result<bool> {
        let Some(node) = self.nodes.get_mut(&record.id) else {
            return Ok(false);
        };
        node.pos = Some(Position::new(record.lat, record.lon).validate()?);
        Ok(true)
    }

    /// Attaches all positions, returning how many were used.
    pub fn attach_positions<I: IntoIterator<Item = NodeRecord>>(&mut self, records: I) -> Result<usize> {
        let mut attached = 0;
        for record in records {
            if self.attach_position(&record)? {
                attached += 1;
            }
        }
        Ok(attached)
    }

    /// Ids of nodes that still have no position, in insertion order.
    pub fn missing_positions(&self) -> Vec<NodeId> {
        self.order
            .iter()
            .copied()
            .filter(|id| self.nodes[id].pos.is_none())
            .collect()
    }

    /// Drops every node without a position together with all edges that touch
    /// it. Returns the removed ids.
    pub fn prune_unpositioned(&mut self) -> Vec<NodeId> {
        let removed = self.missing_positions();
        if removed.is_empty() {
            return removed;
        }
        for id in &removed {
            self.nodes.remove(id);
        }
        let nodes = &self.nodes;
        self.order.retain(|id| nodes.contains_key(id));
        let alive: Vec<NodeId> = self.order.clone();
        for id in alive {
            let keep: Vec<NodeId> = self.nodes[&id]
                .neighbors
                .iter()
                .copied()
                .filter(|n| self.nodes.contains_key(n))
                .collect();
            if let Some(node) = self.nodes.get_mut(&id) {
                node.neighbors = keep;
            }
        }
        removed
    }

    /// Resolves every edge weight and produces the finished graph.
    pub fn finish(self) -> Result<Graph> {
        let missing = self.missing_positions();
        if let Some(&node) = missing.first() {
            return Err(FloodError::MissingPosition {
                node,
                missing: missing.len(),
            });
        }

        let mut graph = Graph::with_capacity(self.order.len());
        let mut edges_added = 0;
        for &id in &self.order {
            let pending = &self.nodes[&id];
            let pos = pending.pos.ok_or(FloodError::MissingPosition { node: id, missing: 1 })?;
            let mut edges = Vec::with_capacity(pending.neighbors.len());
            for &target in &pending.neighbors {
                let target_pos = self.nodes[&target]
                    .pos
                    .ok_or(FloodError::MissingPosition { node: target, missing: 1 })?;
                let weight = geo::distance(pos, target_pos)?;
                edges.push(Edge { target, weight });
            }
            edges_added += edges.len();
            graph.insert(Node::new(id, pos, edges));
        }

        info!("Graph: {} nodes, {} directed edges", graph.len(), edges_added);
        Ok(graph)
    }
}

/// Runs all phases over in-memory way and node records.
pub fn build_graph<S, W, N>(selector: S, ways: W, nodes: N) -> Result<Graph>
where
    S: WaySelector,
    W: IntoIterator<Item = WayRecord>,
    N: IntoIterator<Item = NodeRecord>,
{
    let mut builder = GraphBuilder::new(selector);
    builder.add_ways(ways);
    builder.attach_positions(nodes)?;
    builder.finish()
}
