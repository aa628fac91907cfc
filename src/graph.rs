use fnv::FnvHashMap;

use crate::geo::Position;

pub type NodeId = i64;
pub type Cost = f64;

/// Directed adjacency to `target`, weight in meters.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Edge {
    pub target: NodeId,
    pub weight: Cost,
}

#[derive(Clone, Debug)]
pub struct Node {
    pub id: NodeId,
    pub pos: Position,
    /// Best known distance from the nearest source, `f64::INFINITY` when unreached.
    pub dist: Cost,
    /// Previous node on the best known path; `None` for sources and unreached nodes.
    pub pred: Option<NodeId>,
    pub(crate) pending: bool,
    pub edges: Vec<Edge>,
}

impl Node {
    pub fn new(id: NodeId, pos: Position, edges: Vec<Edge>) -> Self {
        Self {
            id,
            pos,
            dist: Cost::INFINITY,
            pred: None,
            pending: false,
            edges,
        }
    }

    pub fn is_reachable(&self) -> bool {
        self.dist.is_finite()
    }
}

/// Node arena in insertion order, indexed by node id. Edges live inside their
/// source node and refer to targets by id.
#[derive(Clone, Debug, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    index: FnvHashMap<NodeId, usize>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_capacity(n: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(n),
            index: FnvHashMap::with_capacity_and_hasher(n, Default::default()),
        }
    }

    /// Inserts `node`, replacing any node with the same id in place.
    pub(crate) fn insert(&mut self, node: Node) {
        match self.index.get(&node.id) {
            Some(&idx) => self.nodes[idx] = node,
            None => {
                self.index.insert(node.id, self.nodes.len());
                self.nodes.push(node);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(|n| n.edges.len()).sum()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.index.get(&id).map(|&idx| &self.nodes[idx])
    }

    /// Distance of `id`, `None` if the node does not exist.
    pub fn dist(&self, id: NodeId) -> Option<Cost> {
        self.get(id).map(|n| n.dist)
    }

    /// Weight of the edge `from -> to`, if present.
    pub fn edge_weight(&self, from: NodeId, to: NodeId) -> Option<Cost> {
        self.get(from)?
            .edges
            .iter()
            .find(|e| e.target == to)
            .map(|e| e.weight)
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub(crate) fn slot(&self, id: NodeId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    /// Mutable node slots alongside the id index, for in-place relaxation.
    pub(crate) fn parts_mut(&mut self) -> (&mut [Node], &FnvHashMap<NodeId, usize>) {
        (&mut self.nodes, &self.index)
    }

    /// Clears per-node distance, predecessor and pending state.
    pub fn reset_distances(&mut self) {
        for node in &mut self.nodes {
            node.dist = Cost::INFINITY;
            node.pred = None;
            node.pending = false;
        }
    }

    /// Largest finite distance in the graph, if any node is reachable.
    pub fn max_finite_dist(&self) -> Option<Cost> {
        self.nodes
            .iter()
            .map(|n| n.dist)
            .filter(|d| d.is_finite())
            .reduce(Cost::max)
    }

    /// Node whose position minimises |dlat| + |dlon| to `target`. Ties go to
    /// the node inserted first.
    pub fn nearest_node(&self, target: Position) -> Option<NodeId> {
        let mut best: Option<(NodeId, f64)> = None;
        for node in &self.nodes {
            let diff = node.pos.manhattan_degrees(&target);
            if best.map_or(true, |(_, d)| diff < d) {
                best = Some((node.id, diff));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Walks predecessors from `id` back to its source. The returned path
    /// starts at the source. Empty if `id` is unknown or unreachable.
    pub fn path_to(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = Vec::new();
        let mut cur = match self.get(id) {
            Some(node) if node.is_reachable() => Some(node),
            _ => return path,
        };
        while let Some(node) = cur {
            path.push(node.id);
            // Guard against a cycle in a corrupted predecessor chain.
            if path.len() > self.nodes.len() {
                break;
            }
            cur = node.pred.and_then(|p| self.get(p));
        }
        path.reverse();
        path
    }
}
