//! Multi-source distance fill.
//!
//! The default strategy is a FIFO label-correcting relaxation: every node whose
//! distance improves goes back on the worklist unless it is already pending, so
//! a node can be processed several times. An indexed decrease-key heap gives
//! the same settled distances with fewer revisits.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use fnv::FnvHashMap;
use log::info;
use orx_priority_queue::*;

use crate::error::{FloodError, Result};
use crate::graph::{Cost, Graph, Node, NodeId};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum FillAlgorithm {
    #[default]
    Spfa,
    Dijkstra,
}

impl FromStr for FillAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "spfa" => Ok(FillAlgorithm::Spfa),
            "dijkstra" => Ok(FillAlgorithm::Dijkstra),
            _ => Err(format!(
                "Algorithm not found for input string: {s}, possible options are: (\"spfa\", \"dijkstra\")"
            )),
        }
    }
}

impl fmt::Display for FillAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FillAlgorithm::Spfa => "spfa",
            FillAlgorithm::Dijkstra => "dijkstra",
        })
    }
}

/// Work counters of one fill.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FillStats {
    pub seeds: usize,
    pub dequeued: usize,
    pub relaxed: usize,
    pub reachable: usize,
}

/// A distance computation over a graph from a set of source nodes.
#[derive(Clone, Debug, Default)]
pub struct DistanceField {
    sources: Vec<NodeId>,
    algorithm: FillAlgorithm,
}

impl DistanceField {
    pub fn new<I: IntoIterator<Item = NodeId>>(sources: I) -> Self {
        Self {
            sources: sources.into_iter().collect(),
            algorithm: FillAlgorithm::default(),
        }
    }

    pub fn with_algorithm(mut self, algorithm: FillAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn sources(&self) -> &[NodeId] {
        &self.sources
    }

    /// Sets every source to distance 0 and relaxes until no distance improves.
    ///
    /// Nodes already carrying a finite distance (a previous fill, or a
    /// reloaded graph) are seeded as well, so fills can be resumed and merged.
    /// Use [`compute_fresh`](Self::compute_fresh) to start from scratch.
    pub fn compute(&self, graph: &mut Graph) -> Result<FillStats> {
        let mut source_slots = Vec::with_capacity(self.sources.len());
        for &id in &self.sources {
            let slot = graph.slot(id).ok_or(FloodError::UnknownSource(id))?;
            source_slots.push(slot);
        }

        let (nodes, index) = graph.parts_mut();
        for slot in source_slots {
            nodes[slot].dist = 0.0;
            nodes[slot].pred = None;
        }
        let seeds: Vec<usize> = nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_reachable())
            .map(|(slot, _)| slot)
            .collect();
        if seeds.is_empty() {
            return Err(FloodError::NoReachableSource);
        }

        let mut stats = FillStats {
            seeds: seeds.len(),
            ..FillStats::default()
        };
        match self.algorithm {
            FillAlgorithm::Spfa => relax_fifo(nodes, index, seeds, &mut stats),
            FillAlgorithm::Dijkstra => relax_heap(nodes, index, seeds, &mut stats),
        }
        stats.reachable = nodes.iter().filter(|n| n.is_reachable()).count();

        info!(
            "{} fill: {} seeds, {} dequeued, {} relaxations, {} of {} nodes reachable",
            self.algorithm,
            stats.seeds,
            stats.dequeued,
            stats.relaxed,
            stats.reachable,
            nodes.len()
        );
        Ok(stats)
    }

    /// Resets all distances, then computes.
    pub fn compute_fresh(&self, graph: &mut Graph) -> Result<FillStats> {
        for &id in &self.sources {
            if !graph.contains(id) {
                return Err(FloodError::UnknownSource(id));
            }
        }
        graph.reset_distances();
        self.compute(graph)
    }
}

/// Tries to improve the neighbor in `slot` through `from`. Returns true if
/// the neighbor's distance decreased.
#[inline]
fn relax(nodes: &mut [Node], slot: usize, from: NodeId, candidate: Cost) -> bool {
    let neighbor = &mut nodes[slot];
    if candidate < neighbor.dist {
        neighbor.dist = candidate;
        neighbor.pred = Some(from);
        true
    } else {
        false
    }
}

fn relax_fifo(
    nodes: &mut [Node],
    index: &FnvHashMap<NodeId, usize>,
    seeds: Vec<usize>,
    stats: &mut FillStats,
) {
    for &slot in &seeds {
        nodes[slot].pending = true;
    }
    let mut queue = VecDeque::from(seeds);

    while let Some(u) = queue.pop_front() {
        stats.dequeued += 1;
        nodes[u].pending = false;
        let (from, dist_u) = (nodes[u].id, nodes[u].dist);
        for i in 0..nodes[u].edges.len() {
            let edge = nodes[u].edges[i];
            let Some(&v) = index.get(&edge.target) else {
                continue;
            };
            if relax(nodes, v, from, dist_u + edge.weight) {
                stats.relaxed += 1;
                if !nodes[v].pending {
                    nodes[v].pending = true;
                    queue.push_back(v);
                }
            }
        }
    }
}

fn relax_heap(
    nodes: &mut [Node],
    index: &FnvHashMap<NodeId, usize>,
    seeds: Vec<usize>,
    stats: &mut FillStats,
) {
    let mut heap: BinaryHeapWithMap<usize, Cost> = BinaryHeapWithMap::new();
    for slot in seeds {
        heap.decrease_key_or_push(&slot, nodes[slot].dist);
    }

    while let Some((u, cost)) = heap.pop() {
        if cost > nodes[u].dist {
            continue;
        }
        stats.dequeued += 1;
        let from = nodes[u].id;
        for i in 0..nodes[u].edges.len() {
            let edge = nodes[u].edges[i];
            let Some(&v) = index.get(&edge.target) else {
                continue;
            };
            let candidate = cost + edge.weight;
            if relax(nodes, v, from, candidate) {
                stats.relaxed += 1;
                heap.decrease_key_or_push(&v, candidate);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{build_graph, NodeRecord, WayRecord};
    use crate::geo::Position;
    use crate::graph::Edge;
    use crate::selector::Profile;

    const ALGORITHMS: [FillAlgorithm; 2] = [FillAlgorithm::Spfa, FillAlgorithm::Dijkstra];

    fn line(oneway: bool) -> Graph {
        let mut tags = vec![("highway", "residential")];
        if oneway {
            tags.push(("oneway", "yes"));
        }
        let way = WayRecord::new(1, vec![1, 2, 3], &tags);
        let nodes = vec![
            NodeRecord { id: 1, lat: 0.0, lon: 0.0 },
            NodeRecord { id: 2, lat: 0.0, lon: 1.0 },
            NodeRecord { id: 3, lat: 0.0, lon: 2.0 },
        ];
        build_graph(Profile::Car, vec![way], nodes).unwrap()
    }

    /// Hand-weighted directed graph. The direct edge 1 -> 4 is long, so the
    /// FIFO fill first labels 4 through it and has to correct it later.
    fn weighted() -> Graph {
        let edges: &[(NodeId, NodeId, Cost)] = &[
            (1, 2, 1.0),
            (2, 3, 1.0),
            (3, 4, 1.0),
            (1, 4, 10.0),
            (4, 5, 2.0),
            (5, 4, 2.0),
            (2, 6, 7.0),
            (5, 6, 1.0),
            (7, 8, 1.0),
            (8, 1, 1.0),
        ];
        let mut g = Graph::new();
        for id in 1..=8 {
            let out = edges
                .iter()
                .filter(|(from, _, _)| *from == id)
                .map(|&(_, target, weight)| Edge { target, weight })
                .collect();
            g.insert(Node::new(id, Position::new(0.0, id as f64 / 100.0), out));
        }
        g
    }

    fn distances(g: &Graph) -> Vec<(NodeId, Cost)> {
        g.nodes().map(|n| (n.id, n.dist)).collect()
    }

    fn assert_relaxed(g: &Graph) {
        for u in g.nodes() {
            for e in &u.edges {
                let v = g.get(e.target).unwrap();
                assert!(v.dist <= u.dist + e.weight, "edge {} -> {} not relaxed", u.id, v.id);
            }
        }
    }

    #[test]
    fn three_node_line() {
        for alg in ALGORITHMS {
            let mut g = line(false);
            DistanceField::new([1]).with_algorithm(alg).compute(&mut g).unwrap();
            let ab = g.edge_weight(1, 2).unwrap();
            let bc = g.edge_weight(2, 3).unwrap();
            assert!((ab - bc).abs() < 1e-6);
            assert_eq!(g.dist(1), Some(0.0));
            assert!((g.dist(2).unwrap() - ab).abs() < 1e-9);
            assert!((g.dist(3).unwrap() - (ab + bc)).abs() < 1e-9);
            assert_eq!(g.path_to(3), vec![1, 2, 3]);
        }
    }

    #[test]
    fn one_way_line_has_no_reverse_path() {
        for alg in ALGORITHMS {
            let mut g = line(true);
            DistanceField::new([3]).with_algorithm(alg).compute(&mut g).unwrap();
            assert_eq!(g.dist(3), Some(0.0));
            assert_eq!(g.dist(2), Some(f64::INFINITY));
            assert_eq!(g.dist(1), Some(f64::INFINITY));
        }
    }

    #[test]
    fn settles_shortest_distances() {
        for alg in ALGORITHMS {
            let mut g = weighted();
            let stats = DistanceField::new([1]).with_algorithm(alg).compute(&mut g).unwrap();
            assert_eq!(
                distances(&g),
                vec![
                    (1, 0.0),
                    (2, 1.0),
                    (3, 2.0),
                    (4, 3.0),
                    (5, 5.0),
                    (6, 6.0),
                    (7, f64::INFINITY),
                    (8, f64::INFINITY),
                ]
            );
            assert_eq!(stats.reachable, 6);
            assert_eq!(g.path_to(6), vec![1, 2, 3, 4, 5, 6]);
            assert_relaxed(&g);
        }
    }

    #[test]
    fn fifo_fill_revisits_improved_nodes() {
        let mut g = weighted();
        let stats = DistanceField::new([1]).compute(&mut g).unwrap();
        assert!(stats.dequeued > stats.reachable);
        assert!(g.nodes().all(|n| !n.pending));
    }

    #[test]
    fn multi_source_is_min_of_single_sources() {
        let single = |s: NodeId| {
            let mut g = weighted();
            DistanceField::new([s]).compute(&mut g).unwrap();
            distances(&g)
        };
        let (from_1, from_7) = (single(1), single(7));
        for alg in ALGORITHMS {
            let mut g = weighted();
            DistanceField::new([1, 7]).with_algorithm(alg).compute(&mut g).unwrap();
            for ((id, d), ((_, d1), (_, d7))) in distances(&g).into_iter().zip(from_1.iter().zip(&from_7)) {
                assert_eq!(d, d1.min(*d7), "node {id}");
            }
            assert_relaxed(&g);
        }
    }

    #[test]
    fn recompute_is_idempotent() {
        let mut g = weighted();
        let field = DistanceField::new([1]);
        field.compute(&mut g).unwrap();
        let first = distances(&g);
        let stats = field.compute(&mut g).unwrap();
        assert_eq!(distances(&g), first);
        assert_eq!(stats.relaxed, 0);
    }

    #[test]
    fn resume_merges_previous_fill() {
        let mut g = weighted();
        DistanceField::new([7]).compute(&mut g).unwrap();
        DistanceField::new([4]).compute(&mut g).unwrap();

        let mut both = weighted();
        DistanceField::new([7, 4]).compute(&mut both).unwrap();
        assert_eq!(distances(&g), distances(&both));
    }

    #[test]
    fn fresh_compute_forgets_previous_sources() {
        let mut g = weighted();
        DistanceField::new([1]).compute(&mut g).unwrap();
        DistanceField::new([5]).compute_fresh(&mut g).unwrap();
        assert_eq!(g.dist(1), Some(f64::INFINITY));
        assert_eq!(g.dist(5), Some(0.0));
        assert_eq!(g.dist(4), Some(2.0));
    }

    #[test]
    fn unknown_source_fails_before_mutating() {
        let mut g = weighted();
        let err = DistanceField::new([1, 42]).compute(&mut g).unwrap_err();
        assert!(matches!(err, FloodError::UnknownSource(42)));
        assert!(g.nodes().all(|n| n.dist.is_infinite()));
        assert!(DistanceField::new([42]).compute_fresh(&mut g).is_err());
    }

    #[test]
    fn no_sources_and_no_labels_fails() {
        let mut g = weighted();
        assert!(matches!(
            DistanceField::new(Vec::<NodeId>::new()).compute(&mut g),
            Err(FloodError::NoReachableSource)
        ));
    }

    #[test]
    fn algorithm_names_round_trip() {
        for alg in ALGORITHMS {
            assert_eq!(alg.to_string().parse::<FillAlgorithm>(), Ok(alg));
        }
        assert!("astar".parse::<FillAlgorithm>().is_err());
    }
}
