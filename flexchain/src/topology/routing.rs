// FlexChain: Parallelism-Aware Placement of Service Function Chains
// Copyright (C) 2021  Tibor Schneider
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Shortest routes with latency as path weight, and the cache that stores them for one planning
//! run.

use super::{NodeId, Topology, TOLERANCE};

use petgraph::algo::{bellman_ford, dijkstra};
use petgraph::visit::{EdgeFiltered, EdgeRef, Reversed};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Minimal latency from every node to `target`, ignoring all bandwidth constraints. Nodes which
/// cannot reach `target` are not contained in the map.
pub fn latencies_to(topo: &Topology, target: NodeId) -> HashMap<NodeId, f64> {
    dijkstra(Reversed(topo.graph()), target, None, |e| e.weight().latency)
}

/// Result of a single-source shortest path computation.
#[derive(Debug, Clone)]
pub struct ShortestPathTree {
    root: NodeId,
    dist: HashMap<NodeId, f64>,
    pred: HashMap<NodeId, NodeId>,
}

impl ShortestPathTree {
    /// Root of the tree
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Latency of the shortest route from the root to `node`, or `None` if it is unreachable.
    pub fn distance(&self, node: NodeId) -> Option<f64> {
        self.dist.get(&node).copied()
    }

    /// Shortest route from the root to `node` (both included).
    pub fn path_to(&self, node: NodeId) -> Option<Vec<NodeId>> {
        if !self.dist.contains_key(&node) {
            return None;
        }
        let mut path = vec![node];
        let mut current = node;
        while current != self.root {
            current = *self.pred.get(&current)?;
            path.push(current);
        }
        path.reverse();
        Some(path)
    }

    /// All reachable nodes together with their distance, in ascending order of the distance. Ties
    /// are broken by the node index.
    pub fn reachable(&self) -> Vec<(NodeId, f64)> {
        let mut nodes: Vec<(NodeId, f64)> = self.dist.iter().map(|(n, d)| (*n, *d)).collect();
        nodes.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0)));
        nodes
    }
}

/// Compute the shortest routes (in terms of latency) from `root` to all other nodes. Only links
/// with at least `min_bandwidth` remaining bandwidth are used. A node for which `is_transit`
/// returns `false` can be reached, but no route continues through it.
pub fn shortest_path_tree<F>(
    topo: &Topology,
    root: NodeId,
    min_bandwidth: f64,
    is_transit: F,
) -> ShortestPathTree
where
    F: Fn(NodeId) -> bool,
{
    let graph = topo.graph();
    // same node and edge indices as the topology, weighted by the latency only
    let latencies = graph.map(|_, _| (), |_, link| link.latency);
    let usable = EdgeFiltered::from_fn(&latencies, |e| {
        graph[e.id()].bandwidth + TOLERANCE >= min_bandwidth
            && (e.source() == root || is_transit(e.source()))
    });

    let mut dist: HashMap<NodeId, f64> = HashMap::new();
    let mut pred: HashMap<NodeId, NodeId> = HashMap::new();
    match bellman_ford(&usable, root) {
        Ok((distances, predecessors)) => {
            for node in graph.node_indices() {
                if distances[node.index()].is_finite() {
                    dist.insert(node, distances[node.index()]);
                }
                if let Some(p) = predecessors[node.index()] {
                    pred.insert(node, p);
                }
            }
        }
        // latencies are never negative
        Err(_) => {
            dist.insert(root, 0.0);
        }
    }

    ShortestPathTree { root, dist, pred }
}

/// # Path Cache
///
/// Memoizes the shortest sub-routes between capacity-bearing nodes and the latency lower bounds
/// towards a destination. The cache is only valid for one snapshot of the topology. Create a new
/// cache (or call [`PathCache::clear`]) whenever the capacities change.
#[derive(Debug, Clone, Default)]
pub struct PathCache {
    segments: HashMap<(NodeId, NodeId, u64), Option<(Vec<NodeId>, f64)>>,
    distances: HashMap<NodeId, HashMap<NodeId, f64>>,
}

impl PathCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove all cached entries
    pub fn clear(&mut self) {
        self.segments.clear();
        self.distances.clear();
    }

    /// Number of cached sub-routes
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Returns `true` if nothing is cached
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty() && self.distances.is_empty()
    }

    /// Shortest sub-route from `source` to `target` on which every link has at least `throughput`
    /// bandwidth left, and on which no capacity-bearing node is used as an intermediate hop. If
    /// `source == target`, the route consists of the single node.
    pub fn segment(
        &mut self,
        topo: &Topology,
        source: NodeId,
        target: NodeId,
        throughput: f64,
    ) -> Option<(Vec<NodeId>, f64)> {
        if source == target {
            return Some((vec![source], 0.0));
        }
        self.segments
            .entry((source, target, throughput.to_bits()))
            .or_insert_with(|| {
                let tree = shortest_path_tree(topo, source, throughput, |n| !topo.is_server(n));
                tree.path_to(target).and_then(|p| tree.distance(target).map(|d| (p, d)))
            })
            .clone()
    }

    /// Latency lower bound from every node to `target`, see [`latencies_to`].
    pub fn distances_to(&mut self, topo: &Topology, target: NodeId) -> &HashMap<NodeId, f64> {
        self.distances.entry(target).or_insert_with(|| latencies_to(topo, target))
    }
}
