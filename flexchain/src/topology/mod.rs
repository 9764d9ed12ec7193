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

//! # Topology
//!
//! This module represents the physical network on which the chains are placed. Every node carries
//! a compute capacity (zero for pure switches), and every link carries a bandwidth and a latency.
//!
//! Links are full-duplex: [`Topology::add_link`] creates one directed edge in each direction, and
//! both directions get the full bandwidth. Traffic is therefore accounted per directed edge.
//!
//! The topology is also used to represent *residual* capacity. All algorithms that commit
//! configurations work on a private clone, which is mutated with the `consume_*` and `release_*`
//! functions. The topology of the caller is never touched.
//!
//! ```rust
//! use flexchain::topology::Topology;
//!
//! fn main() -> Result<(), flexchain::Error> {
//!     let mut t = Topology::new("line");
//!     let a = t.add_switch("A");
//!     let b = t.add_node("B", 100.0);
//!     let c = t.add_switch("C");
//!     t.add_link(a, b, 50.0, 1.0)?;
//!     t.add_link(b, c, 50.0, 1.0)?;
//!
//!     assert_eq!(t.servers(), vec![b]);
//!     assert_eq!(t.route_latency(&[a, b, c]), Some(2.0));
//!     Ok(())
//! }
//! ```

mod routing;
pub use routing::{latencies_to, shortest_path_tree, PathCache, ShortestPathTree};

use crate::Error;

use petgraph::prelude::*;
use petgraph::visit::EdgeRef;

type IndexType = u32;
/// Node Identification (and index into the graph)
pub type NodeId = NodeIndex<IndexType>;
/// A directed link, identified by its source and its target.
pub type Link = (NodeId, NodeId);
/// Graph storing the topology
pub type TopologyGraph = Graph<NodeData, LinkData, Directed, IndexType>;

/// Absolute tolerance used whenever a resource usage is compared against its capacity.
pub const TOLERANCE: f64 = 1e-9;

/// Properties of a single node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeData {
    /// Name of the node
    pub name: String,
    /// (Remaining) compute capacity. Pure switches have a capacity of zero.
    pub capacity: f64,
}

/// Properties of a single directed link
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkData {
    /// (Remaining) bandwidth of the link
    pub bandwidth: f64,
    /// Transit latency of the link
    pub latency: f64,
}

/// # Topology
/// Capacity-constrained network graph. See the [module documentation](self).
#[derive(Debug, Clone, Default)]
pub struct Topology {
    name: String,
    graph: TopologyGraph,
}

impl Topology {
    /// Generate an empty topology
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into(), graph: TopologyGraph::new() }
    }

    /// Name of the topology
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a new node with the given compute capacity. Negative capacities are treated as zero.
    pub fn add_node<S: Into<String>>(&mut self, name: S, capacity: f64) -> NodeId {
        self.graph.add_node(NodeData { name: name.into(), capacity: capacity.max(0.0) })
    }

    /// Add a pure switch, i.e., a node without any compute capacity.
    pub fn add_switch<S: Into<String>>(&mut self, name: S) -> NodeId {
        self.add_node(name, 0.0)
    }

    /// Add a full-duplex link between `a` and `b`. If the link already exists, nothing happens.
    pub fn add_link(
        &mut self,
        a: NodeId,
        b: NodeId,
        bandwidth: f64,
        latency: f64,
    ) -> Result<(), Error> {
        self.get_node(a)?;
        self.get_node(b)?;
        if a == b {
            return Err(Error::TopologyError(format!("self-loop on node {:?}", a)));
        }
        if bandwidth < 0.0 || latency < 0.0 || !bandwidth.is_finite() || !latency.is_finite() {
            return Err(Error::TopologyError(format!(
                "link {:?} <-> {:?} has bandwidth {} and latency {}",
                a, b, bandwidth, latency
            )));
        }
        if self.graph.contains_edge(a, b) {
            // ignoring the duplicate link
            return Ok(());
        }
        let data = LinkData { bandwidth, latency };
        self.graph.add_edge(a, b, data);
        self.graph.add_edge(b, a, data);
        Ok(())
    }

    /// Returns a reference to the underlying graph
    pub fn graph(&self) -> &TopologyGraph {
        &self.graph
    }

    /// Number of nodes
    pub fn num_nodes(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of directed links (twice the number of physical links)
    pub fn num_links(&self) -> usize {
        self.graph.edge_count()
    }

    /// Iterate over all nodes in the order in which they were added.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.graph.node_indices()
    }

    /// Returns all nodes with positive compute capacity, in the order in which they were added.
    pub fn servers(&self) -> Vec<NodeId> {
        self.nodes().filter(|n| self.is_server(*n)).collect()
    }

    /// Iterate over all directed links.
    pub fn links(&self) -> impl Iterator<Item = (Link, LinkData)> + '_ {
        self.graph.edge_references().map(|e| ((e.source(), e.target()), *e.weight()))
    }

    /// Iterate over all outgoing links of a node, returning the neighbor and the link properties.
    pub fn neighbors(&self, node: NodeId) -> impl Iterator<Item = (NodeId, LinkData)> + '_ {
        self.graph.edges(node).map(|e| (e.target(), *e.weight()))
    }

    /// Get the node properties
    pub fn get_node(&self, node: NodeId) -> Result<&NodeData, Error> {
        self.graph.node_weight(node).ok_or(Error::NodeNotFound(node))
    }

    /// Get the name of a node
    pub fn get_node_name(&self, node: NodeId) -> Result<&str, Error> {
        self.get_node(node).map(|n| n.name.as_str())
    }

    /// Lookup a node by its name
    pub fn get_node_id<S: AsRef<str>>(&self, name: S) -> Result<NodeId, Error> {
        self.graph
            .node_indices()
            .find(|n| self.graph[*n].name == name.as_ref())
            .ok_or_else(|| Error::NodeNameNotFound(name.as_ref().to_string()))
    }

    /// Remaining compute capacity of a node. Unknown nodes have no capacity.
    pub fn capacity(&self, node: NodeId) -> f64 {
        self.graph.node_weight(node).map(|n| n.capacity).unwrap_or(0.0)
    }

    /// Returns `true` if the node can host stages.
    pub fn is_server(&self, node: NodeId) -> bool {
        self.capacity(node) > 0.0
    }

    /// Properties of the directed link `a -> b`, if it exists.
    pub fn link(&self, a: NodeId, b: NodeId) -> Option<LinkData> {
        self.graph.find_edge(a, b).map(|e| self.graph[e])
    }

    /// Sum of the link latencies along the route. Returns `None` if two consecutive nodes are not
    /// adjacent.
    pub fn route_latency(&self, route: &[NodeId]) -> Option<f64> {
        route.windows(2).map(|w| self.link(w[0], w[1]).map(|l| l.latency)).sum()
    }

    /// Reduce the compute capacity of a node.
    pub fn consume_capacity(&mut self, node: NodeId, amount: f64) {
        if let Some(n) = self.graph.node_weight_mut(node) {
            n.capacity -= amount;
        }
    }

    /// Give compute capacity back to a node.
    pub fn release_capacity(&mut self, node: NodeId, amount: f64) {
        self.consume_capacity(node, -amount)
    }

    /// Reduce the bandwidth of a directed link.
    pub fn consume_bandwidth(&mut self, link: Link, amount: f64) {
        if let Some(e) = self.graph.find_edge(link.0, link.1) {
            self.graph[e].bandwidth -= amount;
        }
    }

    /// Give bandwidth back to a directed link.
    pub fn release_bandwidth(&mut self, link: Link, amount: f64) {
        self.consume_bandwidth(link, -amount)
    }
}
