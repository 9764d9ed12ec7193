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

//! # Configuration
//!
//! A configuration is one candidate placement of a chain: a route from the source to the
//! destination, and for each stage the position in the route which hosts it. All resource usages
//! and the effective latency are computed once, when the configuration is created.

use crate::chain::{Chain, ChainId};
use crate::parallelism::LatencyModel;
use crate::topology::{Link, NodeId, Topology};
use crate::Error;

use itertools::Itertools;
use std::collections::BTreeMap;
use std::fmt;

/// Candidate (route, placement) pair of a chain
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    /// The chain for which this configuration was created
    pub chain: ChainId,
    /// Route from the source to the destination (both included)
    pub route: Vec<NodeId>,
    /// Route position of every stage, non-decreasing.
    pub placement: Vec<usize>,
    /// Transit latency of the route
    pub route_latency: f64,
    /// Effective latency, i.e., transit latency plus processing latency.
    pub latency: f64,
    /// Throughput of the chain
    pub throughput: f64,
    /// Aggregated compute usage per node
    pub node_usage: BTreeMap<NodeId, f64>,
    /// Number of traversals per directed link
    pub link_usage: BTreeMap<Link, u32>,
    /// Fractional value assigned by the relaxation (zero before it was solved)
    pub value: f64,
}

impl Configuration {
    /// Create a new configuration. This function only checks that the configuration is well
    /// formed: the route connects the endpoints of the chain using existing links and never
    /// visits a server twice (switches may repeat), and the placement is non-decreasing and fits
    /// the route. Use the [validation](crate::validation)
    /// module to check the resource constraints.
    pub fn new(
        topo: &Topology,
        chain: &Chain,
        route: Vec<NodeId>,
        placement: Vec<usize>,
        model: LatencyModel,
    ) -> Result<Self, Error> {
        let id = chain.id().0;
        if route.first() != Some(&chain.source()) || route.last() != Some(&chain.destination()) {
            return Err(Error::InvalidChain(id, "route does not connect source and destination"));
        }
        if placement.len() != chain.len() {
            return Err(Error::InvalidChain(id, "placement does not cover all stages"));
        }
        if placement.iter().any(|p| *p >= route.len()) || placement.windows(2).any(|w| w[0] > w[1])
        {
            return Err(Error::InvalidChain(id, "placement does not follow the route"));
        }
        let servers: Vec<&NodeId> = route.iter().filter(|n| topo.is_server(**n)).collect();
        if servers.iter().unique().count() != servers.len() {
            return Err(Error::InvalidChain(id, "route visits a server twice"));
        }
        let route_latency = topo
            .route_latency(&route)
            .ok_or_else(|| Error::TopologyError(format!("route {:?} uses missing links", route)))?;

        let mut node_usage: BTreeMap<NodeId, f64> = BTreeMap::new();
        for (stage, pos) in chain.stages().iter().zip(placement.iter()) {
            *node_usage.entry(route[*pos]).or_insert(0.0) += stage.demand;
        }
        let mut link_usage: BTreeMap<Link, u32> = BTreeMap::new();
        for w in route.windows(2) {
            *link_usage.entry((w[0], w[1])).or_insert(0) += 1;
        }

        let latency = route_latency + chain.processing_latency(&placement, model);

        Ok(Self {
            chain: chain.id(),
            route,
            placement,
            route_latency,
            latency,
            throughput: chain.throughput(),
            node_usage,
            link_usage,
            value: 0.0,
        })
    }

    /// Bandwidth consumed on the directed link.
    pub fn link_demand(&self, link: &Link) -> f64 {
        self.link_usage.get(link).map(|u| *u as f64 * self.throughput).unwrap_or(0.0)
    }

    /// Iterate over all directed links with the bandwidth consumed on them.
    pub fn link_demands(&self) -> impl Iterator<Item = (Link, f64)> + '_ {
        self.link_usage.iter().map(move |(l, u)| (*l, *u as f64 * self.throughput))
    }

    /// Nodes hosting at least one stage, in route order.
    pub fn hosts(&self) -> Vec<NodeId> {
        let mut hosts: Vec<NodeId> = self.placement.iter().map(|p| self.route[*p]).collect();
        hosts.dedup();
        hosts
    }

    /// Largest ratio of used to available resource, over all nodes and links used by this
    /// configuration. A usage on a resource with zero availability results in infinity.
    pub fn resource_ratio(&self, topo: &Topology) -> f64 {
        let nodes = self.node_usage.iter().map(|(n, u)| ratio(*u, topo.capacity(*n)));
        let links = self.link_demands().map(|((a, b), d)| {
            ratio(d, topo.link(a, b).map(|l| l.bandwidth).unwrap_or(0.0))
        });
        nodes.chain(links).fold(0.0, f64::max)
    }

    /// Returns `true` if both configurations use the same route and placement.
    pub fn same_placement(&self, other: &Configuration) -> bool {
        self.route == other.route && self.placement == other.placement
    }
}

fn ratio(used: f64, available: f64) -> f64 {
    if used <= 0.0 {
        0.0
    } else if available <= 0.0 {
        f64::INFINITY
    } else {
        used / available
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: route {:?}, placement {:?}, latency {:.3}",
            self.chain,
            self.route.iter().map(|n| n.index()).collect::<Vec<_>>(),
            self.placement,
            self.latency
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Stage;
    use assert_approx_eq::assert_approx_eq;

    fn line() -> (Topology, Vec<NodeId>) {
        let mut t = Topology::new("line");
        let a = t.add_switch("a");
        let b = t.add_node("b", 100.0);
        let c = t.add_node("c", 50.0);
        t.add_link(a, b, 50.0, 1.0).unwrap();
        t.add_link(b, c, 20.0, 2.0).unwrap();
        (t, vec![a, b, c])
    }

    fn chain(n: &[NodeId]) -> Chain {
        let stages = vec![Stage::new(3.0, 40.0), Stage::new(2.0, 10.0)];
        Chain::new(7, stages, n[0], n[2], 10.0, 100.0).unwrap()
    }

    #[test]
    fn usages_and_latency() {
        let (t, n) = line();
        let c = chain(&n);
        let conf =
            Configuration::new(&t, &c, n.clone(), vec![1, 2], LatencyModel::Colocated).unwrap();
        assert_eq!(conf.chain, ChainId(7));
        assert_approx_eq!(conf.route_latency, 3.0);
        // both stages are independent, but on different nodes
        assert_approx_eq!(conf.latency, 8.0);
        assert_eq!(conf.node_usage.get(&n[1]), Some(&40.0));
        assert_eq!(conf.node_usage.get(&n[2]), Some(&10.0));
        assert_eq!(conf.link_usage.get(&(n[0], n[1])), Some(&1));
        assert_approx_eq!(conf.link_demand(&(n[1], n[2])), 10.0);
        assert_approx_eq!(conf.link_demand(&(n[2], n[1])), 0.0);
        assert_eq!(conf.hosts(), vec![n[1], n[2]]);

        let conf =
            Configuration::new(&t, &c, n.clone(), vec![1, 1], LatencyModel::Colocated).unwrap();
        assert_approx_eq!(conf.latency, 6.0);
        assert_eq!(conf.node_usage.get(&n[1]), Some(&50.0));
        assert_eq!(conf.hosts(), vec![n[1]]);
    }

    #[test]
    fn resource_ratio() {
        let (t, n) = line();
        let c = chain(&n);
        let conf =
            Configuration::new(&t, &c, n.clone(), vec![1, 1], LatencyModel::Colocated).unwrap();
        // node b: 50 / 100, link a -> b: 10 / 50, link b -> c: 10 / 20
        assert_approx_eq!(conf.resource_ratio(&t), 0.5);
        let conf = Configuration::new(&t, &c, n.clone(), vec![0, 1], LatencyModel::Colocated)
            .unwrap();
        assert_eq!(conf.resource_ratio(&t), f64::INFINITY);
    }

    #[test]
    fn malformed_configurations() {
        let (t, n) = line();
        let c = chain(&n);
        let m = LatencyModel::Colocated;
        assert!(Configuration::new(&t, &c, vec![n[0], n[1]], vec![1, 1], m).is_err());
        assert!(Configuration::new(&t, &c, n.clone(), vec![1], m).is_err());
        assert!(Configuration::new(&t, &c, n.clone(), vec![2, 1], m).is_err());
        assert!(Configuration::new(&t, &c, n.clone(), vec![1, 3], m).is_err());
        assert!(Configuration::new(&t, &c, vec![n[0], n[2]], vec![0, 1], m).is_err());
    }

    #[test]
    fn servers_are_visited_once() {
        let (t, n) = line();
        let c = chain(&n);
        let m = LatencyModel::Colocated;
        // b is a server, and the route passes it twice
        let route = vec![n[0], n[1], n[2], n[1], n[2]];
        assert!(Configuration::new(&t, &c, route, vec![1, 2], m).is_err());

        // a is a switch, and may be visited again
        let mut t = t;
        let d = t.add_node("d", 10.0);
        t.add_link(n[0], d, 50.0, 1.0).unwrap();
        let c = Chain::new(8, vec![Stage::new(1.0, 5.0)], n[0], n[2], 10.0, 100.0).unwrap();
        let route = vec![n[0], d, n[0], n[1], n[2]];
        let conf = Configuration::new(&t, &c, route, vec![1], m).unwrap();
        assert_eq!(conf.link_usage.get(&(n[0], d)), Some(&1));
        assert_eq!(conf.link_usage.get(&(d, n[0])), Some(&1));
    }
}
