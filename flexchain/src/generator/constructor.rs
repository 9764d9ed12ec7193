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

//! # Greedy Constructor
//!
//! Builds a single configuration by walking from the source to the closest server, packing as
//! many stages as fit onto it, and continuing from there. If the remaining stages cannot be
//! placed, the constructor backtracks and tries the next closest server. The number of candidate
//! servers tried on each level starts at [`GREEDY_FANOUT`] and is halved on every level.
//!
//! The resources used by the partial configuration are subtracted from a private copy of the
//! topology. Every level records what it subtracted in a resource delta, and reverts exactly
//! that delta before trying the next candidate.

use crate::chain::Chain;
use crate::configuration::Configuration;
use crate::parallelism::LatencyModel;
use crate::topology::{shortest_path_tree, Link, NodeId, ShortestPathTree, Topology, TOLERANCE};
use crate::validation;

use log::*;
use std::cmp::Ordering;

/// Number of candidate servers tried on the first level of the greedy constructor.
pub const GREEDY_FANOUT: usize = 16;

/// Construct a single configuration for `chain` greedily. The topology is not modified.
pub fn construct(topo: &Topology, chain: &Chain, model: LatencyModel) -> Option<Configuration> {
    if chain.is_empty() {
        return direct(topo, chain, model);
    }
    let mut constructor = Constructor {
        topo,
        chain,
        model,
        work: topo.clone(),
        route: vec![chain.source()],
        placement: Vec::with_capacity(chain.len()),
        hosts: Vec::new(),
        latency: 0.0,
    };
    let result = constructor.descend(chain.source(), 0, GREEDY_FANOUT);
    match result.as_ref() {
        Some(c) => trace!("{}: greedy constructor found {}", chain.id(), c),
        None => trace!("{}: greedy constructor found no configuration", chain.id()),
    }
    result
}

/// Shortest route from the source to the destination, with no stage placed. Used for chains
/// without any stage.
pub(crate) fn direct(
    topo: &Topology,
    chain: &Chain,
    model: LatencyModel,
) -> Option<Configuration> {
    let tree = shortest_path_tree(topo, chain.source(), chain.throughput(), |_| true);
    let route = tree.path_to(chain.destination())?;
    let config = Configuration::new(topo, chain, route, Vec::new(), model).ok()?;
    validation::check(topo, chain, &config).ok().map(|_| config)
}

/// Resources temporarily taken from the working topology.
#[derive(Debug, Default)]
struct ResourceDelta {
    nodes: Vec<(NodeId, f64)>,
    links: Vec<(Link, f64)>,
}

impl ResourceDelta {
    fn apply(&self, topo: &mut Topology) {
        self.nodes.iter().for_each(|(n, x)| topo.consume_capacity(*n, *x));
        self.links.iter().for_each(|(l, x)| topo.consume_bandwidth(*l, *x));
    }

    fn revert(&self, topo: &mut Topology) {
        self.nodes.iter().for_each(|(n, x)| topo.release_capacity(*n, *x));
        self.links.iter().for_each(|(l, x)| topo.release_bandwidth(*l, *x));
    }
}

struct Constructor<'a> {
    topo: &'a Topology,
    chain: &'a Chain,
    model: LatencyModel,
    work: Topology,
    route: Vec<NodeId>,
    placement: Vec<usize>,
    hosts: Vec<NodeId>,
    latency: f64,
}

impl<'a> Constructor<'a> {
    fn descend(&mut self, current: NodeId, next: usize, fanout: usize) -> Option<Configuration> {
        let topo = self.topo;
        let chain = self.chain;
        let tree =
            shortest_path_tree(&self.work, current, chain.throughput(), |n| !topo.is_server(n));

        if next == chain.len() {
            return self.finish(&tree);
        }

        let demand = chain.stages()[next].demand;
        let slack =
            chain.latency_budget() - chain.min_processing_latency(self.model) - self.latency;
        let mut candidates: Vec<(NodeId, f64)> = tree
            .reachable()
            .into_iter()
            .filter(|(n, d)| {
                topo.is_server(*n)
                    && self.work.capacity(*n) + TOLERANCE >= demand
                    && !self.hosts.contains(n)
                    && (*n == current || !self.route.contains(n))
                    && *d <= slack + TOLERANCE
            })
            .collect();
        let work = &self.work;
        candidates.sort_by(|(a, da), (b, db)| {
            da.partial_cmp(db)
                .unwrap_or(Ordering::Equal)
                .then_with(|| {
                    work.capacity(*b).partial_cmp(&work.capacity(*a)).unwrap_or(Ordering::Equal)
                })
                .then(a.cmp(b))
        });

        for (node, dist) in candidates.into_iter().take(fanout) {
            let path = match tree.path_to(node) {
                Some(p) => p,
                None => continue,
            };

            // pack as many stages as possible
            let capacity = self.work.capacity(node);
            let mut load = 0.0;
            let mut end = next;
            while end < chain.len() && load + chain.stages()[end].demand <= capacity + TOLERANCE {
                load += chain.stages()[end].demand;
                end += 1;
            }

            let delta = ResourceDelta {
                nodes: vec![(node, load)],
                links: path.windows(2).map(|w| ((w[0], w[1]), chain.throughput())).collect(),
            };
            delta.apply(&mut self.work);
            let route_len = self.route.len();
            self.route.extend_from_slice(&path[1..]);
            let pos = self.route.len() - 1;
            self.placement.extend(std::iter::repeat(pos).take(end - next));
            self.hosts.push(node);
            self.latency += dist;

            let result = self.descend(node, end, (fanout / 2).max(1));
            if result.is_some() {
                return result;
            }

            self.latency -= dist;
            self.hosts.pop();
            self.placement.truncate(next);
            self.route.truncate(route_len);
            delta.revert(&mut self.work);
        }

        None
    }

    /// All stages are placed, route to the destination.
    fn finish(&self, tree: &ShortestPathTree) -> Option<Configuration> {
        let destination = self.chain.destination();
        let path = tree.path_to(destination)?;
        if path.len() > 1 && self.route.contains(&destination) && self.topo.is_server(destination)
        {
            return None;
        }
        let mut route = self.route.clone();
        route.extend_from_slice(&path[1..]);
        let config =
            Configuration::new(self.topo, self.chain, route, self.placement.clone(), self.model)
                .ok()?;
        validation::check(self.topo, self.chain, &config).ok().map(|_| config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Stage;

    /// ```text
    ///        s1 (50)
    ///       /       \
    ///  src -- sw --- dst
    ///       \       /
    ///        s2 (100)
    /// ```
    /// `s1` is closer than `s2`.
    fn net() -> (Topology, Vec<NodeId>) {
        let mut t = Topology::new("t");
        let src = t.add_switch("src");
        let dst = t.add_switch("dst");
        let sw = t.add_switch("sw");
        let s1 = t.add_node("s1", 50.0);
        let s2 = t.add_node("s2", 100.0);
        t.add_link(src, sw, 100.0, 1.0).unwrap();
        t.add_link(sw, dst, 100.0, 1.0).unwrap();
        t.add_link(src, s1, 100.0, 1.0).unwrap();
        t.add_link(s1, dst, 100.0, 1.0).unwrap();
        t.add_link(src, s2, 100.0, 2.0).unwrap();
        t.add_link(s2, dst, 100.0, 2.0).unwrap();
        (t, vec![src, dst, sw, s1, s2])
    }

    fn chain(n: &[NodeId], demands: &[f64], budget: f64) -> Chain {
        let stages = demands.iter().map(|d| Stage::new(1.0, *d)).collect();
        Chain::new(0, stages, n[0], n[1], 10.0, budget).unwrap()
    }

    #[test]
    fn closest_server_first() {
        let (t, n) = net();
        let c = construct(&t, &chain(&n, &[20.0, 20.0], 100.0), LatencyModel::Sequential).unwrap();
        assert_eq!(c.route, vec![n[0], n[3], n[1]]);
        assert_eq!(c.placement, vec![1, 1]);
    }

    #[test]
    fn packs_and_continues() {
        let (t, n) = net();
        // 40 fits on s1, the remaining 60 must go to s2, reached from s1 through src or dst.
        let c = construct(&t, &chain(&n, &[40.0, 60.0], 100.0), LatencyModel::Sequential).unwrap();
        assert_eq!(c.hosts(), vec![n[3], n[4]]);
        assert!(validation::check(&t, &chain(&n, &[40.0, 60.0], 100.0), &c).is_ok());
    }

    #[test]
    fn backtracks_if_the_rest_does_not_fit() {
        let (t, n) = net();
        // s1 then s2 takes 8, which exceeds the budget. Only s2 alone is fast enough.
        let c = construct(&t, &chain(&n, &[40.0, 60.0], 7.0), LatencyModel::Sequential).unwrap();
        assert_eq!(c.route, vec![n[0], n[4], n[1]]);
        assert_eq!(c.placement, vec![1, 1]);
    }

    #[test]
    fn skips_servers_that_are_too_small() {
        let (t, n) = net();
        // 80 does not fit on s1
        let c = construct(&t, &chain(&n, &[80.0], 100.0), LatencyModel::Sequential).unwrap();
        assert_eq!(c.route, vec![n[0], n[4], n[1]]);
        // nothing fits
        assert!(construct(&t, &chain(&n, &[120.0], 100.0), LatencyModel::Sequential).is_none());
        // too slow
        assert!(construct(&t, &chain(&n, &[80.0], 4.0), LatencyModel::Sequential).is_none());
    }

    #[test]
    fn does_not_modify_the_topology() {
        let (t, n) = net();
        let before: Vec<f64> = t.nodes().map(|x| t.capacity(x)).collect();
        construct(&t, &chain(&n, &[40.0, 60.0], 100.0), LatencyModel::Sequential).unwrap();
        let after: Vec<f64> = t.nodes().map(|x| t.capacity(x)).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn empty_chain_takes_the_direct_route() {
        let (t, n) = net();
        let c = construct(&t, &chain(&n, &[], 100.0), LatencyModel::Sequential).unwrap();
        assert!(c.placement.is_empty());
        assert_eq!(c.route_latency, 2.0);
    }
}
