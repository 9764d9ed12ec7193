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

//! # Validation
//!
//! Checks configurations against the (residual) resources of a topology. A [`Violation`] is not
//! an error of the program, it just means that the configuration cannot be used.
//!
//! [`validate_assignment`] is independent of how the configurations were generated or selected,
//! and checks all accepted configurations of a set of chains at once.

use crate::chain::Chain;
use crate::configuration::Configuration;
use crate::topology::{Link, NodeId, Topology, TOLERANCE};

use std::collections::BTreeMap;
use thiserror::Error;

/// Reason why a configuration (or a set of configurations) is infeasible.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Violation {
    /// The effective latency exceeds the latency budget of the chain
    #[error("Latency {latency} exceeds the budget of {budget}")]
    Latency {
        /// Effective latency
        latency: f64,
        /// Latency budget
        budget: f64,
    },
    /// The compute usage of a node exceeds its capacity
    #[error("Node {node:?} requires {usage}, but only {capacity} is available")]
    Capacity {
        /// The overloaded node
        node: NodeId,
        /// Compute usage
        usage: f64,
        /// Available capacity
        capacity: f64,
    },
    /// The traffic on a link exceeds its bandwidth
    #[error("Link {link:?} requires {demand}, but only {bandwidth} is available")]
    Bandwidth {
        /// The overloaded link
        link: Link,
        /// Bandwidth demand
        demand: f64,
        /// Available bandwidth
        bandwidth: f64,
    },
    /// The route uses a link that does not exist
    #[error("Link {0:?} does not exist")]
    MissingLink(Link),
}

/// Check a single configuration of `chain` against the resources of `topo`.
pub fn check(topo: &Topology, chain: &Chain, config: &Configuration) -> Result<(), Violation> {
    if config.latency > chain.latency_budget() + TOLERANCE {
        return Err(Violation::Latency { latency: config.latency, budget: chain.latency_budget() });
    }
    check_usage(topo, config.node_usage.iter().map(|(n, u)| (*n, *u)), config.link_demands())
}

fn check_usage<N, L>(topo: &Topology, nodes: N, links: L) -> Result<(), Violation>
where
    N: IntoIterator<Item = (NodeId, f64)>,
    L: IntoIterator<Item = (Link, f64)>,
{
    for (node, usage) in nodes {
        let capacity = topo.capacity(node);
        if usage > capacity + TOLERANCE {
            return Err(Violation::Capacity { node, usage, capacity });
        }
    }
    for (link, demand) in links {
        let bandwidth = match topo.link(link.0, link.1) {
            Some(l) => l.bandwidth,
            None => return Err(Violation::MissingLink(link)),
        };
        if demand > bandwidth + TOLERANCE {
            return Err(Violation::Bandwidth { link, demand, bandwidth });
        }
    }
    Ok(())
}

/// Check the configuration, and if it is valid, subtract its resources from `topo`. On a
/// violation, `topo` is left untouched.
pub fn try_commit(
    topo: &mut Topology,
    chain: &Chain,
    config: &Configuration,
) -> Result<(), Violation> {
    check(topo, chain, config)?;
    for (node, usage) in config.node_usage.iter() {
        topo.consume_capacity(*node, *usage);
    }
    for (link, demand) in config.link_demands() {
        topo.consume_bandwidth(link, demand);
    }
    Ok(())
}

/// Give the resources of a committed configuration back to `topo`.
pub fn release(topo: &mut Topology, config: &Configuration) {
    for (node, usage) in config.node_usage.iter() {
        topo.release_capacity(*node, *usage);
    }
    for (link, demand) in config.link_demands() {
        topo.release_bandwidth(link, demand);
    }
}

/// Check all accepted configurations of `chains` together against the resources of `topo`.
/// Chains without an accepted configuration are ignored.
pub fn validate_assignment(topo: &Topology, chains: &[Chain]) -> Result<(), Violation> {
    let mut nodes: BTreeMap<NodeId, f64> = BTreeMap::new();
    let mut links: BTreeMap<Link, f64> = BTreeMap::new();
    for chain in chains {
        let config = match chain.accepted.as_ref() {
            Some(c) => c,
            None => continue,
        };
        if config.latency > chain.latency_budget() + TOLERANCE {
            return Err(Violation::Latency {
                latency: config.latency,
                budget: chain.latency_budget(),
            });
        }
        for (node, usage) in config.node_usage.iter() {
            *nodes.entry(*node).or_insert(0.0) += usage;
        }
        for (link, demand) in config.link_demands() {
            *links.entry(link).or_insert(0.0) += demand;
        }
    }
    check_usage(topo, nodes, links)
}
