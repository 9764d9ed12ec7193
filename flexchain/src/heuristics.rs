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

//! # Greedy Heuristics
//!
//! Place the chains one after the other, without solving any linear program. Chains are
//! processed in ascending order of their total compute demand (ties keep the input order), and
//! every accepted configuration is immediately subtracted from the topology, such that later
//! chains only see the remaining resources.
//!
//! The configuration of every chain is built by the [greedy constructor](construct).
//! [`GreedyVariant::Parc`] first tries to place the merged stages of the parallelism analysis,
//! and expands the result onto the original stages. If this fails, it falls back to the original
//! stages. [`GreedyVariant::Sequential`] only uses the original stages.

use crate::chain::Chain;
use crate::configuration::Configuration;
use crate::generator::construct;
use crate::parallelism::LatencyModel;
use crate::topology::Topology;
use crate::validation;

use log::*;
use std::cmp::Ordering;

/// Variant of the greedy heuristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GreedyVariant {
    /// Parallelism-aware greedy: try the merged stages first.
    Parc,
    /// Unparallelized baseline: only use the original stages.
    Sequential,
}

impl Default for GreedyVariant {
    fn default() -> Self {
        Self::Parc
    }
}

/// Place all chains which are not yet accepted, and commit every accepted configuration to
/// `topo`. Returns the number of newly accepted chains.
pub fn place_greedy(
    topo: &mut Topology,
    chains: &mut [Chain],
    variant: GreedyVariant,
    model: LatencyModel,
) -> usize {
    let order = demand_order(chains);
    info!("Greedy placement ({:?}) of {} chains", variant, order.len());

    let mut accepted = 0;
    for idx in order {
        let chain = &mut chains[idx];
        let mut config = None;
        if variant == GreedyVariant::Parc {
            config = place_merged(topo, chain, model);
        }
        // without any merged stages, both attempts are identical
        let nothing_merged = chain.analysis().num_clusters() == chain.len();
        if config.is_none() && !(variant == GreedyVariant::Parc && nothing_merged) {
            config = place_original(topo, chain, model);
        }
        match config {
            Some(c) => {
                debug!("{}: accepted {}", chain.id(), c);
                chain.accepted = Some(c);
                accepted += 1;
            }
            None => debug!("{}: rejected", chain.id()),
        }
    }

    info!("Greedy placement accepted {} chains", accepted);
    accepted
}

/// Indices of all chains which are not yet accepted, in ascending order of their total compute
/// demand. Chains with equal demand keep their order.
pub(crate) fn demand_order(chains: &[Chain]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..chains.len()).filter(|i| !chains[*i].is_accepted()).collect();
    order.sort_by(|a, b| {
        chains[*a].demand_sum().partial_cmp(&chains[*b].demand_sum()).unwrap_or(Ordering::Equal)
    });
    order
}

fn place_merged(topo: &mut Topology, chain: &Chain, model: LatencyModel) -> Option<Configuration> {
    let merged = construct(topo, &chain.merged(), model)?;
    let placement = chain.analysis().expand_placement(&merged.placement)?;
    match Configuration::new(topo, chain, merged.route, placement, model) {
        Ok(config) => commit(topo, chain, config),
        Err(e) => {
            debug!("{}: cannot expand the merged configuration: {}", chain.id(), e);
            None
        }
    }
}

fn place_original(
    topo: &mut Topology,
    chain: &Chain,
    model: LatencyModel,
) -> Option<Configuration> {
    let config = construct(topo, chain, model)?;
    commit(topo, chain, config)
}

fn commit(topo: &mut Topology, chain: &Chain, config: Configuration) -> Option<Configuration> {
    match validation::try_commit(topo, chain, &config) {
        Ok(()) => Some(config),
        Err(v) => {
            debug!("{}: {}", chain.id(), v);
            None
        }
    }
}
