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

use flexchain::chain::{Chain, Stage};
use flexchain::example_networks::{DiamondNet, ExampleNetwork, LeafSpineNet, LineNet};
use flexchain::topology::Topology;
use flexchain::Error;

use clap::ValueEnum;
use rand::prelude::*;
use std::fmt;

/// Number of distinct packet fields used by random stages
const NUM_FIELDS: u32 = 8;

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum Network {
    LineNet,
    DiamondNet,
    LeafSpineNet,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Network::LineNet => write!(f, "LineNet"),
            Network::DiamondNet => write!(f, "DiamondNet"),
            Network::LeafSpineNet => write!(f, "LeafSpineNet"),
        }
    }
}

impl Network {
    fn num_variants(&self) -> usize {
        match self {
            Network::LineNet => 2,
            Network::DiamondNet => 1,
            Network::LeafSpineNet => 2,
        }
    }

    /// Build the topology, and either the prepared chains of the network or random chains.
    pub fn build(
        &self,
        variant: usize,
        num_chains: usize,
        seed: Option<u64>,
    ) -> Result<(Topology, Vec<Chain>), Error> {
        if variant >= self.num_variants() {
            return Err(Error::TopologyError(format!(
                "{} has only {} variants",
                self,
                self.num_variants()
            )));
        }
        let net = match self {
            Network::LineNet => LineNet::net(variant),
            Network::DiamondNet => DiamondNet::net(variant),
            Network::LeafSpineNet => LeafSpineNet::net(variant),
        };
        let chains = match (seed, self) {
            (Some(seed), _) => random_chains(&net, num_chains, seed)?,
            (None, Network::LineNet) => LineNet::chains(&net, num_chains),
            (None, Network::DiamondNet) => DiamondNet::chains(&net, num_chains),
            (None, Network::LeafSpineNet) => LeafSpineNet::chains(&net, num_chains),
        };
        Ok((net, chains))
    }
}

/// Generate random chains between the switches of the network (or between any nodes, if there
/// are no switches).
pub fn random_chains(net: &Topology, num_chains: usize, seed: u64) -> Result<Vec<Chain>, Error> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut endpoints: Vec<_> = net.nodes().filter(|n| !net.is_server(*n)).collect();
    if endpoints.is_empty() {
        endpoints = net.nodes().collect();
    }
    if endpoints.is_empty() {
        return Err(Error::TopologyError(String::from("the network has no nodes")));
    }

    (0..num_chains)
        .map(|id| {
            let src = endpoints[rng.gen_range(0, endpoints.len())];
            let dst = endpoints[rng.gen_range(0, endpoints.len())];
            let stages = (0..rng.gen_range(1, 6))
                .map(|_| {
                    let reads: Vec<u32> = (0..rng.gen_range(0, 3))
                        .map(|_| rng.gen_range(0, NUM_FIELDS))
                        .collect();
                    let writes: Vec<u32> = (0..rng.gen_range(0, 2))
                        .map(|_| rng.gen_range(0, NUM_FIELDS))
                        .collect();
                    Stage::new(rng.gen_range(0.5, 3.0), rng.gen_range(10.0, 50.0))
                        .with_reads(reads)
                        .with_writes(writes)
                })
                .collect();
            let throughput = rng.gen_range(10.0, 100.0);
            let budget = rng.gen_range(15.0, 40.0);
            Chain::new(id, stages, src, dst, throughput, budget)
        })
        .collect()
}
