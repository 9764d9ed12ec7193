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

//! # LeafSpineNet

use super::ExampleNetwork;
use crate::chain::{Chain, Stage};
use crate::topology::Topology;

/// Number of spine switches
pub const SPINES: usize = 2;
/// Number of leaf switches
pub const LEAVES: usize = 4;
/// Number of servers attached to every leaf
pub const SERVERS_PER_LEAF: usize = 2;

/// # LeafSpineNet
///
/// Two spine switches, each connected to all four leaf switches (bandwidth 1000, latency 2).
/// Every leaf has two servers attached (bandwidth 500, latency 1). The servers are named
/// `server{leaf}{index}`.
pub struct LeafSpineNet {}

impl ExampleNetwork for LeafSpineNet {
    /// # Variant 0
    /// All servers have a capacity of 100.
    ///
    /// # Variant 1
    /// The servers of leaf `i` have a capacity of `50 * (i + 1)`.
    fn net(variant: usize) -> Topology {
        let mut t = Topology::new("LeafSpineNet");
        let spines: Vec<_> = (0..SPINES).map(|i| t.add_switch(format!("spine{}", i))).collect();
        for leaf_idx in 0..LEAVES {
            let leaf = t.add_switch(format!("leaf{}", leaf_idx));
            for spine in spines.iter() {
                t.add_link(leaf, *spine, 1000.0, 2.0).unwrap();
            }
            let capacity = match variant {
                0 => 100.0,
                1 => 50.0 * (leaf_idx + 1) as f64,
                _ => panic!("Invalid variant number"),
            };
            for j in 0..SERVERS_PER_LEAF {
                let server = t.add_node(format!("server{}{}", leaf_idx, j), capacity);
                t.add_link(leaf, server, 500.0, 1.0).unwrap();
            }
        }
        t
    }

    /// `variant` chains. Chain `i` goes from `leaf{i % 4}` to `leaf{(i + 2) % 4}` and has
    /// `2 + i % 3` stages with demands between 20 and 50.
    fn chains(net: &Topology, variant: usize) -> Vec<Chain> {
        (0..variant)
            .map(|i| {
                let src = net.get_node_id(format!("leaf{}", i % LEAVES)).unwrap();
                let dst = net.get_node_id(format!("leaf{}", (i + 2) % LEAVES)).unwrap();
                let stages = (0..2 + i % 3)
                    .map(|j| {
                        let latency = 1.0 + ((i + j) % 4) as f64;
                        let demand = 20.0 + 10.0 * ((3 * i + j) % 4) as f64;
                        let stage =
                            Stage::new(latency, demand).with_reads(vec![((i + j) % 6) as u32]);
                        if j % 2 == 1 {
                            stage.with_writes(vec![((i + 2 * j + 1) % 6) as u32])
                        } else {
                            stage
                        }
                    })
                    .collect();
                Chain::new(i, stages, src, dst, 10.0, 40.0).unwrap()
            })
            .collect()
    }
}
