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

//! # LineNet

use super::ExampleNetwork;
use crate::chain::{Chain, Stage};
use crate::topology::Topology;

/// # LineNet
///
/// ```text
/// A ---- B ---- C
/// ```
///
/// `A` and `C` are switches, `B` is the only server. All links have a bandwidth of 50 and a
/// latency of 1.
pub struct LineNet {}

impl ExampleNetwork for LineNet {
    /// # Variant 0
    /// `B` has a capacity of 100
    ///
    /// # Variant 1
    /// `B` has a capacity of 70
    fn net(variant: usize) -> Topology {
        let capacity = match variant {
            0 => 100.0,
            1 => 70.0,
            _ => panic!("Invalid variant number"),
        };

        let mut t = Topology::new("LineNet");
        let a = t.add_switch("A");
        let b = t.add_node("B", capacity);
        let c = t.add_switch("C");
        t.add_link(a, b, 50.0, 1.0).unwrap();
        t.add_link(b, c, 50.0, 1.0).unwrap();
        t
    }

    /// `variant` copies of the same chain from `A` to `C`, with two independent stages, each
    /// demanding 40, a throughput of 10 and a large latency budget.
    fn chains(net: &Topology, variant: usize) -> Vec<Chain> {
        let a = net.get_node_id("A").unwrap();
        let c = net.get_node_id("C").unwrap();
        (0..variant)
            .map(|id| {
                let stages = vec![Stage::new(1.0, 40.0), Stage::new(1.0, 40.0)];
                Chain::new(id, stages, a, c, 10.0, 1000.0).unwrap()
            })
            .collect()
    }
}
