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

//! # DiamondNet

use super::ExampleNetwork;
use crate::chain::{Chain, Stage};
use crate::topology::Topology;

/// # DiamondNet
///
/// ```text
///        s1
///       /  \
///  src      dst
///       \  /
///        s2
/// ```
///
/// `src` and `dst` are switches. `s1` and `s2` are servers with a capacity of 100, and are also
/// connected to each other. The path through `s1` has latency 1 per link, the path through `s2`
/// latency 2 per link, and the link `s1 -- s2` has latency 1. All links have bandwidth 100.
pub struct DiamondNet {}

impl ExampleNetwork for DiamondNet {
    /// There exists only one variant.
    fn net(_variant: usize) -> Topology {
        let mut t = Topology::new("DiamondNet");
        let src = t.add_switch("src");
        let s1 = t.add_node("s1", 100.0);
        let s2 = t.add_node("s2", 100.0);
        let dst = t.add_switch("dst");
        t.add_link(src, s1, 100.0, 1.0).unwrap();
        t.add_link(s1, dst, 100.0, 1.0).unwrap();
        t.add_link(src, s2, 100.0, 2.0).unwrap();
        t.add_link(s2, dst, 100.0, 2.0).unwrap();
        t.add_link(s1, s2, 100.0, 1.0).unwrap();
        t
    }

    /// `variant` identical chains from `src` to `dst`, each with two stages demanding 30. The
    /// first stage writes field 0, which the second stage reads. At most three chains fit onto
    /// the network.
    fn chains(net: &Topology, variant: usize) -> Vec<Chain> {
        let src = net.get_node_id("src").unwrap();
        let dst = net.get_node_id("dst").unwrap();
        (0..variant)
            .map(|id| {
                let stages = vec![
                    Stage::new(2.0, 30.0).with_writes(vec![0]),
                    Stage::new(3.0, 30.0).with_reads(vec![0]),
                ];
                Chain::new(id, stages, src, dst, 10.0, 20.0).unwrap()
            })
            .collect()
    }
}
