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

//! All stages co-located on a single server.

use super::SearchContext;
use crate::topology::TOLERANCE;

pub(super) fn search(ctx: &mut SearchContext) {
    let topo = ctx.topo;
    let chain = ctx.chain;
    for node in topo.servers() {
        if ctx.done() || !ctx.tick() {
            return;
        }
        if topo.capacity(node) + TOLERANCE < chain.demand_sum() {
            continue;
        }
        if let Some((route, positions)) =
            ctx.connect(&[chain.source(), node, chain.destination()])
        {
            ctx.offer(&route, vec![positions[1]; chain.len()]);
        }
    }
}
