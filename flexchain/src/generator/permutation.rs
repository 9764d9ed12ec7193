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

//! Search over ordered subsets of servers.

use super::SearchContext;
use crate::topology::{NodeId, TOLERANCE};

use itertools::Itertools;
use std::cmp::Ordering;

pub(super) fn search(ctx: &mut SearchContext) {
    let topo = ctx.topo;
    let chain = ctx.chain;
    let min_demand = chain.min_stage_demand();
    let max_demand = chain.max_stage_demand();

    // largest servers first
    let mut eligible: Vec<NodeId> = topo
        .servers()
        .into_iter()
        .filter(|n| topo.capacity(*n) + TOLERANCE >= min_demand)
        .collect();
    eligible.sort_by(|a, b| {
        topo.capacity(*b).partial_cmp(&topo.capacity(*a)).unwrap_or(Ordering::Equal).then(a.cmp(b))
    });

    for size in 1..=eligible.len().min(chain.len()) {
        for subset in eligible.iter().copied().permutations(size) {
            if ctx.done() || !ctx.tick() {
                return;
            }
            let capacities = subset.iter().map(|n| topo.capacity(*n));
            let total: f64 = capacities.clone().sum();
            let largest = capacities.fold(0.0, f64::max);
            if total + TOLERANCE < chain.demand_sum() || largest + TOLERANCE < max_demand {
                continue;
            }

            let mut waypoints = Vec::with_capacity(size + 2);
            waypoints.push(chain.source());
            waypoints.extend(subset.iter().copied());
            waypoints.push(chain.destination());
            let (route, positions) = match ctx.connect(&waypoints) {
                Some(x) => x,
                None => continue,
            };
            // strip the source and destination
            let hosts = &positions[1..=size];

            let mut placement = Vec::with_capacity(chain.len());
            distribute(ctx, &route, hosts, 0, 0, 0.0, &mut placement);
        }
    }
}

/// Distribute the stages in order over the hosts, such that each host gets at least one stage.
/// Every stage is either placed on the same host as the previous one, or on the next host.
fn distribute(
    ctx: &mut SearchContext,
    route: &[NodeId],
    hosts: &[usize],
    stage: usize,
    host: usize,
    load: f64,
    placement: &mut Vec<usize>,
) {
    let n = ctx.chain.len();
    if stage == n {
        if host + 1 == hosts.len() && ctx.tick() {
            ctx.offer(route, placement.clone());
        }
        return;
    }
    let demand = ctx.chain.stages()[stage].demand;
    let candidates = if stage == 0 { [Some(0), None] } else { [Some(host), Some(host + 1)] };
    for h in candidates.iter().flatten().copied() {
        if ctx.done() {
            return;
        }
        // every remaining host needs at least one of the remaining stages
        if h >= hosts.len() || hosts.len() - h > n - stage {
            continue;
        }
        let base = if stage > 0 && h == host { load } else { 0.0 };
        if base + demand > ctx.topo.capacity(route[hosts[h]]) + TOLERANCE {
            continue;
        }
        placement.push(hosts[h]);
        distribute(ctx, route, hosts, stage + 1, h, base + demand, placement);
        placement.pop();
    }
}
