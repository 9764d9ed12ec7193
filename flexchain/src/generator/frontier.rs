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

//! Breadth-first frontier search over routes.

use super::SearchContext;
use crate::topology::{NodeId, Topology, TOLERANCE};

use std::collections::VecDeque;

struct PartialRoute {
    route: Vec<NodeId>,
    latency: f64,
    capacity: f64,
}

pub(super) fn search(ctx: &mut SearchContext) {
    let topo = ctx.topo;
    let chain = ctx.chain;
    let source = chain.source();
    let destination = chain.destination();
    let throughput = chain.throughput();
    let slack = chain.latency_budget() - chain.min_processing_latency(ctx.options.latency_model);
    let dist = ctx.cache.distances_to(topo, destination).clone();

    let mut queue: VecDeque<PartialRoute> = VecDeque::new();
    queue.push_back(PartialRoute {
        route: vec![source],
        latency: 0.0,
        capacity: topo.capacity(source),
    });

    while let Some(p) = queue.pop_front() {
        if ctx.done() || !ctx.tick() {
            break;
        }

        let last = p.route[p.route.len() - 1];
        if last == destination && p.capacity + TOLERANCE >= chain.demand_sum() {
            place(ctx, &p.route);
            continue;
        }
        if p.route.len() >= ctx.options.route_length_limit {
            continue;
        }

        for (next, link) in topo.neighbors(last) {
            if link.bandwidth + TOLERANCE < throughput || !may_visit(topo, &p.route, next) {
                continue;
            }
            let latency = p.latency + link.latency;
            match dist.get(&next) {
                Some(d) if latency + d <= slack + TOLERANCE => {}
                _ => continue,
            }
            let mut route = p.route.clone();
            route.push(next);
            let capacity = p.capacity + topo.capacity(next);
            queue.push_back(PartialRoute { route, latency, capacity });
        }
    }
}

/// Servers are never visited twice. A switch may be visited again, if the route visited a
/// server after the last occurrence of that switch.
fn may_visit(topo: &Topology, route: &[NodeId], next: NodeId) -> bool {
    match route.iter().rposition(|n| *n == next) {
        None => true,
        Some(_) if topo.is_server(next) => false,
        Some(pos) => route[pos + 1..].iter().any(|n| topo.is_server(*n)),
    }
}

/// Enumerate all non-decreasing placements of the stages onto the servers of the route.
fn place(ctx: &mut SearchContext, route: &[NodeId]) {
    let topo = ctx.topo;
    let positions: Vec<usize> = (0..route.len()).filter(|i| topo.is_server(route[*i])).collect();
    let mut placement = Vec::with_capacity(ctx.chain.len());
    assign(ctx, route, &positions, 0, 0, 0.0, &mut placement);
}

/// Place stage `stage` on any server at or after `positions[first]`, where `load` is already
/// used on `positions[first]`.
fn assign(
    ctx: &mut SearchContext,
    route: &[NodeId],
    positions: &[usize],
    stage: usize,
    first: usize,
    load: f64,
    placement: &mut Vec<usize>,
) {
    if stage == ctx.chain.len() {
        if ctx.tick() {
            ctx.offer(route, placement.clone());
        }
        return;
    }
    let demand = ctx.chain.stages()[stage].demand;
    for j in first..positions.len() {
        if ctx.done() {
            return;
        }
        let base = if j == first { load } else { 0.0 };
        if base + demand > ctx.topo.capacity(route[positions[j]]) + TOLERANCE {
            continue;
        }
        placement.push(positions[j]);
        assign(ctx, route, positions, stage + 1, j, base + demand, placement);
        placement.pop();
    }
}
