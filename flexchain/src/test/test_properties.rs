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

use crate::chain::{Chain, Stage};
use crate::example_networks::*;
use crate::generator::GenerationMode;
use crate::heuristics::GreedyVariant;
use crate::planner::{greedy, optimize, reduce, PlanningParameters};
use crate::relaxation::MinilpSolver;
use crate::rounding::{refine, RoundingPolicy};
use crate::topology::Topology;
use crate::validation::validate_assignment;

use maplit::btreeset;
use rand::prelude::*;

fn params() -> PlanningParameters {
    PlanningParameters::default()
        .with_time_budget(None)
        .with_num_threads(1)
        .with_k(64)
        .with_search_budget(20_000)
}

/// Random chains between the leaf switches of the leaf spine network.
fn random_chains(net: &Topology, n: usize, seed: u64) -> Vec<Chain> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|id| {
            let src = net.get_node_id(format!("leaf{}", rng.gen_range(0, 4))).unwrap();
            let dst = net.get_node_id(format!("leaf{}", rng.gen_range(0, 4))).unwrap();
            let stages = (0..rng.gen_range(1, 5))
                .map(|_| {
                    Stage::new(rng.gen_range(0.5, 3.0), rng.gen_range(10.0, 60.0))
                        .with_reads(btreeset! {rng.gen_range(0, 4)})
                        .with_writes(if rng.gen_bool(0.5) {
                            btreeset! {rng.gen_range(0, 4)}
                        } else {
                            btreeset! {}
                        })
                })
                .collect();
            Chain::new(id, stages, src, dst, rng.gen_range(10.0, 100.0), 30.0).unwrap()
        })
        .collect()
}

#[test]
fn rounding_is_feasible() {
    for variant in 0..2 {
        let net = LeafSpineNet::net(variant);
        for mode in [GenerationMode::Frontier, GenerationMode::Permutation].iter() {
            for policy in [
                RoundingPolicy::Threshold,
                RoundingPolicy::Greedy,
                RoundingPolicy::Randomized { seed: 1 },
            ]
            .iter()
            {
                let mut chains = random_chains(&net, 12, variant as u64);
                let p = params().with_generation_mode(*mode).with_rounding_policy(*policy);
                let result = optimize(&net, &mut chains, &p, &MinilpSolver);
                assert!(result.accepted > 0);
                assert_eq!(validate_assignment(&net, &chains), Ok(()));
                assert!(chains
                    .iter()
                    .filter_map(|c| c.accepted.as_ref().map(|x| (c, x)))
                    .all(|(c, x)| x.latency <= c.latency_budget() + 1e-9));
            }
        }
    }
}

#[test]
fn greedy_is_feasible() {
    for variant in 0..2 {
        let net = LeafSpineNet::net(variant);
        for v in [GreedyVariant::Parc, GreedyVariant::Sequential].iter() {
            let mut chains = random_chains(&net, 20, 10 + variant as u64);
            let result = greedy(&net, &mut chains, &params(), *v);
            assert!(result.accepted > 0);
            assert_eq!(validate_assignment(&net, &chains), Ok(()));
            assert!(result.node_utilization.values().all(|u| *u <= 1.0 + 1e-9));
            assert!(result.link_utilization.values().all(|u| *u <= 1.0 + 1e-9));
        }
    }
}

#[test]
fn refinement_is_monotonic() {
    let net = LeafSpineNet::net(1);
    let mut chains = random_chains(&net, 16, 3);
    let p = params().with_rounding_policy(RoundingPolicy::Threshold);
    let (residual, report) = refine(&net, &mut chains, &p, &MinilpSolver);
    assert!(report.passes >= 1);
    assert!(report.passes <= chains.len() + 1);
    assert!(report.accepted.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(report.num_accepted(), chains.iter().filter(|c| c.is_accepted()).count());
    assert_eq!(validate_assignment(&net, &chains), Ok(()));

    // the residual topology of the refinement is the same as the reduced one
    let reduced = reduce(&net, &chains);
    for node in net.nodes() {
        assert!((residual.capacity(node) - reduced.capacity(node)).abs() < 1e-6);
    }
}

#[test]
fn placement_is_deterministic() {
    let net = LeafSpineNet::net(0);
    let p = params().with_num_threads(3);

    let mut a = random_chains(&net, 10, 5);
    let mut b = a.clone();
    let ra = optimize(&net, &mut a, &p, &MinilpSolver);
    let rb = optimize(&net, &mut b, &p, &MinilpSolver);
    assert_eq!(ra, rb);
    for (x, y) in a.iter().zip(b.iter()) {
        assert_eq!(x.accepted, y.accepted);
    }

    let ra = greedy(&net, &mut a, &p, GreedyVariant::Parc);
    let rb = greedy(&net, &mut b, &p, GreedyVariant::Parc);
    assert_eq!(ra, rb);
    for (x, y) in a.iter().zip(b.iter()) {
        assert_eq!(x.accepted, y.accepted);
    }
}

#[test]
fn online_batches() {
    let net = LeafSpineNet::net(0);
    let mut first = random_chains(&net, 10, 7);
    optimize(&net, &mut first, &params(), &MinilpSolver);
    let residual = reduce(&net, &first);

    let mut second = random_chains(&net, 10, 8);
    optimize(&residual, &mut second, &params(), &MinilpSolver);

    let all: Vec<Chain> = first.into_iter().chain(second.into_iter()).collect();
    assert_eq!(validate_assignment(&net, &all), Ok(()));
}
