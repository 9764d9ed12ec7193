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

use crate::example_networks::*;
use crate::generator::{generate, GenerationMode};
use crate::heuristics::GreedyVariant;
use crate::planner::{greedy, optimize, PlanningParameters};
use crate::relaxation::MinilpSolver;
use crate::rounding::RoundingPolicy;
use crate::topology::PathCache;
use crate::validation::validate_assignment;

const MODES: [GenerationMode; 3] =
    [GenerationMode::Frontier, GenerationMode::Permutation, GenerationMode::SingleNode];

const POLICIES: [RoundingPolicy; 3] = [
    RoundingPolicy::Threshold,
    RoundingPolicy::Greedy,
    RoundingPolicy::Randomized { seed: 42 },
];

fn params(mode: GenerationMode, policy: RoundingPolicy) -> PlanningParameters {
    PlanningParameters::default()
        .with_time_budget(None)
        .with_num_threads(1)
        .with_generation_mode(mode)
        .with_rounding_policy(policy)
}

#[test]
fn line_net_is_accepted() {
    let _ = pretty_env_logger::try_init();
    let net = LineNet::net(0);
    let a = net.get_node_id("A").unwrap();
    let b = net.get_node_id("B").unwrap();
    let c = net.get_node_id("C").unwrap();
    for mode in MODES.iter() {
        for policy in POLICIES.iter() {
            let mut chains = LineNet::chains(&net, 1);
            let result = optimize(&net, &mut chains, &params(*mode, *policy), &MinilpSolver);
            assert_eq!(result.accepted, 1, "{:?}, {:?}", mode, policy);
            let config = chains[0].accepted.as_ref().unwrap();
            assert_eq!(config.route, vec![a, b, c]);
            assert_eq!(config.placement, vec![1, 1]);
            assert_eq!(config.node_usage.get(&b), Some(&80.0));
        }
    }

    for variant in [GreedyVariant::Parc, GreedyVariant::Sequential].iter() {
        let mut chains = LineNet::chains(&net, 1);
        let p = params(GenerationMode::Frontier, RoundingPolicy::Threshold);
        let result = greedy(&net, &mut chains, &p, *variant);
        assert_eq!(result.accepted, 1);
        assert_eq!(chains[0].accepted.as_ref().unwrap().route, vec![a, b, c]);
    }
}

#[test]
fn line_net_is_rejected() {
    let net = LineNet::net(1);
    for mode in MODES.iter() {
        let p = params(*mode, RoundingPolicy::Threshold);
        let mut chains = LineNet::chains(&net, 1);
        let options = p.generator_options(p.k);
        let (configs, _) = generate(&net, &chains[0], &options, &mut PathCache::new());
        assert!(configs.is_empty());

        let result = optimize(&net, &mut chains, &p, &MinilpSolver);
        assert_eq!(result.accepted, 0);
        assert!(!chains[0].is_accepted());
    }

    let mut chains = LineNet::chains(&net, 1);
    let p = params(GenerationMode::Frontier, RoundingPolicy::Threshold);
    assert_eq!(greedy(&net, &mut chains, &p, GreedyVariant::Parc).accepted, 0);
}

#[test]
fn diamond_net_fits_three_chains() {
    let _ = pretty_env_logger::try_init();
    let net = DiamondNet::net(0);
    for policy in [RoundingPolicy::Threshold, RoundingPolicy::Greedy].iter() {
        let mut chains = DiamondNet::chains(&net, 4);
        let p = params(GenerationMode::Frontier, *policy);
        let result = optimize(&net, &mut chains, &p, &MinilpSolver);
        assert_eq!(result.accepted, 3);
        assert!(result.lp_bound.unwrap() >= 3.0);
        assert_eq!(validate_assignment(&net, &chains), Ok(()));
    }

    for variant in [GreedyVariant::Parc, GreedyVariant::Sequential].iter() {
        let mut chains = DiamondNet::chains(&net, 4);
        let p = params(GenerationMode::Frontier, RoundingPolicy::Threshold);
        assert_eq!(greedy(&net, &mut chains, &p, *variant).accepted, 3);
        assert_eq!(validate_assignment(&net, &chains), Ok(()));
    }
}

#[test]
fn parallel_aware_optimization() {
    let net = LineNet::net(0);
    let mut chains = LineNet::chains(&net, 1);
    let p =
        params(GenerationMode::Permutation, RoundingPolicy::Threshold).with_parallel_aware(true);
    let result = optimize(&net, &mut chains, &p, &MinilpSolver);
    assert_eq!(result.accepted, 1);
    assert_eq!(chains[0].accepted.as_ref().unwrap().placement, vec![1, 1]);
}

#[test]
fn routes_never_revisit_a_server() {
    let net = LeafSpineNet::net(0);
    let chains = LeafSpineNet::chains(&net, 6);
    let mut revisited_switch = false;
    for mode in MODES.iter() {
        let p = params(*mode, RoundingPolicy::Threshold).with_search_budget(20_000);
        let options = p.generator_options(64);
        let mut cache = PathCache::new();
        for chain in chains.iter() {
            let (configs, _) = generate(&net, chain, &options, &mut cache);
            for config in configs.iter() {
                let servers: Vec<_> =
                    config.route.iter().filter(|n| net.is_server(**n)).collect();
                let mut unique = servers.clone();
                unique.sort();
                unique.dedup();
                assert_eq!(unique.len(), servers.len(), "{:?}: {}", mode, config);
                let mut nodes = config.route.clone();
                nodes.sort();
                nodes.dedup();
                revisited_switch |= nodes.len() < config.route.len();
            }
        }
    }
    // servers hang off a single leaf, so visiting one means passing its leaf twice
    assert!(revisited_switch);

    let mut chains = LeafSpineNet::chains(&net, 6);
    let p = params(GenerationMode::Frontier, RoundingPolicy::Threshold);
    greedy(&net, &mut chains, &p, GreedyVariant::Parc);
    for config in chains.iter().filter_map(|c| c.accepted.as_ref()) {
        for server in config.route.iter().filter(|n| net.is_server(**n)) {
            assert_eq!(config.route.iter().filter(|n| *n == server).count(), 1, "{}", config);
        }
    }
}
