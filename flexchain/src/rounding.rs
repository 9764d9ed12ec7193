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

//! # Rounding
//!
//! Converts the fractional values of a solved [relaxation](crate::relaxation) into an integral
//! assignment. Threshold and randomized rounding visit the chains in ascending order of their
//! total demand, greedy rounding in ascending order of the resource usage ratio of their best
//! configuration. All policies commit every accepted configuration to the (residual) topology
//! before the next chain is considered, and roll back nothing that was not committed: a
//! configuration violating the remaining resources is simply not accepted.
//!
//! [`refine`] repeats generation, relaxation and rounding on the residual problem until a pass
//! does not accept any chain anymore.

use crate::chain::Chain;
use crate::generator::{generate_all, GenerationReport};
use crate::heuristics::{demand_order, place_greedy, GreedyVariant};
use crate::parallelism::LatencyModel;
use crate::planner::PlanningParameters;
use crate::relaxation::{relax, LpSolver, RelaxationResult};
use crate::topology::Topology;
use crate::validation;

use log::*;
use rand::prelude::*;
use std::cmp::Ordering;

/// Values at least this close to 1 are treated as 1 by [`RoundingPolicy::Threshold`].
pub const ONE_TOLERANCE: f64 = 1e-6;

/// How fractional values are turned into accepted configurations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoundingPolicy {
    /// Accept configurations with a value of 1. Falls back to [`RoundingPolicy::Greedy`] if
    /// nothing is accepted.
    Threshold,
    /// Accept configurations in descending order of their value, processing chains with a small
    /// resource usage ratio first. Falls back to the PARC heuristic if nothing is accepted.
    Greedy,
    /// Accept a configuration with a probability equal to its value.
    Randomized {
        /// Seed of the random number generator
        seed: u64,
    },
}

impl Default for RoundingPolicy {
    fn default() -> Self {
        Self::Threshold
    }
}

/// Perform a single rounding pass on the chains, committing all accepted configurations to
/// `topo`. Returns the number of newly accepted chains.
pub fn round(
    topo: &mut Topology,
    chains: &mut [Chain],
    policy: RoundingPolicy,
    model: LatencyModel,
) -> usize {
    match policy {
        RoundingPolicy::Threshold => round_threshold(topo, chains, model),
        RoundingPolicy::Greedy => round_greedy(topo, chains, model),
        RoundingPolicy::Randomized { seed } => round_randomized(topo, chains, seed),
    }
}

fn round_threshold(topo: &mut Topology, chains: &mut [Chain], model: LatencyModel) -> usize {
    let mut accepted = 0;
    for idx in demand_order(chains) {
        let chain = &mut chains[idx];
        let candidate = match chain.configurations.iter().find(|c| c.value >= 1.0 - ONE_TOLERANCE)
        {
            Some(c) => c,
            None => continue,
        };
        match validation::try_commit(topo, chain, candidate) {
            Ok(()) => {
                trace!("{}: accepted {}", chain.id(), candidate);
                let candidate = candidate.clone();
                chain.accepted = Some(candidate);
                accepted += 1;
            }
            Err(v) => debug!("{}: integral configuration rolled back: {}", chain.id(), v),
        }
    }
    debug!("Threshold rounding accepted {} chains", accepted);

    if accepted == 0 {
        warn!("Threshold rounding accepted no chain, using greedy rounding");
        round_greedy(topo, chains, model)
    } else {
        accepted
    }
}

fn round_greedy(topo: &mut Topology, chains: &mut [Chain], model: LatencyModel) -> usize {
    let mut order: Vec<usize> = Vec::new();
    for (idx, chain) in chains.iter_mut().enumerate() {
        if chain.is_accepted() || chain.configurations.is_empty() {
            continue;
        }
        chain
            .configurations
            .sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap_or(Ordering::Equal));
        order.push(idx);
    }
    let ratios: Vec<f64> = chains
        .iter()
        .map(|c| c.configurations.first().map_or(0.0, |x| x.resource_ratio(topo)))
        .collect();
    order.sort_by(|a, b| ratios[*a].partial_cmp(&ratios[*b]).unwrap_or(Ordering::Equal));

    let mut accepted = 0;
    for idx in order {
        let chain = &mut chains[idx];
        let choice = chain
            .configurations
            .iter()
            .find(|c| validation::try_commit(topo, chain, c).is_ok())
            .cloned();
        if let Some(config) = choice {
            trace!("{}: accepted {}", chain.id(), config);
            chain.accepted = Some(config);
            accepted += 1;
        } else {
            debug!("{}: no configuration fits anymore", chain.id());
        }
    }
    debug!("Greedy rounding accepted {} chains", accepted);

    if accepted == 0 {
        warn!("Greedy rounding accepted no chain, using the PARC heuristic");
        place_greedy(topo, chains, GreedyVariant::Parc, model)
    } else {
        accepted
    }
}

fn round_randomized(topo: &mut Topology, chains: &mut [Chain], seed: u64) -> usize {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut accepted = 0;
    for idx in demand_order(chains) {
        let chain = &mut chains[idx];
        let choice = chain
            .configurations
            .iter()
            .find(|c| rng.gen::<f64>() < c.value && validation::try_commit(topo, chain, c).is_ok())
            .cloned();
        if let Some(config) = choice {
            trace!("{}: accepted {}", chain.id(), config);
            chain.accepted = Some(config);
            accepted += 1;
        }
    }
    debug!("Randomized rounding accepted {} chains", accepted);
    accepted
}

/// Statistics of the recursive refinement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefinementReport {
    /// Number of solved relaxations
    pub passes: usize,
    /// Number of chains accepted after each pass (cumulative)
    pub accepted: Vec<usize>,
    /// Results of all relaxations. The first one is an upper bound on the objective.
    pub relaxations: Vec<RelaxationResult>,
    /// Accumulated statistics of the configuration search
    pub generation: GenerationReport,
}

impl RefinementReport {
    /// Total number of accepted chains
    pub fn num_accepted(&self) -> usize {
        self.accepted.last().copied().unwrap_or(0)
    }
}

/// Recursive refinement: generate configurations, solve the relaxation and round it on the
/// residual topology, until a pass does not accept any new chain. `k` decreases geometrically
/// from pass to pass, down to `k_min`. A failing solver ends the refinement, keeping all chains
/// accepted so far.
///
/// Returns the residual topology and the statistics. The given topology is not modified.
pub fn refine<S>(
    topo: &Topology,
    chains: &mut [Chain],
    params: &PlanningParameters,
    solver: &S,
) -> (Topology, RefinementReport)
where
    S: LpSolver + ?Sized,
{
    let mut residual = topo.clone();
    let mut report = RefinementReport::default();
    let mut k = params.k;
    let mut total = chains.iter().filter(|c| c.is_accepted()).count();

    loop {
        let pending: Vec<usize> =
            (0..chains.len()).filter(|i| !chains[*i].is_accepted()).collect();
        if pending.is_empty() {
            break;
        }
        let mut batch: Vec<Chain> = pending
            .iter()
            .map(|i| {
                let mut c = chains[*i].clone();
                c.configurations.clear();
                c
            })
            .collect();

        info!("Refinement pass {}: {} chains, k = {}", report.passes + 1, batch.len(), k);
        report.generation +=
            generate_all(&residual, &mut batch, &params.generator_options(k), params.num_threads);
        k = params.next_k(k);

        let relaxation = match relax(&residual, &mut batch, params.objective_epsilon(), solver) {
            Ok(r) => r,
            Err(e) => {
                error!("Relaxation failed in pass {}: {}", report.passes + 1, e);
                break;
            }
        };
        report.relaxations.push(relaxation);

        let policy = match params.rounding_policy {
            RoundingPolicy::Randomized { seed } => {
                RoundingPolicy::Randomized { seed: seed.wrapping_add(report.passes as u64) }
            }
            p => p,
        };
        let accepted = round(&mut residual, &mut batch, policy, params.latency_model);
        report.passes += 1;
        total += accepted;
        report.accepted.push(total);
        info!("Pass {} accepted {} chains ({} in total)", report.passes, accepted, total);

        for (idx, chain) in pending.into_iter().zip(batch.into_iter()) {
            chains[idx] = chain;
        }
        if accepted == 0 {
            break;
        }
    }

    (residual, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Stage;
    use crate::example_networks::*;
    use crate::relaxation::{LinearProgram, LpSolution, MinilpSolver};
    use crate::validation::validate_assignment;
    use crate::Error;

    fn prepared<N: ExampleNetwork>(variant: usize, num_chains: usize) -> (Topology, Vec<Chain>) {
        let net = N::net(variant);
        let mut chains = N::chains(&net, num_chains);
        let params = PlanningParameters::default().with_time_budget(None).with_num_threads(1);
        generate_all(&net, &mut chains, &params.generator_options(params.k), 1);
        relax(&net, &mut chains, None, &MinilpSolver).unwrap();
        (net, chains)
    }

    /// Solver that always fails
    struct FailingSolver;

    impl LpSolver for FailingSolver {
        fn solve(&self, _: &LinearProgram) -> Result<LpSolution, Error> {
            Err(Error::SolverError(String::from("failure")))
        }
    }

    #[test]
    fn threshold_rounding_line_net() {
        let (net, mut chains) = prepared::<LineNet>(0, 1);
        let mut topo = net.clone();
        let accepted =
            round(&mut topo, &mut chains, RoundingPolicy::Threshold, LatencyModel::Colocated);
        assert_eq!(accepted, 1);
        let b = net.get_node_id("B").unwrap();
        assert_eq!(chains[0].accepted.as_ref().unwrap().node_usage.get(&b), Some(&80.0));
    }

    #[test]
    fn threshold_rolls_back_joint_violations() {
        let (net, mut chains) = prepared::<LineNet>(0, 2);
        // pretend that both chains got an integral value
        for chain in chains.iter_mut() {
            for c in chain.configurations.iter_mut() {
                c.value = 1.0;
            }
        }
        let mut topo = net.clone();
        let accepted =
            round(&mut topo, &mut chains, RoundingPolicy::Threshold, LatencyModel::Colocated);
        assert_eq!(accepted, 1);
        assert_eq!(validate_assignment(&net, &chains), Ok(()));
    }

    #[test]
    fn threshold_falls_back_to_greedy_rounding() {
        let (net, mut chains) = prepared::<LineNet>(0, 1);
        for c in chains[0].configurations.iter_mut() {
            c.value = 0.5;
        }
        let mut topo = net.clone();
        let accepted =
            round(&mut topo, &mut chains, RoundingPolicy::Threshold, LatencyModel::Colocated);
        assert_eq!(accepted, 1);
        assert_eq!(chains[0].accepted.as_ref().unwrap().value, 0.5);
        let b = net.get_node_id("B").unwrap();
        assert_eq!(topo.capacity(b), 20.0);
    }

    #[test]
    fn greedy_rounding_falls_back_to_the_heuristic() {
        let net = DiamondNet::net(0);
        let mut chains = DiamondNet::chains(&net, 1);
        let params = PlanningParameters::default().with_time_budget(None);
        generate_all(&net, &mut chains, &params.generator_options(params.k), 1);
        let s1 = net.get_node_id("s1").unwrap();
        let s2 = net.get_node_id("s2").unwrap();
        chains[0].configurations.retain(|c| c.hosts().contains(&s1));
        chains[0].configurations.iter_mut().for_each(|c| c.value = 1.0);
        assert!(!chains[0].configurations.is_empty());

        // no candidate fits anymore, only the heuristic can place the chain on s2
        let mut topo = net.clone();
        topo.consume_capacity(s1, 100.0);
        for policy in [RoundingPolicy::Threshold, RoundingPolicy::Greedy].iter() {
            let mut topo = topo.clone();
            let mut chains = chains.clone();
            let accepted = round(&mut topo, &mut chains, *policy, LatencyModel::Colocated);
            assert_eq!(accepted, 1, "{:?}", policy);
            assert_eq!(chains[0].accepted.as_ref().unwrap().hosts(), vec![s2]);
            assert_eq!(topo.capacity(s2), 40.0);
        }
    }

    #[test]
    fn threshold_commits_small_chains_first() {
        let net = LineNet::net(0);
        let a = net.get_node_id("A").unwrap();
        let c = net.get_node_id("C").unwrap();
        // only one of the two chains fits onto B
        let large = vec![Stage::new(1.0, 40.0), Stage::new(1.0, 40.0)];
        let small = vec![Stage::new(1.0, 30.0), Stage::new(1.0, 30.0)];
        let mut chains = vec![
            Chain::new(0, large, a, c, 10.0, 100.0).unwrap(),
            Chain::new(1, small, a, c, 10.0, 100.0).unwrap(),
        ];
        let params = PlanningParameters::default().with_time_budget(None);
        generate_all(&net, &mut chains, &params.generator_options(params.k), 1);
        for chain in chains.iter_mut() {
            assert!(!chain.configurations.is_empty());
            chain.configurations.iter_mut().for_each(|x| x.value = 1.0);
        }

        let mut topo = net.clone();
        let accepted =
            round(&mut topo, &mut chains, RoundingPolicy::Threshold, LatencyModel::Colocated);
        assert_eq!(accepted, 1);
        assert!(!chains[0].is_accepted());
        assert!(chains[1].is_accepted());
        assert_eq!(topo.capacity(net.get_node_id("B").unwrap()), 40.0);
    }

    #[test]
    fn greedy_rounding_prefers_high_values() {
        let (net, mut chains) = prepared::<DiamondNet>(0, 4);
        let mut topo = net.clone();
        let accepted =
            round(&mut topo, &mut chains, RoundingPolicy::Greedy, LatencyModel::Colocated);
        assert!(accepted >= 1);
        assert_eq!(validate_assignment(&net, &chains), Ok(()));
        for chain in chains.iter() {
            assert!(chain.configurations.windows(2).all(|w| w[0].value >= w[1].value));
        }
    }

    #[test]
    fn randomized_rounding_is_deterministic() {
        let policy = RoundingPolicy::Randomized { seed: 7 };
        let (net, chains) = prepared::<DiamondNet>(0, 4);
        let mut a = chains.clone();
        let mut b = chains;
        let mut ta = net.clone();
        let mut tb = net.clone();
        let na = round(&mut ta, &mut a, policy, LatencyModel::Colocated);
        let nb = round(&mut tb, &mut b, policy, LatencyModel::Colocated);
        assert_eq!(na, nb);
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.accepted, y.accepted);
        }
        assert_eq!(validate_assignment(&net, &a), Ok(()));
    }

    #[test]
    fn refinement_fills_the_network() {
        for policy in [RoundingPolicy::Threshold, RoundingPolicy::Greedy].iter() {
            let net = DiamondNet::net(0);
            let mut chains = DiamondNet::chains(&net, 4);
            let params = PlanningParameters::default()
                .with_time_budget(None)
                .with_num_threads(1)
                .with_rounding_policy(*policy);
            let (residual, report) = refine(&net, &mut chains, &params, &MinilpSolver);
            assert_eq!(report.num_accepted(), 3);
            assert!(report.accepted.windows(2).all(|w| w[0] <= w[1]));
            assert!(report.passes <= chains.len() + 1);
            assert_eq!(validate_assignment(&net, &chains), Ok(()));
            let s1 = net.get_node_id("s1").unwrap();
            let s2 = net.get_node_id("s2").unwrap();
            assert!(residual.capacity(s1) + residual.capacity(s2) < 60.0);
        }
    }

    #[test]
    fn solver_failure_ends_the_refinement() {
        let net = LineNet::net(0);
        let mut chains = LineNet::chains(&net, 1);
        let params = PlanningParameters::default().with_time_budget(None).with_num_threads(1);
        let (residual, report) = refine(&net, &mut chains, &params, &FailingSolver);
        assert_eq!(report.passes, 0);
        assert_eq!(report.num_accepted(), 0);
        assert!(!chains[0].is_accepted());
        let b = net.get_node_id("B").unwrap();
        assert_eq!(residual.capacity(b), 100.0);
    }

    #[test]
    fn k_decays_to_the_floor() {
        let params = PlanningParameters::default();
        let mut k = params.k;
        let mut steps = 0;
        while k > params.k_min {
            let next = params.next_k(k);
            assert!(next < k);
            k = next;
            steps += 1;
        }
        assert_eq!(k, params.k_min);
        assert_eq!(params.next_k(k), params.k_min);
        assert!(steps > 5);
    }
}
