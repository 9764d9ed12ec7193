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

//! # Planner
//!
//! Top level entry points. [`optimize`] runs the recursive refinement (generation, relaxation and
//! rounding on the residual problem), and [`greedy`] runs one of the greedy heuristics. Both
//! treat the chains as a fresh batch: previous results stored on the chains are discarded, and
//! the given topology is never modified. Use [`reduce`] to obtain the residual topology of an
//! assignment, in order to place the next batch of chains.
//!
//! The result of both algorithms is evaluated against the original topology (see
//! [`Assignment`]).

use crate::chain::Chain;
use crate::generator::{GenerationMode, GenerationReport, GeneratorOptions};
use crate::heuristics::{place_greedy, GreedyVariant};
use crate::parallelism::LatencyModel;
use crate::relaxation::LpSolver;
use crate::rounding::{refine, RoundingPolicy};
use crate::topology::{Link, NodeId, Topology};

use log::*;
use std::collections::BTreeMap;
use std::time::Duration;

/// All tunable parameters of the placement algorithms
#[derive(Debug, Clone, PartialEq)]
pub struct PlanningParameters {
    /// Initial number of configurations generated per chain
    pub k: usize,
    /// Lower bound of `k` during the refinement
    pub k_min: usize,
    /// Factor by which `k` is reduced after every pass of the refinement
    pub k_decay: f64,
    /// Time budget of the configuration search per chain
    pub time_budget: Option<Duration>,
    /// Maximum number of expanded search nodes per chain
    pub search_budget: usize,
    /// Maximum number of nodes on a route of the frontier search
    pub route_length_limit: usize,
    /// Weight of the latency in the objective
    pub epsilon: f64,
    /// Use `1 - epsilon * latency` as objective weight of a configuration (and subtract
    /// `epsilon * latency` of all accepted chains from the evaluated objective).
    pub weighted_objective: bool,
    /// Mode of the configuration search
    pub generation_mode: GenerationMode,
    /// Rounding policy of the refinement
    pub rounding_policy: RoundingPolicy,
    /// How the effective latency is computed
    pub latency_model: LatencyModel,
    /// Generate configurations for the merged stages of every chain
    pub parallel_aware: bool,
    /// Number of threads used to generate configurations
    pub num_threads: usize,
}

impl Default for PlanningParameters {
    fn default() -> Self {
        Self {
            k: 1024,
            k_min: 16,
            k_decay: 2.0 / 3.0,
            time_budget: Some(Duration::from_secs(3)),
            search_budget: 256 * 1024,
            route_length_limit: 15,
            epsilon: 0.33,
            weighted_objective: false,
            generation_mode: GenerationMode::default(),
            rounding_policy: RoundingPolicy::default(),
            latency_model: LatencyModel::default(),
            parallel_aware: false,
            num_threads: num_cpus::get(),
        }
    }
}

impl PlanningParameters {
    /// Set the initial number of configurations per chain
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    /// Set the lower bound of `k`
    pub fn with_k_min(mut self, k_min: usize) -> Self {
        self.k_min = k_min;
        self
    }

    /// Set the time budget of the configuration search
    pub fn with_time_budget(mut self, time_budget: Option<Duration>) -> Self {
        self.time_budget = time_budget;
        self
    }

    /// Set the search budget of the configuration search
    pub fn with_search_budget(mut self, search_budget: usize) -> Self {
        self.search_budget = search_budget;
        self
    }

    /// Weight the objective with `1 - epsilon * latency`
    pub fn with_weighted_objective(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self.weighted_objective = true;
        self
    }

    /// Set the generation mode
    pub fn with_generation_mode(mut self, mode: GenerationMode) -> Self {
        self.generation_mode = mode;
        self
    }

    /// Set the rounding policy
    pub fn with_rounding_policy(mut self, policy: RoundingPolicy) -> Self {
        self.rounding_policy = policy;
        self
    }

    /// Set the latency model
    pub fn with_latency_model(mut self, model: LatencyModel) -> Self {
        self.latency_model = model;
        self
    }

    /// Generate the configurations for the merged stages
    pub fn with_parallel_aware(mut self, parallel_aware: bool) -> Self {
        self.parallel_aware = parallel_aware;
        self
    }

    /// Set the number of threads used for generating configurations
    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    /// Options of the configuration search, with at most `k` configurations per chain.
    pub fn generator_options(&self, k: usize) -> GeneratorOptions {
        GeneratorOptions {
            mode: self.generation_mode,
            k,
            time_budget: self.time_budget,
            search_budget: self.search_budget,
            route_length_limit: self.route_length_limit,
            latency_model: self.latency_model,
            parallel_aware: self.parallel_aware,
        }
    }

    /// The latency weight of the objective, if enabled.
    pub fn objective_epsilon(&self) -> Option<f64> {
        if self.weighted_objective {
            Some(self.epsilon)
        } else {
            None
        }
    }

    /// `k` of the next refinement pass
    pub fn next_k(&self, k: usize) -> usize {
        ((k as f64 * self.k_decay).floor() as usize).max(self.k_min)
    }
}

/// Evaluated result of a placement algorithm
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Assignment {
    /// Number of accepted chains, minus `epsilon` times their latency if the objective is
    /// weighted.
    pub objective: f64,
    /// Number of accepted chains
    pub accepted: usize,
    /// Number of chains
    pub total: usize,
    /// Average effective latency of the accepted chains
    pub average_latency: f64,
    /// Fraction of the capacity used on every node with a capacity
    pub node_utilization: BTreeMap<NodeId, f64>,
    /// Mean of `node_utilization`
    pub mean_utilization: f64,
    /// Fraction of the bandwidth used on every link with a bandwidth
    pub link_utilization: BTreeMap<Link, f64>,
    /// Objective of the first relaxation, which is an upper bound on the number of accepted
    /// chains. `None` for the greedy heuristics, or if the solver failed.
    pub lp_bound: Option<f64>,
    /// Number of relaxation passes
    pub passes: usize,
    /// Statistics of the configuration search
    pub generation: GenerationReport,
}

impl Assignment {
    /// Evaluate the accepted configurations of `chains` on the original topology.
    pub fn evaluate(topo: &Topology, chains: &[Chain], epsilon: Option<f64>) -> Self {
        let accepted: Vec<_> = chains.iter().filter_map(|c| c.accepted.as_ref()).collect();
        let latency_sum: f64 = accepted.iter().map(|c| c.latency).sum();

        let mut node_usage: BTreeMap<NodeId, f64> = BTreeMap::new();
        let mut link_usage: BTreeMap<Link, f64> = BTreeMap::new();
        for config in accepted.iter() {
            for (node, usage) in config.node_usage.iter() {
                *node_usage.entry(*node).or_insert(0.0) += usage;
            }
            for (link, demand) in config.link_demands() {
                *link_usage.entry(link).or_insert(0.0) += demand;
            }
        }

        let node_utilization: BTreeMap<NodeId, f64> = topo
            .servers()
            .into_iter()
            .map(|n| (n, node_usage.get(&n).copied().unwrap_or(0.0) / topo.capacity(n)))
            .collect();
        let link_utilization: BTreeMap<Link, f64> = topo
            .links()
            .filter(|(_, data)| data.bandwidth > 0.0)
            .map(|(l, data)| (l, link_usage.get(&l).copied().unwrap_or(0.0) / data.bandwidth))
            .collect();

        Self {
            objective: accepted.len() as f64 - epsilon.unwrap_or(0.0) * latency_sum,
            accepted: accepted.len(),
            total: chains.len(),
            average_latency: mean(latency_sum, accepted.len()),
            mean_utilization: mean(node_utilization.values().sum(), node_utilization.len()),
            node_utilization,
            link_utilization,
            lp_bound: None,
            passes: 0,
            generation: GenerationReport::default(),
        }
    }
}

fn mean(sum: f64, n: usize) -> f64 {
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// Place the chains by recursive refinement of the relaxation.
pub fn optimize<S>(
    topo: &Topology,
    chains: &mut [Chain],
    params: &PlanningParameters,
    solver: &S,
) -> Assignment
where
    S: LpSolver + ?Sized,
{
    chains.iter_mut().for_each(|c| c.clear());
    let (_, report) = refine(topo, chains, params, solver);
    let mut result = Assignment::evaluate(topo, chains, params.objective_epsilon());
    result.lp_bound = report.relaxations.first().map(|r| r.lp_objective);
    result.passes = report.passes;
    result.generation = report.generation;
    info!(
        "Optimization accepted {} of {} chains (objective {:.3}, bound {:?})",
        result.accepted, result.total, result.objective, result.lp_bound
    );
    result
}

/// Place the chains with a greedy heuristic.
pub fn greedy(
    topo: &Topology,
    chains: &mut [Chain],
    params: &PlanningParameters,
    variant: GreedyVariant,
) -> Assignment {
    chains.iter_mut().for_each(|c| c.clear());
    let mut work = topo.clone();
    place_greedy(&mut work, chains, variant, params.latency_model);
    let result = Assignment::evaluate(topo, chains, params.objective_epsilon());
    info!(
        "Greedy ({:?}) accepted {} of {} chains (objective {:.3})",
        variant, result.accepted, result.total, result.objective
    );
    result
}

/// Residual topology after subtracting the resources of all accepted configurations.
pub fn reduce(topo: &Topology, chains: &[Chain]) -> Topology {
    let mut residual = topo.clone();
    for config in chains.iter().filter_map(|c| c.accepted.as_ref()) {
        for (node, usage) in config.node_usage.iter() {
            residual.consume_capacity(*node, *usage);
        }
        for (link, demand) in config.link_demands() {
            residual.consume_bandwidth(link, demand);
        }
    }
    residual
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::example_networks::*;
    use crate::relaxation::MinilpSolver;
    use assert_approx_eq::assert_approx_eq;

    fn params() -> PlanningParameters {
        PlanningParameters::default().with_time_budget(None).with_num_threads(1)
    }

    #[test]
    fn default_parameters() {
        let p = PlanningParameters::default();
        assert_eq!(p.k, 1024);
        assert_eq!(p.k_min, 16);
        assert_eq!(p.search_budget, 262_144);
        assert_eq!(p.time_budget, Some(Duration::from_secs(3)));
        assert_eq!(p.objective_epsilon(), None);
        assert_eq!(p.with_weighted_objective(0.1).objective_epsilon(), Some(0.1));
        let options = params().with_k_min(4).generator_options(7);
        assert_eq!(options.k, 7);
        assert_eq!(options.time_budget, None);
    }

    #[test]
    fn evaluate_line_net() {
        let net = LineNet::net(0);
        let mut chains = LineNet::chains(&net, 1);
        let result = optimize(&net, &mut chains, &params(), &MinilpSolver);
        let b = net.get_node_id("B").unwrap();
        assert_eq!(result.accepted, 1);
        assert_eq!(result.total, 1);
        assert_approx_eq!(result.objective, 1.0);
        assert_approx_eq!(result.average_latency, 3.0);
        assert_approx_eq!(result.node_utilization[&b], 0.8);
        assert_approx_eq!(result.mean_utilization, 0.8);
        // each direction is tracked separately, the chain only uses the forward links
        assert_eq!(result.link_utilization.len(), 4);
        assert_approx_eq!(result.link_utilization.values().sum::<f64>(), 0.4);
        assert_approx_eq!(result.lp_bound.unwrap(), 1.0, 1e-6);
        assert!(result.passes >= 1);
    }

    #[test]
    fn weighted_objective() {
        let net = LineNet::net(0);
        let mut chains = LineNet::chains(&net, 1);
        let p = params().with_weighted_objective(0.1);
        let result = greedy(&net, &mut chains, &p, GreedyVariant::Parc);
        assert_eq!(result.accepted, 1);
        assert_approx_eq!(result.objective, 1.0 - 0.1 * 3.0);
        assert_eq!(result.lp_bound, None);
    }

    #[test]
    fn previous_results_are_discarded() {
        let net = LineNet::net(0);
        let mut chains = LineNet::chains(&net, 2);
        let first = greedy(&net, &mut chains, &params(), GreedyVariant::Parc);
        let second = greedy(&net, &mut chains, &params(), GreedyVariant::Parc);
        assert_eq!(first, second);
        assert_eq!(second.accepted, 1);
    }

    #[test]
    fn reduce_and_place_the_next_batch() {
        let net = DiamondNet::net(0);
        let mut first = DiamondNet::chains(&net, 2);
        let result = greedy(&net, &mut first, &params(), GreedyVariant::Parc);
        assert_eq!(result.accepted, 2);

        let residual = reduce(&net, &first);
        let s1 = net.get_node_id("s1").unwrap();
        let s2 = net.get_node_id("s2").unwrap();
        assert_approx_eq!(residual.capacity(s1) + residual.capacity(s2), 80.0);

        let mut second = DiamondNet::chains(&net, 2);
        let result = optimize(&residual, &mut second, &params(), &MinilpSolver);
        assert_eq!(result.accepted, 1);
    }
}
