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

//! # Relaxed Optimization
//!
//! Formulates the selection of configurations as a linear program with one continuous variable
//! in `[0, 1]` per configuration. The program maximizes the (optionally latency weighted) sum of
//! all variables, subject to:
//!
//! - every chain selects at most one configuration in total,
//! - the compute usage on every node is within its capacity,
//! - the traffic on every directed link is within its bandwidth.
//!
//! The program is described by a solver independent [`LinearProgram`], and solved by any
//! [`LpSolver`]. After solving, the fractional values are written back to the configurations
//! (see [`Configuration::value`](crate::configuration::Configuration::value)), and all
//! configurations with a value of zero are removed from the candidate sets.

mod solver;

pub use solver::{LpSolution, LpSolver, MinilpSolver};

use crate::chain::Chain;
use crate::topology::{Link, NodeId, Topology, TOLERANCE};
use crate::Error;

use log::*;
use std::collections::BTreeMap;

/// A single constraint of the form `sum(coefficient * x[variable]) <= rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraint {
    /// Name of the constraint, used for logging.
    pub name: String,
    /// Pairs of variable index and coefficient
    pub terms: Vec<(usize, f64)>,
    /// Right hand side
    pub rhs: f64,
}

/// Linear program with variables bounded to `[0, 1]` and a maximization objective.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LinearProgram {
    /// Objective coefficient of every variable
    pub objective: Vec<f64>,
    /// All constraints
    pub constraints: Vec<LinearConstraint>,
}

impl LinearProgram {
    /// Number of variables
    pub fn num_variables(&self) -> usize {
        self.objective.len()
    }

    /// Evaluate the objective function for the given variable assignment.
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.objective.iter().zip(values.iter()).map(|(c, x)| c * x).sum()
    }
}

/// Linear program together with the mapping from variables to configurations.
#[derive(Debug, Clone)]
pub struct Formulation {
    /// The linear program
    pub program: LinearProgram,
    /// For every variable, the index of the chain and the index of the configuration in
    /// `chain.configurations`.
    pub columns: Vec<(usize, usize)>,
}

/// Summary of a solved relaxation
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RelaxationResult {
    /// Objective value of the linear program, which is an upper bound on the objective of any
    /// integral assignment of the same configurations.
    pub lp_objective: f64,
    /// Number of variables (configurations) in the program
    pub num_variables: usize,
    /// Number of constraints in the program
    pub num_constraints: usize,
    /// Number of chains which still have a candidate after pruning
    pub chains_with_candidates: usize,
    /// Sum of `value * latency` over all remaining candidates, divided by
    /// `chains_with_candidates`.
    pub fractional_latency: f64,
}

/// Build the linear program for all chains which are not yet accepted. If `epsilon` is set, the
/// objective coefficient of a configuration is `1 - epsilon * latency`, otherwise `1`.
pub fn formulate(topo: &Topology, chains: &[Chain], epsilon: Option<f64>) -> Formulation {
    let mut program = LinearProgram::default();
    let mut columns = Vec::new();

    let mut node_terms: BTreeMap<NodeId, Vec<(usize, f64)>> = BTreeMap::new();
    let mut link_terms: BTreeMap<Link, Vec<(usize, f64)>> = BTreeMap::new();

    for (chain_idx, chain) in chains.iter().enumerate() {
        if chain.is_accepted() || chain.configurations.is_empty() {
            continue;
        }
        let mut chain_terms = Vec::with_capacity(chain.configurations.len());
        for (config_idx, config) in chain.configurations.iter().enumerate() {
            let var = columns.len();
            columns.push((chain_idx, config_idx));
            program.objective.push(match epsilon {
                Some(eps) => 1.0 - eps * config.latency,
                None => 1.0,
            });
            chain_terms.push((var, 1.0));
            for (node, usage) in config.node_usage.iter() {
                node_terms.entry(*node).or_default().push((var, *usage));
            }
            for (link, demand) in config.link_demands() {
                link_terms.entry(link).or_default().push((var, demand));
            }
        }
        program.constraints.push(LinearConstraint {
            name: format!("chain {}", chain.id()),
            terms: chain_terms,
            rhs: 1.0,
        });
    }

    for (node, terms) in node_terms {
        program.constraints.push(LinearConstraint {
            name: format!("node {}", topo.get_node_name(node).unwrap_or("?")),
            terms,
            rhs: topo.capacity(node),
        });
    }

    for ((a, b), terms) in link_terms {
        program.constraints.push(LinearConstraint {
            name: format!("link {}->{}", a.index(), b.index()),
            terms,
            rhs: topo.link(a, b).map(|l| l.bandwidth).unwrap_or(0.0),
        });
    }

    Formulation { program, columns }
}

/// Write the values of the solution back onto the configurations, and remove all
/// configurations with a value of zero.
pub fn apply_solution(chains: &mut [Chain], formulation: &Formulation, solution: &LpSolution) {
    for (var, (chain_idx, config_idx)) in formulation.columns.iter().enumerate() {
        let value = solution.values.get(var).copied().unwrap_or(0.0);
        chains[*chain_idx].configurations[*config_idx].value = value;
    }
    for chain in chains.iter_mut() {
        if chain.is_accepted() {
            continue;
        }
        chain.configurations.retain(|c| c.value > TOLERANCE);
    }
}

/// Formulate and solve the relaxation, and write the values back to the configurations.
pub fn relax<S>(
    topo: &Topology,
    chains: &mut [Chain],
    epsilon: Option<f64>,
    solver: &S,
) -> Result<RelaxationResult, Error>
where
    S: LpSolver + ?Sized,
{
    let formulation = formulate(topo, chains, epsilon);
    info!(
        "Solving LP with {} variables and {} constraints",
        formulation.program.num_variables(),
        formulation.program.constraints.len()
    );

    let solution = solver.solve(&formulation.program)?;
    apply_solution(chains, &formulation, &solution);

    let pending = chains.iter().filter(|c| !c.is_accepted());
    let chains_with_candidates = pending.clone().filter(|c| !c.configurations.is_empty()).count();
    let weighted_latency: f64 = pending
        .flat_map(|c| c.configurations.iter())
        .map(|c| c.value * c.latency)
        .sum();
    let fractional_latency = if chains_with_candidates > 0 {
        weighted_latency / chains_with_candidates as f64
    } else {
        0.0
    };

    let result = RelaxationResult {
        lp_objective: solution.objective,
        num_variables: formulation.program.num_variables(),
        num_constraints: formulation.program.constraints.len(),
        chains_with_candidates,
        fractional_latency,
    };
    info!(
        "LP objective: {:.3} ({} chains with candidates, {:.3} fractional latency)",
        result.lp_objective, result.chains_with_candidates, result.fractional_latency
    );
    Ok(result)
}
