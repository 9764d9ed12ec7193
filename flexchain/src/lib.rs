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

#![deny(missing_docs)]

//! # FlexChain: Parallelism-Aware Placement of Service Function Chains
//! This is a library for placing service function chains onto a network of servers and switches,
//! exploiting the parallelism between the stages of every chain.
//!
//! ## Problem Statement
//! Given
//! - a topology of nodes with a compute capacity, connected by links with a bandwidth and a
//!   latency,
//! - a set of chains, each with a source, a destination, a throughput, a latency budget and an
//!   ordered list of stages (with compute demand, processing latency and the packet fields they
//!   read and write),
//!
//! accept as many chains as possible, choosing for every accepted chain a route and a placement
//! of its stages on the servers along that route, such that no capacity or bandwidth is exceeded
//! and the latency budget of every chain holds.
//!
//! ## Structure
//!
//! - **[`Topology`](topology)**: The network, with residual resources and route search. Shortest
//!   paths are cached in an explicit [`PathCache`](topology::PathCache).
//!
//! - **[`Chain`](chain)** and **[`Parallelism`](parallelism)**: Chains of stages, and the analysis
//!   which adjacent stages can be executed concurrently. The
//!   [`ParallelismAnalysis`](parallelism::ParallelismAnalysis) finds the grouping of stages with
//!   the lowest processing latency.
//!
//! - **[`Configuration`](configuration)** and **[`Validation`](validation)**: A candidate route
//!   and placement of a chain, and the checks of configurations against the remaining resources.
//!
//! - **[`Generator`](generator)**: Enumerates the candidate configurations of every chain, in one
//!   of several [modes](generator::GenerationMode), bounded by a search budget. It also contains
//!   the greedy [constructor](generator::construct) for a single configuration.
//!
//! - **[`Relaxation`](relaxation)**: Formulates the selection of configurations as a linear
//!   program, and solves it using any [`LpSolver`](relaxation::LpSolver).
//!
//! - **[`Rounding`](rounding)**: Turns the fractional solution into accepted configurations, and
//!   refines the result recursively on the residual problem.
//!
//! - **[`Heuristics`](heuristics)**: Greedy placement of all chains, without the relaxation.
//!
//! - **[`Planner`](planner)**: Entry points running the algorithms, with all
//!   [parameters](planner::PlanningParameters), and the evaluation of the result.
//!
//! - **[`ExampleNetworks`](example_networks)**: Small prepared networks and chains.
//!
//! ## Usage
//!
//! ```
//! use flexchain::example_networks::*;
//! use flexchain::planner::{optimize, PlanningParameters};
//! use flexchain::relaxation::MinilpSolver;
//!
//! // prepare the topology and the chains
//! let net = DiamondNet::net(0);
//! let mut chains = DiamondNet::chains(&net, 4);
//!
//! // place the chains
//! let result = optimize(&net, &mut chains, &PlanningParameters::default(), &MinilpSolver);
//!
//! // only three of the four chains fit onto the network
//! assert_eq!(result.accepted, 3);
//! ```

// test modules
pub mod example_networks;
mod test;

pub mod chain;
pub mod configuration;
mod error;
pub mod generator;
pub mod heuristics;
pub mod parallelism;
pub mod planner;
pub mod relaxation;
pub mod rounding;
pub mod topology;
pub mod validation;

pub use error::Error;
