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

//! Module containing all error types

use crate::topology::NodeId;
use thiserror::Error;

/// Main error type
#[derive(Debug, Error, PartialEq)]
pub enum Error {
    /// Node is not present in the topology
    #[error("Node was not found in the topology: {0:?}")]
    NodeNotFound(NodeId),
    /// Node name is not present in the topology
    #[error("Node name was not found in the topology: {0}")]
    NodeNameNotFound(String),
    /// A link or node property is invalid (negative capacity, bandwidth or latency)
    #[error("Invalid topology: {0}")]
    TopologyError(String),
    /// The chain cannot be used for placement
    #[error("Invalid chain {0}: {1}")]
    InvalidChain(usize, &'static str),
    /// The solver reported an infeasible or unbounded linear program
    #[error("The linear program has no solution")]
    NoSolution,
    /// The solver failed for some other reason
    #[error("Solver Error: {0}")]
    SolverError(String),
}
