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

//! # Chain Model
//!
//! A [`Chain`] is an ordered sequence of [`Stage`]s, which must be placed on a route from the
//! chain's source to its destination. Every chain caches the result of the
//! [parallelism analysis](crate::parallelism) of its stages, and stores the candidate
//! configurations generated for it, as well as the configuration finally accepted.

use crate::configuration::Configuration;
use crate::parallelism::{LatencyModel, LatencyTable, ParallelismAnalysis};
use crate::topology::NodeId;
use crate::Error;

use std::collections::BTreeSet;
use std::fmt;

/// Identifier of a packet header field, which can be read or written by a stage.
pub type Field = u32;
/// Set of fields
pub type FieldSet = BTreeSet<Field>;

/// A single processing step of a chain (a virtual network function).
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    /// Processing latency
    pub latency: f64,
    /// Compute demand
    pub demand: f64,
    /// Fields read by the stage
    pub reads: FieldSet,
    /// Fields written by the stage
    pub writes: FieldSet,
}

impl Stage {
    /// Create a new stage which neither reads nor writes any field.
    pub fn new(latency: f64, demand: f64) -> Self {
        Self { latency, demand, reads: FieldSet::new(), writes: FieldSet::new() }
    }

    /// Add fields to the read set
    pub fn with_reads<I: IntoIterator<Item = Field>>(mut self, fields: I) -> Self {
        self.reads.extend(fields);
        self
    }

    /// Add fields to the write set
    pub fn with_writes<I: IntoIterator<Item = Field>>(mut self, fields: I) -> Self {
        self.writes.extend(fields);
        self
    }

    /// Merge two stages into one, which executes both concurrently. The merged stage takes the
    /// maximum latency, the sum of both demands and the union of the field sets.
    pub fn merge(&self, other: &Stage) -> Stage {
        Stage {
            latency: self.latency.max(other.latency),
            demand: self.demand + other.demand,
            reads: self.reads.union(&other.reads).copied().collect(),
            writes: self.writes.union(&other.writes).copied().collect(),
        }
    }
}

/// Unique chain identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChainId(pub usize);

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sfc{}", self.0)
    }
}

/// # Service Function Chain
#[derive(Debug, Clone)]
pub struct Chain {
    id: ChainId,
    stages: Vec<Stage>,
    source: NodeId,
    destination: NodeId,
    throughput: f64,
    latency_budget: f64,
    latency_sum: f64,
    demand_sum: f64,
    analysis: ParallelismAnalysis,
    runs: LatencyTable,
    /// Candidate configurations of the current planning pass
    pub configurations: Vec<Configuration>,
    /// The accepted configuration, if any
    pub accepted: Option<Configuration>,
}

impl Chain {
    /// Create a new chain. Returns an error if the throughput, the latency budget, or any stage
    /// latency or demand is negative or not finite.
    pub fn new(
        id: usize,
        stages: Vec<Stage>,
        source: NodeId,
        destination: NodeId,
        throughput: f64,
        latency_budget: f64,
    ) -> Result<Self, Error> {
        if !(throughput.is_finite() && throughput >= 0.0) {
            return Err(Error::InvalidChain(id, "throughput must be finite and non-negative"));
        }
        if latency_budget.is_nan() || latency_budget < 0.0 {
            return Err(Error::InvalidChain(id, "latency budget must be non-negative"));
        }
        if stages.iter().any(|s| {
            !(s.latency.is_finite() && s.demand.is_finite() && s.latency >= 0.0 && s.demand >= 0.0)
        }) {
            return Err(Error::InvalidChain(id, "stage latency and demand must be non-negative"));
        }
        Ok(Self::from_parts(ChainId(id), stages, source, destination, throughput, latency_budget))
    }

    fn from_parts(
        id: ChainId,
        stages: Vec<Stage>,
        source: NodeId,
        destination: NodeId,
        throughput: f64,
        latency_budget: f64,
    ) -> Self {
        let analysis = ParallelismAnalysis::analyze(&stages);
        let runs = LatencyTable::new(&stages);
        Self {
            id,
            latency_sum: stages.iter().map(|s| s.latency).sum(),
            demand_sum: stages.iter().map(|s| s.demand).sum(),
            stages,
            source,
            destination,
            throughput,
            latency_budget,
            analysis,
            runs,
            configurations: Vec::new(),
            accepted: None,
        }
    }

    /// Chain identifier
    pub fn id(&self) -> ChainId {
        self.id
    }

    /// The stages in order
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Number of stages
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns `true` if the chain has no stages
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Source node
    pub fn source(&self) -> NodeId {
        self.source
    }

    /// Destination node
    pub fn destination(&self) -> NodeId {
        self.destination
    }

    /// Throughput requirement, consumed on every link the chain traverses.
    pub fn throughput(&self) -> f64 {
        self.throughput
    }

    /// End-to-end latency budget
    pub fn latency_budget(&self) -> f64 {
        self.latency_budget
    }

    /// Sum of all stage latencies
    pub fn latency_sum(&self) -> f64 {
        self.latency_sum
    }

    /// Sum of all stage demands
    pub fn demand_sum(&self) -> f64 {
        self.demand_sum
    }

    /// Largest single stage demand (zero for an empty chain)
    pub fn max_stage_demand(&self) -> f64 {
        self.stages.iter().map(|s| s.demand).fold(0.0, f64::max)
    }

    /// Smallest single stage demand (zero for an empty chain)
    pub fn min_stage_demand(&self) -> f64 {
        self.stages
            .iter()
            .map(|s| s.demand)
            .fold(None, |m: Option<f64>, d| Some(m.map_or(d, |m| m.min(d))))
            .unwrap_or(0.0)
    }

    /// Result of the parallelism analysis of the stages
    pub fn analysis(&self) -> &ParallelismAnalysis {
        &self.analysis
    }

    /// Processing latency (without transit latency) of the stages with the given placement.
    pub fn processing_latency(&self, placement: &[usize], model: LatencyModel) -> f64 {
        match model {
            LatencyModel::Sequential => self.latency_sum,
            LatencyModel::Colocated => self.runs.colocated(placement),
            LatencyModel::ChainOptimal => self.analysis.latency,
        }
    }

    /// Lower bound of the processing latency over all possible placements.
    pub fn min_processing_latency(&self, model: LatencyModel) -> f64 {
        match model {
            LatencyModel::Sequential => self.latency_sum,
            LatencyModel::Colocated | LatencyModel::ChainOptimal => self.analysis.latency,
        }
    }

    /// The chain consisting of the merged stages of the parallelism analysis. It has the same
    /// identifier, endpoints and requirements, but no configurations.
    pub fn merged(&self) -> Chain {
        Self::from_parts(
            self.id,
            self.analysis.merged.clone(),
            self.source,
            self.destination,
            self.throughput,
            self.latency_budget,
        )
    }

    /// Returns `true` if a configuration was accepted for this chain.
    pub fn is_accepted(&self) -> bool {
        self.accepted.is_some()
    }

    /// Reset the chain by removing all candidate configurations and the accepted one.
    pub fn clear(&mut self) {
        self.configurations.clear();
        self.accepted = None;
    }
}
