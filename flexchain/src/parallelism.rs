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

//! # Parallelism Analyzer
//!
//! Two adjacent stages can be executed concurrently, if the later stage does not read any field
//! which the earlier stage writes (read-after-write hazard). Write-after-read and
//! write-after-write hazards can be resolved by copying the packet for the later stage, so they
//! still allow concurrent execution.
//!
//! The analyzer groups adjacent stages into concurrently executing clusters, such that the sum
//! of the cluster latencies (each cluster takes as long as its slowest stage) is minimal. The
//! search is a branch-and-bound over the decision "merge the current cluster with the next stage
//! or not", where the merge branch is explored first. Among groupings with equal latency, the
//! first one found is kept.

use crate::chain::Stage;

/// Result of the pairwise compatibility test of two adjacent stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compatibility {
    /// The later stage reads what the earlier stage writes. They must run in sequence.
    Forbidden,
    /// The stages can run concurrently, but the later stage needs a copy of the packet.
    Copy,
    /// The stages can run concurrently without any further cost.
    Merge,
}

impl Compatibility {
    /// Returns `true` if the stages may be merged into the same cluster.
    pub fn allows_merge(&self) -> bool {
        *self != Compatibility::Forbidden
    }
}

/// Compatibility of stage `a` with the stage `b` executed directly after it.
pub fn compatibility(a: &Stage, b: &Stage) -> Compatibility {
    if !a.writes.is_disjoint(&b.reads) {
        Compatibility::Forbidden
    } else if !a.reads.is_disjoint(&b.writes) || !a.writes.is_disjoint(&b.writes) {
        Compatibility::Copy
    } else {
        Compatibility::Merge
    }
}

/// How the processing latency of a placed chain is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LatencyModel {
    /// All stages run in sequence, the latency is the sum of all stage latencies.
    Sequential,
    /// Stages hosted on the same node (consecutive stages sharing a route position) are grouped
    /// optimally by the analyzer. Stages on different nodes never run concurrently.
    Colocated,
    /// The optimal latency of the whole chain, independent of the placement.
    ChainOptimal,
}

impl Default for LatencyModel {
    fn default() -> Self {
        Self::Colocated
    }
}

/// Output of the analyzer
#[derive(Debug, Clone, PartialEq)]
pub struct ParallelismAnalysis {
    /// Bit `i` is set if stage `i` and stage `i + 1` are in the same cluster. The vector has
    /// length `n - 1` (or zero for an empty chain).
    pub strategy: Vec<bool>,
    /// One merged stage per cluster
    pub merged: Vec<Stage>,
    /// Optimal end-to-end processing latency
    pub latency: f64,
    cluster_of: Vec<usize>,
}

impl ParallelismAnalysis {
    /// Compute the optimal grouping of the stages.
    pub fn analyze(stages: &[Stage]) -> Self {
        if stages.is_empty() {
            return Self {
                strategy: Vec::new(),
                merged: Vec::new(),
                latency: 0.0,
                cluster_of: Vec::new(),
            };
        }

        let n = stages.len();
        let mut suffix_max = vec![0.0f64; n + 1];
        for i in (0..n).rev() {
            suffix_max[i] = suffix_max[i + 1].max(stages[i].latency);
        }

        let mut search = Search {
            stages,
            suffix_max,
            strategy: Vec::with_capacity(n - 1),
            best_latency: f64::INFINITY,
            best_strategy: vec![false; n - 1],
        };
        search.step(1, 0.0, stages[0].clone());

        Self::from_strategy(stages, search.best_strategy)
    }

    /// Build the analysis from a given strategy, without checking that the merges are allowed.
    pub(crate) fn from_strategy(stages: &[Stage], strategy: Vec<bool>) -> Self {
        let mut merged: Vec<Stage> = Vec::new();
        let mut cluster_of: Vec<usize> = Vec::with_capacity(stages.len());
        for (i, stage) in stages.iter().enumerate() {
            match merged.last_mut() {
                Some(last) if i > 0 && strategy[i - 1] => *last = last.merge(stage),
                _ => merged.push(stage.clone()),
            }
            cluster_of.push(merged.len() - 1);
        }
        let latency = merged.iter().map(|s| s.latency).sum();
        Self { strategy, merged, latency, cluster_of }
    }

    /// Number of clusters
    pub fn num_clusters(&self) -> usize {
        self.merged.len()
    }

    /// Index of the cluster containing the original stage.
    pub fn cluster_of(&self, stage: usize) -> Option<usize> {
        self.cluster_of.get(stage).copied()
    }

    /// Expand a placement of the merged stages into a placement of the original stages. Every
    /// original stage gets the route position of its cluster. Returns `None` if the placement
    /// does not have one entry per cluster.
    pub fn expand_placement(&self, merged_placement: &[usize]) -> Option<Vec<usize>> {
        if merged_placement.len() != self.merged.len() {
            return None;
        }
        Some(self.cluster_of.iter().map(|c| merged_placement[*c]).collect())
    }
}

struct Search<'a> {
    stages: &'a [Stage],
    suffix_max: Vec<f64>,
    strategy: Vec<bool>,
    best_latency: f64,
    best_strategy: Vec<bool>,
}

impl<'a> Search<'a> {
    /// `closed` is the latency of all finished clusters, `current` is the open cluster and `next`
    /// the index of the next stage to decide on.
    fn step(&mut self, next: usize, closed: f64, current: Stage) {
        // every remaining stage either joins the open cluster or adds its own latency
        let bound = closed + current.latency.max(self.suffix_max[next]);
        if bound >= self.best_latency {
            return;
        }
        if next == self.stages.len() {
            self.best_latency = closed + current.latency;
            self.best_strategy = self.strategy.clone();
            return;
        }

        let stages = self.stages;
        let stage = &stages[next];
        if compatibility(&current, stage).allows_merge() {
            self.strategy.push(true);
            self.step(next + 1, closed, current.merge(stage));
            self.strategy.pop();
        }
        self.strategy.push(false);
        self.step(next + 1, closed + current.latency, stage.clone());
        self.strategy.pop();
    }
}

/// Optimal latencies of all contiguous runs of stages, used by [`LatencyModel::Colocated`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LatencyTable {
    runs: Vec<Vec<f64>>,
}

impl LatencyTable {
    /// Analyze every contiguous run of the stages.
    pub fn new(stages: &[Stage]) -> Self {
        let runs = (0..stages.len())
            .map(|i| {
                (i + 1..=stages.len())
                    .map(|j| ParallelismAnalysis::analyze(&stages[i..j]).latency)
                    .collect()
            })
            .collect();
        Self { runs }
    }

    /// Optimal latency of the stages `start..end`. Empty runs have zero latency.
    pub fn run(&self, start: usize, end: usize) -> f64 {
        if end <= start {
            return 0.0;
        }
        self.runs.get(start).and_then(|r| r.get(end - start - 1)).copied().unwrap_or(0.0)
    }

    /// Sum of the optimal run latencies, where a run is a maximal sequence of stages with the
    /// same route position.
    pub fn colocated(&self, placement: &[usize]) -> f64 {
        let mut total = 0.0;
        let mut start = 0;
        for i in 1..=placement.len() {
            if i == placement.len() || placement[i] != placement[start] {
                total += self.run(start, i);
                start = i;
            }
        }
        total
    }
}
