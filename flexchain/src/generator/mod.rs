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

//! # Configuration Generator
//!
//! This module enumerates candidate configurations for a chain on a given topology. Every
//! configuration returned is feasible on its own: the effective latency is within the budget of
//! the chain, and the resources used by this single configuration fit into the topology.
//!
//! ## Modes
//!
//! - **[`GenerationMode::Frontier`]**: Grow routes breadth-first from the source. A route is
//!   accepted once it reaches the destination with enough total capacity on its servers. Then,
//!   all non-decreasing placements of the stages onto the servers of that route are enumerated.
//!   Servers never appear twice on a route. A switch may only be visited again if a server was
//!   visited after its last occurrence (i.e., the route made a detour to a server).
//!
//! - **[`GenerationMode::Permutation`]**: Choose an ordered subset of servers, connect them by
//!   shortest sub-routes which do not pass through any other server, and distribute the stages
//!   over the chosen servers in order, such that every chosen server hosts at least one stage.
//!   Subsets are explored by increasing size.
//!
//! - **[`GenerationMode::SingleNode`]**: Co-locate all stages on one server which has enough
//!   capacity for the entire chain.
//!
//! The search is bounded by the number of configurations `k`, by a time budget and by the
//! number of expanded search nodes. If the time or search budget is exceeded, the search stops,
//! and the [greedy constructor](construct) is used as a fallback, such that a chain does not end up
//! without candidates only because of the budget.
//!
//! If `parallel_aware` is set, the configurations are generated for the merged chain (see
//! [`Chain::merged`]), and then expanded back onto the original stages.

mod constructor;
mod frontier;
mod permutation;
mod single_node;

pub use constructor::{construct, GREEDY_FANOUT};

use crate::chain::Chain;
use crate::configuration::Configuration;
use crate::parallelism::LatencyModel;
use crate::topology::{NodeId, PathCache, Topology, TOLERANCE};
use crate::validation;

use log::*;
use std::ops::AddAssign;
use std::time::{Duration, SystemTime};

/// Mode of the configuration search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenerationMode {
    /// Breadth-first search over routes, enumerating all placements on every route
    Frontier,
    /// Ordered subsets of servers, connected by shortest sub-routes
    Permutation,
    /// All stages on a single server
    SingleNode,
}

impl Default for GenerationMode {
    fn default() -> Self {
        Self::Frontier
    }
}

/// Options of the configuration search
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorOptions {
    /// Search mode
    pub mode: GenerationMode,
    /// Maximum number of configurations per chain
    pub k: usize,
    /// Time budget per chain. `None` means no time limit.
    pub time_budget: Option<Duration>,
    /// Maximum number of expanded search nodes per chain
    pub search_budget: usize,
    /// Maximum number of nodes on a route of the frontier search
    pub route_length_limit: usize,
    /// How the effective latency is computed
    pub latency_model: LatencyModel,
    /// Generate configurations for the merged stages
    pub parallel_aware: bool,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            mode: GenerationMode::default(),
            k: 1024,
            time_budget: Some(Duration::from_secs(3)),
            search_budget: 256 * 1024,
            route_length_limit: 15,
            latency_model: LatencyModel::default(),
            parallel_aware: false,
        }
    }
}

/// Statistics of the configuration search
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationReport {
    /// Number of expanded search nodes
    pub expanded: usize,
    /// Number of chains for which the time or search budget was exceeded
    pub exhausted: usize,
    /// Number of chains for which the greedy constructor provided a configuration
    pub fallbacks: usize,
}

impl AddAssign for GenerationReport {
    fn add_assign(&mut self, other: Self) {
        self.expanded += other.expanded;
        self.exhausted += other.exhausted;
        self.fallbacks += other.fallbacks;
    }
}

/// Generate the candidate configurations of a single chain. The `cache` must only contain
/// entries computed on the same topology.
pub fn generate(
    topo: &Topology,
    chain: &Chain,
    options: &GeneratorOptions,
    cache: &mut PathCache,
) -> (Vec<Configuration>, GenerationReport) {
    if options.parallel_aware && chain.analysis().num_clusters() < chain.len() {
        let merged = chain.merged();
        let (configs, report) = generate_for(topo, &merged, options, cache);
        let configs = configs
            .into_iter()
            .filter_map(|c| {
                let placement = chain.analysis().expand_placement(&c.placement)?;
                let c =
                    Configuration::new(topo, chain, c.route, placement, options.latency_model)
                        .ok()?;
                validation::check(topo, chain, &c).ok().map(|_| c)
            })
            .collect();
        (configs, report)
    } else {
        generate_for(topo, chain, options, cache)
    }
}

fn generate_for(
    topo: &Topology,
    chain: &Chain,
    options: &GeneratorOptions,
    cache: &mut PathCache,
) -> (Vec<Configuration>, GenerationReport) {
    if let Some(reason) = early_out(topo, chain, options.latency_model) {
        debug!("{}: no configuration possible, {}", chain.id(), reason);
        return (Vec::new(), GenerationReport::default());
    }

    if chain.is_empty() {
        let configs = constructor::direct(topo, chain, options.latency_model).into_iter().collect();
        return (configs, GenerationReport::default());
    }

    let mut ctx = SearchContext::new(topo, chain, options, cache);
    match options.mode {
        GenerationMode::Frontier => frontier::search(&mut ctx),
        GenerationMode::Permutation => permutation::search(&mut ctx),
        GenerationMode::SingleNode => single_node::search(&mut ctx),
    }

    let SearchContext { mut configs, mut report, .. } = ctx;

    if report.exhausted > 0 {
        warn!(
            "{}: search budget exceeded after {} nodes with {} configurations",
            chain.id(),
            report.expanded,
            configs.len()
        );
        if configs.len() < options.k {
            if let Some(c) = construct(topo, chain, options.latency_model) {
                if !configs.iter().any(|x| x.same_placement(&c)) {
                    debug!("{}: greedy fallback found {}", chain.id(), c);
                    configs.push(c);
                    report.fallbacks += 1;
                }
            }
        }
    }

    trace!("{}: {} configurations, {} nodes", chain.id(), configs.len(), report.expanded);
    (configs, report)
}

/// Generate the configurations of all chains, and store them in `chain.configurations`. The
/// chains are distributed onto `num_threads` threads. Each thread uses its own [`PathCache`],
/// and the results end up at the chain they belong to, independent of the thread timing.
pub fn generate_all(
    topo: &Topology,
    chains: &mut [Chain],
    options: &GeneratorOptions,
    num_threads: usize,
) -> GenerationReport {
    info!("Generating configurations for {} chains ({:?} mode)", chains.len(), options.mode);
    let mut report = GenerationReport::default();
    let threads = num_threads.max(1).min(chains.len().max(1));

    if threads == 1 {
        let mut cache = PathCache::new();
        for chain in chains.iter_mut() {
            let (configs, r) = generate(topo, chain, options, &mut cache);
            chain.configurations = configs;
            report += r;
        }
    } else {
        let chunk_size = (chains.len() + threads - 1) / threads;
        let results = run_chunks(chains, chunk_size, |part| {
            let mut cache = PathCache::new();
            part.iter().map(|chain| generate(topo, chain, options, &mut cache)).collect::<Vec<_>>()
        });
        report += store_chunks(chains, chunk_size, results);
    }

    info!(
        "Generated {} configurations ({} search nodes, {} chains exceeded the budget)",
        chains.iter().map(|c| c.configurations.len()).sum::<usize>(),
        report.expanded,
        report.exhausted
    );
    report
}

/// Run `work` on consecutive chunks of `chains`, each chunk on its own thread. The result of a
/// chunk is `None` if its thread panicked.
fn run_chunks<T, W>(chains: &[Chain], chunk_size: usize, work: W) -> Vec<Option<T>>
where
    T: Send,
    W: Fn(&[Chain]) -> T + Sync,
{
    let work = &work;
    std::thread::scope(|s| {
        let workers: Vec<_> =
            chains.chunks(chunk_size.max(1)).map(|part| s.spawn(move || work(part))).collect();
        workers.into_iter().map(|worker| worker.join().ok()).collect()
    })
}

/// Store the generated configurations at their chains. The chains of a failed chunk end up
/// without any configuration.
fn store_chunks(
    chains: &mut [Chain],
    chunk_size: usize,
    results: Vec<Option<Vec<(Vec<Configuration>, GenerationReport)>>>,
) -> GenerationReport {
    let mut report = GenerationReport::default();
    for (part, result) in chains.chunks_mut(chunk_size.max(1)).zip(results) {
        match result {
            Some(generated) => {
                for (chain, (configs, r)) in part.iter_mut().zip(generated) {
                    chain.configurations = configs;
                    report += r;
                }
            }
            None => {
                error!("Configuration generation worker panicked! Rejecting {} chains", part.len());
                part.iter_mut().for_each(|chain| chain.configurations.clear());
            }
        }
    }
    report
}

/// Reasons why a chain cannot have any configuration, checked before the search starts.
fn early_out(topo: &Topology, chain: &Chain, model: LatencyModel) -> Option<&'static str> {
    if topo.get_node(chain.source()).is_err() || topo.get_node(chain.destination()).is_err() {
        return Some("endpoints are not part of the topology");
    }
    if chain.min_processing_latency(model) > chain.latency_budget() + TOLERANCE {
        return Some("processing latency exceeds the budget");
    }
    if chain.is_empty() {
        return None;
    }
    let servers = topo.servers();
    let largest = servers.iter().map(|n| topo.capacity(*n)).fold(0.0, f64::max);
    if chain.max_stage_demand() > largest + TOLERANCE {
        return Some("no node can host the largest stage");
    }
    let total: f64 = servers.iter().map(|n| topo.capacity(*n)).sum();
    if chain.demand_sum() > total + TOLERANCE {
        return Some("total demand exceeds the total capacity");
    }
    None
}

/// State shared by all search modes while generating configurations for one chain.
pub(crate) struct SearchContext<'a> {
    pub topo: &'a Topology,
    pub chain: &'a Chain,
    pub options: &'a GeneratorOptions,
    pub cache: &'a mut PathCache,
    pub configs: Vec<Configuration>,
    pub report: GenerationReport,
    stop_time: Option<SystemTime>,
}

impl<'a> SearchContext<'a> {
    fn new(
        topo: &'a Topology,
        chain: &'a Chain,
        options: &'a GeneratorOptions,
        cache: &'a mut PathCache,
    ) -> Self {
        Self {
            topo,
            chain,
            options,
            cache,
            configs: Vec::new(),
            report: GenerationReport::default(),
            stop_time: options.time_budget.map(|dur| SystemTime::now() + dur),
        }
    }

    /// Count an expanded search node. Returns `false` if the budget is exceeded.
    pub fn tick(&mut self) -> bool {
        if self.report.exhausted > 0 {
            return false;
        }
        self.report.expanded += 1;
        let timeout = match self.stop_time {
            Some(stop_time) => stop_time.duration_since(SystemTime::now()).is_err(),
            None => false,
        };
        if timeout || self.report.expanded > self.options.search_budget {
            self.report.exhausted = 1;
            return false;
        }
        true
    }

    /// Returns `true` if the search must stop.
    pub fn done(&self) -> bool {
        self.report.exhausted > 0 || self.configs.len() >= self.options.k
    }

    /// Build the configuration, and keep it if it is feasible. Returns `true` if it was kept.
    pub fn offer(&mut self, route: &[NodeId], placement: Vec<usize>) -> bool {
        let config = match Configuration::new(
            self.topo,
            self.chain,
            route.to_vec(),
            placement,
            self.options.latency_model,
        ) {
            Ok(c) => c,
            Err(e) => {
                trace!("{}: dropping malformed configuration: {}", self.chain.id(), e);
                return false;
            }
        };
        match validation::check(self.topo, self.chain, &config) {
            Ok(()) => {
                trace!("{}", config);
                self.configs.push(config);
                true
            }
            Err(v) => {
                trace!("{}: dropping configuration: {}", self.chain.id(), v);
                false
            }
        }
    }

    /// Concatenate the shortest sub-routes between the waypoints. Returns the route together
    /// with the route position of every waypoint. Returns `None` if any two consecutive waypoints
    /// are not connected, or if a server would appear twice on the route.
    pub fn connect(&mut self, waypoints: &[NodeId]) -> Option<(Vec<NodeId>, Vec<usize>)> {
        let first = *waypoints.first()?;
        let mut route = vec![first];
        let mut positions = vec![0];
        for w in waypoints.windows(2) {
            let (segment, _) = self.cache.segment(self.topo, w[0], w[1], self.chain.throughput())?;
            route.extend_from_slice(&segment[1..]);
            positions.push(route.len() - 1);
        }
        let topo = self.topo;
        let mut servers: Vec<NodeId> =
            route.iter().copied().filter(|n| topo.is_server(*n)).collect();
        let num_servers = servers.len();
        servers.sort();
        servers.dedup();
        if servers.len() != num_servers {
            return None;
        }
        Some((route, positions))
    }
}
