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

use flexchain::chain::Chain;
use flexchain::generator::GenerationMode;
use flexchain::heuristics::GreedyVariant;
use flexchain::parallelism::LatencyModel;
use flexchain::planner::{greedy, optimize, Assignment, PlanningParameters};
use flexchain::relaxation::MinilpSolver;
use flexchain::rounding::RoundingPolicy;
use flexchain::topology::Topology;

use clap::{Parser, Subcommand, ValueEnum};
use log::*;
use serde::Serialize;
use std::error::Error;
use std::fs::File;
use std::time::{Duration, Instant};

mod example_topologies;
use example_topologies::*;

fn main() -> Result<(), Box<dyn Error>> {
    // initialize the env logger
    pretty_env_logger::init();
    // run clap
    let args = CommandLineArguments::parse();

    let (net, mut chains) = args.network.build(args.variant, args.chains, args.seed)?;
    info!(
        "{} (variant {}) with {} nodes, {} links and {} chains",
        args.network,
        args.variant,
        net.num_nodes(),
        net.num_links(),
        chains.len()
    );

    let mut params = PlanningParameters::default().with_latency_model(args.latency.into());
    if let Some(num_threads) = args.num_threads {
        params = params.with_num_threads(num_threads);
    }

    let start = Instant::now();
    let (algorithm, result) = match args.cmd {
        MainCommand::Optimize {
            k,
            k_min,
            mode,
            rounding,
            rounding_seed,
            time_budget,
            search_budget,
            epsilon,
            parallel_aware,
        } => {
            params = params
                .with_k(k)
                .with_k_min(k_min)
                .with_generation_mode(mode.into())
                .with_rounding_policy(rounding.policy(rounding_seed))
                .with_time_budget(time_budget.map(Duration::from_secs_f64))
                .with_search_budget(search_budget)
                .with_parallel_aware(parallel_aware);
            if let Some(epsilon) = epsilon {
                params = params.with_weighted_objective(epsilon);
            }
            debug!("{:#?}", params);
            let algorithm = format!("optimize ({:?}, {:?})", mode, rounding);
            (algorithm, optimize(&net, &mut chains, &params, &MinilpSolver))
        }
        MainCommand::Greedy { sequential } => {
            let variant = if sequential { GreedyVariant::Sequential } else { GreedyVariant::Parc };
            (format!("greedy ({:?})", variant), greedy(&net, &mut chains, &params, variant))
        }
    };
    let elapsed = start.elapsed();

    for chain in chains.iter() {
        match chain.accepted.as_ref() {
            Some(config) => info!("{}: {}", chain.id(), config),
            None => info!("{}: rejected", chain.id()),
        }
    }
    info!(
        "{} accepted {} of {} chains in {:.3}s",
        algorithm,
        result.accepted,
        result.total,
        elapsed.as_secs_f64()
    );
    info!(
        "objective: {:.3}, average latency: {:.3}, mean utilization: {:.3}, LP bound: {:?}",
        result.objective, result.average_latency, result.mean_utilization, result.lp_bound
    );

    if let Some(filename) = args.json_filename {
        let summary = Summary::new(&net, &chains, &result, algorithm, elapsed)?;
        serde_json::to_writer_pretty(File::create(&filename)?, &summary)?;
        info!("Summary written to {}", filename);
    }

    Ok(())
}

/// Result summary, stored as json
#[derive(Debug, Serialize)]
struct Summary {
    network: String,
    algorithm: String,
    num_chains: usize,
    accepted: usize,
    objective: f64,
    average_latency: f64,
    mean_utilization: f64,
    lp_bound: Option<f64>,
    passes: usize,
    expanded_search_nodes: usize,
    elapsed_secs: f64,
    chains: Vec<ChainSummary>,
}

#[derive(Debug, Serialize)]
struct ChainSummary {
    id: usize,
    accepted: bool,
    route: Vec<String>,
    placement: Vec<usize>,
    latency: Option<f64>,
}

impl Summary {
    fn new(
        net: &Topology,
        chains: &[Chain],
        result: &Assignment,
        algorithm: String,
        elapsed: Duration,
    ) -> Result<Self, Box<dyn Error>> {
        let chains = chains
            .iter()
            .map(|chain| -> Result<ChainSummary, flexchain::Error> {
                let config = chain.accepted.as_ref();
                let route = config
                    .map(|c| c.route.iter().map(|n| net.get_node_name(*n).map(String::from)))
                    .into_iter()
                    .flatten()
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ChainSummary {
                    id: chain.id().0,
                    accepted: config.is_some(),
                    route,
                    placement: config.map(|c| c.placement.clone()).unwrap_or_default(),
                    latency: config.map(|c| c.latency),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            network: net.name().to_string(),
            algorithm,
            num_chains: result.total,
            accepted: result.accepted,
            objective: result.objective,
            average_latency: result.average_latency,
            mean_utilization: result.mean_utilization,
            lp_bound: result.lp_bound,
            passes: result.passes,
            expanded_search_nodes: result.generation.expanded,
            elapsed_secs: elapsed.as_secs_f64(),
            chains,
        })
    }
}

/// Place service function chains on one of the example networks, and report the result.
#[derive(Parser, Debug)]
#[clap(name = "FlexChain", author = "Tibor Schneider")]
struct CommandLineArguments {
    /// Algorithm to run
    #[clap(subcommand)]
    cmd: MainCommand,
    /// Network to use (from the example networks)
    #[clap(value_enum, short = 'n', long, default_value = "leaf-spine-net")]
    network: Network,
    /// Variant of the network
    #[clap(short = 'v', long, default_value = "0")]
    variant: usize,
    /// Number of chains
    #[clap(short = 'c', long, default_value = "10")]
    chains: usize,
    /// Generate random chains with this seed, instead of the chains of the example network
    #[clap(short = 's', long)]
    seed: Option<u64>,
    /// How the effective latency of a configuration is computed
    #[clap(value_enum, short = 'l', long, default_value = "colocated")]
    latency: Latency,
    /// Number of threads for generating configurations (defaults to the number of CPUs)
    #[clap(long)]
    num_threads: Option<usize>,
    /// Store the result summary in a json file
    #[clap(long = "json")]
    json_filename: Option<String>,
}

#[derive(Subcommand, Debug)]
enum MainCommand {
    /// Generate configurations, solve the relaxation and round it recursively
    #[clap(name = "optimize")]
    Optimize {
        /// Initial number of configurations per chain
        #[clap(short = 'k', long, default_value = "1024")]
        k: usize,
        /// Lower bound of k during the recursive refinement
        #[clap(long, default_value = "16")]
        k_min: usize,
        /// Mode of the configuration search
        #[clap(value_enum, short = 'm', long, default_value = "frontier")]
        mode: Mode,
        /// Rounding policy
        #[clap(value_enum, short = 'r', long, default_value = "threshold")]
        rounding: Rounding,
        /// Seed of the randomized rounding
        #[clap(long, default_value = "42")]
        rounding_seed: u64,
        /// Time budget of the configuration search per chain, in seconds
        #[clap(short = 't', long)]
        time_budget: Option<f64>,
        /// Maximum number of expanded search nodes per chain
        #[clap(long, default_value = "262144")]
        search_budget: usize,
        /// Weight the objective with the latency of every configuration
        #[clap(short = 'e', long)]
        epsilon: Option<f64>,
        /// Generate the configurations for the merged stages
        #[clap(short = 'p', long)]
        parallel_aware: bool,
    },
    /// Place the chains greedily
    #[clap(name = "greedy")]
    Greedy {
        /// Skip the parallelism-aware attempt
        #[clap(long)]
        sequential: bool,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Mode {
    Frontier,
    Permutation,
    SingleNode,
}

impl From<Mode> for GenerationMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Frontier => GenerationMode::Frontier,
            Mode::Permutation => GenerationMode::Permutation,
            Mode::SingleNode => GenerationMode::SingleNode,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Rounding {
    Threshold,
    Greedy,
    Randomized,
}

impl Rounding {
    fn policy(&self, seed: u64) -> RoundingPolicy {
        match self {
            Rounding::Threshold => RoundingPolicy::Threshold,
            Rounding::Greedy => RoundingPolicy::Greedy,
            Rounding::Randomized => RoundingPolicy::Randomized { seed },
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Latency {
    Sequential,
    Colocated,
    ChainOptimal,
}

impl From<Latency> for LatencyModel {
    fn from(latency: Latency) -> Self {
        match latency {
            Latency::Sequential => LatencyModel::Sequential,
            Latency::Colocated => LatencyModel::Colocated,
            Latency::ChainOptimal => LatencyModel::ChainOptimal,
        }
    }
}
