use std::{net::IpAddr, num::NonZeroUsize, sync::Arc, time::Duration};

use clap::Parser;
use ream_network_spec::{cli::beacon_network_parser, networks::BeaconNetworkSpec};
use ream_operation_pool::{
    prepare_fork_choice::DEFAULT_AGGREGATE_INTERVALS, seen_cache::DEFAULT_SEEN_CACHE_SIZE,
};

use crate::cli::{
    constants::{
        DEFAULT_METRICS_ADDRESS, DEFAULT_METRICS_ENABLED, DEFAULT_METRICS_PORT, DEFAULT_NETWORK,
    },
    verbosity::{Verbosity, verbosity_parser},
};

#[derive(Debug, Parser)]
pub struct NodeConfig {
    /// Verbosity level (1 = error, 5 = trace)
    #[arg(short, long, default_value = "3", value_parser = verbosity_parser)]
    pub verbosity: Verbosity,

    #[arg(
        long,
        help = "Choose mainnet, holesky, sepolia, hoodi, dev or provide a path to a YAML config file",
        default_value = DEFAULT_NETWORK,
        value_parser = beacon_network_parser
    )]
    pub network: Arc<BeaconNetworkSpec>,

    #[arg(
        long,
        help = "Comma-separated offsets into each slot, in milliseconds, at which attestations are batched for fork choice",
        default_values_t = DEFAULT_AGGREGATE_INTERVALS.map(|interval| interval.as_millis() as u64),
        value_delimiter = ','
    )]
    pub aggregate_intervals: Vec<u64>,

    #[arg(
        long,
        help = "Read every attestation from a single shared pool instead of separate unaggregated, aggregated and block pools"
    )]
    pub experimental_attestation_pool: bool,

    #[arg(
        long,
        help = "Number of attestation data roots remembered as already forwarded to fork choice",
        default_value_t = DEFAULT_SEEN_CACHE_SIZE
    )]
    pub seen_cache_size: NonZeroUsize,

    #[arg(long, help = "Enable metrics", default_value_t = DEFAULT_METRICS_ENABLED)]
    pub metrics: bool,

    #[arg(long, help = "Set metrics address", default_value_t = DEFAULT_METRICS_ADDRESS)]
    pub metrics_address: IpAddr,

    #[arg(long, help = "Set metrics port", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,
}

impl NodeConfig {
    pub fn aggregate_intervals(&self) -> Vec<Duration> {
        self.aggregate_intervals
            .iter()
            .copied()
            .map(Duration::from_millis)
            .collect()
    }
}
