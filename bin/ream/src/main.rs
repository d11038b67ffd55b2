use std::{net::SocketAddr, sync::Arc};

use clap::Parser;
use ream::cli::{Cli, Commands, node::NodeConfig};
use ream_network_spec::networks::{beacon_network_spec, set_beacon_network_spec};
use ream_operation_pool::{
    clock::SlotClock,
    prepare_fork_choice::{BatchJob, ForkChoicePreparer},
    seen_cache::SeenCache,
    sources::AttestationPools,
};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Node(config) => {
            let env_filter = match EnvFilter::try_from_default_env() {
                Ok(filter) => filter,
                Err(_) => EnvFilter::builder().parse_lossy(config.verbosity.directive()),
            };
            tracing_subscriber::registry()
                .with(tracing_subscriber::fmt::layer())
                .with(env_filter)
                .init();

            run_node(config).await
        }
    }
}

pub async fn run_node(config: NodeConfig) -> anyhow::Result<()> {
    info!("starting up...");

    set_beacon_network_spec(config.network.clone());
    let network_spec = beacon_network_spec();
    info!(
        "Using network {:?} with {}s slots",
        network_spec.network, network_spec.seconds_per_slot
    );

    if config.metrics {
        let socket_address = SocketAddr::new(config.metrics_address, config.metrics_port);
        let _exporter = prometheus_exporter::start(socket_address)?;
        info!("Serving metrics on {socket_address}");
    }

    let pools = AttestationPools::default();
    let seen_cache = Arc::new(SeenCache::new(config.seen_cache_size));
    let job = BatchJob::new(
        pools.sources(config.experimental_attestation_pool),
        pools.fork_choice.clone(),
        seen_cache,
    );
    let clock =
        SlotClock::from_genesis_time(network_spec.genesis_time, network_spec.slot_duration())?;
    let preparer = ForkChoicePreparer::new(
        job,
        clock,
        &config.aggregate_intervals(),
        CancellationToken::new(),
    )?;
    let scheduler = preparer.start();

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    scheduler.stop().await
}
