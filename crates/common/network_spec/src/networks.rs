use std::{
    sync::{Arc, LazyLock, OnceLock},
    time::Duration,
};

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Holesky,
    Sepolia,
    Hoodi,
    Dev,
    Custom(String),
}

impl<'de> Deserialize<'de> for Network {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        match String::deserialize(deserializer)?.as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "holesky" => Ok(Network::Holesky),
            "sepolia" => Ok(Network::Sepolia),
            "hoodi" => Ok(Network::Hoodi),
            "dev" => Ok(Network::Dev),
            custom => Ok(Network::Custom(custom.to_string())),
        }
    }
}

static BEACON_NETWORK_SPEC: OnceLock<Arc<BeaconNetworkSpec>> = OnceLock::new();

/// MUST be called only once at the start of the application to initialize static
/// [BeaconNetworkSpec].
///
/// The static `BeaconNetworkSpec` can be accessed using [beacon_network_spec].
///
/// # Panics
///
/// Panics if this function is called more than once.
pub fn set_beacon_network_spec(network_spec: Arc<BeaconNetworkSpec>) {
    BEACON_NETWORK_SPEC
        .set(network_spec)
        .expect("BeaconNetworkSpec should be set only once at the start of the application");
}

/// Returns the static [BeaconNetworkSpec] initialized by [set_beacon_network_spec].
///
/// # Panics
///
/// Panics if [set_beacon_network_spec] wasn't called before this function.
pub fn beacon_network_spec() -> Arc<BeaconNetworkSpec> {
    BEACON_NETWORK_SPEC
        .get()
        .expect("BeaconNetworkSpec wasn't set")
        .clone()
}

/// The subset of a network's config that drives slot timing.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct BeaconNetworkSpec {
    #[serde(rename = "CONFIG_NAME")]
    pub network: Network,
    pub genesis_time: u64,
    pub seconds_per_slot: u64,
}

impl BeaconNetworkSpec {
    pub fn slot_duration(&self) -> Duration {
        Duration::from_secs(self.seconds_per_slot)
    }
}

/// Every built-in network uses 12 second slots.
fn built_in(network: Network, genesis_time: u64) -> Arc<BeaconNetworkSpec> {
    Arc::new(BeaconNetworkSpec {
        network,
        genesis_time,
        seconds_per_slot: 12,
    })
}

pub static MAINNET: LazyLock<Arc<BeaconNetworkSpec>> =
    LazyLock::new(|| built_in(Network::Mainnet, 1606824023));

pub static HOLESKY: LazyLock<Arc<BeaconNetworkSpec>> =
    LazyLock::new(|| built_in(Network::Holesky, 1695902400));

pub static SEPOLIA: LazyLock<Arc<BeaconNetworkSpec>> =
    LazyLock::new(|| built_in(Network::Sepolia, 1655733600));

pub static HOODI: LazyLock<Arc<BeaconNetworkSpec>> =
    LazyLock::new(|| built_in(Network::Hoodi, 1742213400));

/// Local devnet. Genesis is taken from mainnet; point `--network` at a YAML file to override it.
pub static DEV: LazyLock<Arc<BeaconNetworkSpec>> =
    LazyLock::new(|| built_in(Network::Dev, 1606824023));
