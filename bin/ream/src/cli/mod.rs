pub mod constants;
pub mod node;
pub mod verbosity;

use clap::{Parser, Subcommand};

use crate::cli::node::NodeConfig;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the attestation preparation node
    #[command(name = "node")]
    Node(NodeConfig),
}
