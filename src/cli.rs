//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::devices::NodeType;
use crate::logging::LogFormat;

#[derive(Debug, Parser)]
#[command(name = "waveslab", version)]
#[command(about = "Household smart-utility device simulator", long_about = None)]
pub struct Cli {
    /// Directory holding nodes.json and users.json (overrides the scenario)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log line format
    #[arg(long, value_enum, default_value = "compact", global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the status of all nodes
    Status,

    /// Show endpoint, utility and consumption of nodes
    Info {
        /// Only nodes that are currently on
        #[arg(short, long)]
        active: bool,

        /// Only nodes of this utility (electricity, water, gas)
        #[arg(short, long)]
        utility: Option<NodeType>,
    },

    /// Flip a node between on and off
    Switch {
        /// Node id, e.g. "kitchen-faucet"
        node_id: String,
    },

    /// List virtual users
    Users,

    /// Assign a node to a virtual user
    Assign { node_id: String, username: String },

    /// Set the endpoint a node reports its readings to
    SetEndpoint { node_id: String, url: String },

    /// Run the simulation loop
    Run(RunArgs),

    /// Serve the REST API
    #[cfg(feature = "api")]
    Serve {
        #[arg(long, default_value = "8000")]
        port: u16,
    },
}

#[derive(Debug, clap::Args)]
pub struct RunArgs {
    /// Load the scenario from a TOML file
    #[arg(long, conflicts_with = "preset")]
    pub scenario: Option<PathBuf>,

    /// Use a built-in preset (realtime, historical)
    #[arg(long)]
    pub preset: Option<String>,

    /// Override the device selection seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Write one CSV row per iteration to this file
    #[arg(long)]
    pub cycle_log: Option<PathBuf>,
}
