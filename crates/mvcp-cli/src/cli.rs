use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "mvcpd", about = "Node-local control plane for microVM workloads", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the API server and the reconcile processor.
    Serve,

    /// Print a one-shot status summary (vm count, policy mode, gpu inventory).
    Status,

    /// Load and show the active placement policy.
    Policy {
        /// Path to a policy YAML document to load before printing it.
        #[arg(long)]
        load: Option<PathBuf>,
    },
}
