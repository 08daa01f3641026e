mod application;
mod cli;
mod commands;

use std::sync::Arc;

use application::Application;
use clap::Parser;
use cli::{Cli, Command};
use mvcp_config::DaemonConfig;
use tracing_subscriber::EnvFilter;

/// Exit codes follow a simple contract: 0 on a clean run, 1 when the daemon
/// fails to initialize (bad config, unreachable store, misconfigured
/// provider), 2 when it dies after having started serving.
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).with_target(false).init();

    let cli = Cli::parse();

    let config = match DaemonConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: invalid configuration: {err}");
            std::process::exit(1);
        }
    };

    let app = match Application::bootstrap(config) {
        Ok(app) => Arc::new(app),
        Err(err) => {
            eprintln!("error: failed to initialize: {err:#}");
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Command::Serve => commands::serve(app).await,
        Command::Status => commands::status(app).await,
        Command::Policy { load } => commands::policy(app, load).await,
    };

    if let Err(err) = result {
        eprintln!("error: {err:#}");
        std::process::exit(2);
    }
}
