//! CLI for udp-pubsub
//!
//! Subcommands:
//! - `broker`: bind the configured endpoint and serve subscriptions
//! - `peer`: subscribe to, or publish on, the configured topics

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use udp_pubsub::broker::Broker;
use udp_pubsub::client::Peer;
use udp_pubsub::config::{load_broker_settings, load_peer_settings};
use udp_pubsub::utils::error::Error;
use udp_pubsub::utils::logging;

#[derive(Parser)]
#[command(name = "udp-pubsub", version, about)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the broker
    Broker {
        /// Configuration file (defaults to config/broker.* if present)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Run a peer
    Peer {
        /// Configuration file (defaults to config/peer.* if present)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    logging::init(cli.verbose);

    let outcome = tokio::select! {
        res = run(cli.command) => res,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, terminating...");
            return ExitCode::SUCCESS;
        }
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.verbose {
                error!("Abnormal termination: {e:?}");
            } else {
                error!("Abnormal termination: {e}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<(), Error> {
    match command {
        Command::Broker { config } => {
            let settings = load_broker_settings(config.as_deref())?;
            Broker::bind(&settings).await?.run().await?;
        }
        Command::Peer { config } => {
            let settings = load_peer_settings(config.as_deref())?;
            Peer::connect(&settings).await?.run().await?;
        }
    }
    Ok(())
}
