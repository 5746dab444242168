//! PairLink client entry point.
//!
//! Loads the configuration, builds the platform adapter, and runs one
//! subcommand:
//!
//! ```text
//! pairlink-client status [--watch]            adapter present / switched on
//! pairlink-client peers                       paired peers, one per line
//! pairlink-client peers add <name> <address>  pair a TCP peer in the config
//! pairlink-client peers remove <name>         forget a TCP peer
//! pairlink-client connect <name-or-address>   connect + $ConReq$/$ConAck$
//! ```
//!
//! `connect` exits with status 0 only when the handshake succeeds.  Ctrl-C
//! while it runs cancels the attempt, which then reports `failed (cancelled)`.
//!
//! # Adapters
//!
//! The TCP adapter is used by default: the peers listed in the config file
//! are "paired" and their address is a `host:port`.  `--mock` swaps in an
//! in-memory adapter with one peer, `mock-server`, that always acknowledges.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use pairlink_core::{PeerIdentifier, CONNECTION_ACK};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pairlink_client::application::connect_to_peer::ConnectionOrchestrator;
use pairlink_client::application::ports::PlatformAdapter;
use pairlink_client::application::query_adapter::{AdapterCapabilities, AdapterStatus};
use pairlink_client::infrastructure::adapter::{MockAdapter, MockSocket};
use pairlink_client::infrastructure::storage::{
    config_file_path, load_config, save_config, ClientConfig,
};
use pairlink_client::infrastructure::transport::Transport;
use pairlink_client::infrastructure::ui_bridge::{subscribe_adapter_status, ClientAppState};

/// How often `status --watch` samples the adapter.
const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(
    name = "pairlink-client",
    version,
    about = "Connect to a paired peer and verify it is a PairLink server"
)]
struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true, env = "PAIRLINK_CONFIG")]
    config: Option<PathBuf>,

    /// Use the in-memory adapter instead of TCP.
    #[arg(long, global = true)]
    mock: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Report whether the adapter exists and is switched on.
    Status {
        /// Keep running and print the status each time it changes.
        #[arg(long)]
        watch: bool,
    },
    /// List paired peers, or edit the configured ones.
    Peers {
        #[command(subcommand)]
        action: Option<PeersAction>,
    },
    /// Connect to a paired peer and run the handshake.
    Connect {
        /// Peer name, or its address (case-insensitive).
        peer: String,
        /// Handshake timeout in milliseconds; 0 waits forever.
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

#[derive(Debug, Subcommand)]
enum PeersAction {
    /// Add a TCP peer to the config, replacing one with the same name.
    Add { name: String, address: String },
    /// Remove a TCP peer from the config.
    Remove { name: String },
}

fn build_adapter(cli: &Cli, config: &ClientConfig) -> Arc<dyn PlatformAdapter> {
    if cli.mock {
        let peer = PeerIdentifier::new("mock-server", "00:00:00:00:00:01");
        let socket = Arc::new(MockSocket::replying(CONNECTION_ACK));
        return Arc::new(MockAdapter::new().with_peer(peer, socket));
    }
    Arc::new(config.tcp_adapter())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

fn print_status(status: AdapterStatus) {
    println!("Adapter available: {}", yes_no(status.has_hardware));
    println!("State: {}", if status.enabled { "On" } else { "Off" });
}

/// Applies `action` to the config and writes it to `path` (or the default).
fn edit_peers(
    path: Option<&Path>,
    mut config: ClientConfig,
    action: PeersAction,
) -> anyhow::Result<()> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => config_file_path()?,
    };

    match action {
        PeersAction::Add { name, address } => {
            info!(%name, %address, "adding peer");
            config.add_peer(name, address);
        }
        PeersAction::Remove { name } => {
            if !config.remove_peer(&name) {
                bail!("no configured peer is named '{name}'");
            }
            info!(%name, "peer removed");
        }
    }

    save_config(&config, &path)
        .with_context(|| format!("could not write {}", path.display()))?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref()).context("could not load configuration")?;
    let adapter = build_adapter(&cli, &config);
    let capabilities = AdapterCapabilities::new(Arc::clone(&adapter));

    match cli.command {
        Command::Status { watch: false } => {
            print_status(capabilities.snapshot());
            Ok(ExitCode::SUCCESS)
        }

        Command::Status { watch: true } => {
            let transport = Arc::new(Transport::new(adapter));
            let orchestrator = ConnectionOrchestrator::new(transport, config.attempt_config()?);
            let state = ClientAppState::new(capabilities, orchestrator);
            let mut updates = subscribe_adapter_status(state, STATUS_POLL_INTERVAL);

            loop {
                tokio::select! {
                    update = updates.recv() => match update {
                        Some(status) => print_status(status),
                        None => break,
                    },
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Peers {
            action: Some(action),
        } => {
            if cli.mock {
                bail!("peers of the in-memory adapter cannot be edited");
            }
            edit_peers(cli.config.as_deref(), config, action)?;
            Ok(ExitCode::SUCCESS)
        }

        Command::Peers { action: None } => {
            let peers = capabilities.list_known_peers();
            if peers.is_empty() {
                warn!("no paired peers (adapter off, or none configured)");
            }
            for peer in peers {
                println!("{}\t{}", peer.name(), peer.address());
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Connect { peer, timeout_ms } => {
            if let Some(ms) = timeout_ms {
                config.handshake_timeout_ms = ms;
            }
            if !capabilities.is_enabled() {
                bail!("the adapter is missing or switched off");
            }
            let Some(target) = capabilities
                .list_known_peers()
                .into_iter()
                .find(|known| known.matches(&peer))
            else {
                bail!("no paired peer matches '{peer}'");
            };

            let transport = Arc::new(Transport::new(adapter));
            let orchestrator = Arc::new(ConnectionOrchestrator::new(
                transport,
                config.attempt_config()?,
            ));

            let handle = orchestrator
                .start(target)
                .context("could not start the connection attempt")?;

            let canceller = Arc::clone(&orchestrator);
            let ctrl_c = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("interrupt received; cancelling");
                    canceller.cancel();
                }
            });

            let outcome = handle.outcome().await;
            ctrl_c.abort();
            println!("{outcome}");

            if outcome.is_success() {
                // The CLI has no use for the open connection beyond proving it.
                orchestrator.transport().close();
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
    }
}
