//! cinder-server: one node of a replicated in-memory key-value cluster.
//!
//! Each node serves clients and peers on a single line-delimited TCP
//! listener. One node is PRIMARY and takes all client reads and writes,
//! fanning mutations out to the SECONDARIES; when the primary dies the
//! secondaries elect a replacement by term-based majority vote.

mod cluster_manager;
mod handler;
mod node;
mod peer;
mod replicator;
mod server;
mod session;

use std::process::ExitCode;

use cinder_cluster::{ClusterConfig, ClusterError, PeerSpec, Timing};
use clap::Parser;
use tracing::{error, info};

use crate::node::Node;

/// One node of the cinder cluster.
#[derive(Parser)]
#[command(name = "cinder-server", version, about)]
struct Args {
    /// Unique node id; must name a member of the cluster.
    #[arg(long)]
    node_id: String,

    /// TCP port to listen on.
    #[arg(long)]
    port: u16,

    /// Listen address.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Bootstrap hint: start in the PRIMARY role at term 0. A running
    /// cluster with a higher term overrides this on first contact.
    #[arg(long)]
    primary: bool,

    /// Cluster membership override as comma-separated id@host:port
    /// entries. Defaults to the canonical three-node localhost cluster.
    #[arg(long, value_delimiter = ',')]
    peers: Option<Vec<String>>,
}

impl Args {
    fn cluster_config(&self) -> Result<ClusterConfig, ClusterError> {
        let config = match &self.peers {
            Some(entries) => ClusterConfig::new(
                entries
                    .iter()
                    .map(|e| PeerSpec::parse(e))
                    .collect::<Result<_, _>>()?,
            ),
            None => ClusterConfig::canonical(),
        };
        // fail fast on a node id the rest of the cluster won't know
        config.member(&self.node_id)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cinder=info".into()),
        )
        .init();

    let args = Args::parse();

    let config = match args.cluster_config() {
        Ok(config) => config,
        Err(e) => {
            error!("invalid cluster configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let node = Node::new(config, Timing::default(), &args.node_id, args.primary);
    let shutdown = node.shutdown_signal();
    node.start_background_tasks();

    info!(
        node_id = %args.node_id,
        role = %node.cluster.role(),
        "node starting"
    );

    match server::run(&args.host, args.port, node, shutdown).await {
        Ok(()) => {
            info!("shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("fatal listener error: {e}");
            ExitCode::FAILURE
        }
    }
}
