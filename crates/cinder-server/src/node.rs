//! Per-process wiring: one `Node` ties the store, the cluster manager,
//! and the replicator together and owns the shutdown signal.

use std::sync::Arc;

use cinder_cluster::{ClusterConfig, Timing};
use cinder_core::Store;
use tokio::sync::watch;

use crate::cluster_manager::ClusterManager;
use crate::replicator::Replicator;

pub struct Node {
    pub store: Arc<Store>,
    pub cluster: Arc<ClusterManager>,
    pub replicator: Replicator,
    shutdown: watch::Sender<bool>,
}

impl Node {
    pub fn new(
        config: ClusterConfig,
        timing: Timing,
        node_id: &str,
        bootstrap_primary: bool,
    ) -> Arc<Self> {
        let store = Arc::new(Store::new());
        let cluster = ClusterManager::new(config, timing, node_id, bootstrap_primary);
        let replicator = Replicator::new(node_id, Arc::clone(&cluster));
        let (shutdown, _) = watch::channel(false);
        Arc::new(Self {
            store,
            cluster,
            replicator,
            shutdown,
        })
    }

    /// Starts the heartbeat emitter, election monitor, and sync task.
    pub fn start_background_tasks(&self) {
        self.cluster
            .spawn_background_tasks(Arc::clone(&self.store), self.shutdown_signal());
    }

    /// A receiver that resolves when SHUTDOWN is requested.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Requests orderly process exit. Idempotent.
    pub fn begin_shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}
