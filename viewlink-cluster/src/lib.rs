//! Cluster-level dispatch for view operations.
//!
//! A [`ViewDispatcher`] holds one [`NodeHandle`] per cluster member and
//! spreads incoming operations across them round-robin. When the cluster
//! topology changes, [`ViewDispatcher::reconfigure`] atomically swaps the
//! node set: retained nodes keep their pools and in-flight work, departed
//! nodes are drained, and operations caught in the middle are requeued
//! rather than lost.

mod dispatcher;
mod error;
mod node;
mod operation;
mod topology;

use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info};
use viewlink_pool::{Connect, HttpConnector, PoolConfig};

pub use crate::dispatcher::ViewDispatcher;
pub use crate::error::ClusterError;
pub use crate::node::{NodeHandle, NodeState};
pub use crate::operation::{Operation, RequeueCallback};
pub use crate::topology::Topology;

/// Build a [`ViewDispatcher`] using provided settings.
pub struct ViewClusterBuilder<C = HttpConnector>
where
    C: Connect + Clone,
{
    topology: Topology,
    config: PoolConfig,
    connector: C,
}

impl ViewClusterBuilder<HttpConnector> {
    /// Create a new builder from the cluster's initial topology, connecting
    /// over HTTP/1.
    pub fn new(topology: Topology) -> Self {
        Self {
            topology,
            config: PoolConfig::default(),
            connector: HttpConnector,
        }
    }
}

impl<C> ViewClusterBuilder<C>
where
    C: Connect + Clone,
{
    /// Set the per-node connection tunables.
    pub fn with_pool_config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    /// Swap in a different connector implementation.
    pub fn with_connector<C2>(self, connector: C2) -> ViewClusterBuilder<C2>
    where
        C2: Connect + Clone,
    {
        ViewClusterBuilder {
            topology: self.topology,
            config: self.config,
            connector,
        }
    }

    /// Build the dispatcher, opening one node handle per topology address.
    pub fn build(self) -> ViewDispatcher<C> {
        let num_nodes = self.topology.len();
        let dispatcher = ViewDispatcher::new(&self.topology, self.config, self.connector);
        info!(num_nodes = num_nodes, "view cluster dispatcher ready");
        dispatcher
    }
}

/// Applies topology updates from a watch channel to the dispatcher.
///
/// This is the seam for whatever monitors the cluster's configuration: each
/// value observed on the channel goes through
/// [`ViewDispatcher::reconfigure`]. The task ends once every sender is
/// dropped or the dispatcher has shut down.
pub fn spawn_topology_watcher<C>(
    dispatcher: ViewDispatcher<C>,
    updates: watch::Receiver<Topology>,
) -> JoinHandle<()>
where
    C: Connect + Clone,
{
    tokio::spawn(async move {
        let mut changes = WatchStream::new(updates);
        while let Some(topology) = changes.next().await {
            match dispatcher.reconfigure(&topology) {
                Ok(()) => {},
                Err(ClusterError::Reconfiguring) => {
                    debug!("dropped topology update during an active reconfiguration");
                },
                Err(ClusterError::Shutdown) => {
                    debug!("dispatcher shut down; stopping topology watcher");
                    break;
                },
            }
        }
    })
}
