use std::collections::HashSet;
use std::mem;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::{debug, error, info, warn};
use viewlink_pool::{Connect, PoolConfig};

use crate::error::ClusterError;
use crate::node::NodeHandle;
use crate::operation::{Operation, RequeueCallback};
use crate::topology::Topology;

/// Routes view operations across the cluster's nodes and keeps the node set
/// in step with the cluster topology.
///
/// Operations are spread round-robin over the current node list with no
/// weighting or health awareness: a down node is discovered by its
/// operations failing (and being requeued), not skipped pre-emptively.
///
/// The node list is an immutable snapshot behind a reader/writer lock.
/// `dispatch` takes the read side, so any number of operations route
/// concurrently; [`reconfigure`](Self::reconfigure) holds the write side
/// only for the pointer swap which installs the new list.
///
/// Cheap to clone; all clones share the same state.
pub struct ViewDispatcher<C>
where
    C: Connect + Clone,
{
    inner: Arc<DispatcherInner<C>>,
}

impl<C> Clone for ViewDispatcher<C>
where
    C: Connect + Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct DispatcherInner<C>
where
    C: Connect + Clone,
{
    config: PoolConfig,
    connector: C,
    requeue: RequeueCallback<C>,
    nodes: RwLock<Vec<Arc<NodeHandle<C>>>>,
    cursor: AtomicUsize,
    reconfiguring: AtomicBool,
    shutdown: AtomicBool,
}

impl<C> ViewDispatcher<C>
where
    C: Connect + Clone,
{
    pub(crate) fn new(topology: &Topology, config: PoolConfig, connector: C) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<DispatcherInner<C>>| {
            let requeue = redispatch_callback(weak.clone());
            let nodes = topology
                .addrs()
                .iter()
                .map(|&addr| {
                    info!(addr = %addr, "added node to connect list");
                    NodeHandle::open(
                        addr,
                        config.clone(),
                        connector.clone(),
                        requeue.clone(),
                    )
                })
                .collect();

            DispatcherInner {
                config: config.clone(),
                connector,
                requeue,
                nodes: RwLock::new(nodes),
                cursor: AtomicUsize::new(0),
                reconfiguring: AtomicBool::new(false),
                shutdown: AtomicBool::new(false),
            }
        });

        Self { inner }
    }

    #[inline]
    /// Whether the dispatcher has been shut down.
    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.load(Ordering::Acquire)
    }

    #[inline]
    /// Whether a reconfiguration run is currently applying a topology.
    pub fn is_reconfiguring(&self) -> bool {
        self.inner.reconfiguring.load(Ordering::Acquire)
    }

    /// The number of nodes currently in the dispatch rotation.
    pub fn node_count(&self) -> usize {
        self.inner.nodes.read().len()
    }

    /// A snapshot of the current node handles, in rotation order.
    pub fn nodes(&self) -> Vec<Arc<NodeHandle<C>>> {
        self.inner.nodes.read().clone()
    }

    /// Route an operation to the next node in the rotation.
    ///
    /// With no nodes available the operation is cancelled immediately and
    /// the caller learns about it through the operation itself; nothing is
    /// retried internally.
    pub fn dispatch(&self, op: Box<dyn Operation<C>>) {
        if self.is_shutdown() {
            warn!("dispatch on a shut down dispatcher; cancelling operation");
            op.cancel();
            return;
        }

        let node = {
            let nodes = self.inner.nodes.read();
            if nodes.is_empty() {
                error!("no server connections; cancelling operation");
                op.cancel();
                return;
            }
            let index = self.inner.cursor.fetch_add(1, Ordering::Relaxed) % nodes.len();
            nodes[index].clone()
        };

        node.write_op(op);
    }

    /// Replace the node set with the one a new topology names.
    ///
    /// Nodes whose address is retained keep their handle and pool state
    /// untouched; new addresses get freshly opened handles; departed nodes
    /// are drained after the new list is already committed, so dispatch
    /// never observes a list missing a retained node. Only one run applies
    /// at a time; an overlapping call returns
    /// [`ClusterError::Reconfiguring`] without blocking.
    pub fn reconfigure(&self, topology: &Topology) -> Result<(), ClusterError> {
        if self.is_shutdown() {
            return Err(ClusterError::Shutdown);
        }
        if self
            .inner
            .reconfiguring
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("reconfiguration already running; ignoring topology update");
            return Err(ClusterError::Reconfiguring);
        }

        let result = self.apply_topology(topology);
        self.inner.reconfiguring.store(false, Ordering::Release);
        result
    }

    fn apply_topology(&self, topology: &Topology) -> Result<(), ClusterError> {
        let wanted: HashSet<SocketAddr> = topology.addrs().iter().copied().collect();

        // Split the current nodes into those staying and those departing.
        // The snapshot is stable: only reconfigure mutates the list and
        // runs are serialized by the `reconfiguring` flag.
        let current = self.inner.nodes.read().clone();
        let mut staying = Vec::new();
        let mut departing = Vec::new();
        for node in current {
            if wanted.contains(&node.addr()) {
                staying.push(node);
            } else {
                departing.push(node);
            }
        }

        let retained: HashSet<SocketAddr> =
            staying.iter().map(|node| node.addr()).collect();

        // Open handles for genuinely new addresses before taking the write
        // lock, so the swap below stays a pointer exchange.
        let joined: Vec<_> = topology
            .addrs()
            .iter()
            .filter(|addr| !retained.contains(addr))
            .map(|&addr| {
                info!(addr = %addr, "added node to connect list");
                NodeHandle::open(
                    addr,
                    self.inner.config.clone(),
                    self.inner.connector.clone(),
                    self.inner.requeue.clone(),
                )
            })
            .collect();

        info!(
            staying = staying.len(),
            joined = joined.len(),
            departing = departing.len(),
            "applying new cluster topology"
        );

        {
            let mut nodes = self.inner.nodes.write();
            if self.is_shutdown() {
                // Shut down while we were building the new set; the fresh
                // handles must not outlive the dispatcher.
                drop(nodes);
                for node in joined {
                    node.shutdown();
                }
                return Err(ClusterError::Shutdown);
            }
            let mut merged = staying;
            merged.extend(joined);
            *nodes = merged;
        }

        // Departing nodes are torn down outside the lock; an individual
        // failure cannot corrupt the already-committed node list.
        for node in departing {
            debug!(addr = %node.addr(), "shutting down departed node");
            if !node.shutdown() {
                warn!(addr = %node.addr(), "departed node was already shut down");
            }
        }

        Ok(())
    }

    /// Shut the dispatcher down and drain every node.
    ///
    /// Nodes still holding queued writes are called out before draining,
    /// since those operations are about to come back through the requeue
    /// path as cancellations. Returns `false` on duplicate calls.
    pub fn shutdown(&self) -> bool {
        if self.inner.shutdown.swap(true, Ordering::AcqRel) {
            info!("suppressing duplicate attempt to shut down");
            return false;
        }

        let nodes = {
            let mut guard = self.inner.nodes.write();
            mem::take(&mut *guard)
        };

        for node in nodes {
            if node.has_queued_writes() {
                warn!(
                    addr = %node.addr(),
                    "shutting down with operations waiting to be written"
                );
            }
            node.shutdown();
        }

        info!("view dispatcher shut down");
        true
    }
}

/// Default requeue policy: hand the operation straight back to `dispatch`
/// so it is re-routed across whichever nodes remain. Once the dispatcher is
/// gone or shut down the operation is cancelled instead.
fn redispatch_callback<C>(weak: Weak<DispatcherInner<C>>) -> RequeueCallback<C>
where
    C: Connect + Clone,
{
    Arc::new(move |op: Box<dyn Operation<C>>| match weak.upgrade() {
        Some(inner) if !inner.shutdown.load(Ordering::Acquire) => {
            debug!("requeueing operation for re-dispatch");
            ViewDispatcher { inner }.dispatch(op);
        },
        _ => {
            warn!("dispatcher unavailable; cancelling requeued operation");
            op.cancel();
        },
    })
}
