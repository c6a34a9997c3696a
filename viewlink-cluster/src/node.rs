use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};
use viewlink_pool::{Connect, ConnectionPool, PoolConfig};

use crate::operation::{Operation, RequeueCallback};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
/// Lifecycle of a node handle. Transitions are monotonic; `Closed` is
/// terminal.
pub enum NodeState {
    /// The handle and its pool are being constructed.
    Initializing = 0,
    /// The dispatcher may route operations to this node.
    Active = 1,
    /// No new work is accepted; in-flight exchanges run to completion.
    Draining = 2,
    /// The node is gone. Work arriving here is rejected, never ignored.
    Closed = 3,
}

impl NodeState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Initializing,
            1 => Self::Active,
            2 => Self::Draining,
            _ => Self::Closed,
        }
    }
}

/// One cluster member from the dispatcher's point of view: the node's
/// address, its connection pool and its liveness state.
///
/// Exactly one handle exists per live address; the dispatcher keeps that
/// invariant across reconfigurations by re-using handles for retained
/// addresses.
pub struct NodeHandle<C>
where
    C: Connect,
{
    addr: SocketAddr,
    pool: ConnectionPool<C>,
    state: AtomicU8,
    requeue: RequeueCallback<C>,
}

impl<C> NodeHandle<C>
where
    C: Connect,
{
    /// Create the handle and open its pool against `addr`.
    ///
    /// The handle only becomes visible to the dispatcher once this returns,
    /// so callers never observe the `Initializing` state from outside.
    pub(crate) fn open(
        addr: SocketAddr,
        config: PoolConfig,
        connector: C,
        requeue: RequeueCallback<C>,
    ) -> Arc<Self> {
        let node = Arc::new(Self {
            addr,
            pool: ConnectionPool::new(addr, config, connector),
            state: AtomicU8::new(NodeState::Initializing as u8),
            requeue,
        });
        node.state.store(NodeState::Active as u8, Ordering::Release);
        node
    }

    #[inline]
    /// The address of the cluster member this handle represents.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    #[inline]
    /// The handle's current lifecycle state.
    pub fn state(&self) -> NodeState {
        NodeState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline]
    /// The connection pool backing this node.
    pub fn pool(&self) -> &ConnectionPool<C> {
        &self.pool
    }

    /// Whether operations are still waiting for a connection on this node.
    pub fn has_queued_writes(&self) -> bool {
        self.pool.has_pending_requests()
    }

    /// Route an operation onto this node's write path.
    ///
    /// A connection is requested from the pool and the operation is handed
    /// to it once bound. If the node is not accepting work, or the request
    /// ends in cancellation or connect failure, the operation goes back
    /// through the requeue callback instead of being dropped.
    pub fn write_op(&self, op: Box<dyn Operation<C>>) {
        if self.state() != NodeState::Active {
            debug!(
                addr = %self.addr,
                state = ?self.state(),
                "node is not accepting operations; requeueing"
            );
            (self.requeue)(op);
            return;
        }

        let request = match self.pool.request_connection() {
            Ok(request) => request,
            Err(_) => {
                // The pool closed between the state check and the request.
                (self.requeue)(op);
                return;
            },
        };

        let addr = self.addr;
        let requeue = self.requeue.clone();
        tokio::spawn(async move {
            match request.await {
                Ok(conn) => op.submit(conn).await,
                Err(error) => {
                    debug!(
                        addr = %addr,
                        error = %error,
                        "connection request unfulfilled; requeueing operation"
                    );
                    requeue(op);
                },
            }
        });
    }

    /// Drain and close the node.
    ///
    /// Pending connection requests are cancelled by the pool (their
    /// operations are requeued by the waiting write-path tasks); exchanges
    /// already holding a connection finish normally. Returns `false` if the
    /// node was already shut down.
    pub fn shutdown(&self) -> bool {
        let prev = self
            .state
            .fetch_max(NodeState::Draining as u8, Ordering::AcqRel);
        if prev >= NodeState::Draining as u8 {
            debug!(addr = %self.addr, "node already shutting down");
            return false;
        }

        let performed = self.pool.shutdown();
        if !performed {
            warn!(
                addr = %self.addr,
                "node pool was shut down behind the handle's back"
            );
        }

        self.state
            .fetch_max(NodeState::Closed as u8, Ordering::AcqRel);
        performed
    }
}
