use std::sync::Arc;

use async_trait::async_trait;
use viewlink_pool::{Connect, PooledConnection};

#[async_trait]
/// A routable unit of work.
///
/// The transport layer only ever routes, cancels or requeues operations; the
/// actual request/response exchange and the operation's own state machine
/// live behind [`Operation::submit`]. Both methods consume the operation, so
/// an operation is always resolved exactly one way.
pub trait Operation<C>: Send + 'static
where
    C: Connect,
{
    /// The operation has been bound to a live connection on its target
    /// node. The exchange happens here; dropping the guard afterwards
    /// returns the connection to the node's pool.
    async fn submit(self: Box<Self>, conn: PooledConnection<C>);

    /// No connection will be provided: the cluster is empty, shut down, or
    /// the operation was deliberately aborted.
    fn cancel(self: Box<Self>);
}

/// Receives operations which lost their node before a connection could be
/// bound, so they can be re-routed or failed instead of vanishing.
///
/// Fired when a queued connection request is cancelled (pool shutdown,
/// connect failure) or when an operation lands on a node which is already
/// draining. The policy is the receiver's: the dispatcher re-dispatches by
/// default and falls back to cancelling once it has shut down itself.
pub type RequeueCallback<C> = Arc<dyn Fn(Box<dyn Operation<C>>) + Send + Sync>;
