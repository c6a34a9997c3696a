use std::io;
use std::net::SocketAddr;
use std::ops::{Deref, DerefMut};
use std::sync::Weak;

use async_trait::async_trait;

use crate::config::PoolConfig;
use crate::pool::{ConnectionPool, PoolInner};

/// A transport session which can be parked in a [ConnectionPool].
///
/// The pool never performs I/O on the session itself, it only needs to know
/// whether the session can still carry requests so that stale connections
/// are discarded rather than handed back to callers.
pub trait PoolableConnection: Send + 'static {
    /// Whether the underlying session is still able to carry requests.
    fn is_open(&self) -> bool;
}

#[async_trait]
/// The collaborator responsible for actually establishing connections.
///
/// Implementations own the socket mechanics end to end, including the
/// connect deadline from [`PoolConfig::connect_timeout`]. The pool invokes
/// `connect` from spawned tasks and never blocks on it.
pub trait Connect: Send + Sync + 'static {
    type Connection: PoolableConnection;

    async fn connect(
        &self,
        addr: SocketAddr,
        config: &PoolConfig,
    ) -> io::Result<Self::Connection>;
}

/// A connection checked out of a [ConnectionPool].
///
/// Dropping the guard returns the connection to its pool, where it either
/// satisfies the oldest pending request or re-joins the idle set. If the
/// pool has already shut down the connection is simply dropped.
pub struct PooledConnection<C>
where
    C: Connect,
{
    conn: Option<C::Connection>,
    pool: Weak<PoolInner<C>>,
}

impl<C> PooledConnection<C>
where
    C: Connect,
{
    pub(crate) fn new(conn: C::Connection, pool: Weak<PoolInner<C>>) -> Self {
        Self {
            conn: Some(conn),
            pool,
        }
    }

    /// Take the connection out of the guard, bypassing the automatic
    /// release back to the pool.
    ///
    /// The pool keeps counting the connection against its limit until it
    /// is dropped, so this is only useful for handing the session to
    /// another owner which will not return it.
    pub fn detach(mut self) -> C::Connection {
        match self.conn.take() {
            Some(conn) => conn,
            // The slot is only emptied on drop or detach.
            None => unreachable!("pooled connection accessed after release"),
        }
    }
}

impl<C> Deref for PooledConnection<C>
where
    C: Connect,
{
    type Target = C::Connection;

    fn deref(&self) -> &Self::Target {
        match self.conn.as_ref() {
            Some(conn) => conn,
            None => unreachable!("pooled connection accessed after release"),
        }
    }
}

impl<C> DerefMut for PooledConnection<C>
where
    C: Connect,
{
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self.conn.as_mut() {
            Some(conn) => conn,
            None => unreachable!("pooled connection accessed after release"),
        }
    }
}

impl<C> Drop for PooledConnection<C>
where
    C: Connect,
{
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Some(inner) = self.pool.upgrade() {
                ConnectionPool::from_inner(inner).release(conn);
            }
        }
    }
}
