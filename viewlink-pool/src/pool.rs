use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::PoolConfig;
use crate::connection::{Connect, PoolableConnection};
use crate::error::{AcquireError, PoolError};
use crate::pending::{ConnectionRequest, RequestSlot};
use crate::statistics::PoolStatistics;

/// A bounded pool of persistent connections to a single node.
///
/// Connections are handed out greedy-reuse-first: an idle open connection is
/// always preferred, and a new connect attempt is only started when none is
/// idle and the pool is below [`PoolConfig::max_connections`]. Callers which
/// cannot be satisfied immediately are queued and fulfilled in strict FIFO
/// order as connections are released or new connects complete.
///
/// The pool is a cheap-to-clone handle; all clones share the same state.
pub struct ConnectionPool<C>
where
    C: Connect,
{
    inner: Arc<PoolInner<C>>,
}

impl<C> Clone for ConnectionPool<C>
where
    C: Connect,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

pub(crate) struct PoolInner<C>
where
    C: Connect,
{
    addr: SocketAddr,
    config: PoolConfig,
    connector: C,
    statistics: PoolStatistics,
    shutdown: AtomicBool,
    state: Mutex<PoolState<C::Connection>>,
}

struct PoolState<T> {
    /// Idle open connections ready for immediate checkout.
    available: VecDeque<T>,
    /// Unfulfilled connection requests, oldest first.
    pending: VecDeque<Arc<RequestSlot<T>>>,
    /// Connections currently alive, idle and checked out combined.
    live: usize,
    /// Connect attempts currently in flight.
    connecting: usize,
}

impl<C> ConnectionPool<C>
where
    C: Connect,
{
    /// Create a new pool for the node at `addr`.
    ///
    /// No connection is opened until the first request arrives.
    pub fn new(addr: SocketAddr, config: PoolConfig, connector: C) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                addr,
                config,
                connector,
                statistics: PoolStatistics::default(),
                shutdown: AtomicBool::new(false),
                state: Mutex::new(PoolState {
                    available: VecDeque::new(),
                    pending: VecDeque::new(),
                    live: 0,
                    connecting: 0,
                }),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<PoolInner<C>>) -> Self {
        Self { inner }
    }

    #[inline]
    /// The address of the node this pool serves.
    pub fn addr(&self) -> SocketAddr {
        self.inner.addr
    }

    #[inline]
    /// Gets the live pool statistics.
    pub fn statistics(&self) -> PoolStatistics {
        self.inner.statistics.clone()
    }

    #[inline]
    /// Whether the pool has been shut down.
    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.load(Ordering::Acquire)
    }

    /// The number of connection requests still waiting for a connection.
    pub fn pending_len(&self) -> usize {
        let state = self.inner.state.lock();
        state.pending.iter().filter(|slot| slot.is_waiting()).count()
    }

    /// Whether any connection request is still waiting for a connection.
    pub fn has_pending_requests(&self) -> bool {
        self.pending_len() > 0
    }

    /// Request a connection from the pool.
    ///
    /// Never blocks. If an idle open connection exists the returned request
    /// is already fulfilled; otherwise the request is queued and enough
    /// connect attempts are started to keep the pool working towards its
    /// connection limit. Stale idle connections found along the way are
    /// silently discarded, they are never handed to a caller.
    pub fn request_connection(&self) -> Result<ConnectionRequest<C>, PoolError> {
        let mut state = self.inner.state.lock();
        if self.is_shutdown() {
            return Err(PoolError::Closed);
        }

        while let Some(conn) = state.available.pop_front() {
            if conn.is_open() {
                debug!(addr = %self.inner.addr, "re-using persistent connection");
                self.inner
                    .statistics
                    .connections_reused
                    .fetch_add(1, Ordering::Relaxed);
                let slot = RequestSlot::ready(conn);
                return Ok(ConnectionRequest::new(slot, Arc::downgrade(&self.inner)));
            }
            // Stale connection found at acquisition time.
            state.live -= 1;
        }

        let slot = RequestSlot::waiting();
        state.pending.push_back(slot.clone());
        self.inner
            .statistics
            .requests_queued
            .fetch_add(1, Ordering::Relaxed);
        self.spawn_connects(&mut state);

        Ok(ConnectionRequest::new(slot, Arc::downgrade(&self.inner)))
    }

    /// Return a connection to the pool.
    ///
    /// An open connection satisfies the oldest pending request, or re-joins
    /// the idle set if none is waiting. A connection whose session has
    /// closed is discarded and, if requests are still pending, replaced by
    /// a fresh connect attempt. No-op once the pool has shut down.
    pub fn release(&self, conn: C::Connection) {
        let mut state = self.inner.state.lock();
        if self.is_shutdown() {
            return;
        }

        if conn.is_open() {
            if self.hand_over_or_park(&mut state, conn) {
                debug!(addr = %self.inner.addr, "re-using persistent connection");
                self.inner
                    .statistics
                    .connections_reused
                    .fetch_add(1, Ordering::Relaxed);
            }
        } else {
            state.live -= 1;
            if !state.pending.is_empty() {
                self.spawn_connects(&mut state);
            }
        }
    }

    /// Shut the pool down.
    ///
    /// Every pending request is cancelled exactly once and the idle set is
    /// dropped. Connections currently checked out finish their exchange and
    /// are discarded on release. Returns `false` if the pool was already
    /// shut down.
    pub fn shutdown(&self) -> bool {
        if self.inner.shutdown.swap(true, Ordering::AcqRel) {
            info!(
                addr = %self.inner.addr,
                "suppressing duplicate attempt to shut down pool"
            );
            return false;
        }

        let drained = {
            let mut state = self.inner.state.lock();
            state.available.clear();
            state.live = 0;
            std::mem::take(&mut state.pending)
        };

        let mut cancelled = 0u64;
        for slot in drained {
            if slot.cancel(AcquireError::PoolClosed).is_ok() {
                cancelled += 1;
            }
        }
        self.inner
            .statistics
            .requests_cancelled
            .fetch_add(cancelled, Ordering::Relaxed);

        info!(
            addr = %self.inner.addr,
            cancelled_requests = cancelled,
            "connection pool shut down"
        );
        true
    }

    /// Hand an open connection to the oldest live pending request, or park
    /// it in the idle set if every queued request has already been
    /// cancelled. Returns whether a request was fulfilled.
    fn hand_over_or_park(
        &self,
        state: &mut PoolState<C::Connection>,
        conn: C::Connection,
    ) -> bool {
        let mut conn = conn;
        while let Some(slot) = state.pending.pop_front() {
            match slot.fulfil(conn) {
                Ok(()) => return true,
                // The request was cancelled while queued; offer the
                // connection to the next one.
                Err(returned) => conn = returned,
            }
        }
        state.available.push_back(conn);
        false
    }

    /// Start enough connect attempts to work towards satisfying the pending
    /// queue without exceeding the connection limit.
    fn spawn_connects(&self, state: &mut PoolState<C::Connection>) {
        while state.live + state.connecting < self.inner.config.max_connections
            && state.connecting < state.pending.len()
        {
            state.connecting += 1;
            info!(addr = %self.inner.addr, "opening new view connection");

            let inner = self.inner.clone();
            tokio::spawn(async move {
                let result = inner.connector.connect(inner.addr, &inner.config).await;
                let pool = ConnectionPool::from_inner(inner);
                match result {
                    Ok(conn) => pool.on_connected(conn),
                    Err(error) => pool.on_connect_failed(error),
                }
            });
        }
    }

    /// A connect attempt finished successfully.
    fn on_connected(&self, conn: C::Connection) {
        let mut state = self.inner.state.lock();
        state.connecting -= 1;
        if self.is_shutdown() {
            // Arrived after shutdown; the connection is simply dropped.
            return;
        }

        state.live += 1;
        self.inner
            .statistics
            .connections_opened
            .fetch_add(1, Ordering::Relaxed);
        self.hand_over_or_park(&mut state, conn);
    }

    /// A connect attempt definitively failed.
    ///
    /// The failure is surfaced to the oldest live pending request; the pool
    /// itself never retries.
    fn on_connect_failed(&self, error: io::Error) {
        warn!(
            addr = %self.inner.addr,
            error = %error,
            "view connection attempt failed"
        );

        {
            let mut state = self.inner.state.lock();
            state.connecting -= 1;
        }

        let mut reason = AcquireError::ConnectFailed(error);
        loop {
            let slot = {
                let mut state = self.inner.state.lock();
                state.pending.pop_front()
            };
            let Some(slot) = slot else {
                // Nothing left to notify; every queued request was already
                // satisfied or cancelled.
                return;
            };
            match slot.cancel(reason) {
                Ok(()) => {
                    self.inner
                        .statistics
                        .requests_cancelled
                        .fetch_add(1, Ordering::Relaxed);
                    return;
                },
                Err(returned) => reason = returned,
            }
        }
    }
}
