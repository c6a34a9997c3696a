use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub type Counter = AtomicU64;

#[derive(Debug, Clone, Default)]
/// Live metrics around one node's connection pool.
pub struct PoolStatistics(Arc<PoolStatisticsInner>);

impl Deref for PoolStatistics {
    type Target = PoolStatisticsInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Debug, Default)]
pub struct PoolStatisticsInner {
    /// The number of connections the pool has successfully opened.
    pub(crate) connections_opened: Counter,
    /// The number of times a persistent connection was re-used.
    pub(crate) connections_reused: Counter,
    /// The number of connection requests which had to be queued.
    pub(crate) requests_queued: Counter,
    /// The number of queued requests which ended in cancellation.
    pub(crate) requests_cancelled: Counter,
}

impl PoolStatisticsInner {
    /// The number of connections the pool has successfully opened.
    pub fn connections_opened(&self) -> u64 {
        self.connections_opened.load(Ordering::Relaxed)
    }

    /// The number of times a persistent connection was re-used.
    pub fn connections_reused(&self) -> u64 {
        self.connections_reused.load(Ordering::Relaxed)
    }

    /// The number of connection requests which had to be queued.
    pub fn requests_queued(&self) -> u64 {
        self.requests_queued.load(Ordering::Relaxed)
    }

    /// The number of queued requests which ended in cancellation.
    pub fn requests_cancelled(&self) -> u64 {
        self.requests_cancelled.load(Ordering::Relaxed)
    }
}
