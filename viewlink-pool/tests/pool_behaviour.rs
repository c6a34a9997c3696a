use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::timeout;
use viewlink_pool::{
    AcquireError,
    Connect,
    ConnectionPool,
    PoolConfig,
    PoolError,
    PoolableConnection,
};

struct StubConn {
    id: usize,
    open: Arc<AtomicBool>,
}

impl PoolableConnection for StubConn {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy)]
enum Script {
    /// The connect attempt succeeds.
    Succeed,
    /// The connect attempt fails with `ConnectionRefused`.
    Refuse,
    /// The connect attempt never completes.
    Stall,
}

#[derive(Clone, Default)]
struct StubConnect {
    script: Arc<Mutex<VecDeque<Script>>>,
    opened: Arc<AtomicUsize>,
    flags: Arc<Mutex<Vec<Arc<AtomicBool>>>>,
}

impl StubConnect {
    fn scripted(steps: impl IntoIterator<Item = Script>) -> Self {
        Self {
            script: Arc::new(Mutex::new(steps.into_iter().collect())),
            ..Default::default()
        }
    }

    fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Flip the open flag of the nth connection this connector produced.
    fn close_conn(&self, n: usize) {
        self.flags.lock()[n].store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connect for StubConnect {
    type Connection = StubConn;

    async fn connect(
        &self,
        _addr: SocketAddr,
        _config: &PoolConfig,
    ) -> io::Result<StubConn> {
        let step = self.script.lock().pop_front().unwrap_or(Script::Succeed);
        match step {
            Script::Succeed => {
                let id = self.opened.fetch_add(1, Ordering::SeqCst);
                let open = Arc::new(AtomicBool::new(true));
                self.flags.lock().push(open.clone());
                Ok(StubConn { id, open })
            },
            Script::Refuse => Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "stub refused the connection",
            )),
            Script::Stall => std::future::pending().await,
        }
    }
}

fn node_addr() -> SocketAddr {
    "127.0.0.1:8092".parse().unwrap()
}

/// Give spawned connect tasks a chance to run on the test runtime.
async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

const WAIT: Duration = Duration::from_secs(1);

#[tokio::test]
async fn test_fresh_connect_then_reuse() {
    let connector = StubConnect::default();
    let pool = ConnectionPool::new(
        node_addr(),
        PoolConfig::default().with_max_connections(2),
        connector.clone(),
    );

    let conn = timeout(WAIT, pool.request_connection().unwrap())
        .await
        .expect("request fulfilled in time")
        .expect("connection established");
    assert_eq!(connector.opened(), 1);
    drop(conn);

    // The released connection is idle, so the next request is satisfied
    // synchronously without another connect.
    let request = pool.request_connection().unwrap();
    assert!(request.is_fulfilled());
    let conn = timeout(WAIT, request).await.unwrap().unwrap();
    assert_eq!(conn.id, 0);
    assert_eq!(connector.opened(), 1);
    assert!(pool.statistics().connections_reused() >= 1);
}

#[tokio::test]
async fn test_checkout_never_exceeds_limit() {
    let connector = StubConnect::default();
    let pool = ConnectionPool::new(
        node_addr(),
        PoolConfig::default().with_max_connections(2),
        connector.clone(),
    );

    let requests: Vec<_> = (0..5)
        .map(|_| pool.request_connection().unwrap())
        .collect();
    settle().await;

    assert_eq!(connector.opened(), 2);

    let mut requests = requests.into_iter();
    let first = timeout(WAIT, requests.next().unwrap()).await.unwrap().unwrap();
    let second = timeout(WAIT, requests.next().unwrap()).await.unwrap().unwrap();
    assert_eq!(pool.pending_len(), 3);
    assert_eq!(connector.opened(), 2);

    // Releasing one checkout lets exactly one queued request through.
    drop(first);
    settle().await;
    let third = timeout(WAIT, requests.next().unwrap()).await.unwrap().unwrap();
    assert_eq!(connector.opened(), 2);

    drop(second);
    drop(third);
}

#[tokio::test]
async fn test_pending_requests_fulfilled_in_fifo_order() {
    let connector = StubConnect::default();
    let pool = ConnectionPool::new(
        node_addr(),
        PoolConfig::default().with_max_connections(1),
        connector.clone(),
    );

    let first = pool.request_connection().unwrap();
    let second = pool.request_connection().unwrap();
    let third = pool.request_connection().unwrap();
    settle().await;

    let conn = timeout(WAIT, first).await.unwrap().unwrap();
    assert!(!second.is_fulfilled());
    assert!(!third.is_fulfilled());

    drop(conn);
    settle().await;
    assert!(second.is_fulfilled());
    assert!(!third.is_fulfilled());

    let conn = timeout(WAIT, second).await.unwrap().unwrap();
    drop(conn);
    settle().await;
    assert!(third.is_fulfilled());
}

#[tokio::test]
async fn test_shutdown_cancels_pending_and_fails_fast() {
    let connector = StubConnect::scripted([Script::Stall, Script::Stall]);
    let pool = ConnectionPool::new(
        node_addr(),
        PoolConfig::default().with_max_connections(4),
        connector.clone(),
    );

    let first = pool.request_connection().unwrap();
    let second = pool.request_connection().unwrap();
    settle().await;

    assert!(pool.shutdown());

    let err = timeout(WAIT, first).await.unwrap().unwrap_err();
    assert!(matches!(err, AcquireError::PoolClosed));
    let err = timeout(WAIT, second).await.unwrap().unwrap_err();
    assert!(matches!(err, AcquireError::PoolClosed));

    assert_eq!(pool.statistics().requests_cancelled(), 2);
    assert_eq!(connector.opened(), 0);

    // Duplicate shutdown is a reported no-op.
    assert!(!pool.shutdown());

    let err = pool.request_connection().unwrap_err();
    assert!(matches!(err, PoolError::Closed));
}

#[tokio::test]
async fn test_stale_connection_replaced_on_release() {
    let connector = StubConnect::default();
    let pool = ConnectionPool::new(
        node_addr(),
        PoolConfig::default().with_max_connections(1),
        connector.clone(),
    );

    let conn = timeout(WAIT, pool.request_connection().unwrap())
        .await
        .unwrap()
        .unwrap();
    connector.close_conn(0);

    // Queued while the only connection is checked out; the pool is at its
    // limit so no new attempt starts yet.
    let waiting = pool.request_connection().unwrap();
    settle().await;
    assert_eq!(connector.opened(), 1);

    // Releasing the dead connection discards it and triggers a replacement
    // connect for the waiting request.
    drop(conn);
    settle().await;
    let conn = timeout(WAIT, waiting).await.unwrap().unwrap();
    assert_eq!(conn.id, 1);
    assert_eq!(connector.opened(), 2);
}

#[tokio::test]
async fn test_stale_idle_connection_discarded_at_acquire() {
    let connector = StubConnect::default();
    let pool = ConnectionPool::new(
        node_addr(),
        PoolConfig::default().with_max_connections(2),
        connector.clone(),
    );

    let conn = timeout(WAIT, pool.request_connection().unwrap())
        .await
        .unwrap()
        .unwrap();
    drop(conn);

    // Dies while parked in the idle set.
    connector.close_conn(0);

    let conn = timeout(WAIT, pool.request_connection().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(conn.id, 1);
    assert_eq!(connector.opened(), 2);
    assert_eq!(pool.statistics().connections_reused(), 0);
}

#[tokio::test]
async fn test_connect_failure_surfaces_to_oldest_request() {
    let connector = StubConnect::scripted([Script::Refuse]);
    let pool = ConnectionPool::new(
        node_addr(),
        PoolConfig::default().with_max_connections(1),
        connector.clone(),
    );

    let request = pool.request_connection().unwrap();
    let err = timeout(WAIT, request).await.unwrap().unwrap_err();
    assert!(matches!(err, AcquireError::ConnectFailed(_)));
    assert_eq!(pool.statistics().requests_cancelled(), 1);
}

#[tokio::test]
async fn test_dropped_request_does_not_leak_connection() {
    let connector = StubConnect::default();
    let pool = ConnectionPool::new(
        node_addr(),
        PoolConfig::default().with_max_connections(1),
        connector.clone(),
    );

    let request = pool.request_connection().unwrap();
    drop(request);
    settle().await;

    // The connect finished with nobody waiting; the connection is parked
    // and satisfies the next request without a new attempt.
    let request = pool.request_connection().unwrap();
    assert!(request.is_fulfilled());
    let conn = timeout(WAIT, request).await.unwrap().unwrap();
    assert_eq!(conn.id, 0);
    assert_eq!(connector.opened(), 1);
}

#[tokio::test]
async fn test_release_after_shutdown_is_noop() {
    let connector = StubConnect::default();
    let pool = ConnectionPool::new(
        node_addr(),
        PoolConfig::default().with_max_connections(1),
        connector.clone(),
    );

    let conn = timeout(WAIT, pool.request_connection().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert!(pool.shutdown());
    // Dropping the checkout after shutdown simply discards the connection.
    drop(conn);
    assert!(pool.request_connection().is_err());
}
