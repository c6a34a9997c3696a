#![allow(dead_code)] // Not every test binary exercises every helper.

use std::collections::HashSet;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use viewlink_cluster::Operation;
use viewlink_pool::{Connect, PoolConfig, PoolableConnection, PooledConnection};

pub fn addr(port: u16) -> SocketAddr {
    ([127, 0, 0, 1], port).into()
}

pub struct StubConn {
    pub addr: SocketAddr,
    pub open: Arc<AtomicBool>,
}

impl PoolableConnection for StubConn {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Default)]
/// In-memory connector: connects instantly everywhere except addresses
/// marked as stalled, which never finish.
pub struct StubConnect {
    stalled: Arc<Mutex<HashSet<SocketAddr>>>,
}

impl StubConnect {
    pub fn stall(&self, addr: SocketAddr) {
        self.stalled.lock().insert(addr);
    }
}

#[async_trait]
impl Connect for StubConnect {
    type Connection = StubConn;

    async fn connect(
        &self,
        addr: SocketAddr,
        _config: &PoolConfig,
    ) -> io::Result<StubConn> {
        if self.stalled.lock().contains(&addr) {
            std::future::pending::<()>().await;
        }
        Ok(StubConn {
            addr,
            open: Arc::new(AtomicBool::new(true)),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpEvent {
    Submitted { id: usize, node: SocketAddr },
    Cancelled { id: usize },
}

/// An operation which records how the transport resolved it.
pub struct TestOp {
    pub id: usize,
    pub events: flume::Sender<OpEvent>,
}

#[async_trait]
impl Operation<StubConnect> for TestOp {
    async fn submit(self: Box<Self>, conn: PooledConnection<StubConnect>) {
        let _ = self.events.send(OpEvent::Submitted {
            id: self.id,
            node: conn.addr,
        });
    }

    fn cancel(self: Box<Self>) {
        let _ = self.events.send(OpEvent::Cancelled { id: self.id });
    }
}

/// Receive exactly `n` operation events, failing the test on a stall.
pub async fn recv_events(rx: &flume::Receiver<OpEvent>, n: usize) -> Vec<OpEvent> {
    let mut events = Vec::with_capacity(n);
    for _ in 0..n {
        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv_async())
            .await
            .expect("operation event within deadline")
            .expect("event channel open");
        events.push(event);
    }
    events
}
