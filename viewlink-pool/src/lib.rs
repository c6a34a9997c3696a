//! Bounded asynchronous connection pooling for cluster nodes.
//!
//! Each pool owns the persistent connections to one node. Callers request a
//! connection and get back a future-style handle which resolves as soon as
//! an idle connection is available or a fresh connect attempt completes;
//! requests queued behind the connection limit are fulfilled strictly in
//! FIFO order.

#[macro_use]
extern crate tracing;

mod config;
mod connection;
mod error;
mod http;
mod pending;
mod pool;
mod statistics;

pub use config::PoolConfig;
pub use connection::{Connect, PoolableConnection, PooledConnection};
pub use error::{AcquireError, PoolError};
pub use http::{HttpConnection, HttpConnector};
pub use pending::ConnectionRequest;
pub use pool::ConnectionPool;
pub use statistics::PoolStatistics;
