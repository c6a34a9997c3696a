use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
/// The pool rejected the call outright.
pub enum PoolError {
    #[error("connection pool has been shut down")]
    /// The pool no longer accepts connection requests.
    Closed,
}

#[derive(Debug, Error)]
/// A queued connection request completed without producing a connection.
pub enum AcquireError {
    #[error("connection request was cancelled")]
    /// The request was cancelled before a connection could be bound to it.
    Cancelled,

    #[error("failed to establish connection: {0}")]
    /// The connect attempt backing this request definitively failed.
    ConnectFailed(#[from] io::Error),

    #[error("connection pool was shut down while the request was queued")]
    /// The pool shut down with this request still waiting.
    PoolClosed,
}
