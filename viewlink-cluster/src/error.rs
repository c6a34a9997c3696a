use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("dispatcher has been shut down")]
    /// The dispatcher no longer accepts operations or topology changes.
    Shutdown,

    #[error("a reconfiguration is already in progress")]
    /// Another reconfiguration run is still applying a topology; the
    /// rejected call should be retried with the latest topology.
    Reconfiguring,
}
