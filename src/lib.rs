//! # viewlink
//! Client-side transport for dispatching view (map/reduce index) queries
//! across a cluster of database nodes over HTTP.
//!
//! This is a convenience package which re-exports the sub-projects within
//! viewlink, realistically you probably only want some of these projects:
//!
//! ### Features
//! - `viewlink_pool` - A bounded, asynchronous per-node connection pool with
//!   FIFO pending-request queueing.
//! - `viewlink_cluster` - Round-robin dispatch of operations across cluster
//!   nodes and atomic node-set reconfiguration when the topology changes.

#[cfg(feature = "viewlink-cluster")]
pub use viewlink_cluster as cluster;
#[cfg(feature = "viewlink-pool")]
pub use viewlink_pool as pool;
