pub mod api;
pub mod aws;
pub mod client;
pub mod common;
pub mod diagnose;
pub mod metrics;
pub mod monitor;
pub mod observer;
pub mod remote;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod tests;

pub use crate::common::error::ClusterWatchError as Error;
pub type Result<T> = std::result::Result<T, Error>;

pub const CLUSTERWATCH_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Tag attached to every instance launched for a cluster.
pub const CLUSTER_NAME_TAG: &str = "parallelcluster:cluster-name";
/// Tag distinguishing head, login and compute instances.
pub const NODE_TYPE_TAG: &str = "parallelcluster:node-type";
