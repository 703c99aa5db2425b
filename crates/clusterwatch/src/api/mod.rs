//! Per-cluster monitoring state exposed to callers.
pub mod models;
pub mod service;

pub use models::{
    ClusterFailure, ClusterView, ConvergenceView, LoginNodesPool, LoginNodesState,
};
pub use service::{MonitorService, create_monitor_service};
