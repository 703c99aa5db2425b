//! Monitoring of compute fleet scaling.
pub mod config;
pub mod scaling_test;
pub mod session;

pub use config::{
    MonitorProfile, ProfileKind, ScalingPhase, ScalingTestConfig, max_monitoring_time_from_env,
};
pub use scaling_test::{PhaseResult, ScalingTestContext, run_scaling_test};
pub use session::{ScalingSession, SessionConfig, monitor_scaling, watch_compute_nodes};
