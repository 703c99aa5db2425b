//! Explaining why a cluster did not reach its desired state.
pub mod bootstrap;
pub mod failure;

pub use bootstrap::{BootstrapErrorLog, BootstrapReport, BootstrapScan, get_bootstrap_errors};
pub use failure::{FailureCode, FailureRecord, StackEvent, classify, get_failure_reason};
