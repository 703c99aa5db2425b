//! Sources of the observed compute fleet size.
use convergence::SampleSource;
use futures::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};

pub mod capacity;
pub mod headnode;
pub mod membership;

pub use capacity::InstanceCapacityObserver;
pub use headnode::HeadNodeMetricsObserver;
pub use membership::SchedulerMembershipObserver;

/// Result of calls to external capabilities. Errors are always treated as retryable by the
/// monitoring loop.
pub type ObserveResult<T> = anyhow::Result<T>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounts {
    pub pending: u64,
    pub running: u64,
}

/// A single reading of an observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub count: u64,
    /// Scheduler queue statistics, if the observer can provide them.
    pub jobs: Option<JobCounts>,
}

impl Observation {
    pub fn count(count: u64) -> Self {
        Self { count, jobs: None }
    }
}

pub trait Observer {
    fn source(&self) -> SampleSource;

    fn sample(&self) -> LocalBoxFuture<'_, ObserveResult<Observation>>;
}
