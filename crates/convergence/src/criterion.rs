use serde::{Deserialize, Serialize};

use crate::series::TimeSeries;

/// Decides whether a single source has reached its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Criterion {
    /// The largest count seen so far equals `target` and is non-zero.
    ///
    /// A low reading from a lagging source is ignored once the target was reached, and a series
    /// that only ever saw zeros is never accepted.
    RunningMax { target: u64 },
    /// The source has seen a non-zero count and its latest count is zero, i.e. the fleet has
    /// been drained after being scaled up.
    DrainedAfterScaleUp,
    /// The latest count equals `target`. No smoothing, used when only a single, noise-free source
    /// is watched.
    LatestEquals { target: u64 },
}

impl Criterion {
    /// Criterion used for monitoring a scaling operation towards `target` nodes.
    pub fn for_target(target: u64) -> Self {
        if target == 0 {
            Criterion::DrainedAfterScaleUp
        } else {
            Criterion::RunningMax { target }
        }
    }

    pub fn target(&self) -> u64 {
        match self {
            Criterion::RunningMax { target } | Criterion::LatestEquals { target } => *target,
            Criterion::DrainedAfterScaleUp => 0,
        }
    }

    pub fn is_satisfied(&self, series: &TimeSeries) -> bool {
        match *self {
            Criterion::RunningMax { target } => match series.max_count() {
                Some(max) => max == target && max != 0,
                None => false,
            },
            Criterion::DrainedAfterScaleUp => {
                series.has_nonzero() && series.last_count() == Some(0)
            }
            Criterion::LatestEquals { target } => series.last_count() == Some(target),
        }
    }
}

/// Selects which sources take part in the stop decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLimits {
    /// Stop only after all instances have been launched.
    pub capacity: bool,
    /// Stop only after all nodes have joined the scheduler.
    pub membership: bool,
}

impl SourceLimits {
    pub fn both() -> Self {
        Self {
            capacity: true,
            membership: true,
        }
    }

    pub fn membership_only() -> Self {
        Self {
            capacity: false,
            membership: true,
        }
    }

    pub fn capacity_only() -> Self {
        Self {
            capacity: true,
            membership: false,
        }
    }
}

impl Default for SourceLimits {
    fn default() -> Self {
        Self::both()
    }
}

/// Returns `true` while polling should continue, i.e. while any enabled source has not satisfied
/// `criterion`. With no source enabled, polling stops after the first tick.
pub fn should_continue(
    criterion: &Criterion,
    limits: &SourceLimits,
    capacity: &TimeSeries,
    membership: &TimeSeries,
) -> bool {
    (limits.capacity && !criterion.is_satisfied(capacity))
        || (limits.membership && !criterion.is_satisfied(membership))
}
