use std::fmt::{Display, Formatter};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::series::{SampleSource, TimeSeries};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Running,
    Converged,
    TimedOut,
}

impl Display for SessionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Running => f.write_str("RUNNING"),
            SessionState::Converged => f.write_str("CONVERGED"),
            SessionState::TimedOut => f.write_str("TIMED_OUT"),
        }
    }
}

/// How many samples of each source could not be taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedSamples {
    pub capacity: u32,
    pub membership: u32,
}

/// Accumulates the transition logs of one monitoring session.
#[derive(Debug, Clone)]
pub struct ConvergenceTracker {
    capacity: TimeSeries,
    membership: TimeSeries,
    failed: FailedSamples,
}

impl Default for ConvergenceTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ConvergenceTracker {
    pub fn new() -> Self {
        Self {
            capacity: TimeSeries::new(SampleSource::Capacity),
            membership: TimeSeries::new(SampleSource::Membership),
            failed: FailedSamples::default(),
        }
    }

    /// Records a successful sample. Returns `true` if it was a transition.
    pub fn record(
        &mut self,
        source: SampleSource,
        count: u64,
        elapsed: Duration,
        date: SystemTime,
    ) -> bool {
        self.series_mut(source).record(count, elapsed, date)
    }

    pub fn record_failure(&mut self, source: SampleSource) {
        match source {
            SampleSource::Capacity => self.failed.capacity += 1,
            SampleSource::Membership => self.failed.membership += 1,
        }
    }

    fn series_mut(&mut self, source: SampleSource) -> &mut TimeSeries {
        match source {
            SampleSource::Capacity => &mut self.capacity,
            SampleSource::Membership => &mut self.membership,
        }
    }

    pub fn capacity(&self) -> &TimeSeries {
        &self.capacity
    }

    pub fn membership(&self) -> &TimeSeries {
        &self.membership
    }

    pub fn failed_samples(&self) -> FailedSamples {
        self.failed
    }

    /// Ends the session. Consuming the tracker guarantees that exactly one result is produced.
    pub fn finish(self, timed_out: bool, ticks: u32, elapsed: Duration) -> ConvergenceResult {
        ConvergenceResult {
            capacity: self.capacity,
            membership: self.membership,
            state: if timed_out {
                SessionState::TimedOut
            } else {
                SessionState::Converged
            },
            end_time: SystemTime::now(),
            elapsed,
            ticks,
            failed_samples: self.failed,
        }
    }
}

/// Outcome of a finished monitoring session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvergenceResult {
    #[serde(rename = "capacitySeries")]
    capacity: TimeSeries,
    #[serde(rename = "membershipSeries")]
    membership: TimeSeries,
    state: SessionState,
    end_time: SystemTime,
    elapsed: Duration,
    ticks: u32,
    failed_samples: FailedSamples,
}

impl ConvergenceResult {
    pub fn capacity(&self) -> &TimeSeries {
        &self.capacity
    }

    pub fn membership(&self) -> &TimeSeries {
        &self.membership
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn timed_out(&self) -> bool {
        matches!(self.state, SessionState::TimedOut)
    }

    pub fn end_time(&self) -> SystemTime {
        self.end_time
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    pub fn failed_samples(&self) -> FailedSamples {
        self.failed_samples
    }
}
