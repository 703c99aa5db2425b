use std::fmt::{Display, Formatter};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

/// Which view of the fleet produced a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleSource {
    /// Instances that the cloud provider reports as active for the cluster.
    Capacity,
    /// Compute nodes that the scheduler recognizes as joined.
    Membership,
}

impl Display for SampleSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleSource::Capacity => f.write_str("capacity"),
            SampleSource::Membership => f.write_str("membership"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationSample {
    pub source: SampleSource,
    pub count: u64,
    /// Monotonic offset from the start of the monitoring session.
    pub elapsed: Duration,
    /// Wall-clock time of the sample, for correlating with external logs.
    pub date: SystemTime,
}

/// Transition log of a single source.
///
/// A sample is recorded only when its count differs from the last recorded count, so consecutive
/// entries never share a count. Offsets are non-decreasing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSeries {
    source: SampleSource,
    samples: Vec<ObservationSample>,
}

impl TimeSeries {
    pub fn new(source: SampleSource) -> Self {
        Self {
            source,
            samples: Vec::new(),
        }
    }

    pub fn source(&self) -> SampleSource {
        self.source
    }

    /// Records `count` if it is a transition. Returns `true` if the series grew.
    ///
    /// An offset older than the last recorded one is clamped to it.
    pub fn record(&mut self, count: u64, elapsed: Duration, date: SystemTime) -> bool {
        let elapsed = match self.samples.last() {
            Some(last) if last.count == count => return false,
            Some(last) => elapsed.max(last.elapsed),
            None => elapsed,
        };
        self.samples.push(ObservationSample {
            source: self.source,
            count,
            elapsed,
            date,
        });
        true
    }

    pub fn samples(&self) -> &[ObservationSample] {
        &self.samples
    }

    pub fn counts(&self) -> Vec<u64> {
        self.samples.iter().map(|sample| sample.count).collect()
    }

    pub fn last_count(&self) -> Option<u64> {
        self.samples.last().map(|sample| sample.count)
    }

    /// Largest count seen so far.
    pub fn max_count(&self) -> Option<u64> {
        self.samples.iter().map(|sample| sample.count).max()
    }

    pub fn has_nonzero(&self) -> bool {
        self.samples.iter().any(|sample| sample.count > 0)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Renders the counts as `[a b c]`.
impl Display for TimeSeries {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("[")?;
        for (index, sample) in self.samples.iter().enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", sample.count)?;
        }
        f.write_str("]")
    }
}
