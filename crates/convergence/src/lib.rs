//! Building blocks for loops that reconcile a desired size against eventually-consistent
//! observations.
//!
//! Observations are stored as transition logs ([`TimeSeries`]), sampled by a bounded polling
//! loop ([`poll_until`]) and judged by a stop predicate ([`Criterion`]). A session ends either
//! converged or timed out, and in both cases hands back everything it collected as a
//! [`ConvergenceResult`].
pub mod criterion;
pub mod poll;
pub mod series;
pub mod tracker;

pub use criterion::{Criterion, SourceLimits, should_continue};
pub use poll::{PollOutcome, PollSchedule, TickContext, poll_until};
pub use series::{ObservationSample, SampleSource, TimeSeries};
pub use tracker::{ConvergenceResult, ConvergenceTracker, FailedSamples, SessionState};
