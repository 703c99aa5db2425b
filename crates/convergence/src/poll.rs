use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Fixed wait between ticks and the hard ceiling on the total monitoring time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSchedule {
    pub tick: Duration,
    pub ceiling: Duration,
}

impl PollSchedule {
    pub fn new(tick: Duration, ceiling: Duration) -> Self {
        Self { tick, ceiling }
    }
}

/// Passed to every tick so that samples can be stamped relative to the start of polling.
#[derive(Debug, Clone, Copy)]
pub struct TickContext {
    pub index: u32,
    started_at: Instant,
}

impl TickContext {
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

#[derive(Debug)]
pub struct PollOutcome<S> {
    pub state: S,
    pub timed_out: bool,
    pub ticks: u32,
    pub elapsed: Duration,
}

/// Runs `tick` repeatedly until `done` accepts the accumulated state or the ceiling of `schedule`
/// is exceeded.
///
/// The accumulator is moved into every tick and handed back by it, so the tick function never
/// shares mutable state with the caller. At least one tick is always performed. After each tick
/// that does not satisfy `done`, the loop either stops (ceiling reached) or waits for
/// `schedule.tick`, so polling ends at most one tick after the ceiling.
///
/// Running out of time is not an error: the partially accumulated state is always returned.
pub async fn poll_until<S, F, Fut, P>(
    mut state: S,
    schedule: &PollSchedule,
    mut tick: F,
    mut done: P,
) -> PollOutcome<S>
where
    F: FnMut(S, TickContext) -> Fut,
    Fut: Future<Output = S>,
    P: FnMut(&S) -> bool,
{
    let started_at = Instant::now();
    let mut ticks = 0;

    loop {
        let context = TickContext {
            index: ticks,
            started_at,
        };
        state = tick(state, context).await;
        ticks += 1;

        if done(&state) {
            return PollOutcome {
                state,
                timed_out: false,
                ticks,
                elapsed: started_at.elapsed(),
            };
        }

        let elapsed = started_at.elapsed();
        if elapsed >= schedule.ceiling {
            log::debug!(
                "Polling stopped after {ticks} tick(s): {elapsed:?} exceeds the limit of {:?}",
                schedule.ceiling
            );
            return PollOutcome {
                state,
                timed_out: true,
                ticks,
                elapsed,
            };
        }
        tokio::time::sleep(schedule.tick).await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{PollSchedule, poll_until};

    #[tokio::test(start_paused = true)]
    async fn stops_when_done() {
        let schedule = PollSchedule::new(Duration::from_secs(1), Duration::from_secs(60));
        let outcome = poll_until(
            Vec::new(),
            &schedule,
            |mut values: Vec<u32>, context| async move {
                values.push(context.index);
                values
            },
            |values| values.len() == 3,
        )
        .await;
        assert!(!outcome.timed_out);
        assert_eq!(outcome.ticks, 3);
        assert_eq!(outcome.state, vec![0, 1, 2]);
        assert_eq!(outcome.elapsed, Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn done_on_first_tick_does_not_wait() {
        let schedule = PollSchedule::new(Duration::from_secs(20), Duration::from_secs(60));
        let outcome = poll_until(0u32, &schedule, |n, _| async move { n + 1 }, |_| true).await;
        assert!(!outcome.timed_out);
        assert_eq!(outcome.ticks, 1);
        assert_eq!(outcome.elapsed, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_within_one_tick_of_ceiling() {
        let tick = Duration::from_secs(20);
        let ceiling = Duration::from_secs(90);
        let schedule = PollSchedule::new(tick, ceiling);
        let outcome = poll_until(0u32, &schedule, |n, _| async move { n + 1 }, |_| false).await;
        assert!(outcome.timed_out);
        assert!(outcome.elapsed >= ceiling);
        assert!(outcome.elapsed <= ceiling + tick);
        // Ticks at 0, 20, 40, 60, 80 and 100 seconds.
        assert_eq!(outcome.ticks, 6);
        assert_eq!(outcome.state, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_ceiling_still_ticks_once() {
        let schedule = PollSchedule::new(Duration::from_secs(1), Duration::ZERO);
        let outcome = poll_until(0u32, &schedule, |n, _| async move { n + 1 }, |_| false).await;
        assert!(outcome.timed_out);
        assert_eq!(outcome.ticks, 1);
        assert_eq!(outcome.state, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_ticks_count_towards_ceiling() {
        let schedule = PollSchedule::new(Duration::from_secs(1), Duration::from_secs(10));
        let outcome = poll_until(
            0u32,
            &schedule,
            |n, _| async move {
                tokio::time::sleep(Duration::from_secs(4)).await;
                n + 1
            },
            |_| false,
        )
        .await;
        assert!(outcome.timed_out);
        // Ticks finish at 4, 9 and 14 seconds.
        assert_eq!(outcome.ticks, 3);
        assert_eq!(outcome.elapsed, Duration::from_secs(14));
    }
}
