use std::time::SystemTime;

use convergence::{
    ConvergenceResult, ConvergenceTracker, Criterion, PollSchedule, SampleSource, SourceLimits,
    TickContext, poll_until, should_continue,
};

use crate::api::MonitorService;
use crate::common::error::config_error;
use crate::metrics::{MetricsEmitter, ScalingSample};
use crate::monitor::config::MonitorProfile;
use crate::observer::Observer;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub cluster_name: String,
    pub criterion: Criterion,
    pub limits: SourceLimits,
    pub schedule: PollSchedule,
}

/// Monitors a cluster until the observed fleet size converges or the monitoring time runs out.
///
/// Each tick samples every attached observer sequentially. A failed sample is logged and counted,
/// and the source is simply sampled again on the next tick.
pub struct ScalingSession<'a> {
    config: SessionConfig,
    capacity: Option<&'a dyn Observer>,
    membership: Option<&'a dyn Observer>,
    emitter: Option<&'a MetricsEmitter>,
    reporter: Option<&'a MonitorService>,
}

impl<'a> ScalingSession<'a> {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            capacity: None,
            membership: None,
            emitter: None,
            reporter: None,
        }
    }

    pub fn with_capacity(mut self, observer: &'a dyn Observer) -> Self {
        self.capacity = Some(observer);
        self
    }

    pub fn with_membership(mut self, observer: &'a dyn Observer) -> Self {
        self.membership = Some(observer);
        self
    }

    pub fn with_metrics(mut self, emitter: Option<&'a MetricsEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    pub fn with_reporter(mut self, reporter: Option<&'a MonitorService>) -> Self {
        self.reporter = reporter;
        self
    }

    fn observers(&self) -> crate::Result<Vec<(SampleSource, &'a dyn Observer)>> {
        let slots = [
            (SampleSource::Capacity, self.capacity, self.config.limits.capacity),
            (
                SampleSource::Membership,
                self.membership,
                self.config.limits.membership,
            ),
        ];
        let mut observers = vec![];
        for (source, observer, required) in slots {
            match observer {
                Some(observer) if observer.source() != source => {
                    return config_error(format!(
                        "{} observer cannot be used as a {source} observer",
                        observer.source()
                    ));
                }
                Some(observer) => observers.push((source, observer)),
                None if required => {
                    return config_error(format!(
                        "convergence of {source} is required, but no {source} observer was given"
                    ));
                }
                None => {}
            }
        }
        Ok(observers)
    }

    /// Runs the session to completion.
    ///
    /// Only an inconsistent session setup is an error. Sampling failures and running out of time
    /// are reported through the returned result, together with everything that was collected.
    pub async fn run(self) -> crate::Result<ConvergenceResult> {
        let observers = self.observers()?;
        let SessionConfig {
            cluster_name,
            criterion,
            limits,
            schedule,
        } = &self.config;
        let emitter = self.emitter;
        let reporter = self.reporter;
        let observers = &observers;

        log::info!(
            "Monitoring cluster {cluster_name}: target {} node(s), tick {:?}, at most {:?}",
            criterion.target(),
            schedule.tick,
            schedule.ceiling
        );
        if let Some(reporter) = reporter {
            reporter.session_started(cluster_name, criterion.target());
        }

        let tick = move |mut tracker: ConvergenceTracker, context: TickContext| async move {
            let mut sample = ScalingSample::default();
            let mut changed = false;
            for (source, observer) in observers {
                match observer.sample().await {
                    Ok(observation) => {
                        let elapsed = context.elapsed();
                        if tracker.record(*source, observation.count, elapsed, SystemTime::now()) {
                            log::debug!(
                                "{source} of cluster {cluster_name} changed to {} after {elapsed:?}",
                                observation.count
                            );
                            changed = true;
                        }
                        match source {
                            SampleSource::Capacity => sample.capacity = Some(observation.count),
                            SampleSource::Membership => {
                                sample.membership = Some(observation.count)
                            }
                        }
                        if observation.jobs.is_some() {
                            sample.jobs = observation.jobs;
                        }
                    }
                    Err(error) => {
                        log::warn!(
                            "Could not sample {source} of cluster {cluster_name} (tick {}): {error:?}",
                            context.index
                        );
                        tracker.record_failure(*source);
                    }
                }
            }
            if let Some(emitter) = emitter {
                emitter.emit_scaling(&sample).await;
            }
            if let Some(reporter) = reporter {
                if changed {
                    reporter.report_progress(cluster_name, &tracker);
                }
            }
            tracker
        };
        let done = |tracker: &ConvergenceTracker| {
            !should_continue(criterion, limits, tracker.capacity(), tracker.membership())
        };

        let outcome = poll_until(ConvergenceTracker::new(), schedule, tick, done).await;
        let result = outcome
            .state
            .finish(outcome.timed_out, outcome.ticks, outcome.elapsed);

        log::info!(
            "Monitoring completed: capacity series {}, membership series {}",
            result.capacity(),
            result.membership()
        );
        if result.timed_out() {
            log::warn!(
                "Cluster {cluster_name} did not converge to {} node(s) within {:?}",
                criterion.target(),
                schedule.ceiling
            );
        }
        if let Some(reporter) = reporter {
            reporter.session_finished(cluster_name, &result);
        }
        Ok(result)
    }
}

/// Monitors a scaling operation towards `target` nodes using both sources.
#[allow(clippy::too_many_arguments)]
pub async fn monitor_scaling(
    cluster_name: &str,
    capacity: &dyn Observer,
    membership: &dyn Observer,
    target: u64,
    limits: SourceLimits,
    profile: &MonitorProfile,
    emitter: Option<&MetricsEmitter>,
    reporter: Option<&MonitorService>,
) -> crate::Result<ConvergenceResult> {
    ScalingSession::new(SessionConfig {
        cluster_name: cluster_name.to_string(),
        criterion: Criterion::for_target(target),
        limits,
        schedule: profile.schedule(),
    })
    .with_capacity(capacity)
    .with_membership(membership)
    .with_metrics(emitter)
    .with_reporter(reporter)
    .run()
    .await
}

/// Waits until the scheduler reports exactly `target` compute nodes.
pub async fn watch_compute_nodes(
    cluster_name: &str,
    membership: &dyn Observer,
    target: u64,
    profile: &MonitorProfile,
    reporter: Option<&MonitorService>,
) -> crate::Result<ConvergenceResult> {
    ScalingSession::new(SessionConfig {
        cluster_name: cluster_name.to_string(),
        criterion: Criterion::LatestEquals { target },
        limits: SourceLimits::membership_only(),
        schedule: profile.schedule(),
    })
    .with_membership(membership)
    .with_reporter(reporter)
    .run()
    .await
}
