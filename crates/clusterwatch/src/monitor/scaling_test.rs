use std::time::Duration;

use anyhow::Context;
use convergence::{ConvergenceResult, SourceLimits};
use serde::Serialize;

use crate::api::MonitorService;
use crate::common::error::config_error;
use crate::diagnose::bootstrap::{BootstrapReport, BootstrapScan, get_bootstrap_errors};
use crate::metrics::MetricsEmitter;
use crate::monitor::config::{MonitorProfile, ScalingTestConfig};
use crate::monitor::session::monitor_scaling;
use crate::observer::Observer;
use crate::remote::RemoteExecutor;

/// Collaborators of a scaling test.
pub struct ScalingTestContext<'a> {
    pub cluster_name: &'a str,
    pub capacity: &'a dyn Observer,
    pub membership: &'a dyn Observer,
    pub tick: Duration,
    /// Replaces the monitoring time of every phase.
    pub max_monitoring_time: Option<Duration>,
    pub limits: SourceLimits,
    /// Runs phase commands on the head node.
    pub executor: Option<&'a dyn RemoteExecutor>,
    pub emitter: Option<&'a MetricsEmitter>,
    pub reporter: Option<&'a MonitorService>,
    /// Collects bootstrap errors after a phase that did not converge.
    pub bootstrap: Option<BootstrapScan<'a>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseResult {
    pub target: u64,
    pub result: ConvergenceResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootstrap_errors: Option<BootstrapReport>,
}

/// Runs the phases of `config` one after another, each as an independent monitoring session.
pub async fn run_scaling_test(
    config: &ScalingTestConfig,
    context: &ScalingTestContext<'_>,
) -> crate::Result<Vec<PhaseResult>> {
    if context.executor.is_none() && config.phases.iter().any(|p| p.command.is_some()) {
        return config_error("phase commands require access to the head node");
    }

    let mut results = Vec::with_capacity(config.phases.len());
    for (index, phase) in config.phases.iter().enumerate() {
        log::info!(
            "Scaling phase {}/{}: cluster {} to {} node(s)",
            index + 1,
            config.phases.len(),
            context.cluster_name,
            phase.target
        );
        if let (Some(command), Some(executor)) = (&phase.command, context.executor) {
            executor
                .run_command(command)
                .await
                .with_context(|| format!("Cannot start scaling phase {}", index + 1))?;
        }

        let profile = MonitorProfile {
            tick: context.tick,
            max_monitoring_time: config.phase_monitoring_time(phase),
        }
        .with_overrides(None, context.max_monitoring_time);
        let result = monitor_scaling(
            context.cluster_name,
            context.capacity,
            context.membership,
            phase.target,
            context.limits,
            &profile,
            context.emitter,
            context.reporter,
        )
        .await?;

        let bootstrap_errors = match (&context.bootstrap, result.timed_out()) {
            (Some(scan), true) => Some(get_bootstrap_errors(scan).await?),
            _ => None,
        };
        results.push(PhaseResult {
            target: phase.target,
            result,
            bootstrap_errors,
        });
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use convergence::{SampleSource, SessionState, SourceLimits};

    use super::{ScalingTestContext, run_scaling_test};
    use crate::Error;
    use crate::aws::InstanceState;
    use crate::diagnose::BootstrapScan;
    use crate::monitor::config::ScalingTestConfig;
    use crate::tests::utils::{FakeExecutor, FakeInventory, ScriptedObserver, instance};

    fn context<'a>(
        capacity: &'a ScriptedObserver,
        membership: &'a ScriptedObserver,
    ) -> ScalingTestContext<'a> {
        ScalingTestContext {
            cluster_name: "c1",
            capacity,
            membership,
            tick: Duration::from_secs(1),
            max_monitoring_time: None,
            limits: SourceLimits::both(),
            executor: None,
            emitter: None,
            reporter: None,
            bootstrap: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn scale_up_then_down() {
        let config = ScalingTestConfig::parse(
            r#"
max_monitoring_time = "1m"
[[phases]]
target = 3
[[phases]]
target = 0
"#,
        )
        .unwrap();
        let capacity = ScriptedObserver::counts(SampleSource::Capacity, &[0, 3, 3, 1, 0]);
        let membership = ScriptedObserver::counts(SampleSource::Membership, &[0, 2, 3, 1, 0]);
        let results = run_scaling_test(&config, &context(&capacity, &membership))
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].target, 3);
        assert_eq!(results[0].result.state(), SessionState::Converged);
        assert_eq!(results[0].result.membership().counts(), vec![0, 2, 3]);
        assert_eq!(results[1].result.state(), SessionState::Converged);
        assert_eq!(results[1].result.capacity().counts(), vec![1, 0]);
        assert!(results[1].bootstrap_errors.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_phase_collects_bootstrap_errors() {
        let dir = tempfile::TempDir::with_prefix("clusterwatch").unwrap();
        let config = ScalingTestConfig::parse(
            r#"
max_monitoring_time = "10s"
[[phases]]
target = 2
command = "sbatch -N 2 --wrap 'sleep 60'"
"#,
        )
        .unwrap();
        let executor = FakeExecutor::default();
        executor.set_output("sbatch -N 2 --wrap 'sleep 60'", "Submitted batch job 1");
        executor.set_output("cat $HOME/bootstrap_errors.txt", "10.0.0.7\n");
        let inventory = FakeInventory::default();
        inventory.add_instance(instance("i-7", "10.0.0.7", 1, InstanceState::Running));

        let capacity = ScriptedObserver::counts(SampleSource::Capacity, &[2]);
        let membership = ScriptedObserver::counts(SampleSource::Membership, &[1]);
        let mut context = context(&capacity, &membership);
        context.executor = Some(&executor);
        context.bootstrap = Some(BootstrapScan {
            executor: &executor,
            inventory: &inventory,
            scripts_dir: Path::new("/scripts"),
            cluster_name: "c1",
            region: "eu-west-1",
            output_dir: dir.path(),
        });

        let results = run_scaling_test(&config, &context).await.unwrap();
        assert!(results[0].result.timed_out());
        let report = results[0].bootstrap_errors.as_ref().unwrap();
        assert_eq!(report.written.len(), 1);
        assert_eq!(executor.commands()[0], "sbatch -N 2 --wrap 'sleep 60'");
    }

    #[tokio::test(start_paused = true)]
    async fn monitoring_time_override_replaces_phase_time() {
        let config = ScalingTestConfig::parse(
            r#"
max_monitoring_time = "1h"
[[phases]]
target = 2
[[phases]]
target = 0
max_monitoring_time = "30m"
"#,
        )
        .unwrap();
        let capacity = ScriptedObserver::counts(SampleSource::Capacity, &[1]);
        let membership = ScriptedObserver::counts(SampleSource::Membership, &[1]);
        let mut context = context(&capacity, &membership);
        context.max_monitoring_time = Some(Duration::from_secs(3));

        let results = run_scaling_test(&config, &context).await.unwrap();
        assert_eq!(results.len(), 2);
        for phase in &results {
            assert!(phase.result.timed_out());
            assert_eq!(phase.result.elapsed(), Duration::from_secs(3));
            assert_eq!(phase.result.ticks(), 4);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn phase_command_requires_executor() {
        let config = ScalingTestConfig::parse(
            r#"
max_monitoring_time = "10s"
[[phases]]
target = 2
command = "true"
"#,
        )
        .unwrap();
        let capacity = ScriptedObserver::counts(SampleSource::Capacity, &[2]);
        let membership = ScriptedObserver::counts(SampleSource::Membership, &[2]);
        let result = run_scaling_test(&config, &context(&capacity, &membership)).await;
        assert!(matches!(result, Err(Error::ConfigError(_))));
        assert_eq!(capacity.calls(), 0);
    }
}
