use std::path::PathBuf;
use std::rc::Rc;

use anyhow::Context;
use convergence::SampleSource;
use futures::future::LocalBoxFuture;
use serde_json::Value;

use crate::observer::{JobCounts, ObserveResult, Observation, Observer};
use crate::remote::RemoteExecutor;

/// Script that stores scheduler statistics into `$HOME/scaling_metrics.json` on the head node.
pub const COLLECT_METRICS_SCRIPT: &str = "collect_metrics_on_headnode.sh";
const READ_METRICS_COMMAND: &str = "cat $HOME/scaling_metrics.json";

/// Reads the node count and job queue statistics collected on the head node.
pub struct HeadNodeMetricsObserver {
    executor: Rc<dyn RemoteExecutor>,
    script: PathBuf,
}

impl HeadNodeMetricsObserver {
    pub fn new(executor: Rc<dyn RemoteExecutor>, scripts_dir: PathBuf) -> Self {
        Self {
            executor,
            script: scripts_dir.join(COLLECT_METRICS_SCRIPT),
        }
    }
}

fn read_count(metrics: &Value, key: &str) -> Option<u64> {
    match metrics.get(key)? {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

pub fn parse_head_node_metrics(text: &str) -> ObserveResult<Observation> {
    let metrics: Value =
        serde_json::from_str(text).context("Head node metrics are not valid JSON")?;
    let count = read_count(&metrics, "NodeCount")
        .with_context(|| format!("Head node metrics do not contain a valid NodeCount: {text}"))?;
    let jobs = match (
        read_count(&metrics, "PendingJobsCount"),
        read_count(&metrics, "RunningJobsCount"),
    ) {
        (Some(pending), Some(running)) => Some(JobCounts { pending, running }),
        _ => None,
    };
    Ok(Observation { count, jobs })
}

impl Observer for HeadNodeMetricsObserver {
    fn source(&self) -> SampleSource {
        SampleSource::Membership
    }

    fn sample(&self) -> LocalBoxFuture<'_, ObserveResult<Observation>> {
        Box::pin(async move {
            self.executor.run_script(&self.script, &[]).await?;
            let output = self.executor.run_command(READ_METRICS_COMMAND).await?;
            parse_head_node_metrics(&output)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::rc::Rc;

    use super::{HeadNodeMetricsObserver, READ_METRICS_COMMAND, parse_head_node_metrics};
    use crate::observer::{JobCounts, Observer};
    use crate::tests::utils::FakeExecutor;

    #[test]
    fn parse_numbers_and_strings() {
        let observation = parse_head_node_metrics(
            r#"{"NodeCount": "12", "PendingJobsCount": 3, "RunningJobsCount": "9"}"#,
        )
        .unwrap();
        assert_eq!(observation.count, 12);
        assert_eq!(
            observation.jobs,
            Some(JobCounts {
                pending: 3,
                running: 9
            })
        );
    }

    #[test]
    fn parse_without_jobs() {
        let observation = parse_head_node_metrics(r#"{"NodeCount": 0}"#).unwrap();
        assert_eq!(observation.count, 0);
        assert_eq!(observation.jobs, None);
    }

    #[test]
    fn parse_invalid_node_count() {
        assert!(parse_head_node_metrics(r#"{"NodeCount": "many"}"#).is_err());
        assert!(parse_head_node_metrics(r#"{"PendingJobsCount": 1}"#).is_err());
        assert!(parse_head_node_metrics("not json").is_err());
    }

    #[tokio::test]
    async fn runs_collection_script_before_reading() {
        let executor = Rc::new(FakeExecutor::default());
        executor.set_output(READ_METRICS_COMMAND, r#"{"NodeCount": 5}"#);
        let observer = HeadNodeMetricsObserver::new(executor.clone(), PathBuf::from("/scripts"));
        assert_eq!(observer.sample().await.unwrap().count, 5);
        assert_eq!(
            executor.scripts(),
            vec![PathBuf::from("/scripts/collect_metrics_on_headnode.sh")]
        );
    }

    #[tokio::test]
    async fn failing_script_does_not_read_stale_metrics() {
        let executor = Rc::new(FakeExecutor::default());
        executor.set_output(READ_METRICS_COMMAND, r#"{"NodeCount": 0}"#);
        executor.set_failing_scripts(true);
        let observer = HeadNodeMetricsObserver::new(executor.clone(), PathBuf::from("/scripts"));
        assert!(observer.sample().await.is_err());
        assert!(executor.commands().is_empty());
    }
}
