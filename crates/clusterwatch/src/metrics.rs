//! Publishing of sampled counts into an external time-series store.
use std::fmt::Write;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use serde::Serialize;

use crate::observer::{JobCounts, ObserveResult};

pub const SCALING_METRICS_NAMESPACE: &str = "ParallelCluster/ScalingStressTest";
pub const CLUSTER_NAME_DIMENSION: &str = "ClusterName";

pub const COMPUTE_NODES_COUNT: &str = "ComputeNodesCount";
pub const EC2_NODES_COUNT: &str = "EC2NodesCount";
pub const PENDING_JOBS_COUNT: &str = "PendingJobsCount";
pub const RUNNING_JOBS_COUNT: &str = "RunningJobsCount";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MetricUnit {
    Count,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Dimension {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Metric {
    #[serde(rename = "MetricName")]
    pub name: String,
    pub value: f64,
    pub unit: MetricUnit,
    pub dimensions: Vec<Dimension>,
}

impl Metric {
    pub fn count(name: &str, value: u64, dimensions: Vec<Dimension>) -> Self {
        Self {
            name: name.to_string(),
            value: value as f64,
            unit: MetricUnit::Count,
            dimensions,
        }
    }
}

pub trait MetricsSink {
    fn publish<'a>(
        &'a self,
        namespace: &'a str,
        metrics: &'a [Metric],
    ) -> LocalBoxFuture<'a, ObserveResult<()>>;
}

/// Writes metrics into the log instead of a metrics store.
#[derive(Default)]
pub struct LogSink;

impl MetricsSink for LogSink {
    fn publish<'a>(
        &'a self,
        namespace: &'a str,
        metrics: &'a [Metric],
    ) -> LocalBoxFuture<'a, ObserveResult<()>> {
        Box::pin(async move {
            let mut line = String::new();
            for metric in metrics {
                let _ = write!(line, " {}={}", metric.name, metric.value);
            }
            log::info!("Metrics [{namespace}]{line}");
            Ok(())
        })
    }
}

/// Values sampled during one tick of a scaling session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScalingSample {
    pub capacity: Option<u64>,
    pub membership: Option<u64>,
    pub jobs: Option<JobCounts>,
}

/// Publishes scaling metrics of a single cluster.
///
/// Publishing is best-effort: failures are logged and never returned to the caller.
#[derive(Clone)]
pub struct MetricsEmitter {
    sink: Rc<dyn MetricsSink>,
    namespace: String,
    cluster_name: String,
}

impl MetricsEmitter {
    pub fn new(sink: Rc<dyn MetricsSink>, namespace: String, cluster_name: String) -> Self {
        Self {
            sink,
            namespace,
            cluster_name,
        }
    }

    pub fn scaling_metrics(&self, sample: &ScalingSample) -> Vec<Metric> {
        let dimensions = vec![Dimension {
            name: CLUSTER_NAME_DIMENSION.to_string(),
            value: self.cluster_name.clone(),
        }];
        let mut metrics = vec![];
        if let Some(count) = sample.membership {
            metrics.push(Metric::count(COMPUTE_NODES_COUNT, count, dimensions.clone()));
        }
        if let Some(count) = sample.capacity {
            metrics.push(Metric::count(EC2_NODES_COUNT, count, dimensions.clone()));
        }
        if let Some(jobs) = sample.jobs {
            metrics.push(Metric::count(
                PENDING_JOBS_COUNT,
                jobs.pending,
                dimensions.clone(),
            ));
            metrics.push(Metric::count(RUNNING_JOBS_COUNT, jobs.running, dimensions));
        }
        metrics
    }

    /// Returns `true` if the metrics were published.
    pub async fn publish(&self, metrics: &[Metric]) -> bool {
        if metrics.is_empty() {
            return true;
        }
        match self.sink.publish(&self.namespace, metrics).await {
            Ok(()) => true,
            Err(error) => {
                log::warn!(
                    "Could not publish {} metric(s) of cluster {} into {}: {error:?}",
                    metrics.len(),
                    self.cluster_name,
                    self.namespace
                );
                false
            }
        }
    }

    pub async fn emit_scaling(&self, sample: &ScalingSample) -> bool {
        let metrics = self.scaling_metrics(sample);
        self.publish(&metrics).await
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::{LogSink, MetricsEmitter, SCALING_METRICS_NAMESPACE, ScalingSample};
    use crate::observer::JobCounts;
    use crate::tests::utils::RecordingSink;

    fn emitter(sink: Rc<RecordingSink>) -> MetricsEmitter {
        MetricsEmitter::new(
            sink,
            SCALING_METRICS_NAMESPACE.to_string(),
            "c1".to_string(),
        )
    }

    #[test]
    fn scaling_metrics_json() {
        let emitter = emitter(Rc::new(RecordingSink::default()));
        let metrics = emitter.scaling_metrics(&ScalingSample {
            capacity: Some(4),
            membership: Some(3),
            jobs: Some(JobCounts {
                pending: 1,
                running: 2,
            }),
        });
        insta::assert_snapshot!(serde_json::to_string_pretty(&metrics[..2]).unwrap(), @r###"
        [
          {
            "MetricName": "ComputeNodesCount",
            "Value": 3.0,
            "Unit": "Count",
            "Dimensions": [
              {
                "Name": "ClusterName",
                "Value": "c1"
              }
            ]
          },
          {
            "MetricName": "EC2NodesCount",
            "Value": 4.0,
            "Unit": "Count",
            "Dimensions": [
              {
                "Name": "ClusterName",
                "Value": "c1"
              }
            ]
          }
        ]
        "###);
        let names: Vec<_> = metrics.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "ComputeNodesCount",
                "EC2NodesCount",
                "PendingJobsCount",
                "RunningJobsCount"
            ]
        );
    }

    #[test]
    fn missing_values_are_skipped() {
        let emitter = emitter(Rc::new(RecordingSink::default()));
        let metrics = emitter.scaling_metrics(&ScalingSample {
            capacity: None,
            membership: Some(1),
            jobs: None,
        });
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].name, "ComputeNodesCount");
    }

    #[tokio::test]
    async fn publish_failure_is_swallowed() {
        let sink = Rc::new(RecordingSink::failing());
        let emitter = emitter(sink.clone());
        let sample = ScalingSample {
            capacity: Some(1),
            ..Default::default()
        };
        assert!(!emitter.emit_scaling(&sample).await);
        assert_eq!(sink.attempts(), 1);
    }

    #[tokio::test]
    async fn publish_records_namespace() {
        let sink = Rc::new(RecordingSink::default());
        let emitter = emitter(sink.clone());
        let sample = ScalingSample {
            capacity: Some(2),
            membership: Some(2),
            jobs: None,
        };
        assert!(emitter.emit_scaling(&sample).await);
        let published = sink.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, SCALING_METRICS_NAMESPACE);
        assert_eq!(published[0].1.len(), 2);
    }

    #[tokio::test]
    async fn log_sink_never_fails() {
        let emitter = MetricsEmitter::new(
            Rc::new(LogSink),
            "ns".to_string(),
            "c1".to_string(),
        );
        assert!(
            emitter
                .emit_scaling(&ScalingSample {
                    capacity: Some(0),
                    ..Default::default()
                })
                .await
        );
    }
}
