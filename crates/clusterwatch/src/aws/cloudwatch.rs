use anyhow::Context;
use futures::future::LocalBoxFuture;

use crate::aws::AwsCli;
use crate::metrics::{Metric, MetricsSink};
use crate::observer::ObserveResult;

/// Publishes metrics through `aws cloudwatch put-metric-data`.
pub struct CloudWatchSink {
    cli: AwsCli,
}

impl CloudWatchSink {
    pub fn new(cli: AwsCli) -> Self {
        Self { cli }
    }
}

fn put_metric_data_arguments(namespace: &str, metrics: &[Metric]) -> ObserveResult<Vec<String>> {
    let data = serde_json::to_string(metrics).context("Cannot serialize metric data")?;
    Ok(vec![
        "--namespace".to_string(),
        namespace.to_string(),
        "--metric-data".to_string(),
        data,
    ])
}

impl MetricsSink for CloudWatchSink {
    fn publish<'a>(
        &'a self,
        namespace: &'a str,
        metrics: &'a [Metric],
    ) -> LocalBoxFuture<'a, ObserveResult<()>> {
        Box::pin(async move {
            let arguments = put_metric_data_arguments(namespace, metrics)?;
            self.cli
                .call_raw("cloudwatch", "put-metric-data", arguments)
                .await?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::put_metric_data_arguments;
    use crate::metrics::{Dimension, Metric};

    #[test]
    fn metric_data_argument() {
        let metrics = vec![Metric::count(
            "EC2NodesCount",
            3,
            vec![Dimension {
                name: "ClusterName".to_string(),
                value: "c1".to_string(),
            }],
        )];
        let arguments = put_metric_data_arguments("ns", &metrics).unwrap();
        insta::assert_debug_snapshot!(arguments, @r###"
        [
            "--namespace",
            "ns",
            "--metric-data",
            "[{\"MetricName\":\"EC2NodesCount\",\"Value\":3.0,\"Unit\":\"Count\",\"Dimensions\":[{\"Name\":\"ClusterName\",\"Value\":\"c1\"}]}]",
        ]
        "###);
    }
}
