use chrono::{DateTime, Utc};
use futures::future::LocalBoxFuture;
use serde::Deserialize;

use crate::aws::{AwsCli, InstanceFilter, InstanceInventory, InstanceRecord, InstanceState};
use crate::observer::ObserveResult;

/// EC2 instance inventory of one region.
pub struct Ec2Inventory {
    cli: AwsCli,
}

impl Ec2Inventory {
    pub fn new(cli: AwsCli) -> Self {
        Self { cli }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeInstancesOutput {
    #[serde(default)]
    reservations: Vec<Reservation>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Reservation {
    #[serde(default)]
    instances: Vec<Ec2Instance>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Ec2Instance {
    instance_id: String,
    private_ip_address: Option<String>,
    launch_time: DateTime<Utc>,
    state: Ec2InstanceState,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Ec2InstanceState {
    name: InstanceState,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ConsoleOutput {
    output: Option<String>,
}

fn filter_arguments(filters: &[InstanceFilter]) -> Vec<String> {
    if filters.is_empty() {
        return vec![];
    }
    let mut arguments = vec!["--filters".to_string()];
    arguments.extend(
        filters
            .iter()
            .map(|filter| format!("Name={},Values={}", filter.name, filter.values.join(","))),
    );
    arguments
}

fn parse_instances(output: DescribeInstancesOutput) -> Vec<InstanceRecord> {
    output
        .reservations
        .into_iter()
        .flat_map(|reservation| reservation.instances)
        .map(|instance| InstanceRecord {
            instance_id: instance.instance_id,
            private_ip_address: instance.private_ip_address,
            launch_time: instance.launch_time,
            state: instance.state.name,
        })
        .collect()
}

impl InstanceInventory for Ec2Inventory {
    fn list_instances<'a>(
        &'a self,
        filters: &'a [InstanceFilter],
    ) -> LocalBoxFuture<'a, ObserveResult<Vec<InstanceRecord>>> {
        Box::pin(async move {
            let output: DescribeInstancesOutput = self
                .cli
                .call("ec2", "describe-instances", filter_arguments(filters))
                .await?;
            Ok(parse_instances(output))
        })
    }

    fn get_console_output<'a>(
        &'a self,
        instance_id: &'a str,
    ) -> LocalBoxFuture<'a, ObserveResult<String>> {
        Box::pin(async move {
            let output: ConsoleOutput = self
                .cli
                .call(
                    "ec2",
                    "get-console-output",
                    vec![
                        "--instance-id".to_string(),
                        instance_id.to_string(),
                        "--latest".to_string(),
                    ],
                )
                .await?;
            Ok(output.output.unwrap_or_default())
        })
    }
}
