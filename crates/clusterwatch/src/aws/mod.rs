//! Cloud capabilities backed by the `aws` command line client.
use std::fmt::{Display, Formatter};

use anyhow::Context;
use chrono::{DateTime, Utc};
use futures::future::LocalBoxFuture;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::common::command::run_command;
use crate::diagnose::failure::StackEvent;
use crate::observer::ObserveResult;

pub mod cloudformation;
pub mod cloudwatch;
pub mod ec2;
pub mod throttle;

pub use cloudformation::CloudFormationStacks;
pub use cloudwatch::CloudWatchSink;
pub use ec2::Ec2Inventory;
pub use throttle::ThrottledInventory;

/// Server-side instance filter, e.g. `tag:parallelcluster:cluster-name=<name>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceFilter {
    pub name: String,
    pub values: Vec<String>,
}

impl InstanceFilter {
    pub fn new(name: &str, values: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    pub fn tag(key: &str, values: &[&str]) -> Self {
        Self::new(&format!("tag:{key}"), values)
    }

    pub fn private_ip(ip: &str) -> Self {
        Self::new("private-ip-address", &[ip])
    }

    pub fn states(states: &[InstanceState]) -> Self {
        let names: Vec<String> = states.iter().map(|s| s.to_string()).collect();
        Self {
            name: "instance-state-name".to_string(),
            values: names,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceState {
    Pending,
    Running,
    ShuttingDown,
    Terminated,
    Stopping,
    Stopped,
}

impl InstanceState {
    /// Instances that occupy (or are about to occupy) capacity of the compute fleet.
    pub fn is_active(&self) -> bool {
        matches!(self, InstanceState::Pending | InstanceState::Running)
    }
}

impl Display for InstanceState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            InstanceState::Pending => "pending",
            InstanceState::Running => "running",
            InstanceState::ShuttingDown => "shutting-down",
            InstanceState::Terminated => "terminated",
            InstanceState::Stopping => "stopping",
            InstanceState::Stopped => "stopped",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceRecord {
    pub instance_id: String,
    pub private_ip_address: Option<String>,
    pub launch_time: DateTime<Utc>,
    pub state: InstanceState,
}

/// Instance inventory of a cloud region.
pub trait InstanceInventory {
    fn list_instances<'a>(
        &'a self,
        filters: &'a [InstanceFilter],
    ) -> LocalBoxFuture<'a, ObserveResult<Vec<InstanceRecord>>>;

    fn get_console_output<'a>(
        &'a self,
        instance_id: &'a str,
    ) -> LocalBoxFuture<'a, ObserveResult<String>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StackOutput {
    pub output_key: String,
    pub output_value: String,
}

#[derive(Debug, Clone, Default)]
pub struct StackDescription {
    pub outputs: Vec<StackOutput>,
    pub events: Vec<StackEvent>,
}

pub trait StackDescriber {
    fn describe_stack<'a>(
        &'a self,
        stack_name: &'a str,
    ) -> LocalBoxFuture<'a, ObserveResult<StackDescription>>;
}

/// Finds the value of a stack output by its key.
pub fn get_stack_output_value<'a>(outputs: &'a [StackOutput], key: &str) -> Option<&'a str> {
    outputs
        .iter()
        .find(|output| output.output_key == key)
        .map(|output| output.output_value.as_str())
}

/// Invokes `aws <service> <operation>` with JSON output in a fixed region.
#[derive(Debug, Clone)]
pub struct AwsCli {
    region: String,
    profile: Option<String>,
}

impl AwsCli {
    pub fn new(region: String, profile: Option<String>) -> Self {
        Self { region, profile }
    }

    pub fn arguments(&self, service: &str, operation: &str, extra: Vec<String>) -> Vec<String> {
        let mut arguments = vec![
            "aws".to_string(),
            service.to_string(),
            operation.to_string(),
            "--region".to_string(),
            self.region.clone(),
            "--output".to_string(),
            "json".to_string(),
        ];
        if let Some(profile) = &self.profile {
            arguments.push("--profile".to_string());
            arguments.push(profile.clone());
        }
        arguments.extend(extra);
        arguments
    }

    pub async fn call<T: DeserializeOwned>(
        &self,
        service: &str,
        operation: &str,
        extra: Vec<String>,
    ) -> ObserveResult<T> {
        let output = self.call_raw(service, operation, extra).await?;
        serde_json::from_str(&output)
            .with_context(|| format!("Cannot parse output of `aws {service} {operation}`"))
    }

    pub async fn call_raw(
        &self,
        service: &str,
        operation: &str,
        extra: Vec<String>,
    ) -> ObserveResult<String> {
        run_command(&self.arguments(service, operation, extra))
            .await
            .with_context(|| format!("`aws {service} {operation}` failed in {}", self.region))
    }
}
