use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const WAIT_CONDITION_RESOURCE_TYPE: &str = "AWS::CloudFormation::WaitCondition";
pub const CREATE_FAILED_STATUS: &str = "CREATE_FAILED";

/// A single event of a CloudFormation stack.
///
/// Accepts both the camelCase fields of the cluster management API and the PascalCase fields
/// printed by the `aws` command line client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackEvent {
    #[serde(alias = "ResourceType")]
    pub resource_type: String,
    #[serde(alias = "ResourceStatus")]
    pub resource_status: String,
    #[serde(
        default,
        alias = "ResourceStatusReason",
        skip_serializing_if = "Option::is_none"
    )]
    pub resource_status_reason: Option<String>,
    #[serde(alias = "Timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(
        default,
        alias = "LogicalResourceId",
        skip_serializing_if = "Option::is_none"
    )]
    pub logical_resource_id: Option<String>,
}

pub fn is_failed_wait_condition(event: &StackEvent) -> bool {
    event.resource_type == WAIT_CONDITION_RESOURCE_TYPE
        && event.resource_status == CREATE_FAILED_STATUS
}

pub fn find_failed_wait_condition(events: &[StackEvent]) -> Option<&StackEvent> {
    events.iter().find(|event| is_failed_wait_condition(event))
}

/// Raw status reason of the first failed wait condition, exactly as reported by the stack.
pub fn get_failure_reason(events: &[StackEvent]) -> Option<&str> {
    find_failed_wait_condition(events).map(|event| {
        event
            .resource_status_reason
            .as_deref()
            .unwrap_or_default()
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureCode {
    OnNodeStartExecutionFailure,
    OnNodeConfiguredExecutionFailure,
    EbsMountFailure,
    EfsMountFailure,
    FsxMountFailure,
    RaidMountFailure,
    HeadNodeBootstrapFailure,
}

impl FailureCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCode::OnNodeStartExecutionFailure => "OnNodeStartExecutionFailure",
            FailureCode::OnNodeConfiguredExecutionFailure => "OnNodeConfiguredExecutionFailure",
            FailureCode::EbsMountFailure => "EbsMountFailure",
            FailureCode::EfsMountFailure => "EfsMountFailure",
            FailureCode::FsxMountFailure => "FsxMountFailure",
            FailureCode::RaidMountFailure => "RaidMountFailure",
            FailureCode::HeadNodeBootstrapFailure => "HeadNodeBootstrapFailure",
        }
    }
}

impl Display for FailureCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Substring of a raw reason, the failure code it maps to and the canonical reason.
/// The first matching entry wins.
const FAILURE_PATTERNS: &[(&str, FailureCode, &str)] = &[
    (
        "OnNodeStart script",
        FailureCode::OnNodeStartExecutionFailure,
        "Failed to execute OnNodeStart script.",
    ),
    (
        "OnNodeConfigured script",
        FailureCode::OnNodeConfiguredExecutionFailure,
        "Failed to execute OnNodeConfigured script.",
    ),
    (
        "mount EBS volume",
        FailureCode::EbsMountFailure,
        "Failed to mount EBS volume.",
    ),
    (
        "mount EFS",
        FailureCode::EfsMountFailure,
        "Failed to mount EFS.",
    ),
    (
        "mount FSX",
        FailureCode::FsxMountFailure,
        "Failed to mount FSX.",
    ),
    (
        "mount RAID array",
        FailureCode::RaidMountFailure,
        "Failed to mount RAID array.",
    ),
    (
        "WaitCondition timed out",
        FailureCode::HeadNodeBootstrapFailure,
        "Cluster creation timed out.",
    ),
];

const UNKNOWN_FAILURE_REASON: &str = "Failed to set up the head node.";

/// Maps a raw wait condition reason to a failure code and its canonical reason.
pub fn classify_reason(raw_reason: &str) -> (FailureCode, &'static str) {
    FAILURE_PATTERNS
        .iter()
        .find(|(pattern, _, _)| raw_reason.contains(*pattern))
        .map(|(_, code, reason)| (*code, *reason))
        .unwrap_or((FailureCode::HeadNodeBootstrapFailure, UNKNOWN_FAILURE_REASON))
}

/// Structured description of why a cluster failed to provision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureRecord {
    pub failure_code: FailureCode,
    pub failure_reason: String,
    /// IP address or instance id of the resource that failed, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected_resource: Option<String>,
}

/// Classifies the failure of a stack.
///
/// `None` means that no failed wait condition was found, which does not imply that the stack
/// is healthy. Stack events do not identify the failed node, so the affected resource is left
/// for the bootstrap error scan to fill in.
pub fn classify(events: &[StackEvent]) -> Option<FailureRecord> {
    let event = find_failed_wait_condition(events)?;
    let raw_reason = event.resource_status_reason.as_deref().unwrap_or_default();
    let (failure_code, reason) = classify_reason(raw_reason);
    Some(FailureRecord {
        failure_code,
        failure_reason: reason.to_string(),
        affected_resource: None,
    })
}
