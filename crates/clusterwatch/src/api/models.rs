use std::time::SystemTime;

use convergence::{ConvergenceResult, SessionState};
use serde::{Deserialize, Serialize};

use crate::diagnose::FailureRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoginNodesState {
    Pending,
    Active,
    Failed,
}

/// Health snapshot of a login node pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginNodesPool {
    pub status: LoginNodesState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(default)]
    pub healthy_nodes: u32,
    #[serde(default)]
    pub unhealthy_nodes: u32,
}

/// Failure as surfaced by the management API, without the affected resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterFailure {
    pub failure_code: String,
    pub failure_reason: String,
}

impl From<&FailureRecord> for ClusterFailure {
    fn from(record: &FailureRecord) -> Self {
        Self {
            failure_code: record.failure_code.to_string(),
            failure_reason: record.failure_reason.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvergenceView {
    pub state: SessionState,
    pub target: u64,
    pub capacity_series: Vec<u64>,
    pub membership_series: Vec<u64>,
    pub updated_at: SystemTime,
}

impl ConvergenceView {
    pub fn started(target: u64) -> Self {
        Self {
            state: SessionState::Running,
            target,
            capacity_series: vec![],
            membership_series: vec![],
            updated_at: SystemTime::now(),
        }
    }

    pub fn update_series(&mut self, capacity: Vec<u64>, membership: Vec<u64>) {
        self.capacity_series = capacity;
        self.membership_series = membership;
        self.updated_at = SystemTime::now();
    }

    pub fn finish(&mut self, result: &ConvergenceResult) {
        self.state = result.state();
        self.capacity_series = result.capacity().counts();
        self.membership_series = result.membership().counts();
        self.updated_at = result.end_time();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterView {
    pub cluster_name: String,
    /// Absent until the first monitoring session of the cluster starts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub convergence: Option<ConvergenceView>,
    /// Absent until the stack of the cluster was diagnosed. An empty list means that it was
    /// diagnosed, but no failure could be classified, which is not the same as a healthy stack.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failures: Option<Vec<ClusterFailure>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_nodes: Option<LoginNodesPool>,
}

impl ClusterView {
    pub fn new(cluster_name: String) -> Self {
        Self {
            cluster_name,
            convergence: None,
            failures: None,
            login_nodes: None,
        }
    }
}
