use std::collections::BTreeMap;
use std::future::Future;

use convergence::{ConvergenceResult, ConvergenceTracker};

use crate::api::models::{ClusterFailure, ClusterView, ConvergenceView, LoginNodesPool};
use crate::common::rpc::{RpcReceiver, RpcSender, ResponseToken, make_rpc_queue, request};
use crate::diagnose::FailureRecord;
use crate::get_or_return;

#[derive(Debug)]
pub enum MonitorMessage {
    // Events
    SessionStarted {
        cluster: String,
        target: u64,
    },
    SessionProgress {
        cluster: String,
        capacity: Vec<u64>,
        membership: Vec<u64>,
    },
    SessionFinished {
        cluster: String,
        result: ConvergenceResult,
    },
    SetFailures {
        cluster: String,
        failures: Vec<ClusterFailure>,
    },
    SetLoginNodes {
        cluster: String,
        pool: LoginNodesPool,
    },
    // Requests
    GetCluster(String, ResponseToken<Option<ClusterView>>),
    Quit,
}

/// Handle to the monitoring registry. Cheap to clone.
#[derive(Clone)]
pub struct MonitorService {
    sender: RpcSender<MonitorMessage>,
}

impl MonitorService {
    pub fn session_started(&self, cluster: &str, target: u64) {
        self.send(MonitorMessage::SessionStarted {
            cluster: cluster.to_string(),
            target,
        });
    }

    pub fn report_progress(&self, cluster: &str, tracker: &ConvergenceTracker) {
        self.send(MonitorMessage::SessionProgress {
            cluster: cluster.to_string(),
            capacity: tracker.capacity().counts(),
            membership: tracker.membership().counts(),
        });
    }

    pub fn session_finished(&self, cluster: &str, result: &ConvergenceResult) {
        self.send(MonitorMessage::SessionFinished {
            cluster: cluster.to_string(),
            result: result.clone(),
        });
    }

    pub fn set_failures(&self, cluster: &str, failures: &[FailureRecord]) {
        self.send(MonitorMessage::SetFailures {
            cluster: cluster.to_string(),
            failures: failures.iter().map(ClusterFailure::from).collect(),
        });
    }

    pub fn set_login_nodes(&self, cluster: &str, pool: LoginNodesPool) {
        self.send(MonitorMessage::SetLoginNodes {
            cluster: cluster.to_string(),
            pool,
        });
    }

    pub async fn get_cluster(&self, cluster: &str) -> crate::Result<Option<ClusterView>> {
        request(&self.sender, |token| {
            MonitorMessage::GetCluster(cluster.to_string(), token)
        })
        .await
    }

    pub fn quit(&self) {
        self.send(MonitorMessage::Quit);
    }

    fn send(&self, message: MonitorMessage) {
        if self.sender.send(message).is_err() {
            log::debug!("Monitoring service is not running, dropping message");
        }
    }
}

#[derive(Default)]
struct MonitorState {
    clusters: BTreeMap<String, ClusterView>,
}

impl MonitorState {
    fn cluster_mut(&mut self, cluster: String) -> &mut ClusterView {
        self.clusters
            .entry(cluster)
            .or_insert_with_key(|name| ClusterView::new(name.clone()))
    }

    fn on_session_progress(&mut self, cluster: &str, capacity: Vec<u64>, membership: Vec<u64>) {
        let view = get_or_return!(self.clusters.get_mut(cluster));
        let convergence = get_or_return!(view.convergence.as_mut());
        convergence.update_series(capacity, membership);
    }

    fn on_session_finished(&mut self, cluster: String, result: &ConvergenceResult) {
        let view = self.cluster_mut(cluster);
        view.convergence
            .get_or_insert_with(|| ConvergenceView::started(0))
            .finish(result);
    }
}

/// Applies events to the registry. Returns `false` once the service should stop.
fn handle_message(state: &mut MonitorState, message: MonitorMessage) -> bool {
    match message {
        MonitorMessage::SessionStarted { cluster, target } => {
            state.cluster_mut(cluster).convergence = Some(ConvergenceView::started(target));
        }
        MonitorMessage::SessionProgress {
            cluster,
            capacity,
            membership,
        } => state.on_session_progress(&cluster, capacity, membership),
        MonitorMessage::SessionFinished { cluster, result } => {
            state.on_session_finished(cluster, &result)
        }
        MonitorMessage::SetFailures { cluster, failures } => {
            state.cluster_mut(cluster).failures = Some(failures);
        }
        MonitorMessage::SetLoginNodes { cluster, pool } => {
            state.cluster_mut(cluster).login_nodes = Some(pool);
        }
        MonitorMessage::GetCluster(cluster, response) => {
            response.respond(state.clusters.get(&cluster).cloned());
        }
        MonitorMessage::Quit => return false,
    }
    true
}

async fn monitor_service_process(mut receiver: RpcReceiver<MonitorMessage>) {
    let mut state = MonitorState::default();
    while let Some(message) = receiver.recv().await {
        if !handle_message(&mut state, message) {
            break;
        }
    }
    log::debug!("Monitoring service has stopped");
}

/// Creates the registry service. The returned future processes its messages and has to be
/// polled for the service to respond.
pub fn create_monitor_service() -> (MonitorService, impl Future<Output = ()>) {
    let (tx, rx) = make_rpc_queue();
    let process = monitor_service_process(rx);
    (MonitorService { sender: tx }, process)
}
