use std::collections::HashSet;
use std::rc::Rc;

use anyhow::Context;
use futures::future::LocalBoxFuture;

use crate::observer::ObserveResult;
use crate::remote::RemoteExecutor;
use crate::scheduler::SchedulerClient;

/// Lists responding nodes, one line per node and partition.
const SINFO_NODES_COMMAND: &str = "sinfo --Node --noheader --responding --format=%N";

/// Queries Slurm on the head node.
pub struct SlurmCommands {
    executor: Rc<dyn RemoteExecutor>,
}

impl SlurmCommands {
    pub fn new(executor: Rc<dyn RemoteExecutor>) -> Self {
        Self { executor }
    }
}

impl SchedulerClient for SlurmCommands {
    fn get_compute_nodes(&self) -> LocalBoxFuture<'_, ObserveResult<Vec<String>>> {
        Box::pin(async move {
            let output = self
                .executor
                .run_command(SINFO_NODES_COMMAND)
                .await
                .context("Cannot list Slurm nodes")?;
            Ok(parse_node_list(&output))
        })
    }
}

/// Returns the unique node names of `sinfo --Node` output in their original order.
pub fn parse_node_list(output: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    output
        .lines()
        .map(|line| line.trim())
        .filter(|name| !name.is_empty())
        .filter(|name| seen.insert(*name))
        .map(|name| name.to_string())
        .collect()
}
