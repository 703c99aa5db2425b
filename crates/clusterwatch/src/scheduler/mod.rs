//! Access to the node registry of the cluster scheduler.
use futures::future::LocalBoxFuture;

use crate::observer::ObserveResult;

pub mod slurm;

pub use slurm::SlurmCommands;

pub trait SchedulerClient {
    /// Names of the compute nodes that have joined the scheduler.
    fn get_compute_nodes(&self) -> LocalBoxFuture<'_, ObserveResult<Vec<String>>>;

    fn compute_nodes_count(&self) -> LocalBoxFuture<'_, ObserveResult<u64>> {
        let nodes = self.get_compute_nodes();
        Box::pin(async move { Ok(nodes.await?.len() as u64) })
    }
}
