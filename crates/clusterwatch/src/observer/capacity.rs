use std::rc::Rc;

use anyhow::Context;
use convergence::SampleSource;
use futures::future::LocalBoxFuture;

use crate::aws::{InstanceFilter, InstanceInventory, InstanceState};
use crate::observer::{ObserveResult, Observation, Observer};
use crate::{CLUSTER_NAME_TAG, NODE_TYPE_TAG};

/// Counts compute instances of a cluster that are pending or running in the cloud.
pub struct InstanceCapacityObserver {
    inventory: Rc<dyn InstanceInventory>,
    filters: Vec<InstanceFilter>,
    cluster_name: String,
}

impl InstanceCapacityObserver {
    pub fn new(inventory: Rc<dyn InstanceInventory>, cluster_name: &str) -> Self {
        Self {
            inventory,
            filters: compute_fleet_filters(cluster_name),
            cluster_name: cluster_name.to_string(),
        }
    }
}

pub fn compute_fleet_filters(cluster_name: &str) -> Vec<InstanceFilter> {
    vec![
        InstanceFilter::tag(CLUSTER_NAME_TAG, &[cluster_name]),
        InstanceFilter::tag(NODE_TYPE_TAG, &["Compute"]),
        InstanceFilter::states(&[InstanceState::Pending, InstanceState::Running]),
    ]
}

impl Observer for InstanceCapacityObserver {
    fn source(&self) -> SampleSource {
        SampleSource::Capacity
    }

    fn sample(&self) -> LocalBoxFuture<'_, ObserveResult<Observation>> {
        Box::pin(async move {
            let instances = self
                .inventory
                .list_instances(&self.filters)
                .await
                .with_context(|| {
                    format!("Cannot list compute instances of {}", self.cluster_name)
                })?;
            // The inventory may return stale states, only count the active ones.
            let count = instances
                .iter()
                .filter(|instance| instance.state.is_active())
                .count();
            Ok(Observation::count(count as u64))
        })
    }
}
