use std::rc::Rc;

use convergence::SampleSource;
use futures::future::LocalBoxFuture;

use crate::observer::{ObserveResult, Observation, Observer};
use crate::scheduler::SchedulerClient;

/// Counts compute nodes that have joined the scheduler.
pub struct SchedulerMembershipObserver {
    scheduler: Rc<dyn SchedulerClient>,
}

impl SchedulerMembershipObserver {
    pub fn new(scheduler: Rc<dyn SchedulerClient>) -> Self {
        Self { scheduler }
    }
}

impl Observer for SchedulerMembershipObserver {
    fn source(&self) -> SampleSource {
        SampleSource::Membership
    }

    fn sample(&self) -> LocalBoxFuture<'_, ObserveResult<Observation>> {
        Box::pin(async move {
            let count = self.scheduler.compute_nodes_count().await?;
            Ok(Observation::count(count))
        })
    }
}
