use std::rc::Rc;
use std::time::Duration;

use futures::future::LocalBoxFuture;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::aws::{InstanceFilter, InstanceInventory, InstanceRecord};
use crate::observer::ObserveResult;

/// Inventory shared by several monitoring sessions.
///
/// Outbound calls are serialized and spaced at least `min_interval` apart, regardless of how many
/// sessions use the inventory at the same time.
pub struct ThrottledInventory {
    inner: Rc<dyn InstanceInventory>,
    min_interval: Duration,
    /// When the last call was started, `None` before the first call.
    last_call: Mutex<Option<Instant>>,
}

impl ThrottledInventory {
    pub fn new(inner: Rc<dyn InstanceInventory>, min_interval: Duration) -> Self {
        Self {
            inner,
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    async fn throttled<'a, T>(
        &'a self,
        call: LocalBoxFuture<'a, ObserveResult<T>>,
    ) -> ObserveResult<T> {
        let mut last_call = self.last_call.lock().await;
        if let Some(last) = *last_call {
            let ready_at = last + self.min_interval;
            if ready_at > Instant::now() {
                log::debug!("Delaying inventory call by {:?}", ready_at - Instant::now());
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last_call = Some(Instant::now());
        call.await
    }
}

impl InstanceInventory for ThrottledInventory {
    fn list_instances<'a>(
        &'a self,
        filters: &'a [InstanceFilter],
    ) -> LocalBoxFuture<'a, ObserveResult<Vec<InstanceRecord>>> {
        Box::pin(self.throttled(self.inner.list_instances(filters)))
    }

    fn get_console_output<'a>(
        &'a self,
        instance_id: &'a str,
    ) -> LocalBoxFuture<'a, ObserveResult<String>> {
        Box::pin(self.throttled(self.inner.get_console_output(instance_id)))
    }
}
