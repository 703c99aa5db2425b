use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use convergence::{SampleSource, SourceLimits};
use derive_builder::Builder;
use futures::future::LocalBoxFuture;

use crate::aws::{InstanceFilter, InstanceInventory, InstanceRecord, InstanceState};
use crate::metrics::{Metric, MetricsSink};
use crate::observer::{JobCounts, ObserveResult, Observation, Observer};
use crate::remote::RemoteExecutor;

/// Instance launched `launch_minute` minutes after a fixed point in time.
pub fn instance(id: &str, ip: &str, launch_minute: u32, state: InstanceState) -> InstanceRecord {
    InstanceRecord {
        instance_id: id.to_string(),
        private_ip_address: Some(ip.to_string()),
        launch_time: Utc.with_ymd_and_hms(2024, 5, 2, 10, 0, 0).unwrap()
            + chrono::Duration::minutes(launch_minute as i64),
        state,
    }
}

#[derive(Default)]
pub struct FakeInventory {
    instances: RefCell<Vec<InstanceRecord>>,
    console_outputs: RefCell<HashMap<String, String>>,
    failing: Cell<bool>,
    list_calls: Cell<u32>,
    console_calls: Cell<u32>,
    last_filters: RefCell<Vec<InstanceFilter>>,
}

impl FakeInventory {
    pub fn add_instance(&self, instance: InstanceRecord) {
        self.instances.borrow_mut().push(instance);
    }

    pub fn set_console_output(&self, instance_id: &str, output: &str) {
        self.console_outputs
            .borrow_mut()
            .insert(instance_id.to_string(), output.to_string());
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.set(failing);
    }

    pub fn list_calls(&self) -> u32 {
        self.list_calls.get()
    }

    pub fn console_calls(&self) -> u32 {
        self.console_calls.get()
    }

    pub fn last_filters(&self) -> Vec<InstanceFilter> {
        self.last_filters.borrow().clone()
    }

    fn matches(instance: &InstanceRecord, filter: &InstanceFilter) -> bool {
        match filter.name.as_str() {
            "private-ip-address" => instance
                .private_ip_address
                .as_ref()
                .is_some_and(|ip| filter.values.contains(ip)),
            "instance-state-name" => filter.values.contains(&instance.state.to_string()),
            _ => true,
        }
    }
}

impl InstanceInventory for FakeInventory {
    fn list_instances<'a>(
        &'a self,
        filters: &'a [InstanceFilter],
    ) -> LocalBoxFuture<'a, ObserveResult<Vec<InstanceRecord>>> {
        Box::pin(async move {
            self.list_calls.set(self.list_calls.get() + 1);
            *self.last_filters.borrow_mut() = filters.to_vec();
            if self.failing.get() {
                anyhow::bail!("RequestLimitExceeded");
            }
            Ok(self
                .instances
                .borrow()
                .iter()
                .filter(|instance| filters.iter().all(|f| Self::matches(instance, f)))
                .cloned()
                .collect())
        })
    }

    fn get_console_output<'a>(
        &'a self,
        instance_id: &'a str,
    ) -> LocalBoxFuture<'a, ObserveResult<String>> {
        Box::pin(async move {
            self.console_calls.set(self.console_calls.get() + 1);
            if self.failing.get() {
                anyhow::bail!("RequestLimitExceeded");
            }
            Ok(self
                .console_outputs
                .borrow()
                .get(instance_id)
                .cloned()
                .unwrap_or_default())
        })
    }
}

/// Answers known commands, fails on unknown ones and records executed scripts.
#[derive(Default)]
pub struct FakeExecutor {
    outputs: RefCell<HashMap<String, String>>,
    scripts: RefCell<Vec<PathBuf>>,
    commands: RefCell<Vec<String>>,
    failing_scripts: Cell<bool>,
}

impl FakeExecutor {
    pub fn set_output(&self, command: &str, output: &str) {
        self.outputs
            .borrow_mut()
            .insert(command.to_string(), output.to_string());
    }

    /// Scripts exit with a non-zero code, e.g. because `sinfo` cannot reach the controller.
    pub fn set_failing_scripts(&self, failing: bool) {
        self.failing_scripts.set(failing);
    }

    pub fn scripts(&self) -> Vec<PathBuf> {
        self.scripts.borrow().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.borrow().clone()
    }
}

impl RemoteExecutor for FakeExecutor {
    fn run_command<'a>(&'a self, command: &'a str) -> LocalBoxFuture<'a, ObserveResult<String>> {
        Box::pin(async move {
            self.commands.borrow_mut().push(command.to_string());
            self.outputs
                .borrow()
                .get(command)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("ssh: connect to host: Connection refused"))
        })
    }

    fn run_script<'a>(
        &'a self,
        script: &'a Path,
        _args: &'a [String],
    ) -> LocalBoxFuture<'a, ObserveResult<String>> {
        Box::pin(async move {
            self.scripts.borrow_mut().push(script.to_path_buf());
            if self.failing_scripts.get() {
                anyhow::bail!(
                    "slurm_load_node error: Unable to contact slurm controller (connect failure)"
                );
            }
            Ok(String::new())
        })
    }
}

#[derive(Default)]
pub struct RecordingSink {
    failing: bool,
    attempts: Cell<u32>,
    published: RefCell<Vec<(String, Vec<Metric>)>>,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.get()
    }

    pub fn published(&self) -> Vec<(String, Vec<Metric>)> {
        self.published.borrow().clone()
    }
}

impl MetricsSink for RecordingSink {
    fn publish<'a>(
        &'a self,
        namespace: &'a str,
        metrics: &'a [Metric],
    ) -> LocalBoxFuture<'a, ObserveResult<()>> {
        Box::pin(async move {
            self.attempts.set(self.attempts.get() + 1);
            if self.failing {
                anyhow::bail!("AccessDenied");
            }
            self.published
                .borrow_mut()
                .push((namespace.to_string(), metrics.to_vec()));
            Ok(())
        })
    }
}

/// Returns the scripted readings one per call, `None` being a failed sample.
/// The last reading is repeated once the script is exhausted.
pub struct ScriptedObserver {
    source: SampleSource,
    readings: RefCell<VecDeque<Option<u64>>>,
    last: Cell<Option<u64>>,
    jobs: Option<JobCounts>,
    calls: Cell<u32>,
}

impl ScriptedObserver {
    pub fn new(source: SampleSource, readings: &[Option<u64>]) -> Self {
        Self {
            source,
            readings: RefCell::new(readings.iter().copied().collect()),
            last: Cell::new(None),
            jobs: None,
            calls: Cell::new(0),
        }
    }

    pub fn counts(source: SampleSource, counts: &[u64]) -> Self {
        let readings: Vec<_> = counts.iter().map(|c| Some(*c)).collect();
        Self::new(source, &readings)
    }

    pub fn with_jobs(mut self, jobs: JobCounts) -> Self {
        self.jobs = Some(jobs);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.get()
    }
}

impl Observer for ScriptedObserver {
    fn source(&self) -> SampleSource {
        self.source
    }

    fn sample(&self) -> LocalBoxFuture<'_, ObserveResult<Observation>> {
        Box::pin(async move {
            self.calls.set(self.calls.get() + 1);
            let reading = match self.readings.borrow_mut().pop_front() {
                Some(reading) => {
                    if reading.is_some() {
                        self.last.set(reading);
                    }
                    reading
                }
                None => self.last.get(),
            };
            match reading {
                Some(count) => Ok(Observation {
                    count,
                    jobs: self.jobs,
                }),
                None => anyhow::bail!("{} is unreachable", self.source),
            }
        })
    }
}

/// Scaling scenario with scripted readings of both sources.
#[derive(Builder, Clone)]
#[builder(pattern = "owned")]
pub struct Scenario {
    #[builder(default = "4")]
    pub target: u64,
    #[builder(default)]
    pub capacity: Vec<Option<u64>>,
    #[builder(default)]
    pub membership: Vec<Option<u64>>,
    #[builder(default = "Duration::from_secs(1)")]
    pub tick: Duration,
    #[builder(default = "Duration::from_secs(60)")]
    pub ceiling: Duration,
    #[builder(default = "SourceLimits::both()")]
    pub limits: SourceLimits,
}

impl ScenarioBuilder {
    pub fn capacity_counts(self, counts: &[u64]) -> Self {
        self.capacity(counts.iter().map(|c| Some(*c)).collect())
    }

    pub fn membership_counts(self, counts: &[u64]) -> Self {
        self.membership(counts.iter().map(|c| Some(*c)).collect())
    }
}

impl Scenario {
    pub fn observers(&self) -> (ScriptedObserver, ScriptedObserver) {
        (
            ScriptedObserver::new(SampleSource::Capacity, &self.capacity),
            ScriptedObserver::new(SampleSource::Membership, &self.membership),
        )
    }
}
