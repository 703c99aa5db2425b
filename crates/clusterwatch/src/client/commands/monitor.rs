use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use convergence::SourceLimits;
use serde::Deserialize;

use crate::api::{LoginNodesPool, MonitorService, create_monitor_service};
use crate::aws::{
    CloudFormationStacks, CloudWatchSink, Ec2Inventory, InstanceInventory, StackDescriber,
    ThrottledInventory,
};
use crate::client::commands::{ClusterOpts, HeadNodeOpts};
use crate::client::globalsettings::GlobalSettings;
use crate::diagnose::{BootstrapScan, FailureRecord, classify, get_bootstrap_errors};
use crate::metrics::{LogSink, MetricsEmitter, MetricsSink, SCALING_METRICS_NAMESPACE};
use crate::monitor::{
    MonitorProfile, ProfileKind, ScalingTestConfig, ScalingTestContext,
    max_monitoring_time_from_env, monitor_scaling, run_scaling_test, watch_compute_nodes,
};
use crate::observer::{
    HeadNodeMetricsObserver, InstanceCapacityObserver, Observer, SchedulerMembershipObserver,
};
use crate::remote::RemoteExecutor;
use crate::scheduler::SlurmCommands;

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum MembershipSource {
    /// Count nodes listed by `sinfo`
    Slurm,
    /// Count nodes reported by the metrics collection script on the head node
    HeadNodeMetrics,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetricsSinkKind {
    /// Publish into CloudWatch
    Cloudwatch,
    /// Only write metrics into the log
    Log,
}

#[derive(Parser)]
pub struct MetricsOpts {
    /// Publish sampled counts as metrics
    #[arg(long)]
    pub publish_metrics: bool,

    /// Where metrics are published
    #[arg(long, value_enum, default_value_t = MetricsSinkKind::Cloudwatch)]
    pub metrics_sink: MetricsSinkKind,

    /// Namespace of published metrics
    #[arg(long, default_value = SCALING_METRICS_NAMESPACE)]
    pub metrics_namespace: String,
}

#[derive(Parser)]
pub struct ScaleOpts {
    #[clap(flatten)]
    pub cluster: ClusterOpts,

    #[clap(flatten)]
    pub head_node: HeadNodeOpts,

    #[clap(flatten)]
    pub metrics: MetricsOpts,

    /// Desired number of compute nodes (0 for a scale down)
    #[arg(long)]
    pub target: u64,

    /// Maximum monitoring time, e.g. `30m`
    #[arg(long, value_parser = humantime::parse_duration)]
    pub max_monitoring_time: Duration,

    /// Monitoring profile that decides how often the sources are sampled
    #[arg(long, value_enum, default_value_t = ProfileKind::Scaling)]
    pub profile: ProfileKind,

    /// Source of the scheduler view of the fleet
    #[arg(long, value_enum, default_value_t = MembershipSource::Slurm)]
    pub membership_source: MembershipSource,

    /// Do not wait for the cloud capacity to reach the target
    #[arg(long)]
    pub no_capacity_limit: bool,

    /// Do not wait for the scheduler to reach the target
    #[arg(long)]
    pub no_membership_limit: bool,

    /// Minimum delay between two calls to the EC2 API
    #[arg(long, default_value = "500ms", value_parser = humantime::parse_duration)]
    pub min_api_interval: Duration,

    /// Collect bootstrap errors into this directory if the cluster does not converge
    #[arg(long, value_hint = clap::ValueHint::DirPath)]
    pub output_dir: Option<PathBuf>,
}

#[derive(Parser)]
pub struct WatchNodesOpts {
    #[clap(flatten)]
    pub cluster: ClusterOpts,

    #[clap(flatten)]
    pub head_node: HeadNodeOpts,

    /// Expected number of compute nodes
    #[arg(long)]
    pub target: u64,

    /// Maximum monitoring time, e.g. `30m`
    #[arg(long, value_parser = humantime::parse_duration)]
    pub max_monitoring_time: Duration,
}

#[derive(Parser)]
pub struct ScalingTestOpts {
    /// Path to the scaling test description (TOML)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    #[clap(flatten)]
    pub cluster: ClusterOpts,

    #[clap(flatten)]
    pub head_node: HeadNodeOpts,

    /// Monitoring profile that decides how often the sources are sampled
    #[arg(long, value_enum, default_value_t = ProfileKind::Scaling)]
    pub profile: ProfileKind,

    /// Source of the scheduler view of the fleet
    #[arg(long, value_enum, default_value_t = MembershipSource::HeadNodeMetrics)]
    pub membership_source: MembershipSource,

    /// Where metrics are published when enabled by the test description
    #[arg(long, value_enum, default_value_t = MetricsSinkKind::Cloudwatch)]
    pub metrics_sink: MetricsSinkKind,

    /// Minimum delay between two calls to the EC2 API
    #[arg(long, default_value = "500ms", value_parser = humantime::parse_duration)]
    pub min_api_interval: Duration,

    /// Write the final state of the cluster (convergence and failures) as JSON into this file
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub view_file: Option<PathBuf>,

    /// Saved output of `pcluster describe-cluster`.
    ///
    /// Its login node pool is added to the state written into the view file.
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub cluster_description: Option<PathBuf>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LoginNodesField {
    Pools(Vec<LoginNodesPool>),
    Pool(LoginNodesPool),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClusterDescription {
    #[serde(default)]
    login_nodes: Option<LoginNodesField>,
}

/// Returns the first login node pool of a cluster description.
pub fn parse_login_nodes(text: &str) -> anyhow::Result<Option<LoginNodesPool>> {
    let description: ClusterDescription =
        serde_json::from_str(text).context("Cannot parse cluster description")?;
    Ok(match description.login_nodes {
        Some(LoginNodesField::Pools(pools)) => pools.into_iter().next(),
        Some(LoginNodesField::Pool(pool)) => Some(pool),
        None => None,
    })
}

fn create_inventory(cluster: &ClusterOpts, min_interval: Duration) -> Rc<dyn InstanceInventory> {
    Rc::new(ThrottledInventory::new(
        Rc::new(Ec2Inventory::new(cluster.aws_cli())),
        min_interval,
    ))
}

fn create_membership_observer(
    source: MembershipSource,
    executor: Rc<dyn RemoteExecutor>,
    head_node: &HeadNodeOpts,
) -> Box<dyn Observer> {
    match source {
        MembershipSource::Slurm => Box::new(SchedulerMembershipObserver::new(Rc::new(
            SlurmCommands::new(executor),
        ))),
        MembershipSource::HeadNodeMetrics => Box::new(HeadNodeMetricsObserver::new(
            executor,
            head_node.scripts_dir.clone(),
        )),
    }
}

fn create_emitter(
    kind: MetricsSinkKind,
    cluster: &ClusterOpts,
    namespace: &str,
) -> MetricsEmitter {
    let sink: Rc<dyn MetricsSink> = match kind {
        MetricsSinkKind::Cloudwatch => Rc::new(CloudWatchSink::new(cluster.aws_cli())),
        MetricsSinkKind::Log => Rc::new(LogSink),
    };
    MetricsEmitter::new(sink, namespace.to_string(), cluster.cluster_name.clone())
}

pub async fn command_scale(gsettings: &GlobalSettings, opts: ScaleOpts) -> anyhow::Result<()> {
    let cluster_name = &opts.cluster.cluster_name;
    let executor = opts.head_node.executor(&opts.cluster).await?;
    let inventory = create_inventory(&opts.cluster, opts.min_api_interval);
    let capacity = InstanceCapacityObserver::new(inventory.clone(), cluster_name);
    let membership =
        create_membership_observer(opts.membership_source, executor.clone(), &opts.head_node);
    let emitter = opts.metrics.publish_metrics.then(|| {
        create_emitter(
            opts.metrics.metrics_sink,
            &opts.cluster,
            &opts.metrics.metrics_namespace,
        )
    });
    let profile =
        MonitorProfile::new(opts.profile, opts.max_monitoring_time).with_env_overrides();
    let limits = SourceLimits {
        capacity: !opts.no_capacity_limit,
        membership: !opts.no_membership_limit,
    };

    let result = monitor_scaling(
        cluster_name,
        &capacity,
        membership.as_ref(),
        opts.target,
        limits,
        &profile,
        emitter.as_ref(),
        None,
    )
    .await?;
    gsettings
        .printer()
        .print_convergence_result(cluster_name, opts.target, &result);

    if result.timed_out() {
        if let Some(output_dir) = &opts.output_dir {
            let scan = BootstrapScan {
                executor: executor.as_ref(),
                inventory: inventory.as_ref(),
                scripts_dir: &opts.head_node.scripts_dir,
                cluster_name,
                region: &opts.cluster.region,
                output_dir,
            };
            let report = get_bootstrap_errors(&scan).await?;
            gsettings
                .printer()
                .print_bootstrap_report(cluster_name, &report);
        }
        anyhow::bail!(
            "Cluster {cluster_name} did not reach {} node(s) in time",
            opts.target
        );
    }
    Ok(())
}

pub async fn command_watch_nodes(
    gsettings: &GlobalSettings,
    opts: WatchNodesOpts,
) -> anyhow::Result<()> {
    let cluster_name = &opts.cluster.cluster_name;
    let executor = opts.head_node.executor(&opts.cluster).await?;
    let membership = SchedulerMembershipObserver::new(Rc::new(SlurmCommands::new(executor)));
    let profile = MonitorProfile::new(ProfileKind::Watch, opts.max_monitoring_time)
        .with_env_overrides();

    let result =
        watch_compute_nodes(cluster_name, &membership, opts.target, &profile, None).await?;
    gsettings
        .printer()
        .print_convergence_result(cluster_name, opts.target, &result);
    if result.timed_out() {
        anyhow::bail!(
            "Scheduler of cluster {cluster_name} did not report {} node(s) in time",
            opts.target
        );
    }
    Ok(())
}

pub async fn command_scaling_test(
    gsettings: &GlobalSettings,
    opts: ScalingTestOpts,
) -> anyhow::Result<()> {
    let config = ScalingTestConfig::load(&opts.config)
        .with_context(|| format!("Cannot load scaling test {}", opts.config.display()))?;
    let (service, process) = create_monitor_service();
    let (_, result) = tokio::join!(process, async {
        let result = run_scaling_test_phases(gsettings, &opts, &config, &service).await;
        service.quit();
        result
    });
    let failed = result?;
    if failed > 0 {
        anyhow::bail!(
            "{failed} scaling phase(s) of cluster {} did not converge",
            opts.cluster.cluster_name
        );
    }
    Ok(())
}

/// Returns the number of phases that did not converge.
async fn run_scaling_test_phases(
    gsettings: &GlobalSettings,
    opts: &ScalingTestOpts,
    config: &ScalingTestConfig,
    service: &MonitorService,
) -> anyhow::Result<usize> {
    let cluster_name = &opts.cluster.cluster_name;
    if let Some(path) = &opts.cluster_description {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read {}", path.display()))?;
        match parse_login_nodes(&text)? {
            Some(pool) => service.set_login_nodes(cluster_name, pool),
            None => log::debug!("Cluster {cluster_name} has no login nodes"),
        }
    }

    let executor = opts.head_node.executor(&opts.cluster).await?;
    let inventory = create_inventory(&opts.cluster, opts.min_api_interval);
    let capacity = InstanceCapacityObserver::new(inventory.clone(), cluster_name);
    let membership =
        create_membership_observer(opts.membership_source, executor.clone(), &opts.head_node);
    let emitter = config
        .publish_metrics
        .then(|| create_emitter(opts.metrics_sink, &opts.cluster, &config.metrics_namespace));
    let tick = MonitorProfile::new(opts.profile, config.max_monitoring_time)
        .with_env_overrides()
        .tick;

    let bootstrap = config.output_dir.as_deref().map(|output_dir| BootstrapScan {
        executor: executor.as_ref(),
        inventory: inventory.as_ref(),
        scripts_dir: &opts.head_node.scripts_dir,
        cluster_name,
        region: &opts.cluster.region,
        output_dir,
    });
    let context = ScalingTestContext {
        cluster_name,
        capacity: &capacity,
        membership: membership.as_ref(),
        tick,
        max_monitoring_time: max_monitoring_time_from_env(),
        limits: SourceLimits::both(),
        executor: Some(executor.as_ref()),
        emitter: emitter.as_ref(),
        reporter: Some(service),
        bootstrap,
    };

    let phases = run_scaling_test(config, &context).await?;
    gsettings.printer().print_scaling_test(cluster_name, &phases);

    let failed = phases.iter().filter(|phase| phase.result.timed_out()).count();
    if failed > 0 {
        let stacks = CloudFormationStacks::new(opts.cluster.aws_cli());
        match stacks.describe_stack(cluster_name).await {
            Ok(description) => {
                let failure = classify(&description.events);
                if failure.is_none() {
                    log::info!("No failed wait condition in the stack of cluster {cluster_name}");
                }
                let failures: Vec<FailureRecord> = failure.into_iter().collect();
                service.set_failures(cluster_name, &failures);
            }
            Err(error) => log::warn!("Cannot read the stack of cluster {cluster_name}: {error:?}"),
        }
    }

    if let Some(path) = &opts.view_file {
        let view = service.get_cluster(cluster_name).await?;
        let file = std::fs::File::create(path)
            .with_context(|| format!("Cannot create {}", path.display()))?;
        serde_json::to_writer_pretty(file, &view)?;
    }
    Ok(failed)
}
