pub mod diagnose;
pub mod monitor;

use std::path::PathBuf;
use std::rc::Rc;

use anyhow::Context;
use clap::Parser;

use crate::aws::{AwsCli, CloudFormationStacks, get_stack_output_value};
use crate::remote::{RemoteExecutor, SshExecutor};

/// Directory with the scripts that are executed on the head node.
pub const BUNDLED_SCRIPTS_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/scripts");

/// Stack outputs that hold the address of the head node, in order of preference.
const HEAD_NODE_ADDRESS_OUTPUTS: [&str; 2] = ["HeadNodePublicIP", "HeadNodePrivateIP"];

#[derive(Parser)]
pub struct ClusterOpts {
    /// Name of the cluster (and of its CloudFormation stack)
    #[arg(long)]
    pub cluster_name: String,

    /// Region of the cluster
    #[arg(long, env = "AWS_DEFAULT_REGION")]
    pub region: String,

    /// AWS profile used for API calls
    #[arg(long, env = "AWS_PROFILE")]
    pub aws_profile: Option<String>,
}

impl ClusterOpts {
    pub fn aws_cli(&self) -> AwsCli {
        AwsCli::new(self.region.clone(), self.aws_profile.clone())
    }
}

#[derive(Parser)]
pub struct HeadNodeOpts {
    /// Address of the head node.
    /// If not set, it is read from the outputs of the cluster stack.
    #[arg(long)]
    pub head_node: Option<String>,

    /// User used to log into the head node
    #[arg(long)]
    pub ssh_user: Option<String>,

    /// Private key used to log into the head node
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub ssh_key: Option<PathBuf>,

    /// Directory with the scripts executed on the head node
    #[arg(long, default_value = BUNDLED_SCRIPTS_DIR, value_hint = clap::ValueHint::DirPath)]
    pub scripts_dir: PathBuf,
}

impl HeadNodeOpts {
    pub async fn executor(&self, cluster: &ClusterOpts) -> anyhow::Result<Rc<dyn RemoteExecutor>> {
        let host = match &self.head_node {
            Some(host) => host.clone(),
            None => resolve_head_node(cluster).await?,
        };
        let executor = SshExecutor::new(host)
            .with_user(self.ssh_user.clone())
            .with_identity_file(self.ssh_key.clone())
            .with_root_scripts(true);
        Ok(Rc::new(executor))
    }
}

async fn resolve_head_node(cluster: &ClusterOpts) -> anyhow::Result<String> {
    let stacks = CloudFormationStacks::new(cluster.aws_cli());
    let outputs = stacks.stack_outputs(&cluster.cluster_name).await?;
    HEAD_NODE_ADDRESS_OUTPUTS
        .iter()
        .find_map(|key| get_stack_output_value(&outputs, key))
        .map(|address| address.to_string())
        .with_context(|| {
            format!(
                "Cannot find the head node address of {}, use --head-node",
                cluster.cluster_name
            )
        })
}
