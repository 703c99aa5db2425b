use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;

use crate::aws::{InstanceFilter, InstanceInventory, InstanceRecord};
use crate::observer::ObserveResult;
use crate::remote::RemoteExecutor;

/// Script that stores IP addresses of compute nodes with bootstrap errors into
/// `$HOME/bootstrap_errors.txt` on the head node.
pub const GET_BOOTSTRAP_ERRORS_SCRIPT: &str = "get_bootstrap_errors.sh";
const READ_BOOTSTRAP_ERRORS_COMMAND: &str = "cat $HOME/bootstrap_errors.txt";

/// Subdirectory of the output directory that stores console logs of failed nodes.
pub const BOOTSTRAP_ERRORS_DIR: &str = "bootstrap_errors";

/// Everything needed to collect console logs of compute nodes that failed to bootstrap.
pub struct BootstrapScan<'a> {
    pub executor: &'a dyn RemoteExecutor,
    pub inventory: &'a dyn InstanceInventory,
    pub scripts_dir: &'a Path,
    pub cluster_name: &'a str,
    pub region: &'a str,
    pub output_dir: &'a Path,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapErrorLog {
    pub ip_address: String,
    pub instance_id: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapReport {
    /// Console logs written during this scan.
    pub written: Vec<BootstrapErrorLog>,
    /// IP addresses whose log had already been written by an earlier scan.
    pub already_collected: Vec<String>,
    /// IP addresses that could not be mapped to any instance.
    pub unresolved: Vec<String>,
}

impl BootstrapReport {
    pub fn is_empty(&self) -> bool {
        self.written.is_empty() && self.already_collected.is_empty() && self.unresolved.is_empty()
    }
}

pub fn log_file_name(
    ip_address: &str,
    cluster_name: &str,
    instance_id: &str,
    region: &str,
) -> String {
    format!("{ip_address}-{cluster_name}-{instance_id}-{region}-log.txt")
}

/// Unique non-empty lines of the bootstrap error list.
fn parse_ip_addresses(output: &str) -> Vec<&str> {
    let mut seen = HashSet::new();
    output
        .lines()
        .map(|line| line.trim())
        .filter(|ip| !ip.is_empty() && seen.insert(*ip))
        .collect()
}

/// IP addresses can be reused by replacement instances, so a log of any instance that had the
/// address means that the address was already diagnosed.
fn has_log_for_ip(directory: &Path, ip_address: &str) -> std::io::Result<bool> {
    let prefix = format!("{ip_address}-");
    for entry in std::fs::read_dir(directory)? {
        if entry?.file_name().to_string_lossy().starts_with(&prefix) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// The most recently launched instance that had the given private IP address.
pub async fn find_latest_instance(
    inventory: &dyn InstanceInventory,
    ip_address: &str,
) -> ObserveResult<Option<InstanceRecord>> {
    let filters = [InstanceFilter::private_ip(ip_address)];
    let mut instances = inventory.list_instances(&filters).await?;
    instances.sort_by_key(|instance| instance.launch_time);
    Ok(instances.pop())
}

enum CollectOutcome {
    Written(BootstrapErrorLog),
    AlreadyExists,
    NotFound,
}

/// Writes `content` into a new file. Returns `false` if the file already exists.
fn write_new_file(path: &Path, content: &str) -> std::io::Result<bool> {
    let mut file = match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
    {
        Ok(file) => file,
        Err(error) if error.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
        Err(error) => return Err(error),
    };
    file.write_all(content.as_bytes())?;
    Ok(true)
}

async fn collect_console_log(
    scan: &BootstrapScan<'_>,
    directory: &Path,
    ip_address: &str,
) -> ObserveResult<CollectOutcome> {
    let Some(instance) = find_latest_instance(scan.inventory, ip_address).await? else {
        return Ok(CollectOutcome::NotFound);
    };
    log::warn!(
        "Instance {} had bootstrap errors. Check the outputs for details.",
        instance.instance_id
    );
    let console_output = scan
        .inventory
        .get_console_output(&instance.instance_id)
        .await?;

    let path = directory.join(log_file_name(
        ip_address,
        scan.cluster_name,
        &instance.instance_id,
        scan.region,
    ));
    if !write_new_file(&path, &console_output)
        .with_context(|| format!("Cannot write console log into {}", path.display()))?
    {
        return Ok(CollectOutcome::AlreadyExists);
    }
    Ok(CollectOutcome::Written(BootstrapErrorLog {
        ip_address: ip_address.to_string(),
        instance_id: instance.instance_id,
        path,
    }))
}

/// Stores console logs of compute nodes that reported bootstrap errors into
/// `<output_dir>/bootstrap_errors`.
///
/// Every IP address is diagnosed at most once across repeated scans. Addresses that do not map
/// to any instance are skipped, other errors abort the scan.
pub async fn get_bootstrap_errors(scan: &BootstrapScan<'_>) -> ObserveResult<BootstrapReport> {
    log::info!("Checking for bootstrap errors of cluster {}", scan.cluster_name);
    scan.executor
        .run_script(&scan.scripts_dir.join(GET_BOOTSTRAP_ERRORS_SCRIPT), &[])
        .await?;
    let output = scan
        .executor
        .run_command(READ_BOOTSTRAP_ERRORS_COMMAND)
        .await?;

    let directory = scan.output_dir.join(BOOTSTRAP_ERRORS_DIR);
    std::fs::create_dir_all(&directory)
        .with_context(|| format!("Cannot create directory {}", directory.display()))?;

    let mut report = BootstrapReport::default();
    for ip_address in parse_ip_addresses(&output) {
        if has_log_for_ip(&directory, ip_address)
            .with_context(|| format!("Cannot read directory {}", directory.display()))?
        {
            log::debug!("Bootstrap errors of {ip_address} were already collected");
            report.already_collected.push(ip_address.to_string());
            continue;
        }

        log::warn!("Compute node with IP {ip_address} had bootstrap errors. Getting instance id...");
        match collect_console_log(scan, &directory, ip_address).await {
            Ok(CollectOutcome::Written(log)) => report.written.push(log),
            Ok(CollectOutcome::AlreadyExists) => {
                report.already_collected.push(ip_address.to_string())
            }
            Ok(CollectOutcome::NotFound) => {
                log::warn!(
                    "Couldn't find instance with IP {ip_address} but could have a bootstrap error."
                );
                report.unresolved.push(ip_address.to_string());
            }
            Err(error) => {
                log::error!(
                    "Error when retrieving the compute node logs for instance with IP address {ip_address}"
                );
                return Err(error);
            }
        }
    }
    Ok(report)
}
