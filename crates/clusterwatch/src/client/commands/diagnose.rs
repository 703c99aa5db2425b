use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;

use crate::aws::{CloudFormationStacks, Ec2Inventory};
use crate::client::commands::{ClusterOpts, HeadNodeOpts};
use crate::client::globalsettings::GlobalSettings;
use crate::diagnose::{
    BootstrapScan, StackEvent, classify, get_bootstrap_errors, get_failure_reason,
};

#[derive(Parser)]
pub struct DiagnoseOpts {
    #[clap(flatten)]
    pub cluster: ClusterOpts,

    /// Read stack events from a JSON file instead of calling CloudFormation.
    ///
    /// Both a plain list of events and an object with an `events` list are accepted.
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub events: Option<PathBuf>,
}

#[derive(Parser)]
pub struct BootstrapErrorsOpts {
    #[clap(flatten)]
    pub cluster: ClusterOpts,

    #[clap(flatten)]
    pub head_node: HeadNodeOpts,

    /// Directory where the console logs are stored
    #[arg(long, value_hint = clap::ValueHint::DirPath)]
    pub output_dir: PathBuf,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StackEventsFile {
    List(Vec<StackEvent>),
    Wrapped { events: Vec<StackEvent> },
}

pub fn parse_events_file(text: &str) -> anyhow::Result<Vec<StackEvent>> {
    let file: StackEventsFile =
        serde_json::from_str(text).context("Cannot parse stack events")?;
    Ok(match file {
        StackEventsFile::List(events) => events,
        StackEventsFile::Wrapped { events } => events,
    })
}

pub async fn command_diagnose(
    gsettings: &GlobalSettings,
    opts: DiagnoseOpts,
) -> anyhow::Result<()> {
    let events = match &opts.events {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Cannot read {}", path.display()))?;
            parse_events_file(&text)?
        }
        None => {
            CloudFormationStacks::new(opts.cluster.aws_cli())
                .stack_events(&opts.cluster.cluster_name)
                .await?
        }
    };
    log::debug!("Classifying {} stack event(s)", events.len());

    let failure = classify(&events);
    gsettings.printer().print_failure(
        &opts.cluster.cluster_name,
        failure.as_ref(),
        get_failure_reason(&events),
    );
    Ok(())
}

pub async fn command_bootstrap_errors(
    gsettings: &GlobalSettings,
    opts: BootstrapErrorsOpts,
) -> anyhow::Result<()> {
    let executor = opts.head_node.executor(&opts.cluster).await?;
    let inventory = Ec2Inventory::new(opts.cluster.aws_cli());
    let scan = BootstrapScan {
        executor: executor.as_ref(),
        inventory: &inventory,
        scripts_dir: &opts.head_node.scripts_dir,
        cluster_name: &opts.cluster.cluster_name,
        region: &opts.cluster.region,
        output_dir: &opts.output_dir,
    };
    let report = get_bootstrap_errors(&scan).await?;
    gsettings
        .printer()
        .print_bootstrap_report(&opts.cluster.cluster_name, &report);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::parse_events_file;

    #[test]
    fn events_file_formats() {
        let event = r#"{"resourceType": "AWS::CloudFormation::Stack",
            "resourceStatus": "CREATE_IN_PROGRESS", "timestamp": "2024-05-02T10:00:00Z"}"#;
        assert_eq!(parse_events_file(&format!("[{event}]")).unwrap().len(), 1);
        assert_eq!(
            parse_events_file(&format!(r#"{{"events": [{event}, {event}]}}"#))
                .unwrap()
                .len(),
            2
        );
        assert!(parse_events_file(r#"{"stackEvents": []}"#).is_err());
    }
}
