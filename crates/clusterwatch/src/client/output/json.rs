use anyhow::Error;
use convergence::ConvergenceResult;
use serde_json::json;

use crate::client::output::outputs::Output;
use crate::diagnose::{BootstrapReport, FailureRecord};
use crate::monitor::PhaseResult;

#[derive(Default)]
pub struct JsonOutput;

impl JsonOutput {
    fn print(&self, data: serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string_pretty(&data).unwrap_or_else(|_| data.to_string())
        );
    }
}

impl Output for JsonOutput {
    fn print_convergence_result(&self, cluster: &str, target: u64, result: &ConvergenceResult) {
        self.print(json!({
            "cluster": cluster,
            "target": target,
            "result": result,
        }));
    }

    fn print_scaling_test(&self, cluster: &str, phases: &[PhaseResult]) {
        self.print(json!({
            "cluster": cluster,
            "phases": phases,
        }));
    }

    fn print_failure(
        &self,
        cluster: &str,
        failure: Option<&FailureRecord>,
        raw_reason: Option<&str>,
    ) {
        self.print(json!({
            "cluster": cluster,
            "failure": failure,
            "rawReason": raw_reason,
        }));
    }

    fn print_bootstrap_report(&self, cluster: &str, report: &BootstrapReport) {
        self.print(json!({
            "cluster": cluster,
            "bootstrapErrors": report,
        }));
    }

    fn print_error(&self, error: Error) {
        self.print(json!({
            "error": format!("{error:?}"),
        }));
    }
}
