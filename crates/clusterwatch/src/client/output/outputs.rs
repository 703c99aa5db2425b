use anyhow::Error;
use convergence::ConvergenceResult;

use crate::diagnose::{BootstrapReport, FailureRecord};
use crate::monitor::PhaseResult;

#[allow(clippy::upper_case_acronyms)]
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outputs {
    CLI,
    JSON,
    Quiet,
}

pub trait Output {
    // Monitoring
    fn print_convergence_result(&self, cluster: &str, target: u64, result: &ConvergenceResult);
    fn print_scaling_test(&self, cluster: &str, phases: &[PhaseResult]);

    // Diagnostics
    fn print_failure(
        &self,
        cluster: &str,
        failure: Option<&FailureRecord>,
        raw_reason: Option<&str>,
    );
    fn print_bootstrap_report(&self, cluster: &str, report: &BootstrapReport);

    // Errors
    fn print_error(&self, error: Error);
}
