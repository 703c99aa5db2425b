use anyhow::Error;
use convergence::ConvergenceResult;

use crate::client::output::outputs::Output;
use crate::diagnose::{BootstrapReport, FailureRecord};
use crate::monitor::PhaseResult;

/// Prints only the essential value of each result, one per line.
#[derive(Default)]
pub struct Quiet;

impl Output for Quiet {
    fn print_convergence_result(&self, _cluster: &str, _target: u64, result: &ConvergenceResult) {
        println!("{}", result.state());
    }

    fn print_scaling_test(&self, _cluster: &str, phases: &[PhaseResult]) {
        for phase in phases {
            println!("{} {}", phase.target, phase.result.state());
        }
    }

    fn print_failure(
        &self,
        _cluster: &str,
        failure: Option<&FailureRecord>,
        _raw_reason: Option<&str>,
    ) {
        if let Some(failure) = failure {
            println!("{}", failure.failure_code);
        }
    }

    fn print_bootstrap_report(&self, _cluster: &str, report: &BootstrapReport) {
        for log in &report.written {
            println!("{}", log.path.display());
        }
    }

    fn print_error(&self, error: Error) {
        eprintln!("{error:?}");
    }
}
