//! Command execution on the head node of a cluster.
use std::path::Path;

use futures::future::LocalBoxFuture;

use crate::observer::ObserveResult;

pub mod ssh;

pub use ssh::SshExecutor;

/// Runs commands and bundled scripts on a remote host.
pub trait RemoteExecutor {
    /// Runs a shell command and returns its standard output.
    fn run_command<'a>(&'a self, command: &'a str) -> LocalBoxFuture<'a, ObserveResult<String>>;

    /// Runs a local script file on the remote host with the given arguments.
    fn run_script<'a>(
        &'a self,
        script: &'a Path,
        args: &'a [String],
    ) -> LocalBoxFuture<'a, ObserveResult<String>>;
}
