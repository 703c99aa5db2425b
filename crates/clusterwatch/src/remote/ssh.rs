use std::path::{Path, PathBuf};

use anyhow::Context;
use futures::future::LocalBoxFuture;

use crate::common::command::{run_command, run_command_with_input};
use crate::observer::ObserveResult;
use crate::remote::RemoteExecutor;

/// Executes commands on a host through the `ssh` client.
#[derive(Debug, Clone)]
pub struct SshExecutor {
    host: String,
    user: Option<String>,
    identity_file: Option<PathBuf>,
    run_scripts_as_root: bool,
}

impl SshExecutor {
    pub fn new(host: String) -> Self {
        Self {
            host,
            user: None,
            identity_file: None,
            run_scripts_as_root: false,
        }
    }

    pub fn with_user(mut self, user: Option<String>) -> Self {
        self.user = user;
        self
    }

    pub fn with_identity_file(mut self, identity_file: Option<PathBuf>) -> Self {
        self.identity_file = identity_file;
        self
    }

    /// Scripts will be executed through `sudo`.
    pub fn with_root_scripts(mut self, enabled: bool) -> Self {
        self.run_scripts_as_root = enabled;
        self
    }

    fn destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{user}@{}", self.host),
            None => self.host.clone(),
        }
    }

    fn ssh_arguments(&self) -> Vec<String> {
        let mut arguments = vec![
            "ssh".to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
        ];
        if let Some(identity) = &self.identity_file {
            arguments.push("-i".to_string());
            arguments.push(identity.display().to_string());
        }
        arguments.push(self.destination());
        arguments
    }

    fn command_arguments(&self, command: &str) -> Vec<String> {
        let mut arguments = self.ssh_arguments();
        arguments.push(command.to_string());
        arguments
    }

    fn script_arguments(&self, args: &[String]) -> Vec<String> {
        let mut arguments = self.ssh_arguments();
        if self.run_scripts_as_root {
            arguments.push("sudo".to_string());
        }
        arguments.extend(["bash", "-s", "--"].map(|s| s.to_string()));
        arguments.extend(args.iter().map(|arg| shell_quote(arg)));
        arguments
    }
}

/// Quotes an argument for the remote shell, which re-parses everything passed to `ssh`.
fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,@%+".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

impl RemoteExecutor for SshExecutor {
    fn run_command<'a>(&'a self, command: &'a str) -> LocalBoxFuture<'a, ObserveResult<String>> {
        Box::pin(async move {
            run_command(&self.command_arguments(command))
                .await
                .with_context(|| format!("Remote command `{command}` failed on {}", self.host))
        })
    }

    fn run_script<'a>(
        &'a self,
        script: &'a Path,
        args: &'a [String],
    ) -> LocalBoxFuture<'a, ObserveResult<String>> {
        Box::pin(async move {
            let content = tokio::fs::read(script)
                .await
                .with_context(|| format!("Cannot read script {}", script.display()))?;
            run_command_with_input(&self.script_arguments(args), &content)
                .await
                .with_context(|| {
                    format!("Remote script {} failed on {}", script.display(), self.host)
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{SshExecutor, shell_quote};

    #[test]
    fn command_arguments() {
        let executor = SshExecutor::new("10.0.0.5".to_string())
            .with_user(Some("ec2-user".to_string()))
            .with_identity_file(Some(PathBuf::from("/keys/cluster.pem")));
        insta::assert_debug_snapshot!(executor.command_arguments("cat $HOME/scaling_metrics.json"), @r###"
        [
            "ssh",
            "-o",
            "BatchMode=yes",
            "-i",
            "/keys/cluster.pem",
            "ec2-user@10.0.0.5",
            "cat $HOME/scaling_metrics.json",
        ]
        "###);
    }

    #[test]
    fn script_arguments_with_sudo() {
        let executor = SshExecutor::new("head".to_string()).with_root_scripts(true);
        let args = vec!["my cluster".to_string(), "eu-west-1".to_string()];
        insta::assert_debug_snapshot!(executor.script_arguments(&args), @r###"
        [
            "ssh",
            "-o",
            "BatchMode=yes",
            "head",
            "sudo",
            "bash",
            "-s",
            "--",
            "'my cluster'",
            "eu-west-1",
        ]
        "###);
    }

    #[test]
    fn quoting() {
        assert_eq!(shell_quote("abc-1.2"), "abc-1.2");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }
}
