use std::process::{Output, Stdio};

use anyhow::Context;
use bstr::ByteSlice;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

pub fn create_command(arguments: &[String]) -> anyhow::Result<Command> {
    let (program, args) = arguments
        .split_first()
        .ok_or_else(|| anyhow::anyhow!("Cannot run an empty command"))?;
    let mut command = Command::new(program);
    command.args(args);
    command.kill_on_drop(true);
    Ok(command)
}

pub fn check_command_output(output: Output) -> anyhow::Result<Output> {
    let status = output.status;
    if !status.success() {
        return Err(anyhow::anyhow!(
            "Exit code: {}\nStderr: {}\nStdout: {}",
            status.code().unwrap_or(-1),
            output.stderr.to_str_lossy().trim(),
            output.stdout.to_str_lossy().trim()
        ));
    }
    Ok(output)
}

fn stdout_to_string(program: &str, output: Output) -> anyhow::Result<String> {
    output
        .stdout
        .to_str()
        .map(|s| s.to_string())
        .map_err(|e| anyhow::anyhow!("Invalid UTF-8 {} output: {:?}", program, e))
}

/// Runs a command to completion and returns its standard output.
pub async fn run_command(arguments: &[String]) -> anyhow::Result<String> {
    let program = arguments.first().map(|s| s.as_str()).unwrap_or_default();
    log::debug!("Running command `{}`", arguments.join(" "));

    let output = create_command(arguments)?
        .output()
        .await
        .with_context(|| format!("{program} start failed"))?;
    let output =
        check_command_output(output).with_context(|| format!("{program} execution failed"))?;
    stdout_to_string(program, output)
}

/// Runs a command with `input` written to its standard input.
pub async fn run_command_with_input(arguments: &[String], input: &[u8]) -> anyhow::Result<String> {
    let program = arguments.first().map(|s| s.as_str()).unwrap_or_default();
    log::debug!(
        "Running command `{}` with {} byte(s) of input",
        arguments.join(" "),
        input.len()
    );

    let mut child = create_command(arguments)?
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("{program} start failed"))?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(input)
            .await
            .with_context(|| format!("Cannot write input of {program}"))?;
    }
    let output = child
        .wait_with_output()
        .await
        .with_context(|| format!("{program} did not finish"))?;
    let output =
        check_command_output(output).with_context(|| format!("{program} execution failed"))?;
    stdout_to_string(program, output)
}
