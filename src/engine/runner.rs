//! Command runner.
//!
//! Runs the user's command with inherited stdout/stderr and reduces the
//! result to a `CommandOutcome`. The command line is split the way a POSIX
//! shell would split it, so quoted spans stay a single argument.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{info, warn};

use crate::types::CommandOutcome;

/// Runs one command line to completion.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &str) -> CommandOutcome;
}

/// Split a command line into program and arguments.
///
/// Returns `None` for unbalanced quotes or an empty command.
pub fn split_command(command: &str) -> Option<(String, Vec<String>)> {
    let mut parts = shlex::split(command)?.into_iter();
    let program = parts.next()?;
    Some((program, parts.collect()))
}

/// Spawns the command as a child process of this one.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellCommandRunner;

#[async_trait]
impl CommandRunner for ShellCommandRunner {
    async fn run(&self, command: &str) -> CommandOutcome {
        let Some((program, args)) = split_command(command) else {
            warn!(command, "Failed to parse command");
            return CommandOutcome::Failed;
        };

        info!(program = %program, args = ?args, "Running command");

        let mut child = match Command::new(&program)
            .args(&args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!(program = %program, error = %e, "Failed to start command");
                return CommandOutcome::Failed;
            }
        };

        match child.wait().await {
            Ok(status) if status.success() => {
                info!("Command succeeded");
                CommandOutcome::Succeeded
            }
            Ok(status) => {
                warn!(status = %status, "Command exited unsuccessfully");
                CommandOutcome::Failed
            }
            Err(e) => {
                warn!(error = %e, "Command execution failed");
                CommandOutcome::Failed
            }
        }
    }
}
