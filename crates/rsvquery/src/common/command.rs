//! Transport used to talk to the batch servers: their client commands are executed and
//! the standard output is handed back to the report decoders.
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::process::Output;

use anyhow::Context;
use bstr::ByteSlice;
use tokio::process::Command;

use crate::common::config::ServerConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
}

impl ExternalCommand {
    /// Creates a command running a client program of `server`.
    pub fn for_server(server: &ServerConfig, program: &str) -> Self {
        Self {
            program: server.program(program),
            args: vec![],
            env: server.env.clone(),
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl Display for ExternalCommand {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

pub type CommandFuture = Pin<Box<dyn Future<Output = anyhow::Result<String>>>>;

/// Executes batch server client commands.
pub trait CommandRunner {
    /// Runs the command and returns its standard output.
    /// Fails if the command cannot be started or if it exits unsuccessfully.
    fn run(&self, command: ExternalCommand) -> CommandFuture;
}

/// Runs commands as local processes.
#[derive(Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, command: ExternalCommand) -> CommandFuture {
        Box::pin(async move {
            log::debug!("Running command `{command}`");

            let mut process = Command::new(&command.program);
            process
                .args(&command.args)
                .envs(&command.env)
                .kill_on_drop(true);

            let output = process
                .output()
                .await
                .with_context(|| format!("{} start failed", command.program))?;
            let output = check_command_output(output)
                .with_context(|| format!("{} execution failed", command.program))?;

            log::trace!(
                "Command `{command}` output\nStdout\n{}Stderr\n{}",
                output.stdout.to_str_lossy(),
                output.stderr.to_str_lossy()
            );

            let stdout = output
                .stdout
                .to_str()
                .map_err(|e| anyhow::anyhow!("Invalid UTF-8 {} output: {:?}", command.program, e))?;
            Ok(stdout.to_string())
        })
    }
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
