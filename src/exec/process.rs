// src/exec/process.rs

//! Invocations of the `docker` command line client.

use std::process::{ExitStatus, Stdio};

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, trace};

use crate::engine::cancellation::CancellationContext;
use crate::errors::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }

    /// Stdout then stderr, for reporting what a command printed.
    pub fn combined_output(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }

    /// The most useful single-line explanation of a failed invocation.
    pub fn error_message(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }

        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }

        format!("command exited with code {}", self.exit_code)
    }
}

fn exit_code(status: ExitStatus) -> i64 {
    status.code().map(i64::from).unwrap_or(-1)
}

#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl DockerCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Run to completion and capture output. Not interruptible; used for
    /// cleanup, which must still happen after cancellation.
    pub async fn output(&self, args: &[String]) -> Result<ProcessOutput> {
        debug!(binary = %self.binary, ?args, "running docker command");

        let output = self
            .command(args)
            .output()
            .await
            .with_context(|| format!("running '{} {}'", self.binary, args.join(" ")))?;

        Ok(ProcessOutput {
            exit_code: exit_code(output.status),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Like [`output`](Self::output), but the process is killed and
    /// `Cancelled` returned if `cancellation` fires first.
    pub async fn output_cancellable(
        &self,
        args: &[String],
        cancellation: &CancellationContext,
    ) -> Result<ProcessOutput> {
        cancellation.run_cancellable(self.output(args)).await?
    }

    /// Run while handing each line of output to `on_line` as it arrives.
    pub async fn stream_cancellable(
        &self,
        args: &[String],
        cancellation: &CancellationContext,
        mut on_line: impl FnMut(&str) + Send,
    ) -> Result<ProcessOutput> {
        debug!(binary = %self.binary, ?args, "streaming docker command");

        let mut child = self
            .command(args)
            .spawn()
            .with_context(|| format!("running '{} {}'", self.binary, args.join(" ")))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let work = async move {
            // Output is not guaranteed to be UTF-8, so decode it lossily.
            let read_stdout = async {
                let mut collected = String::new();
                if let Some(stdout) = stdout {
                    let mut reader = BufReader::new(stdout);
                    let mut raw = Vec::new();
                    while reader.read_until(b'\n', &mut raw).await? > 0 {
                        let line = String::from_utf8_lossy(&raw)
                            .trim_end_matches(['\n', '\r'])
                            .to_string();
                        raw.clear();
                        trace!(%line, "docker output");
                        on_line(&line);
                        collected.push_str(&line);
                        collected.push('\n');
                    }
                }
                Ok::<_, std::io::Error>(collected)
            };

            let read_stderr = async {
                let mut raw = Vec::new();
                if let Some(mut stderr) = stderr {
                    stderr.read_to_end(&mut raw).await?;
                }
                Ok::<_, std::io::Error>(String::from_utf8_lossy(&raw).into_owned())
            };

            let (stdout, stderr) = tokio::try_join!(read_stdout, read_stderr)?;
            let status = child.wait().await?;

            Ok::<_, std::io::Error>(ProcessOutput {
                exit_code: exit_code(status),
                stdout,
                stderr,
            })
        };

        let output = cancellation
            .run_cancellable(work)
            .await?
            .context("reading docker output")?;
        Ok(output)
    }

    /// Run with the terminal attached and return the exit code.
    ///
    /// Not interruptible. Killing the client would leave the container
    /// running unnoticed, so this only returns once the process exits.
    pub async fn run_attached(&self, args: &[String]) -> Result<i64> {
        debug!(binary = %self.binary, ?args, "running attached docker command");

        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("running '{} {}'", self.binary, args.join(" ")))?;

        let status = child
            .wait()
            .await
            .context("waiting for attached docker command")?;

        Ok(exit_code(status))
    }
}
