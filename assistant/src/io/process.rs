//! Spawning the planner command: prompt on stdin, capped capture, hard deadline.

use std::io::{Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// What a finished (or killed) planner command left behind.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Last non-empty stderr line, for error messages.
    pub fn stderr_tail(&self) -> String {
        String::from_utf8_lossy(&self.stderr)
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .unwrap_or_default()
            .trim()
            .to_string()
    }
}

/// Spawn `cmd`, hand it `stdin`, and wait at most `timeout` for it to exit.
///
/// Output readers start before the prompt is written. Each stream keeps its
/// first `output_limit_bytes`; the overflow is only counted. On timeout the
/// child is killed and `timed_out` is set, the partial output is kept.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), output_limit_bytes))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    stdin: Option<&[u8]>,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    })
    .stdout(Stdio::piped())
    .stderr(Stdio::piped());

    debug!(program = ?cmd.get_program(), "spawning");
    let mut child = cmd
        .spawn()
        .inspect_err(|err| error!(err = %err, "spawn failed"))
        .context("spawn command")?;

    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        bail!("output pipes were not set up");
    };

    let stdout_handle = thread::spawn(move || drain_capped(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || drain_capped(stderr, output_limit_bytes));

    if let Some(input) = stdin {
        // EOF for the child once this handle drops.
        let mut child_stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("stdin was not piped"))?;
        child_stdin.write_all(input).context("write stdin")?;
    }

    let (status, timed_out) = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => (status, false),
        None => {
            warn!(timeout_secs = timeout.as_secs(), "deadline passed, killing");
            child.kill().context("kill command")?;
            (child.wait().context("reap killed command")?, true)
        }
    };

    let (stdout, stdout_truncated) = collect(stdout_handle).context("join stdout")?;
    let (stderr, stderr_truncated) = collect(stderr_handle).context("join stderr")?;

    if stdout_truncated + stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output over cap");
    }
    debug!(exit_code = ?status.code(), timed_out, "finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
    })
}

/// Bytes kept from one stream, plus how many were dropped past the cap.
type Captured = (Vec<u8>, usize);

fn collect(reader: thread::JoinHandle<Result<Captured>>) -> Result<Captured> {
    reader
        .join()
        .map_err(|_| anyhow!("output reader thread panicked"))?
}

fn drain_capped<R: Read>(mut stream: R, cap: usize) -> Result<Captured> {
    let mut kept = Vec::new();
    let mut dropped = 0usize;
    let mut chunk = [0u8; 8192];
    loop {
        let n = stream.read(&mut chunk).context("read output")?;
        if n == 0 {
            return Ok((kept, dropped));
        }
        let take = n.min(cap.saturating_sub(kept.len()));
        kept.extend_from_slice(&chunk[..take]);
        dropped += n - take;
    }
}
