//! Child processes with a deadline and bounded output capture.
//!
//! Used for `RUN_COMMAND` actions and for the command-backed reasoner.

use std::io::{Read, Write};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// After a kill, how long to wait for the output pipes to close.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Bytes kept from one output stream, plus how many were discarded past the limit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capture {
    pub bytes: Vec<u8>,
    pub dropped: usize,
}

impl Capture {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    /// `"\n[<label> <stream> truncated N bytes]\n"`, or nothing when complete.
    pub fn notice(&self, label: &str, stream: &str) -> String {
        if self.dropped == 0 {
            return String::new();
        }
        format!("\n[{label} {stream} truncated {} bytes]\n", self.dropped)
    }
}

#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Capture,
    pub stderr: Capture,
    /// The deadline passed and the child was killed.
    pub timed_out: bool,
}

impl CommandOutput {
    /// `"exit code N"`, `"timed out"` or `"terminated by signal"`.
    pub fn status_line(&self) -> String {
        if self.timed_out {
            return "timed out".to_string();
        }
        match self.status.code() {
            Some(code) => format!("exit code {code}"),
            None => "terminated by signal".to_string(),
        }
    }

    /// Transcript stored in the scratchpad: status line, then both streams.
    pub fn render(&self, label: &str) -> String {
        format!(
            "{label}: {}\n--- stdout ---\n{}{}--- stderr ---\n{}{}",
            self.status_line(),
            self.stdout.text(),
            self.stdout.notice(label, "stdout"),
            self.stderr.text(),
            self.stderr.notice(label, "stderr"),
        )
    }
}

/// `sh -c <command>` rooted at `cwd`.
pub fn shell_command(command: &str, cwd: &Path) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command).current_dir(cwd);
    cmd
}

/// Run `cmd` to completion or until `timeout`, whichever comes first.
///
/// Both pipes are drained on their own threads while the child runs, so a
/// chatty child cannot block on a full pipe. At most `output_limit_bytes` of
/// each stream is kept.
///
/// On unix the child leads its own process group and a timeout kills the whole
/// group, so background jobs it started cannot outlive the deadline.
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
    own_process_group(&mut cmd);

    let mut child = cmd.spawn().map_err(|err| {
        error!(error = %err, "failed to spawn child process");
        anyhow!(err).context("spawn command")
    })?;
    debug!(pid = child.id(), "child spawned");

    if let Some(input) = stdin {
        let mut pipe = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("stdin was not piped"))?;
        pipe.write_all(input).context("write stdin")?;
        // Dropping the handle closes the pipe so the child sees EOF.
    }

    let stdout = drain(child.stdout.take(), output_limit_bytes, "stdout")?;
    let stderr = drain(child.stderr.take(), output_limit_bytes, "stderr")?;

    let (status, timed_out) = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => (status, false),
        None => {
            warn!(timeout_secs = timeout.as_secs(), "deadline passed, killing child");
            kill_tree(&mut child)?;
            (child.wait().context("reap killed command")?, true)
        }
    };

    let grace = timed_out.then(|| Instant::now() + DRAIN_GRACE);
    let stdout = collect(stdout, "stdout", grace)?;
    let stderr = collect(stderr, "stderr", grace)?;
    if stdout.dropped > 0 || stderr.dropped > 0 {
        warn!(
            stdout_dropped = stdout.dropped,
            stderr_dropped = stderr.dropped,
            "output truncated"
        );
    }

    debug!(exit_code = ?status.code(), timed_out, "child finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        timed_out,
    })
}

fn drain<R: Read + Send + 'static>(
    pipe: Option<R>,
    limit: usize,
    stream: &str,
) -> Result<JoinHandle<Result<Capture>>> {
    let pipe = pipe.ok_or_else(|| anyhow!("{stream} was not piped"))?;
    Ok(thread::spawn(move || capture_limited(pipe, limit)))
}

#[cfg(unix)]
fn own_process_group(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn own_process_group(_cmd: &mut Command) {}

/// Kill the child's process group, falling back to the child alone.
fn kill_tree(child: &mut Child) -> Result<()> {
    #[cfg(unix)]
    {
        let group = format!("-{}", child.id());
        match Command::new("kill")
            .args(["-KILL", "--", &group])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            Ok(status) if status.success() => return Ok(()),
            Ok(status) => warn!(exit_code = ?status.code(), "process group kill failed"),
            Err(err) => warn!(error = %err, "could not run kill for the process group"),
        }
    }
    child.kill().context("kill command")
}

/// Join a reader thread. With a `deadline`, a reader still blocked after it
/// (a descendant escaped the group and holds the pipe) is abandoned.
fn collect(
    handle: JoinHandle<Result<Capture>>,
    stream: &str,
    deadline: Option<Instant>,
) -> Result<Capture> {
    if let Some(deadline) = deadline {
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                warn!(stream, "output pipe still open after kill; abandoning reader");
                return Ok(Capture::default());
            }
            thread::sleep(Duration::from_millis(20));
        }
    }
    handle
        .join()
        .map_err(|_| anyhow!("{stream} reader thread panicked"))?
        .with_context(|| format!("read {stream}"))
}

fn capture_limited<R: Read>(mut reader: R, limit: usize) -> Result<Capture> {
    let mut capture = Capture::default();
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            return Ok(capture);
        }
        let keep = n.min(limit.saturating_sub(capture.bytes.len()));
        capture.bytes.extend_from_slice(&chunk[..keep]);
        capture.dropped += n - keep;
    }
}
