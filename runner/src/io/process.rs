//! One-shot helper processes: the oracle command reads its prompt on stdin and
//! answers on stdout within a deadline.

use std::io::{self, ErrorKind, Read, Write};
use std::process::{ChildStdin, Command, ExitStatus, Stdio};
use std::thread::{self, ScopedJoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// What a finished (or killed) helper process produced, decoded as text.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    /// Bytes read past the capture limit on either stream and thrown away.
    pub dropped_bytes: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    /// Trimmed stderr cut to `max_chars`, for error messages.
    pub fn stderr_excerpt(&self, max_chars: usize) -> String {
        let trimmed = self.stderr.trim();
        match trimmed.char_indices().nth(max_chars) {
            Some((idx, _)) => format!("{}...", &trimmed[..idx]),
            None => trimmed.to_string(),
        }
    }
}

/// Bytes kept from one stream plus the count of bytes past the limit.
#[derive(Debug, Default)]
struct Capture {
    kept: Vec<u8>,
    dropped: usize,
}

impl Capture {
    /// Drain `reader` to EOF, keeping at most `limit` bytes.
    fn drain<R: Read>(mut reader: R, limit: usize) -> io::Result<Self> {
        let mut capture = Self::default();
        let mut chunk = [0u8; 8192];
        loop {
            let n = match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            };
            let keep = n.min(limit.saturating_sub(capture.kept.len()));
            capture.kept.extend_from_slice(&chunk[..keep]);
            capture.dropped += n - keep;
        }
        Ok(capture)
    }

    fn into_text(self) -> String {
        String::from_utf8_lossy(&self.kept).into_owned()
    }
}

/// Run `cmd` with `input` on stdin, killing it after `timeout`.
///
/// Stdin is written and both output pipes are drained on their own threads,
/// so a large prompt or a chatty child cannot wedge the wait. At most
/// `output_limit_bytes` per stream are kept.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), input_bytes = input.len()))]
pub fn run_with_input(
    mut cmd: Command,
    input: &str,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = cmd.spawn().context("spawn command")?;
    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| anyhow!("stdin was not piped"))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    thread::scope(|scope| -> Result<CommandOutput> {
        let feeder = scope.spawn(move || feed(stdin, input.as_bytes()));
        let out = scope.spawn(move || Capture::drain(stdout, output_limit_bytes));
        let err = scope.spawn(move || Capture::drain(stderr, output_limit_bytes));

        let (status, timed_out) = match child.wait_timeout(timeout).context("wait for command")? {
            Some(status) => (status, false),
            None => {
                warn!(timeout_secs = timeout.as_secs(), "command timed out, killing");
                child.kill().context("kill command")?;
                (child.wait().context("reap killed command")?, true)
            }
        };

        finish("stdin", feeder)?;
        let out = finish("stdout", out)?;
        let err = finish("stderr", err)?;
        let dropped_bytes = out.dropped + err.dropped;
        if dropped_bytes > 0 {
            warn!(dropped_bytes, limit = output_limit_bytes, "command output truncated");
        }
        debug!(exit_code = ?status.code(), timed_out, "command finished");

        Ok(CommandOutput {
            status,
            stdout: out.into_text(),
            stderr: err.into_text(),
            dropped_bytes,
            timed_out,
        })
    })
}

/// Write the whole input and close stdin. A child that exits before reading
/// all of it is not an error here.
fn feed(mut stdin: ChildStdin, input: &[u8]) -> io::Result<()> {
    match stdin.write_all(input) {
        Err(err) if err.kind() == ErrorKind::BrokenPipe => {
            debug!("command closed stdin before reading all input");
            Ok(())
        }
        other => other,
    }
}

fn finish<T>(stream: &str, handle: ScopedJoinHandle<'_, io::Result<T>>) -> Result<T> {
    handle
        .join()
        .map_err(|_| anyhow!("{stream} thread panicked"))?
        .with_context(|| format!("pipe {stream}"))
}
