//! Line-oriented channel to the game process.
//!
//! The game runs on a pseudo-terminal so it behaves as if a person were
//! typing: prompts are flushed without a trailing newline and input is echoed
//! back. A reader thread forwards raw output chunks over an mpsc channel so
//! every read can be bounded by a timeout.

use std::io::{ErrorKind, Read, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use portable_pty::{Child, ChildKiller, CommandBuilder, MasterPty, PtySize, native_pty_system};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::core::budget::remaining_budget;

/// Byte that marks the game waiting for input.
pub const PROMPT_DELIMITER: u8 = b'?';

/// Grace period used when a channel is dropped without an explicit teardown.
pub const DEFAULT_TEARDOWN_GRACE: Duration = Duration::from_secs(5);

/// Terminal interrupt character; the line discipline turns it into SIGINT.
const INTERRUPT: u8 = 0x03;
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("game command is empty")]
    EmptyCommand,
    #[error("spawn {program}: {reason}")]
    Spawn { program: String, reason: String },
    #[error("game process has exited")]
    Exited,
    #[error("write to game: {0}")]
    Write(#[from] std::io::Error),
}

/// Output collected by one bounded read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadOutcome {
    /// Everything read before the prompt delimiter (or before giving up).
    pub text: String,
    /// The timeout elapsed before a prompt appeared.
    pub timed_out: bool,
    /// The game's output stream closed.
    pub ended: bool,
}

/// Abstraction over the game subprocess.
///
/// The turn controller owns exactly one channel. Tests substitute scripted
/// channels that replay canned output.
pub trait GameChannel {
    /// Send one command line. Fails once the process has exited.
    fn send_line(&mut self, line: &str) -> Result<(), ChannelError>;

    /// Read until the prompt delimiter, end of stream or `timeout`.
    ///
    /// Never fails: a timeout or closed stream returns whatever was buffered
    /// and says so in the outcome flags.
    fn read_until_prompt(&mut self, timeout: Duration) -> ReadOutcome;

    fn is_alive(&mut self) -> bool;

    /// Interrupt, wait up to `grace`, then kill. Safe to call repeatedly.
    fn terminate(&mut self, grace: Duration);
}

/// Game process attached to a pseudo-terminal.
pub struct PtyChannel {
    child: Box<dyn Child + Send + Sync>,
    writer: Option<Box<dyn Write + Send>>,
    output: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    ended: bool,
    terminated: bool,
    // The terminal closes when the master is dropped.
    _master: Box<dyn MasterPty + Send>,
}

impl PtyChannel {
    /// Launch `command` (program followed by its arguments).
    #[instrument(skip_all, fields(program = command.first().map(String::as_str)))]
    pub fn start(command: &[String]) -> Result<Self, ChannelError> {
        let (program, args) = command.split_first().ok_or(ChannelError::EmptyCommand)?;
        let spawn_error = |err: anyhow::Error| ChannelError::Spawn {
            program: program.clone(),
            reason: format!("{err:#}"),
        };

        let pair = native_pty_system()
            .openpty(PtySize {
                rows: 24,
                cols: 80,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(spawn_error)?;

        let mut cmd = CommandBuilder::new(program);
        cmd.args(args);
        if let Ok(cwd) = std::env::current_dir() {
            cmd.cwd(cwd);
        }
        let child = pair.slave.spawn_command(cmd).map_err(spawn_error)?;
        // Only the child may hold the slave side, or end of stream is never seen.
        drop(pair.slave);

        let reader = pair.master.try_clone_reader().map_err(spawn_error)?;
        let writer = pair.master.take_writer().map_err(spawn_error)?;
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("game-output".to_string())
            .spawn(move || forward_output(reader, tx))
            .map_err(|err| spawn_error(err.into()))?;

        info!(pid = ?child.process_id(), "game process started");
        Ok(Self {
            child,
            writer: Some(writer),
            output: rx,
            pending: Vec::new(),
            ended: false,
            terminated: false,
            _master: pair.master,
        })
    }

    fn take_pending(&mut self, timed_out: bool) -> ReadOutcome {
        let bytes = std::mem::take(&mut self.pending);
        ReadOutcome {
            text: String::from_utf8_lossy(&bytes).into_owned(),
            timed_out,
            ended: self.ended,
        }
    }

    fn child_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }
}

impl GameChannel for PtyChannel {
    fn send_line(&mut self, line: &str) -> Result<(), ChannelError> {
        if self.ended || self.terminated || !self.child_running() {
            return Err(ChannelError::Exited);
        }
        let writer = self.writer.as_mut().ok_or(ChannelError::Exited)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        debug!(line, "sent command");
        Ok(())
    }

    fn read_until_prompt(&mut self, timeout: Duration) -> ReadOutcome {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(pos) = self.pending.iter().position(|b| *b == PROMPT_DELIMITER) {
                // Anything after the delimiter belongs to the next read.
                let mut taken: Vec<u8> = self.pending.drain(..=pos).collect();
                taken.pop();
                return ReadOutcome {
                    text: String::from_utf8_lossy(&taken).into_owned(),
                    timed_out: false,
                    ended: false,
                };
            }
            if self.ended {
                return self.take_pending(false);
            }
            match self.output.recv_timeout(remaining_budget(deadline)) {
                Ok(chunk) => self.pending.extend_from_slice(&chunk),
                Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        timeout_ms = timeout.as_millis() as u64,
                        buffered = self.pending.len(),
                        "timed out waiting for game prompt"
                    );
                    return self.take_pending(true);
                }
                Err(RecvTimeoutError::Disconnected) => {
                    warn!(buffered = self.pending.len(), "game output ended unexpectedly");
                    self.ended = true;
                }
            }
        }
    }

    fn is_alive(&mut self) -> bool {
        !self.terminated && !self.ended && self.child_running()
    }

    #[instrument(skip_all, fields(grace_ms = grace.as_millis() as u64))]
    fn terminate(&mut self, grace: Duration) {
        if self.terminated {
            return;
        }
        self.terminated = true;

        let mut writer = self.writer.take();
        if !self.child_running() {
            debug!("game process already exited");
            return;
        }
        if let Some(writer) = writer.as_mut()
            && let Err(err) = writer.write_all(&[INTERRUPT]).and_then(|()| writer.flush())
        {
            debug!(err = %err, "interrupt not delivered");
        }
        drop(writer);

        let deadline = Instant::now() + grace;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    info!(status = ?status, "game process exited after interrupt");
                    return;
                }
                Ok(None) if !remaining_budget(deadline).is_zero() => {
                    thread::sleep(EXIT_POLL_INTERVAL);
                }
                Ok(None) => break,
                Err(err) => {
                    debug!(err = %err, "poll game process");
                    break;
                }
            }
        }

        warn!("game process still running after grace period, killing");
        if let Err(err) = self.child.kill() {
            debug!(err = %err, "kill game process");
        }
        if let Err(err) = self.child.wait() {
            debug!(err = %err, "reap game process");
        }
    }
}

impl Drop for PtyChannel {
    fn drop(&mut self) {
        self.terminate(DEFAULT_TEARDOWN_GRACE);
    }
}

fn forward_output(mut reader: Box<dyn Read + Send>, tx: Sender<Vec<u8>>) {
    let mut buf = [0u8; 4096];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(ref err) if err.kind() == ErrorKind::Interrupted => continue,
            // Linux reports a closed terminal as EIO rather than EOF.
            Err(err) => {
                debug!(err = %err, "game output closed");
                break;
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[test]
    fn reads_up_to_prompt_and_keeps_the_rest() {
        let mut channel = PtyChannel::start(&sh(
            "printf 'HELLO\\nREADY? '; read x; printf 'GOT %s\\nNEXT? ' \"$x\"; sleep 5",
        ))
        .expect("start");

        let first = channel.read_until_prompt(Duration::from_secs(5));
        assert!(first.text.contains("HELLO"));
        assert!(first.text.contains("READY"));
        assert!(!first.text.contains('?'));
        assert!(!first.timed_out);

        channel.send_line("abc").expect("send");
        let second = channel.read_until_prompt(Duration::from_secs(5));
        assert!(second.text.contains("GOT abc"), "{:?}", second.text);
        assert!(second.text.contains("NEXT"));

        channel.terminate(Duration::from_secs(2));
        assert!(!channel.is_alive());
    }

    #[test]
    fn timeout_returns_buffered_text() {
        let mut channel = PtyChannel::start(&sh("printf 'NO PROMPT HERE'; sleep 5")).expect("start");

        let outcome = channel.read_until_prompt(Duration::from_millis(500));
        assert!(outcome.timed_out);
        assert!(!outcome.ended);
        assert!(outcome.text.contains("NO PROMPT HERE"));

        channel.terminate(Duration::from_millis(500));
        channel.terminate(Duration::from_millis(500));
        assert!(!channel.is_alive());
    }

    #[test]
    fn end_of_stream_flags_process_death() {
        let mut channel = PtyChannel::start(&sh("printf 'BYE'")).expect("start");

        let outcome = channel.read_until_prompt(Duration::from_secs(5));
        assert!(outcome.ended);
        assert!(!outcome.timed_out);
        assert!(outcome.text.contains("BYE"));

        let err = channel.send_line("N").unwrap_err();
        assert!(matches!(err, ChannelError::Exited));
    }

    #[test]
    fn missing_executable_fails_to_spawn() {
        let result = PtyChannel::start(&["definitely-not-a-wumpus-binary".to_string()]);
        assert!(matches!(result, Err(ChannelError::Spawn { .. })));
    }

    #[test]
    fn empty_command_is_rejected() {
        let result = PtyChannel::start(&[]);
        assert!(matches!(result, Err(ChannelError::EmptyCommand)));
    }
}
