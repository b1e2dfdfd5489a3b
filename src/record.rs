//! Session recording through a pseudo-terminal.
//!
//! Spawns the requested program on a PTY, forwards the local terminal's
//! keyboard to it, echoes its output, and writes every byte as a timestamped
//! asciicast v2 event.
//!
//! # Architecture
//!
//! ```text
//! reader thread:  PTY master --read--> stamp clock --> bounded queue
//! stdin thread:   stdin --read--> PTY writer, then --> bounded queue
//! main loop:      queue --drain--> echo to stdout + cast writer (flushes
//!                 line by line, so an interrupted recording stays valid)
//! ```
//!
//! Bytes are stamped the moment they come off the PTY master, and events are
//! appended in the order their stamps were produced.

use std::io::{Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use portable_pty::{native_pty_system, CommandBuilder, PtySize};

use crate::cast::{CastWriter, EventKind, Header};
use crate::error::{Error, Result};

const READ_BUF_SIZE: usize = 4096;
const QUEUE_DEPTH: usize = 1024;
const DRAIN_INTERVAL: Duration = Duration::from_millis(50);

/// Options of one recording.
#[derive(Debug, Clone, Default)]
pub struct RecordOptions {
    /// Program (with arguments) to run; defaults to `$SHELL`, then `/bin/sh`.
    pub command: Option<String>,
    /// PTY geometry; defaults to the attached terminal's size, then 80x24.
    pub geometry: Option<(u16, u16)>,
}

/// What a recording produced.
#[derive(Debug)]
pub struct RecordOutcome {
    /// True when the recording was cut short by SIGINT.
    pub interrupted: bool,
    /// Number of events written to the cast.
    pub events: usize,
    /// PTY geometry used.
    pub cols: u16,
    /// PTY geometry used.
    pub rows: u16,
}

enum PtyMessage {
    Data {
        time_ms: u64,
        kind: EventKind,
        bytes: Vec<u8>,
    },
    Eof,
}

/// Restores cooked mode when the recording ends, on every exit path.
struct RawModeGuard {
    active: bool,
}

impl RawModeGuard {
    fn enable() -> Self {
        match crossterm::terminal::enable_raw_mode() {
            Ok(()) => RawModeGuard { active: true },
            Err(e) => {
                // Not fatal: without a controlling TTY (tests, pipes) the
                // child still runs on its own PTY.
                log::warn!("could not enable raw mode: {e}");
                RawModeGuard { active: false }
            }
        }
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.active {
            let _ = crossterm::terminal::disable_raw_mode();
        }
    }
}

/// Records one session to `output` as asciicast v2.
///
/// Returns when the child exits (EOF on the PTY master) or when `interrupt`
/// is raised; in both cases the partial cast has been flushed to disk.
pub fn record_session(
    output: &Path,
    opts: &RecordOptions,
    interrupt: &AtomicBool,
) -> Result<RecordOutcome> {
    let (cols, rows) = opts
        .geometry
        .or_else(|| crossterm::terminal::size().ok())
        .unwrap_or((80, 24));
    let command = opts
        .command
        .clone()
        .or_else(|| std::env::var("SHELL").ok())
        .unwrap_or_else(|| "/bin/sh".to_string());
    log::debug!("recording {command:?} at {cols}x{rows} into {}", output.display());

    let pair = native_pty_system()
        .openpty(PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        })
        .map_err(|e| Error::Pty(format!("failed to open PTY: {e}")))?;

    let mut child = pair
        .slave
        .spawn_command(build_command(&command))
        .map_err(|e| Error::Pty(format!("failed to spawn {command:?}: {e}")))?;
    // The master keeps its own copy; dropping ours lets EOF propagate when
    // the child exits.
    drop(pair.slave);

    let pty_writer = pair
        .master
        .take_writer()
        .map_err(|e| Error::Pty(format!("failed to take PTY writer: {e}")))?;
    let pty_reader = pair
        .master
        .try_clone_reader()
        .map_err(|e| Error::Pty(format!("failed to clone PTY reader: {e}")))?;

    let file = std::fs::File::create(output).map_err(|e| Error::File {
        path: output.to_path_buf(),
        source: e,
    })?;
    let header = Header {
        version: 2,
        cols,
        rows,
        timestamp: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .ok()
            .map(|d| d.as_secs()),
        idle_time_limit: None,
        theme: None,
    };
    let mut writer = CastWriter::new(file, &header)?;

    let raw_mode = RawModeGuard::enable();
    let start = Instant::now();
    let (tx, rx) = mpsc::sync_channel::<PtyMessage>(QUEUE_DEPTH);

    let reader_thread = spawn_output_reader(pty_reader, start, tx.clone());
    spawn_input_forwarder(pty_writer, start, tx);

    let mut stdout = std::io::stdout();
    let mut pending_output = Utf8Accumulator::default();
    let mut pending_input = Utf8Accumulator::default();
    let mut events = 0usize;
    let mut interrupted = false;

    loop {
        if interrupt.load(Ordering::Relaxed) {
            interrupted = true;
            break;
        }
        match rx.recv_timeout(DRAIN_INTERVAL) {
            Ok(PtyMessage::Data {
                time_ms,
                kind,
                bytes,
            }) => {
                if kind == EventKind::Output {
                    let _ = stdout.write_all(&bytes);
                    let _ = stdout.flush();
                }
                let pending = if kind == EventKind::Output {
                    &mut pending_output
                } else {
                    &mut pending_input
                };
                let text = pending.push(&bytes);
                if !text.is_empty() {
                    writer.write_event(time_ms, kind, &text)?;
                    events += 1;
                }
            }
            Ok(PtyMessage::Eof) => break,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    drop(raw_mode);

    if interrupted {
        log::info!("interrupted, flushing partial cast");
        if let Err(e) = child.kill() {
            log::warn!("failed to kill recorded child: {e}");
        }
        // Drain whatever the reader managed to queue before the signal.
        while let Ok(PtyMessage::Data {
            time_ms,
            kind,
            bytes,
        }) = rx.try_recv()
        {
            let pending = if kind == EventKind::Output {
                &mut pending_output
            } else {
                &mut pending_input
            };
            let text = pending.push(&bytes);
            if !text.is_empty() {
                writer.write_event(time_ms, kind, &text)?;
                events += 1;
            }
        }
    }
    let _ = child.wait();
    drop(pair.master);
    let _ = reader_thread.join();
    writer.into_inner()?;

    log::debug!("recorded {events} events");
    Ok(RecordOutcome {
        interrupted,
        events,
        cols,
        rows,
    })
}

/// Splits a command string into a `CommandBuilder`.
fn build_command(command: &str) -> CommandBuilder {
    let mut parts = command.split_whitespace();
    let mut cmd = CommandBuilder::new(parts.next().unwrap_or("/bin/sh"));
    for arg in parts {
        cmd.arg(arg);
    }
    if let Ok(cwd) = std::env::current_dir() {
        cmd.cwd(cwd);
    }
    cmd
}

fn spawn_output_reader(
    mut reader: Box<dyn Read + Send>,
    start: Instant,
    tx: SyncSender<PtyMessage>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        log::debug!("PTY reader thread started");
        let mut buf = [0u8; READ_BUF_SIZE];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    let time_ms = start.elapsed().as_millis() as u64;
                    if tx
                        .send(PtyMessage::Data {
                            time_ms,
                            kind: EventKind::Output,
                            bytes: buf[..n].to_vec(),
                        })
                        .is_err()
                    {
                        break;
                    }
                }
                Err(e) => {
                    log::debug!("PTY read ended: {e}");
                    break;
                }
            }
        }
        let _ = tx.send(PtyMessage::Eof);
        log::debug!("PTY reader thread exiting");
    })
}

fn spawn_input_forwarder(
    mut pty_writer: Box<dyn Write + Send>,
    start: Instant,
    tx: SyncSender<PtyMessage>,
) {
    // Detached on purpose: a blocked stdin read cannot be interrupted
    // portably, and the thread dies with the process.
    thread::spawn(move || {
        let mut stdin = std::io::stdin();
        let mut buf = [0u8; READ_BUF_SIZE];
        loop {
            match stdin.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if pty_writer
                        .write_all(&buf[..n])
                        .and_then(|()| pty_writer.flush())
                        .is_err()
                    {
                        break;
                    }
                    let time_ms = start.elapsed().as_millis() as u64;
                    if tx
                        .send(PtyMessage::Data {
                            time_ms,
                            kind: EventKind::Input,
                            bytes: buf[..n].to_vec(),
                        })
                        .is_err()
                    {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });
}

/// Reassembles UTF-8 text from byte chunks that may split codepoints.
///
/// Complete text comes back immediately; a trailing partial sequence waits
/// for the next chunk; genuinely invalid bytes become U+FFFD.
#[derive(Default)]
struct Utf8Accumulator {
    pending: Vec<u8>,
}

impl Utf8Accumulator {
    fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(std::str::from_utf8(&self.pending[..valid]).unwrap_or(""));
                    match e.error_len() {
                        // Partial sequence at the end: keep it for later.
                        None => {
                            self.pending.drain(..valid);
                            return out;
                        }
                        Some(len) => {
                            out.push('\u{FFFD}');
                            self.pending.drain(..valid + len);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_command_splits_arguments() {
        let cmd = build_command("echo hello world");
        // CommandBuilder hides its internals; creation not panicking is the
        // contract here.
        let _ = cmd;
    }

    #[test]
    fn test_utf8_accumulator_passes_complete_text() {
        let mut acc = Utf8Accumulator::default();
        assert_eq!(acc.push(b"hello"), "hello");
        assert_eq!(acc.push("héllo".as_bytes()), "héllo");
    }

    #[test]
    fn test_utf8_accumulator_joins_split_codepoint() {
        let mut acc = Utf8Accumulator::default();
        let bytes = "\u{4e2d}".as_bytes();
        assert_eq!(acc.push(&bytes[..1]), "");
        assert_eq!(acc.push(&bytes[1..]), "\u{4e2d}");
    }

    #[test]
    fn test_utf8_accumulator_replaces_invalid_bytes() {
        let mut acc = Utf8Accumulator::default();
        assert_eq!(acc.push(b"a\xffb"), "a\u{FFFD}b");
        assert!(acc.pending.is_empty());
    }

    #[test]
    fn test_utf8_accumulator_mixed_chunks() {
        let mut acc = Utf8Accumulator::default();
        let text = "ab\u{4e2d}cd";
        let bytes = text.as_bytes();
        let mut collected = String::new();
        for chunk in bytes.chunks(3) {
            collected.push_str(&acc.push(chunk));
        }
        assert_eq!(collected, text);
    }
}
