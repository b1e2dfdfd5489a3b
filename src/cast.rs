//! Asciicast v1/v2 codec.
//!
//! Reading is permissive: unknown header fields are ignored and both format
//! versions are accepted. Writing is strict: only asciicast v2 is produced,
//! with documented fields in a stable key order, one event per line, flushed
//! line by line so a partial recording survives an interruption.
//!
//! Both versions decode to the same uniform stream of events with
//! millisecond timestamps, sorted non-decreasing.

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Color theme carried by some v2 headers.
///
/// Parsed and preserved so round-trips keep it, but color resolution for
/// rendering is the template's job, so the renderer never reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    /// Default foreground, `#rrggbb`.
    pub fg: String,
    /// Default background, `#rrggbb`.
    pub bg: String,
    /// Colon-separated palette entries.
    pub palette: String,
}

/// Normalised cast header, common to both versions.
#[derive(Debug, Clone)]
pub struct Header {
    /// Source format version (1 or 2).
    pub version: u8,
    /// Screen width in columns, at least 1.
    pub cols: u16,
    /// Screen height in rows, at least 1.
    pub rows: u16,
    /// Unix timestamp of the session start, when recorded.
    pub timestamp: Option<u64>,
    /// Upper bound on inter-event gaps, in seconds.
    pub idle_time_limit: Option<f64>,
    /// Optional color theme.
    pub theme: Option<Theme>,
}

/// Event kinds of the uniform stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Bytes written by the recorded program ("o").
    Output,
    /// Bytes typed by the user ("i").
    Input,
    /// Advisory screen resize ("r").
    Resize,
}

impl EventKind {
    fn code(self) -> &'static str {
        match self {
            EventKind::Output => "o",
            EventKind::Input => "i",
            EventKind::Resize => "r",
        }
    }
}

/// One timestamped event of the uniform stream.
#[derive(Debug, Clone)]
pub struct CastEvent {
    /// Milliseconds from session start.
    pub time_ms: u64,
    /// What the payload means.
    pub kind: EventKind,
    /// Payload: terminal bytes for output/input, `COLSxROWS` for resize.
    pub data: String,
}

#[derive(Deserialize)]
struct V2Header {
    version: u8,
    width: i64,
    height: i64,
    #[serde(default)]
    timestamp: Option<u64>,
    #[serde(default)]
    idle_time_limit: Option<f64>,
    #[serde(default)]
    theme: Option<Theme>,
}

#[derive(Deserialize)]
struct V1Cast {
    #[allow(dead_code)]
    version: u8,
    width: i64,
    height: i64,
    stdout: Vec<(f64, String)>,
}

/// Reads a cast in either format and yields the normalised header plus the
/// event stream, sorted non-decreasing by time.
///
/// # Errors
///
/// Returns [`Error::InvalidCast`] when the version is unknown, the header is
/// malformed, the geometry is non-positive, or any event line is invalid.
pub fn read_cast(text: &str) -> Result<(Header, Vec<CastEvent>)> {
    let mut lines = text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());
    let (_, header_line) = lines
        .next()
        .ok_or_else(|| Error::InvalidCast("empty cast file".to_string()))?;

    let value: serde_json::Value = serde_json::from_str(header_line)
        .map_err(|e| Error::InvalidCast(format!("malformed header: {e}")))?;
    match value.get("version").and_then(serde_json::Value::as_i64) {
        Some(2) => read_v2(header_line, lines),
        Some(1) => read_v1(text),
        Some(v) => Err(Error::InvalidCast(format!("unsupported version {v}"))),
        None => Err(Error::InvalidCast("header has no version field".to_string())),
    }
}

fn read_v2<'a>(
    header_line: &str,
    lines: impl Iterator<Item = (usize, &'a str)>,
) -> Result<(Header, Vec<CastEvent>)> {
    let header: V2Header = serde_json::from_str(header_line)
        .map_err(|e| Error::InvalidCast(format!("malformed v2 header: {e}")))?;
    let (cols, rows) = check_geometry(header.width, header.height)?;
    if header.idle_time_limit.is_some_and(|l| l < 0.0) {
        return Err(Error::InvalidCast("negative idle_time_limit".to_string()));
    }

    let mut events = Vec::new();
    let mut previous_ms = 0u64;
    for (num, line) in lines {
        let line_num = num + 1;
        let (time, code, data): (f64, String, String) = serde_json::from_str(line)
            .map_err(|e| Error::InvalidCast(format!("line {line_num}: {e}")))?;
        let time_ms = seconds_to_ms(time)
            .ok_or_else(|| Error::InvalidCast(format!("line {line_num}: negative time")))?;
        if time_ms < previous_ms {
            return Err(Error::InvalidCast(format!(
                "line {line_num}: event goes backwards in time"
            )));
        }
        previous_ms = time_ms;
        let kind = match code.as_str() {
            "o" => EventKind::Output,
            "i" => EventKind::Input,
            "r" => EventKind::Resize,
            other => {
                return Err(Error::InvalidCast(format!(
                    "line {line_num}: unknown event kind {other:?}"
                )))
            }
        };
        events.push(CastEvent { time_ms, kind, data });
    }

    Ok((
        Header {
            version: 2,
            cols,
            rows,
            timestamp: header.timestamp,
            idle_time_limit: header.idle_time_limit,
            theme: header.theme,
        },
        events,
    ))
}

fn read_v1(text: &str) -> Result<(Header, Vec<CastEvent>)> {
    let cast: V1Cast = serde_json::from_str(text)
        .map_err(|e| Error::InvalidCast(format!("malformed v1 cast: {e}")))?;
    let (cols, rows) = check_geometry(cast.width, cast.height)?;

    // v1 times are deltas in seconds; accumulate into absolute milliseconds.
    let mut events = Vec::with_capacity(cast.stdout.len());
    let mut clock = 0.0f64;
    for (index, (delta, data)) in cast.stdout.into_iter().enumerate() {
        if delta < 0.0 || !delta.is_finite() {
            return Err(Error::InvalidCast(format!(
                "stdout entry {index}: invalid delay {delta}"
            )));
        }
        clock += delta;
        let time_ms = seconds_to_ms(clock)
            .ok_or_else(|| Error::InvalidCast(format!("stdout entry {index}: time overflow")))?;
        events.push(CastEvent {
            time_ms,
            kind: EventKind::Output,
            data,
        });
    }

    Ok((
        Header {
            version: 1,
            cols,
            rows,
            timestamp: None,
            idle_time_limit: None,
            theme: None,
        },
        events,
    ))
}

fn check_geometry(width: i64, height: i64) -> Result<(u16, u16)> {
    if width < 1 || height < 1 || width > i64::from(u16::MAX) || height > i64::from(u16::MAX) {
        return Err(Error::InvalidCast(format!(
            "invalid geometry {width}x{height}"
        )));
    }
    Ok((width as u16, height as u16))
}

fn seconds_to_ms(seconds: f64) -> Option<u64> {
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Some((seconds * 1000.0).round() as u64)
}

#[derive(Serialize)]
struct V2HeaderOut<'a> {
    version: u8,
    width: u16,
    height: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    idle_time_limit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    theme: Option<&'a Theme>,
}

/// Streaming asciicast v2 writer.
///
/// The header goes out on construction; each event becomes one line and is
/// flushed immediately.
pub struct CastWriter<W: Write> {
    out: W,
}

impl<W: Write> CastWriter<W> {
    /// Writes the header line and returns the writer.
    pub fn new(mut out: W, header: &Header) -> Result<Self> {
        let line = serde_json::to_string(&V2HeaderOut {
            version: 2,
            width: header.cols,
            height: header.rows,
            timestamp: header.timestamp,
            idle_time_limit: header.idle_time_limit,
            theme: header.theme.as_ref(),
        })
        .map_err(|e| Error::InvalidCast(format!("header serialisation: {e}")))?;
        writeln!(out, "{line}")?;
        out.flush()?;
        Ok(CastWriter { out })
    }

    /// Appends one event line and flushes it.
    pub fn write_event(&mut self, time_ms: u64, kind: EventKind, data: &str) -> Result<()> {
        let line = serde_json::to_string(&(time_ms as f64 / 1000.0, kind.code(), data))
            .map_err(|e| Error::InvalidCast(format!("event serialisation: {e}")))?;
        writeln!(self.out, "{line}")?;
        self.out.flush()?;
        Ok(())
    }

    /// Flushes and returns the underlying writer.
    pub fn into_inner(mut self) -> Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Re-encodes a decoded cast as asciicast v2.
pub fn write_cast<W: Write>(out: W, header: &Header, events: &[CastEvent]) -> Result<()> {
    let mut writer = CastWriter::new(out, header)?;
    for event in events {
        writer.write_event(event.time_ms, event.kind, &event.data)?;
    }
    writer.into_inner()?;
    Ok(())
}
