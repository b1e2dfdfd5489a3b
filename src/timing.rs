//! Frame timing normalisation.
//!
//! Turns the raw snapshot stream into display frames: undersized gaps are
//! folded into their successor, oversized gaps are clamped, and adjacent
//! identical screens collapse into a single frame. The sum of the emitted
//! durations is the animation's loop duration.

use std::rc::Rc;

use crate::error::{Error, Result};
use crate::screen::{Screen, Snapshot};

/// A screen plus how long it stays on display.
#[derive(Debug, Clone)]
pub struct Frame {
    /// The screen shown during this frame.
    pub screen: Rc<Screen>,
    /// Display duration in milliseconds.
    pub duration_ms: u64,
}

/// Timing parameters, all in milliseconds.
#[derive(Debug, Clone, Copy)]
pub struct TimingOptions {
    /// Smallest allowed frame duration; shorter frames merge into their
    /// successor. At least 1.
    pub min_frame_duration: u64,
    /// Largest allowed frame duration; longer gaps are clamped. Must be at
    /// least `min_frame_duration` (`u64::MAX` means unlimited).
    pub max_frame_duration: u64,
    /// Synthetic duration of the last frame, giving the viewer a pause
    /// before the animation loops.
    pub loop_delay: u64,
}

impl Default for TimingOptions {
    fn default() -> Self {
        TimingOptions {
            min_frame_duration: 1,
            max_frame_duration: u64::MAX,
            loop_delay: 1000,
        }
    }
}

/// Normalises a snapshot stream into frames plus the total loop duration.
///
/// # Errors
///
/// Returns [`Error::EmptyCast`] when the stream has no snapshots.
pub fn normalise(snapshots: &[Snapshot], opts: &TimingOptions) -> Result<(Vec<Frame>, u64)> {
    if snapshots.is_empty() {
        return Err(Error::EmptyCast);
    }
    debug_assert!(opts.min_frame_duration >= 1);
    debug_assert!(opts.min_frame_duration <= opts.max_frame_duration);

    let last = snapshots.len() - 1;
    let mut merged: Vec<Frame> = Vec::with_capacity(snapshots.len());
    let mut carry = 0u64;
    for (i, snapshot) in snapshots.iter().enumerate() {
        let raw = if i == last {
            opts.loop_delay.max(1)
        } else {
            // Timestamps are non-decreasing; equal stamps yield zero gaps.
            snapshots[i + 1].time_ms.saturating_sub(snapshot.time_ms)
        };
        let mut duration = raw + carry;
        if duration < opts.min_frame_duration {
            if i < last {
                // Too short to display: fold into the next frame.
                carry = duration;
                continue;
            }
            duration = opts.min_frame_duration;
        }
        carry = 0;
        merged.push(Frame {
            screen: Rc::clone(&snapshot.screen),
            duration_ms: duration.min(opts.max_frame_duration),
        });
    }

    // Collapse runs of identical screens into one frame.
    let mut frames: Vec<Frame> = Vec::with_capacity(merged.len());
    for frame in merged {
        match frames.last_mut() {
            Some(previous) if previous.screen == frame.screen => {
                previous.duration_ms += frame.duration_ms;
            }
            _ => frames.push(frame),
        }
    }

    let total = frames.iter().map(|f| f.duration_ms).sum();
    log::debug!("normalised {} snapshots into {} frames, loop {total} ms", snapshots.len(), frames.len());
    Ok((frames, total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screen::{Cell, Color};

    fn snapshot(time_ms: u64, marker: &str) -> Snapshot {
        let mut screen = Screen::new(4, 1);
        if !marker.is_empty() {
            screen.set_cell(
                0,
                0,
                Cell {
                    ch: marker.to_string(),
                    fg: Color::Foreground,
                    bg: Color::Background,
                    attrs: Default::default(),
                },
            );
        }
        Snapshot {
            time_ms,
            screen: Rc::new(screen),
        }
    }

    fn opts(min: u64, max: u64, loop_delay: u64) -> TimingOptions {
        TimingOptions {
            min_frame_duration: min,
            max_frame_duration: max,
            loop_delay,
        }
    }

    #[test]
    fn test_empty_stream_is_an_error() {
        let err = normalise(&[], &TimingOptions::default()).unwrap_err();
        assert!(matches!(err, Error::EmptyCast));
    }

    #[test]
    fn test_single_snapshot() {
        let (frames, total) = normalise(&[snapshot(0, "a")], &opts(1, u64::MAX, 1000)).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].duration_ms, 1000);
        assert_eq!(total, 1000);
    }

    #[test]
    fn test_single_snapshot_with_loop_delay_below_min() {
        let (frames, total) = normalise(&[snapshot(0, "a")], &opts(50, u64::MAX, 0)).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].duration_ms, 50);
        assert_eq!(total, 50);
    }

    #[test]
    fn test_durations_are_gaps_plus_loop_delay() {
        let stream = [snapshot(0, "a"), snapshot(40, "b"), snapshot(100, "c")];
        let (frames, total) = normalise(&stream, &opts(1, u64::MAX, 1000)).unwrap();
        let durations: Vec<u64> = frames.iter().map(|f| f.duration_ms).collect();
        assert_eq!(durations, vec![40, 60, 1000]);
        assert_eq!(total, 100 + 1000);
    }

    #[test]
    fn test_undersized_frames_merge_into_successor() {
        let stream = [
            snapshot(0, "a"),
            snapshot(2, "b"),
            snapshot(4, "c"),
            snapshot(100, "d"),
        ];
        let (frames, total) = normalise(&stream, &opts(10, u64::MAX, 1000)).unwrap();
        // "a" (2 ms) and "b" (2 ms) fold into "c", which had 96 ms of its own.
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].screen.cell(0, 0).ch, "c");
        assert_eq!(frames[0].duration_ms, 100);
        assert_eq!(frames[1].screen.cell(0, 0).ch, "d");
        assert_eq!(total, 100 + 1000);
    }

    #[test]
    fn test_zero_duration_gaps_are_absorbed() {
        let stream = [snapshot(10, "a"), snapshot(10, "b"), snapshot(30, "c")];
        let (frames, _) = normalise(&stream, &opts(1, u64::MAX, 500)).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].screen.cell(0, 0).ch, "b");
        assert_eq!(frames[0].duration_ms, 20);
    }

    #[test]
    fn test_clamp_to_max() {
        let stream = [snapshot(0, "a"), snapshot(10000, "b")];
        let (frames, total) = normalise(&stream, &opts(1, 2000, 1000)).unwrap();
        assert_eq!(frames[0].duration_ms, 2000);
        assert_eq!(frames[1].duration_ms, 1000);
        assert_eq!(total, 3000);
    }

    #[test]
    fn test_adjacent_identical_screens_collapse() {
        let stream = [snapshot(0, "x"), snapshot(10, "x"), snapshot(20, "x")];
        let (frames, total) = normalise(&stream, &opts(1, u64::MAX, 1000)).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].duration_ms, 20 + 1000);
        assert_eq!(total, 1020);
    }

    #[test]
    fn test_no_adjacent_frames_are_equal_after_normalisation() {
        let stream = [
            snapshot(0, "x"),
            snapshot(10, "x"),
            snapshot(20, "y"),
            snapshot(30, "y"),
            snapshot(40, "x"),
        ];
        let (frames, _) = normalise(&stream, &opts(1, u64::MAX, 1000)).unwrap();
        assert_eq!(frames.len(), 3);
        for pair in frames.windows(2) {
            assert_ne!(pair[0].screen, pair[1].screen);
        }
    }

    #[test]
    fn test_conservation_before_clamp() {
        let stream = [
            snapshot(5, "a"),
            snapshot(7, "b"),
            snapshot(300, "c"),
            snapshot(450, "d"),
        ];
        let loop_delay = 777;
        let (frames, total) = normalise(&stream, &opts(10, u64::MAX, loop_delay)).unwrap();
        let sum: u64 = frames.iter().map(|f| f.duration_ms).sum();
        assert_eq!(sum, total);
        assert_eq!(total, 450 - 5 + loop_delay);
    }

    #[test]
    fn test_last_frame_rounds_up_to_min() {
        let stream = [snapshot(0, "a"), snapshot(100, "b")];
        let (frames, _) = normalise(&stream, &opts(40, u64::MAX, 1)).unwrap();
        assert_eq!(frames[1].duration_ms, 40);
    }
}
