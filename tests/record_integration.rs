// PTY-based integration tests for session recording.
//
// These spawn a real child process on a pseudo-terminal. Environments
// without PTY support (some CI sandboxes) make the recorder fail with a
// PTY error; those tests skip themselves instead of failing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use termtosvg::cast::{self, EventKind};
use termtosvg::record::{record_session, RecordOptions};
use termtosvg::render::{render_animation_file, RenderOptions};
use termtosvg::{templates, Error, Template};

fn pty_available() -> bool {
    portable_pty::native_pty_system()
        .openpty(portable_pty::PtySize {
            rows: 24,
            cols: 80,
            pixel_width: 0,
            pixel_height: 0,
        })
        .is_ok()
}

#[test]
fn record_captures_child_output() {
    if !pty_available() {
        eprintln!("Skipping: no PTY support in this environment");
        return;
    }

    let dir = tempfile::TempDir::new().unwrap();
    let cast_path = dir.path().join("session.cast");
    let opts = RecordOptions {
        command: Some("echo recorded-output".to_string()),
        geometry: Some((80, 24)),
    };
    let interrupt = AtomicBool::new(false);
    let outcome = record_session(&cast_path, &opts, &interrupt).unwrap();
    assert!(!outcome.interrupted);
    assert_eq!((outcome.cols, outcome.rows), (80, 24));
    assert!(outcome.events > 0);

    let text = std::fs::read_to_string(&cast_path).unwrap();
    let (header, events) = cast::read_cast(&text).unwrap();
    assert_eq!(header.version, 2);
    assert_eq!((header.cols, header.rows), (80, 24));
    assert!(header.timestamp.is_some());
    let output: String = events
        .iter()
        .filter(|e| e.kind == EventKind::Output)
        .map(|e| e.data.as_str())
        .collect();
    assert!(
        output.contains("recorded-output"),
        "captured output: {output:?}"
    );

    // Timestamps are non-decreasing by construction.
    for pair in events.windows(2) {
        assert!(pair[0].time_ms <= pair[1].time_ms);
    }
}

#[test]
fn recorded_cast_renders_to_svg() {
    if !pty_available() {
        eprintln!("Skipping: no PTY support in this environment");
        return;
    }

    let dir = tempfile::TempDir::new().unwrap();
    let cast_path = dir.path().join("session.cast");
    let opts = RecordOptions {
        command: Some("echo hello-svg".to_string()),
        geometry: Some((80, 24)),
    };
    let interrupt = AtomicBool::new(false);
    record_session(&cast_path, &opts, &interrupt).unwrap();

    let svg_path = dir.path().join("session.svg");
    let template = Template::parse(templates::builtin("gjm8").unwrap()).unwrap();
    let summary =
        render_animation_file(&cast_path, &svg_path, &template, &RenderOptions::default())
            .unwrap();
    assert!(summary.frames >= 1);
    let svg = std::fs::read_to_string(&svg_path).unwrap();
    assert!(svg.contains("hello-svg"));
}

#[test]
fn interrupt_flushes_a_valid_partial_cast() {
    if !pty_available() {
        eprintln!("Skipping: no PTY support in this environment");
        return;
    }

    let dir = tempfile::TempDir::new().unwrap();
    let cast_path = dir.path().join("partial.cast");
    let opts = RecordOptions {
        command: Some("sleep 30".to_string()),
        geometry: Some((80, 24)),
    };
    // Raised before the loop starts: the recording stops immediately.
    let interrupt = AtomicBool::new(true);
    let start = std::time::Instant::now();
    let outcome = record_session(&cast_path, &opts, &interrupt).unwrap();
    assert!(outcome.interrupted);
    assert!(
        start.elapsed() < Duration::from_secs(20),
        "interrupt did not stop the recording promptly"
    );
    assert!(interrupt.load(Ordering::Relaxed));

    // Header-only cast is well-formed but empty.
    let text = std::fs::read_to_string(&cast_path).unwrap();
    let (header, _) = cast::read_cast(&text).unwrap();
    assert_eq!(header.version, 2);

    let template = Template::parse(templates::builtin("gjm8").unwrap()).unwrap();
    let err = render_animation_file(
        &cast_path,
        &dir.path().join("out.svg"),
        &template,
        &RenderOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::EmptyCast));
}
