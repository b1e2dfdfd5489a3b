//! Cell-to-run layout.
//!
//! Partitions each screen row into maximal runs of identically styled cells,
//! which is what keeps the SVG output small: one `<rect>` per colored span
//! and one `<text>` per styled span instead of per-cell elements.
//!
//! Inverse video is resolved here (colors swap, the flag is consumed) and
//! the visible cursor is painted by swapping its cell's colors once more,
//! regardless of that cell's own inverse state.

use crate::screen::{Attrs, Color, Screen};

/// A maximal horizontal span of cells sharing one style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    /// Zero-based row.
    pub row: u16,
    /// Zero-based column of the first cell.
    pub col: u16,
    /// Number of cells covered.
    pub cells: u16,
    /// Concatenated cell text. Wide glyphs contribute one character for two
    /// cells; blanks contribute a space.
    pub text: String,
    /// Foreground after inverse/cursor resolution.
    pub fg: Color,
    /// Background after inverse/cursor resolution.
    pub bg: Color,
    /// Remaining attributes (inverse is already consumed).
    pub attrs: Attrs,
}

impl Run {
    /// True when the run needs a background rectangle: a colored background,
    /// or a styled span of wide-glyph continuation cells carrying no text of
    /// its own.
    #[must_use]
    pub fn emits_rect(&self) -> bool {
        self.bg != Color::Background
            || (self.text.is_empty()
                && (self.fg != Color::Foreground || !self.attrs.is_plain()))
    }

    /// True when the run needs a text element.
    ///
    /// Space-only runs are skipped unless an attribute (say, underline)
    /// makes the spaces visible.
    #[must_use]
    pub fn emits_text(&self) -> bool {
        let blank = self.text.chars().all(|c| c == ' ');
        !self.text.is_empty() && (!blank || !self.attrs.is_plain())
    }
}

/// Effective display style of one cell: colors with inverse and the cursor
/// overlay applied, and the inverse bit dropped.
fn effective_style(screen: &Screen, row: u16, col: u16) -> (Color, Color, Attrs) {
    let cell = screen.cell(row, col);
    let mut fg = cell.fg;
    let mut bg = cell.bg;
    if cell.attrs.inverse {
        std::mem::swap(&mut fg, &mut bg);
    }
    let cursor = screen.cursor;
    if cursor.visible && cursor.row == row && cursor.col == col {
        std::mem::swap(&mut fg, &mut bg);
    }
    let mut attrs = cell.attrs;
    attrs.inverse = false;
    (fg, bg, attrs)
}

/// Partitions a screen into runs, dropping spans that would render nothing.
#[must_use]
pub fn screen_runs(screen: &Screen) -> Vec<Run> {
    let mut runs = Vec::new();
    for row in 0..screen.rows() {
        let mut current: Option<Run> = None;
        for col in 0..screen.cols() {
            let (fg, bg, attrs) = effective_style(screen, row, col);
            let ch = screen.cell(row, col).ch.as_str();
            match current.as_mut() {
                Some(run) if run.fg == fg && run.bg == bg && run.attrs == attrs => {
                    run.text.push_str(ch);
                    run.cells += 1;
                }
                _ => {
                    flush(&mut runs, current.take());
                    current = Some(Run {
                        row,
                        col,
                        cells: 1,
                        text: ch.to_string(),
                        fg,
                        bg,
                        attrs,
                    });
                }
            }
        }
        flush(&mut runs, current.take());
    }
    runs
}

fn flush(runs: &mut Vec<Run>, run: Option<Run>) {
    if let Some(run) = run {
        if run.emits_rect() || run.emits_text() {
            runs.push(run);
        }
    }
}
