//! Terminal-emulator adapter.
//!
//! Owns a `vt100::Parser` exclusively and turns raw output bytes into
//! immutable [`Snapshot`]s stamped with the session clock. Nothing outside
//! this module ever touches the parser, which is what keeps the emitted
//! screens genuinely immutable.

use std::rc::Rc;

use crate::error::{Error, Result};
use crate::screen::{indexed_to_rgb, Attrs, Cell, Color, Cursor, Screen, Snapshot};

/// Stream-driven VT emulator producing screen snapshots.
///
/// Re-entrant within one session: `feed` may be called any number of times,
/// each call advancing the monotonic clock and yielding a deep copy of the
/// screen. Not reusable across sessions; build a new one instead.
pub struct Emulator {
    parser: vt100::Parser,
    cols: u16,
    rows: u16,
    clock_ms: u64,
}

impl Emulator {
    /// Creates an emulator for a `cols x rows` screen, blank, default
    /// colors, cursor visible at the origin.
    #[must_use]
    pub fn new(cols: u16, rows: u16) -> Self {
        Emulator {
            // No scrollback: only the visible screen is ever rendered.
            parser: vt100::Parser::new(rows, cols, 0),
            cols,
            rows,
            clock_ms: 0,
        }
    }

    /// Screen width in columns.
    #[must_use]
    pub fn cols(&self) -> u16 {
        self.cols
    }

    /// Screen height in rows.
    #[must_use]
    pub fn rows(&self) -> u16 {
        self.rows
    }

    /// Feeds one output event and returns the resulting snapshot.
    ///
    /// The clock never moves backwards; equal timestamps yield
    /// zero-duration gaps that the timing normaliser later absorbs.
    pub fn feed(&mut self, time_ms: u64, data: &[u8]) -> Result<Snapshot> {
        if time_ms > self.clock_ms {
            self.clock_ms = time_ms;
        }
        self.parser.process(data);
        log::trace!("fed {} bytes at {} ms", data.len(), self.clock_ms);
        Ok(Snapshot {
            time_ms: self.clock_ms,
            screen: Rc::new(self.materialise()?),
        })
    }

    /// Deep-copies the emulator screen into the crate's screen model.
    fn materialise(&self) -> Result<Screen> {
        let vt = self.parser.screen();
        let (rows, cols) = vt.size();
        if (rows, cols) != (self.rows, self.cols) {
            return Err(Error::EmulatorOverflow(format!(
                "screen is {rows}x{cols}, session is {}x{}",
                self.rows, self.cols
            )));
        }

        let mut screen = Screen::new(cols, rows);
        for row in 0..rows {
            let mut in_wide = false;
            for col in 0..cols {
                let cell = vt.cell(row, col).ok_or_else(|| {
                    Error::EmulatorOverflow(format!("no cell at {row},{col}"))
                })?;
                let contents = cell.contents();
                if contents.is_empty() && in_wide {
                    // Right half of the wide glyph at col - 1: empty text,
                    // style copied from the left half rather than queried,
                    // so the inheritance the layout relies on holds here.
                    in_wide = false;
                    let lead = screen.cell(row, col - 1).clone();
                    screen.set_cell(
                        row,
                        col,
                        Cell {
                            ch: String::new(),
                            ..lead
                        },
                    );
                    continue;
                }
                // Any other empty cell is a plain blank.
                let ch = if contents.is_empty() {
                    " ".to_string()
                } else {
                    contents
                };
                in_wide = cell.is_wide();
                screen.set_cell(
                    row,
                    col,
                    Cell {
                        ch,
                        fg: convert_color(cell.fgcolor(), true),
                        bg: convert_color(cell.bgcolor(), false),
                        attrs: Attrs {
                            bold: cell.bold(),
                            italic: cell.italic(),
                            underline: cell.underline(),
                            // vt100 tracks bold/italic/underline/inverse;
                            // these two stay clear with this backend.
                            strikethrough: false,
                            inverse: cell.inverse(),
                            blink: false,
                        },
                    },
                );
            }
        }

        let (cursor_row, cursor_col) = vt.cursor_position();
        screen.cursor = Cursor {
            row: cursor_row,
            col: cursor_col,
            visible: !vt.hide_cursor(),
        };
        Ok(screen)
    }
}

/// Maps a vt100 color to the screen model.
///
/// Indices 0..=15 are kept as named palette slots so the template's CSS can
/// theme them; higher indices resolve to their fixed xterm RGB value.
fn convert_color(color: vt100::Color, foreground: bool) -> Color {
    match color {
        vt100::Color::Default => {
            if foreground {
                Color::Foreground
            } else {
                Color::Background
            }
        }
        vt100::Color::Idx(i) if i < 16 => Color::Indexed(i),
        vt100::Color::Idx(i) => {
            let (r, g, b) = indexed_to_rgb(i);
            Color::Rgb(r, g, b)
        }
        vt100::Color::Rgb(r, g, b) => Color::Rgb(r, g, b),
    }
}
