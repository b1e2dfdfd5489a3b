//! SVG composition.
//!
//! Walks the validated template's event stream, copies everything verbatim,
//! and fills the named slots: screen geometry on `#terminal`, `#screen` and
//! `screen_geometry`, the frame library and view stack inside `#screen`,
//! the generated stylesheet, and (for WAAPI templates) the generated script.
//!
//! Each distinct screen becomes one reusable `<g id="frame_k">` under a
//! `<defs>`; the `<g id="screen_view">` stacks one `<use>` per animation
//! step, each a screen height below the previous, and the animation driver
//! scrolls the stack one screen at a time with a stepped transform.
//!
//! Output is deterministic: identical inputs produce identical bytes.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::cast::{self, EventKind};
use crate::emulator::Emulator;
use crate::error::{Error, Result};
use crate::layout;
use crate::screen::{Color, Screen, Snapshot};
use crate::template::{attribute, local_name, AnimationKind, Template};
use crate::timing::{self, Frame, TimingOptions};

/// Options of one render operation.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    /// Smallest frame duration in ms, at least 1.
    pub min_frame_duration: u64,
    /// Largest frame duration in ms; `None` falls back to the cast's
    /// `idle_time_limit`, or unlimited.
    pub max_frame_duration: Option<u64>,
    /// Pause appended to the last frame before the animation loops, ms.
    pub loop_delay: u64,
    /// Target geometry override; `None` uses the cast header's.
    pub geometry: Option<(u16, u16)>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            min_frame_duration: 1,
            max_frame_duration: None,
            loop_delay: 1000,
            geometry: None,
        }
    }
}

/// What a render produced.
#[derive(Debug)]
pub struct RenderSummary {
    /// Number of animation frames after normalisation.
    pub frames: usize,
    /// Total loop duration in ms.
    pub loop_duration_ms: u64,
    /// Files written.
    pub outputs: Vec<PathBuf>,
}

/// Replays a cast into normalised frames.
///
/// Returns the session geometry, the frames and the loop duration.
pub fn cast_to_frames(
    text: &str,
    opts: &RenderOptions,
) -> Result<((u16, u16), Vec<Frame>, u64)> {
    let (header, events) = cast::read_cast(text)?;
    let (cols, rows) = opts.geometry.unwrap_or((header.cols, header.rows));
    log::debug!(
        "cast v{}: {} events, rendering at {cols}x{rows}",
        header.version,
        events.len()
    );

    let max_frame_duration = opts
        .max_frame_duration
        .or_else(|| {
            header
                .idle_time_limit
                .map(|limit| (limit * 1000.0).round() as u64)
        })
        .unwrap_or(u64::MAX);
    let min_frame_duration = opts.min_frame_duration.max(1);
    let timing_opts = TimingOptions {
        min_frame_duration,
        max_frame_duration: max_frame_duration.max(min_frame_duration),
        loop_delay: opts.loop_delay,
    };

    let mut emulator = Emulator::new(cols, rows);
    let mut snapshots: Vec<Snapshot> = Vec::new();
    for event in &events {
        match event.kind {
            EventKind::Output => snapshots.push(emulator.feed(event.time_ms, event.data.as_bytes())?),
            EventKind::Input => {}
            EventKind::Resize => {
                log::debug!("ignoring resize to {} at {} ms", event.data, event.time_ms);
            }
        }
    }

    let (frames, loop_ms) = timing::normalise(&snapshots, &timing_opts)?;
    Ok(((cols, rows), frames, loop_ms))
}

/// Renders a cast file into one animated SVG at `output`.
pub fn render_animation_file(
    input: &Path,
    output: &Path,
    template: &Template,
    opts: &RenderOptions,
) -> Result<RenderSummary> {
    let text = read_input(input)?;
    let ((cols, rows), frames, loop_ms) = cast_to_frames(&text, opts)?;
    let compositor = Compositor::new(template, cols, rows);
    let bytes = compositor.animation(&frames, loop_ms)?;
    log::debug!("animated SVG: {} frames, {} bytes", frames.len(), bytes.len());
    write_atomic(output, &bytes)?;
    Ok(RenderSummary {
        frames: frames.len(),
        loop_duration_ms: loop_ms,
        outputs: vec![output.to_path_buf()],
    })
}

/// Renders a cast file into `<stem>_<k>.svg` still files under `out_dir`.
pub fn render_still_files(
    input: &Path,
    out_dir: &Path,
    stem: &str,
    template: &Template,
    opts: &RenderOptions,
) -> Result<RenderSummary> {
    let text = read_input(input)?;
    let ((cols, rows), frames, loop_ms) = cast_to_frames(&text, opts)?;
    std::fs::create_dir_all(out_dir).map_err(|e| Error::File {
        path: out_dir.to_path_buf(),
        source: e,
    })?;
    let compositor = Compositor::new(template, cols, rows);
    let mut outputs = Vec::with_capacity(frames.len());
    for (k, frame) in frames.iter().enumerate() {
        let bytes = compositor.still(&frame.screen)?;
        let path = out_dir.join(format!("{stem}_{k}.svg"));
        write_atomic(&path, &bytes)?;
        outputs.push(path);
    }
    log::debug!("wrote {} still frames to {}", outputs.len(), out_dir.display());
    Ok(RenderSummary {
        frames: frames.len(),
        loop_duration_ms: loop_ms,
        outputs,
    })
}

fn read_input(input: &Path) -> Result<String> {
    std::fs::read_to_string(input).map_err(|e| Error::File {
        path: input.to_path_buf(),
        source: e,
    })
}

/// Writes through a temp file in the destination directory so a failed run
/// never leaves a partial file at `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file_error = |e: std::io::Error| Error::File {
        path: path.to_path_buf(),
        source: e,
    };
    let mut tmp = tempfile::Builder::new()
        .prefix("termtosvg_")
        .rand_bytes(6)
        .tempfile_in(&dir)
        .map_err(file_error)?;
    tmp.write_all(bytes).map_err(file_error)?;
    tmp.flush().map_err(file_error)?;
    tmp.persist(path).map_err(|e| file_error(e.error))?;
    Ok(())
}

/// Composes frames and a template into SVG documents.
pub struct Compositor<'a> {
    template: &'a Template,
    cols: u16,
    rows: u16,
    cell_w: f64,
    cell_h: f64,
}

impl<'a> Compositor<'a> {
    /// Binds a template to the session geometry. When the geometry differs
    /// from the template's, the document dimensions scale by cell size.
    #[must_use]
    pub fn new(template: &'a Template, cols: u16, rows: u16) -> Self {
        Compositor {
            template,
            cols,
            rows,
            cell_w: template.cell_width(),
            cell_h: template.cell_height(),
        }
    }

    /// Pixel width of the rendered screen.
    #[must_use]
    pub fn screen_width(&self) -> f64 {
        self.cell_w * f64::from(self.cols)
    }

    /// Pixel height of the rendered screen.
    #[must_use]
    pub fn screen_height(&self) -> f64 {
        self.cell_h * f64::from(self.rows)
    }

    /// Builds the animated document.
    pub fn animation(&self, frames: &[Frame], loop_ms: u64) -> Result<Vec<u8>> {
        if frames.is_empty() {
            return Err(Error::EmptyCast);
        }
        self.compose(self.template.animation, frames, loop_ms)
    }

    /// Builds one still document for a single screen.
    ///
    /// Stills carry no animation, so every `script` element of the template
    /// (the generated slot and any hand-authored bootstrap) is dropped.
    pub fn still(&self, screen: &Rc<Screen>) -> Result<Vec<u8>> {
        let frame = Frame {
            screen: Rc::clone(screen),
            duration_ms: 0,
        };
        self.compose(AnimationKind::None, std::slice::from_ref(&frame), 0)
    }

    fn compose(&self, driver: AnimationKind, frames: &[Frame], loop_ms: u64) -> Result<Vec<u8>> {
        // Frame library: one entry per distinct screen, numbered in order of
        // first appearance; steps index into it.
        let mut library: Vec<Rc<Screen>> = Vec::new();
        let mut seen: HashMap<Rc<Screen>, usize> = HashMap::new();
        let mut steps: Vec<usize> = Vec::with_capacity(frames.len());
        for frame in frames {
            let next = library.len();
            let index = *seen.entry(Rc::clone(&frame.screen)).or_insert(next);
            if index == next {
                library.push(Rc::clone(&frame.screen));
            }
            steps.push(index);
        }

        let events = self.template.events();
        let mut writer = Writer::new(Vec::new());
        if !matches!(events.first(), Some(Event::Decl(_))) {
            emit(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        }

        let mut i = 0;
        while i < events.len() {
            let (element, is_empty) = match &events[i] {
                Event::Start(e) => (e, false),
                Event::Empty(e) => (e, true),
                other => {
                    emit(&mut writer, other.clone())?;
                    i += 1;
                    continue;
                }
            };
            let local = local_name(element);
            let id = attribute(element, "id")?;

            match (local.as_str(), id.as_deref()) {
                ("svg", Some("terminal")) => {
                    let rebuilt = self.rebuild_sized(element)?;
                    if is_empty {
                        emit(&mut writer, Event::Empty(rebuilt))?;
                    } else {
                        emit(&mut writer, Event::Start(rebuilt))?;
                    }
                    i += 1;
                }
                ("svg", Some("screen")) => {
                    emit(&mut writer, Event::Start(self.rebuild_sized(element)?))?;
                    self.write_screen_content(&mut writer, driver, &library, &steps)?;
                    emit(&mut writer, end_of(element))?;
                    i = skip_element(events, i, is_empty)?;
                }
                ("style", Some("generated-style")) => {
                    emit(&mut writer, Event::Start(rebuild(element, &[])?))?;
                    let css = self.generated_css(driver, frames, loop_ms);
                    emit(&mut writer, Event::Text(BytesText::new(&css)))?;
                    emit(&mut writer, end_of(element))?;
                    i = skip_element(events, i, is_empty)?;
                }
                ("script", _) if driver == AnimationKind::None => {
                    // Stills carry no script, generated or user-authored.
                    i = skip_element(events, i, is_empty)?;
                }
                ("script", Some("generated-js")) if driver == AnimationKind::Waapi => {
                    emit(&mut writer, Event::Start(rebuild(element, &[])?))?;
                    let js = self.generated_js(frames, loop_ms);
                    emit(&mut writer, Event::Text(BytesText::new(&js)))?;
                    emit(&mut writer, end_of(element))?;
                    i = skip_element(events, i, is_empty)?;
                }
                ("screen_geometry", _) => {
                    let cols = self.cols.to_string();
                    let rows = self.rows.to_string();
                    let rebuilt = rebuild(element, &[("cols", &cols), ("rows", &rows)])?;
                    if is_empty {
                        emit(&mut writer, Event::Empty(rebuilt))?;
                    } else {
                        emit(&mut writer, Event::Start(rebuilt))?;
                    }
                    i += 1;
                }
                _ => {
                    emit(&mut writer, events[i].clone())?;
                    i += 1;
                }
            }
        }

        Ok(writer.into_inner())
    }

    /// Rewrites width/height/viewBox for the session geometry, keeping all
    /// other attributes.
    fn rebuild_sized(&self, element: &BytesStart<'_>) -> Result<BytesStart<'static>> {
        let width = fmt_num(self.screen_width());
        let height = fmt_num(self.screen_height());
        let viewbox = format!("0 0 {width} {height}");
        rebuild(
            element,
            &[("width", &width), ("height", &height), ("viewBox", &viewbox)],
        )
    }

    fn write_screen_content(
        &self,
        writer: &mut Writer<Vec<u8>>,
        driver: AnimationKind,
        library: &[Rc<Screen>],
        steps: &[usize],
    ) -> Result<()> {
        if driver == AnimationKind::None {
            let mut view = BytesStart::new("g");
            view.push_attribute(("id", "screen_view"));
            emit(writer, Event::Start(view))?;
            self.write_frame_group(writer, 0, &library[0])?;
            emit(writer, Event::End(BytesEnd::new("g")))?;
            return Ok(());
        }

        emit(writer, Event::Start(BytesStart::new("defs")))?;
        for (k, screen) in library.iter().enumerate() {
            self.write_frame_group(writer, k, screen)?;
        }
        emit(writer, Event::End(BytesEnd::new("defs")))?;

        let mut view = BytesStart::new("g");
        view.push_attribute(("id", "screen_view"));
        emit(writer, Event::Start(view))?;
        for (j, &k) in steps.iter().enumerate() {
            let mut use_element = BytesStart::new("use");
            let href = format!("#frame_{k}");
            use_element.push_attribute(("xlink:href", href.as_str()));
            if j > 0 {
                let y = fmt_num(self.screen_height() * j as f64);
                use_element.push_attribute(("y", y.as_str()));
            }
            emit(writer, Event::Empty(use_element))?;
        }
        emit(writer, Event::End(BytesEnd::new("g")))?;
        Ok(())
    }

    fn write_frame_group(
        &self,
        writer: &mut Writer<Vec<u8>>,
        k: usize,
        screen: &Screen,
    ) -> Result<()> {
        let mut group = BytesStart::new("g");
        let id = format!("frame_{k}");
        group.push_attribute(("id", id.as_str()));
        emit(writer, Event::Start(group))?;

        for run in layout::screen_runs(screen) {
            let x = fmt_num(f64::from(run.col) * self.cell_w);
            let y = fmt_num(f64::from(run.row) * self.cell_h);
            let width = fmt_num(f64::from(run.cells) * self.cell_w);

            if run.emits_rect() {
                let mut rect = BytesStart::new("rect");
                rect.push_attribute(("x", x.as_str()));
                rect.push_attribute(("y", y.as_str()));
                rect.push_attribute(("width", width.as_str()));
                rect.push_attribute(("height", fmt_num(self.cell_h).as_str()));
                push_color(&mut rect, run.bg);
                emit(writer, Event::Empty(rect))?;
            }

            if run.emits_text() {
                let mut text = BytesStart::new("text");
                text.push_attribute(("x", x.as_str()));
                text.push_attribute(("y", y.as_str()));
                text.push_attribute(("textLength", width.as_str()));
                push_color(&mut text, run.fg);
                if run.attrs.bold {
                    text.push_attribute(("font-weight", "bold"));
                }
                if run.attrs.italic {
                    text.push_attribute(("font-style", "italic"));
                }
                match (run.attrs.underline, run.attrs.strikethrough) {
                    (true, true) => text.push_attribute(("text-decoration", "underline line-through")),
                    (true, false) => text.push_attribute(("text-decoration", "underline")),
                    (false, true) => text.push_attribute(("text-decoration", "line-through")),
                    (false, false) => {}
                }
                text.push_attribute(("xml:space", "preserve"));
                emit(writer, Event::Start(text))?;
                emit(writer, Event::Text(BytesText::new(&run.text)))?;
                emit(writer, Event::End(BytesEnd::new("text")))?;
            }
        }

        emit(writer, Event::End(BytesEnd::new("g")))
    }

    fn generated_css(&self, driver: AnimationKind, frames: &[Frame], loop_ms: u64) -> String {
        let font = &self.template.font;
        let mut css = String::new();
        let _ = write!(
            css,
            "\ntext {{\n    font-family: {};\n    font-size: {}px;\n    dominant-baseline: text-before-edge;\n    white-space: pre;\n}}\n",
            font.family,
            fmt_num(font.size)
        );
        if driver == AnimationKind::None {
            return css;
        }

        let _ = write!(css, ":root {{\n    --animation-duration: {loop_ms}ms;\n}}\n");
        if driver != AnimationKind::Css {
            return css;
        }

        let _ = write!(
            css,
            "#screen_view {{\n    animation: roll var(--animation-duration) steps(1, end) infinite;\n}}\n"
        );
        let _ = write!(css, "@keyframes roll {{\n");
        let mut elapsed = 0u64;
        for (k, frame) in frames.iter().enumerate() {
            let percent = fmt_num(elapsed as f64 * 100.0 / loop_ms as f64);
            let _ = write!(
                css,
                "    {percent}% {{ transform: {}; }}\n",
                translate_y(self.screen_height(), k)
            );
            elapsed += frame.duration_ms;
        }
        let _ = write!(css, "}}\n");
        css
    }

    fn generated_js(&self, frames: &[Frame], loop_ms: u64) -> String {
        let last = frames.len() - 1;
        let mut js = String::from("\nvar termtosvg_vars = {\n    transforms: [\n");
        let mut elapsed = 0u64;
        for (k, frame) in frames.iter().enumerate() {
            let _ = write!(
                js,
                "        {{\"transform\": \"{}\", \"easing\": \"steps(1, end)\"",
                translate_y(self.screen_height(), k)
            );
            if k > 0 && k < last {
                let _ = write!(js, ", \"offset\": {}", fmt_num(elapsed as f64 / loop_ms as f64));
            }
            js.push_str(if k < last { "},\n" } else { "}\n" });
            elapsed += frame.duration_ms;
        }
        let _ = write!(
            js,
            "    ],\n    timings: {{duration: {loop_ms}, iterations: Infinity}}\n}};\n"
        );
        js
    }
}

fn translate_y(screen_height: f64, step: usize) -> String {
    if step == 0 {
        "translateY(0px)".to_string()
    } else {
        format!("translateY(-{}px)", fmt_num(screen_height * step as f64))
    }
}

fn push_color(element: &mut BytesStart<'_>, color: Color) {
    match color {
        Color::Foreground => element.push_attribute(("class", "foreground")),
        Color::Background => element.push_attribute(("class", "background")),
        Color::Indexed(i) => element.push_attribute(("class", format!("color{i}").as_str())),
        Color::Rgb(r, g, b) => {
            element.push_attribute(("fill", format!("#{r:02x}{g:02x}{b:02x}").as_str()));
        }
    }
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| Error::Svg(e.to_string()))
}

fn end_of(element: &BytesStart<'_>) -> Event<'static> {
    Event::End(BytesEnd::new(
        String::from_utf8_lossy(element.name().as_ref()).into_owned(),
    ))
}

/// Copies an element, replacing or appending the given attributes.
fn rebuild(element: &BytesStart<'_>, overrides: &[(&str, &str)]) -> Result<BytesStart<'static>> {
    let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
    let mut out = BytesStart::new(name);
    let mut replaced: Vec<&str> = Vec::new();
    for attr in element.attributes() {
        let attr = attr.map_err(|e| Error::Svg(format!("bad attributes: {e}")))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        if let Some((k, v)) = overrides.iter().find(|(k, _)| *k == key.as_str()) {
            replaced.push(*k);
            out.push_attribute((key.as_str(), *v));
        } else {
            let value = attr
                .unescape_value()
                .map_err(|e| Error::Svg(format!("bad {key} attribute: {e}")))?;
            out.push_attribute((key.as_str(), value.as_ref()));
        }
    }
    for (k, v) in overrides {
        if !replaced.contains(k) {
            out.push_attribute((*k, *v));
        }
    }
    Ok(out)
}

/// Index just past `events[start]`'s subtree.
fn skip_element(events: &[Event<'static>], start: usize, is_empty: bool) -> Result<usize> {
    if is_empty {
        return Ok(start + 1);
    }
    let mut depth = 0usize;
    for (offset, event) in events[start..].iter().enumerate() {
        match event {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    return Ok(start + offset + 1);
                }
            }
            _ => {}
        }
    }
    Err(Error::Svg("unbalanced element".to_string()))
}

/// Formats a number with at most three decimals, trimmed.
fn fmt_num(value: f64) -> String {
    let mut s = format!("{value:.3}");
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screen::{Attrs, Cell};

    fn test_template(animation: &str) -> Template {
        let script = if animation == "waapi" {
            "<script id=\"generated-js\"></script>"
        } else {
            ""
        };
        let text = format!(
            concat!(
                "<?xml version=\"1.0\" encoding=\"utf-8\"?>",
                "<svg id=\"terminal\" width=\"80\" height=\"34\" viewBox=\"0 0 80 34\" ",
                "xmlns=\"http://www.w3.org/2000/svg\" ",
                "xmlns:xlink=\"http://www.w3.org/1999/xlink\" ",
                "xmlns:termtosvg=\"https://github.com/nbedos/termtosvg\">",
                "<termtosvg:template_settings>",
                "<termtosvg:screen_geometry cols=\"10\" rows=\"2\"/>",
                "<termtosvg:animation type=\"{animation}\"/>",
                "</termtosvg:template_settings>",
                "<defs>",
                "<style id=\"generated-style\"></style>",
                "<style id=\"user-style\">.foreground {{ fill: #eee; }}</style>",
                "</defs>",
                "<rect class=\"background\" width=\"100%\" height=\"100%\"/>",
                "<svg id=\"screen\" width=\"80\" height=\"34\" viewBox=\"0 0 80 34\"></svg>",
                "{script}",
                "</svg>",
            ),
            animation = animation,
            script = script,
        );
        Template::parse(&text).unwrap()
    }

    fn screen_with(marker: &str) -> Rc<Screen> {
        let mut screen = Screen::new(10, 2);
        screen.cursor.visible = false;
        for (i, ch) in marker.chars().enumerate() {
            screen.set_cell(
                0,
                i as u16,
                Cell {
                    ch: ch.to_string(),
                    fg: Color::Foreground,
                    bg: Color::Background,
                    attrs: Attrs::default(),
                },
            );
        }
        Rc::new(screen)
    }

    fn frame(marker: &str, duration_ms: u64) -> Frame {
        Frame {
            screen: screen_with(marker),
            duration_ms,
        }
    }

    fn render_str(template: &Template, frames: &[Frame], loop_ms: u64) -> String {
        let compositor = Compositor::new(template, 10, 2);
        String::from_utf8(compositor.animation(frames, loop_ms).unwrap()).unwrap()
    }

    #[test]
    fn test_animation_contains_frame_library_and_steps() {
        let template = test_template("css");
        let svg = render_str(&template, &[frame("one", 500), frame("two", 500)], 1000);
        assert!(svg.contains("<g id=\"frame_0\">"));
        assert!(svg.contains("<g id=\"frame_1\">"));
        assert!(svg.contains("<use xlink:href=\"#frame_0\"/>"));
        assert!(svg.contains("<use xlink:href=\"#frame_1\" y=\"34\"/>"));
        assert!(svg.contains(">one</text>"));
        assert!(svg.contains(">two</text>"));
    }

    #[test]
    fn test_identical_screens_share_a_frame_definition() {
        let template = test_template("css");
        // Blink back to the first screen: 3 steps, 2 definitions.
        let svg = render_str(
            &template,
            &[frame("a", 100), frame("b", 100), frame("a", 100)],
            300,
        );
        assert_eq!(svg.matches("<g id=\"frame_").count(), 2);
        assert_eq!(svg.matches("<use xlink:href=\"#frame_0\"").count(), 2);
        assert!(svg.contains("y=\"68\""));
    }

    #[test]
    fn test_css_driver_rules() {
        let template = test_template("css");
        let svg = render_str(&template, &[frame("a", 2000), frame("b", 1000)], 3000);
        assert!(svg.contains("--animation-duration: 3000ms;"));
        assert!(svg.contains("animation: roll var(--animation-duration) steps(1, end) infinite;"));
        assert!(svg.contains("@keyframes roll"));
        assert!(svg.contains("0% { transform: translateY(0px); }"));
        assert!(svg.contains("66.667% { transform: translateY(-34px); }"));
        assert!(svg.contains("dominant-baseline: text-before-edge;"));
    }

    #[test]
    fn test_waapi_driver_script() {
        let template = test_template("waapi");
        let svg = render_str(
            &template,
            &[frame("a", 1000), frame("b", 1000), frame("c", 1000)],
            3000,
        );
        assert!(svg.contains("var termtosvg_vars = {"));
        assert_eq!(svg.matches("\"transform\": \"translateY(").count(), 3);
        // Only the middle entry carries an offset.
        assert_eq!(svg.matches("\"offset\": ").count(), 1);
        assert!(svg.contains("\"offset\": 0.333"));
        assert!(svg.contains("timings: {duration: 3000, iterations: Infinity}"));
        // No CSS keyframes in waapi mode.
        assert!(!svg.contains("@keyframes"));
    }

    #[test]
    fn test_still_has_no_animation_machinery() {
        let template = test_template("css");
        let compositor = Compositor::new(&template, 10, 2);
        let svg = String::from_utf8(compositor.still(&screen_with("hi")).unwrap()).unwrap();
        assert!(svg.contains(">hi</text>"));
        assert!(svg.contains("<g id=\"screen_view\">"));
        assert!(!svg.contains("<use"));
        assert!(!svg.contains("@keyframes"));
        assert!(!svg.contains("--animation-duration"));
        // Font rules still present.
        assert!(svg.contains("font-family: monospace;"));
    }

    #[test]
    fn test_still_drops_scripts_even_from_waapi_templates() {
        let template = test_template("waapi");
        let compositor = Compositor::new(&template, 10, 2);
        let svg = String::from_utf8(compositor.still(&screen_with("hi")).unwrap()).unwrap();
        assert!(svg.contains(">hi</text>"));
        assert!(!svg.contains("<script"));
        assert!(!svg.contains("termtosvg_vars"));
    }

    #[test]
    fn test_geometry_rescale() {
        let template = test_template("css");
        // 20 cols x 4 rows at 8x17 cells.
        let compositor = Compositor::new(&template, 20, 4);
        let mut screen = Screen::new(20, 4);
        screen.cursor.visible = false;
        screen.set_cell(
            0,
            0,
            Cell {
                ch: "x".to_string(),
                fg: Color::Foreground,
                bg: Color::Background,
                attrs: Attrs::default(),
            },
        );
        let frames = [Frame {
            screen: Rc::new(screen),
            duration_ms: 100,
        }];
        let svg = String::from_utf8(compositor.animation(&frames, 100).unwrap()).unwrap();
        assert!(svg.contains("<svg id=\"terminal\" width=\"160\" height=\"68\" viewBox=\"0 0 160 68\""));
        assert!(svg.contains("<svg id=\"screen\" width=\"160\" height=\"68\" viewBox=\"0 0 160 68\">"));
        assert!(svg.contains("cols=\"20\" rows=\"4\""));
    }

    #[test]
    fn test_template_chrome_is_preserved() {
        let template = test_template("css");
        let svg = render_str(&template, &[frame("a", 100)], 100);
        assert!(svg.contains("<rect class=\"background\" width=\"100%\" height=\"100%\"/>"));
        assert!(svg.contains(".foreground { fill: #eee; }"));
    }

    #[test]
    fn test_output_is_deterministic() {
        let template = test_template("css");
        let a = render_str(&template, &[frame("a", 100), frame("b", 200)], 300);
        let b = render_str(&template, &[frame("a", 100), frame("b", 200)], 300);
        assert_eq!(a, b);
    }

    #[test]
    fn test_rect_and_styles_in_frame_group() {
        let template = test_template("css");
        let mut screen = Screen::new(10, 2);
        screen.cursor.visible = false;
        screen.set_cell(
            1,
            2,
            Cell {
                ch: "b".to_string(),
                fg: Color::Indexed(1),
                bg: Color::Rgb(0, 128, 255),
                attrs: Attrs {
                    bold: true,
                    underline: true,
                    ..Attrs::default()
                },
            },
        );
        let frames = [Frame {
            screen: Rc::new(screen),
            duration_ms: 100,
        }];
        let svg = render_str(&template, &frames, 100);
        assert!(svg.contains("<rect x=\"16\" y=\"17\" width=\"8\" height=\"17\" fill=\"#0080ff\"/>"));
        assert!(svg.contains("class=\"color1\""));
        assert!(svg.contains("font-weight=\"bold\""));
        assert!(svg.contains("text-decoration=\"underline\""));
    }

    #[test]
    fn test_fmt_num() {
        assert_eq!(fmt_num(8.0), "8");
        assert_eq!(fmt_num(66.6666), "66.667");
        assert_eq!(fmt_num(0.5), "0.5");
        assert_eq!(fmt_num(0.0), "0");
    }
}
