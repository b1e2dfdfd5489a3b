//! Template parsing and validation.
//!
//! A template is an SVG document with named slots the compositor fills in:
//! the outer `#terminal` svg, the inner `#screen` svg, the
//! `#generated-style` and `#user-style` stylesheets, an optional
//! `#generated-js` script, and a `template_settings` element (in the
//! termtosvg namespace) declaring screen geometry, animation kind and font.
//!
//! Parsing is a single validating pass over the XML event stream. The
//! stream itself is kept verbatim, so everything outside the named slots
//! round-trips byte-compatibly into the output document.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Error, Result};

/// Namespace URI of the `template_settings` element.
pub const TEMPLATE_NAMESPACE: &str = "https://github.com/nbedos/termtosvg";

/// How the output document animates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationKind {
    /// Stepped CSS keyframe animation in `#generated-style`.
    Css,
    /// Web Animations API driven by a `termtosvg_vars` declaration in
    /// `#generated-js`.
    Waapi,
    /// No animation; used for still frames.
    None,
}

impl Default for AnimationKind {
    fn default() -> Self {
        AnimationKind::Css
    }
}

/// Font used for every text element of the rendered screen.
#[derive(Debug, Clone, PartialEq)]
pub struct FontSpec {
    /// CSS font-family list.
    pub family: String,
    /// Font size in pixels.
    pub size: f64,
}

impl Default for FontSpec {
    fn default() -> Self {
        FontSpec {
            family: "monospace".to_string(),
            size: 14.0,
        }
    }
}

/// A validated template: the verbatim event stream plus everything the
/// compositor needs to know about it.
#[derive(Debug, Clone)]
pub struct Template {
    events: Vec<Event<'static>>,
    /// Width of `#terminal` in pixels.
    pub width: u32,
    /// Height of `#terminal` in pixels.
    pub height: u32,
    /// Columns the template was designed for.
    pub cols: u16,
    /// Rows the template was designed for.
    pub rows: u16,
    /// Declared animation kind (default CSS).
    pub animation: AnimationKind,
    /// Declared font.
    pub font: FontSpec,
}

impl Template {
    /// Parses and validates a template document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TemplateInvalid`] for XML errors, missing or
    /// duplicate slots, non-integer geometry or unknown animation types.
    pub fn parse(text: &str) -> Result<Self> {
        let mut reader = Reader::from_str(text);
        let mut events = Vec::new();
        loop {
            match reader.read_event() {
                Ok(Event::Eof) => break,
                Ok(event) => events.push(event.into_owned()),
                Err(e) => {
                    return Err(Error::TemplateInvalid(format!(
                        "XML error at byte {}: {e}",
                        reader.buffer_position()
                    )))
                }
            }
        }
        Validator::default().run(&events).map(|v| Template {
            events,
            width: v.width,
            height: v.height,
            cols: v.cols,
            rows: v.rows,
            animation: v.animation,
            font: v.font,
        })
    }

    /// The verbatim event stream.
    #[must_use]
    pub(crate) fn events(&self) -> &[Event<'static>] {
        &self.events
    }

    /// Pixel width of one cell.
    #[must_use]
    pub fn cell_width(&self) -> f64 {
        f64::from(self.width) / f64::from(self.cols)
    }

    /// Pixel height of one cell.
    #[must_use]
    pub fn cell_height(&self) -> f64 {
        f64::from(self.height) / f64::from(self.rows)
    }
}

/// Returns the unescaped value of an attribute, if present.
pub(crate) fn attribute(element: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
    match element.try_get_attribute(name) {
        Ok(Some(attr)) => attr
            .unescape_value()
            .map(|v| Some(v.into_owned()))
            .map_err(|e| Error::TemplateInvalid(format!("bad {name} attribute: {e}"))),
        Ok(None) => Ok(None),
        Err(e) => Err(Error::TemplateInvalid(format!("bad attributes: {e}"))),
    }
}

/// Local (prefix-stripped) element name.
pub(crate) fn local_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.name().local_name().as_ref()).into_owned()
}

fn prefix_of(element: &BytesStart<'_>) -> Option<String> {
    element
        .name()
        .prefix()
        .map(|p| String::from_utf8_lossy(p.as_ref()).into_owned())
}

#[derive(Default)]
struct Validated {
    width: u32,
    height: u32,
    cols: u16,
    rows: u16,
    animation: AnimationKind,
    font: FontSpec,
}

#[derive(Default)]
struct Validator {
    stack: Vec<String>,
    seen_root: bool,
    template_prefixes: Vec<Option<String>>,
    terminal_count: u32,
    screen_count: u32,
    generated_style_count: u32,
    user_style_count: u32,
    generated_script_count: u32,
    settings_count: u32,
    geometry_count: u32,
    animation_count: u32,
    result: Validated,
}

impl Validator {
    fn run(mut self, events: &[Event<'static>]) -> Result<Validated> {
        for event in events {
            match event {
                Event::Start(e) => {
                    self.element(e)?;
                    self.stack.push(local_name(e));
                }
                Event::Empty(e) => self.element(e)?,
                Event::End(_) => {
                    self.stack.pop();
                }
                _ => {}
            }
        }
        self.finish()
    }

    fn element(&mut self, e: &BytesStart<'_>) -> Result<()> {
        if self.stack.is_empty() {
            return self.root(e);
        }

        let local = local_name(e);
        let id = attribute(e, "id")?;
        match (local.as_str(), id.as_deref()) {
            ("svg", Some("terminal")) => self.terminal_count += 1,
            ("svg", Some("screen")) => self.screen_count += 1,
            ("style", Some("generated-style")) => {
                self.require_defs("generated-style")?;
                self.generated_style_count += 1;
            }
            ("style", Some("user-style")) => {
                self.require_defs("user-style")?;
                self.user_style_count += 1;
            }
            ("script", Some("generated-js")) => self.generated_script_count += 1,
            ("template_settings", _) => {
                if !self.template_prefixes.contains(&prefix_of(e)) {
                    return Err(Error::TemplateInvalid(
                        "template_settings is not in the termtosvg namespace".to_string(),
                    ));
                }
                self.settings_count += 1;
            }
            ("screen_geometry", _) if self.in_settings() => {
                self.geometry_count += 1;
                self.result.cols = geometry_attr(e, "cols")?;
                self.result.rows = geometry_attr(e, "rows")?;
            }
            ("animation", _) if self.in_settings() => {
                self.animation_count += 1;
                self.result.animation = match attribute(e, "type")?.as_deref() {
                    Some("css") | None => AnimationKind::Css,
                    Some("waapi") => AnimationKind::Waapi,
                    Some(other) => {
                        return Err(Error::TemplateInvalid(format!(
                            "unknown animation type {other:?}"
                        )))
                    }
                };
            }
            ("font", _) if self.in_settings() => {
                if let Some(family) = attribute(e, "family")? {
                    self.result.font.family = family;
                }
                if let Some(size) = attribute(e, "size")? {
                    self.result.font.size = size.parse::<f64>().ok().filter(|s| *s > 0.0).ok_or_else(
                        || Error::TemplateInvalid(format!("bad font size {size:?}")),
                    )?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn root(&mut self, e: &BytesStart<'_>) -> Result<()> {
        if self.seen_root {
            return Err(Error::TemplateInvalid("multiple root elements".to_string()));
        }
        self.seen_root = true;

        if local_name(e) != "svg" || attribute(e, "id")?.as_deref() != Some("terminal") {
            return Err(Error::TemplateInvalid(
                "root element must be <svg id=\"terminal\">".to_string(),
            ));
        }
        self.terminal_count += 1;

        self.result.width = integer_attr(e, "width")?;
        self.result.height = integer_attr(e, "height")?;
        self.check_viewbox(e)?;

        // Record which prefixes bind the termtosvg namespace.
        for attr in e.attributes() {
            let attr =
                attr.map_err(|err| Error::TemplateInvalid(format!("bad attributes: {err}")))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|err| Error::TemplateInvalid(format!("bad {key} attribute: {err}")))?;
            if value == TEMPLATE_NAMESPACE {
                if key == "xmlns" {
                    self.template_prefixes.push(None);
                } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                    self.template_prefixes.push(Some(prefix.to_string()));
                }
            }
        }
        Ok(())
    }

    fn check_viewbox(&self, e: &BytesStart<'_>) -> Result<()> {
        let viewbox = attribute(e, "viewBox")?
            .ok_or_else(|| Error::TemplateInvalid("root svg has no viewBox".to_string()))?;
        let parts: Vec<f64> = viewbox
            .split_whitespace()
            .filter_map(|p| p.parse().ok())
            .collect();
        let expected = [
            0.0,
            0.0,
            f64::from(self.result.width),
            f64::from(self.result.height),
        ];
        if parts.len() != 4 || parts != expected {
            return Err(Error::TemplateInvalid(format!(
                "viewBox {viewbox:?} does not match width/height"
            )));
        }
        Ok(())
    }

    fn require_defs(&self, slot: &str) -> Result<()> {
        if self.stack.iter().any(|name| name == "defs") {
            Ok(())
        } else {
            Err(Error::TemplateInvalid(format!(
                "{slot} must live inside a defs element"
            )))
        }
    }

    fn in_settings(&self) -> bool {
        self.stack.last().map(String::as_str) == Some("template_settings")
    }

    fn finish(self) -> Result<Validated> {
        let exactly_one = [
            (self.terminal_count, "svg id=\"terminal\""),
            (self.screen_count, "svg id=\"screen\""),
            (self.generated_style_count, "style id=\"generated-style\""),
            (self.user_style_count, "style id=\"user-style\""),
            (self.settings_count, "template_settings"),
            (self.geometry_count, "screen_geometry"),
        ];
        for (count, what) in exactly_one {
            match count {
                0 => return Err(Error::TemplateInvalid(format!("missing {what}"))),
                1 => {}
                n => return Err(Error::TemplateInvalid(format!("{n} {what} elements"))),
            }
        }
        if self.animation_count > 1 {
            return Err(Error::TemplateInvalid("duplicate animation element".to_string()));
        }
        if self.generated_script_count > 1 {
            return Err(Error::TemplateInvalid(
                "duplicate script id=\"generated-js\"".to_string(),
            ));
        }
        if self.result.animation == AnimationKind::Waapi && self.generated_script_count == 0 {
            return Err(Error::TemplateInvalid(
                "waapi animation needs a script id=\"generated-js\"".to_string(),
            ));
        }
        Ok(self.result)
    }
}

fn integer_attr(e: &BytesStart<'_>, name: &str) -> Result<u32> {
    let value = attribute(e, name)?
        .ok_or_else(|| Error::TemplateInvalid(format!("root svg has no {name}")))?;
    value
        .parse::<u32>()
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| Error::TemplateInvalid(format!("non-integer {name} {value:?}")))
}

fn geometry_attr(e: &BytesStart<'_>, name: &str) -> Result<u16> {
    let value = attribute(e, name)?
        .ok_or_else(|| Error::TemplateInvalid(format!("screen_geometry has no {name}")))?;
    value
        .parse::<u16>()
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| Error::TemplateInvalid(format!("bad screen_geometry {name} {value:?}")))
}
