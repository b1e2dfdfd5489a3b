//! Built-in template registry.
//!
//! Each name maps to an asset under `templates/`, compiled into the binary.
//! `-t` accepts either one of these names or a filesystem path.

use std::path::Path;

use crate::error::{Error, Result};

/// Template used when `-t` is not given.
pub const DEFAULT: &str = "gjm8";

/// All built-in template names.
pub const NAMES: &[&str] = &[
    "base16_default_dark",
    "dracula",
    "gjm8",
    "gjm8_play",
    "gjm8_single_loop",
    "powershell",
    "progress_bar",
    "putty",
    "solarized_dark",
    "solarized_light",
    "terminal_app",
    "ubuntu",
    "window_frame",
    "window_frame_js",
    "window_frame_powershell",
    "xterm",
];

/// Returns the built-in template with this name, if any.
#[must_use]
pub fn builtin(name: &str) -> Option<&'static str> {
    match name {
        "base16_default_dark" => Some(include_str!("../templates/base16_default_dark.svg")),
        "dracula" => Some(include_str!("../templates/dracula.svg")),
        "gjm8" => Some(include_str!("../templates/gjm8.svg")),
        "gjm8_play" => Some(include_str!("../templates/gjm8_play.svg")),
        "gjm8_single_loop" => Some(include_str!("../templates/gjm8_single_loop.svg")),
        "powershell" => Some(include_str!("../templates/powershell.svg")),
        "progress_bar" => Some(include_str!("../templates/progress_bar.svg")),
        "putty" => Some(include_str!("../templates/putty.svg")),
        "solarized_dark" => Some(include_str!("../templates/solarized_dark.svg")),
        "solarized_light" => Some(include_str!("../templates/solarized_light.svg")),
        "terminal_app" => Some(include_str!("../templates/terminal_app.svg")),
        "ubuntu" => Some(include_str!("../templates/ubuntu.svg")),
        "window_frame" => Some(include_str!("../templates/window_frame.svg")),
        "window_frame_js" => Some(include_str!("../templates/window_frame_js.svg")),
        "window_frame_powershell" => Some(include_str!("../templates/window_frame_powershell.svg")),
        "xterm" => Some(include_str!("../templates/xterm.svg")),
        _ => None,
    }
}

/// Resolves a `-t` argument: a built-in name first, then a path.
pub fn load(name_or_path: &str) -> Result<String> {
    if let Some(text) = builtin(name_or_path) {
        return Ok(text.to_string());
    }
    let path = Path::new(name_or_path);
    std::fs::read_to_string(path).map_err(|e| Error::File {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_name_resolves() {
        for name in NAMES {
            assert!(builtin(name).is_some(), "missing builtin {name}");
        }
    }

    #[test]
    fn test_unknown_name_is_none() {
        assert!(builtin("no_such_template").is_none());
    }

    #[test]
    fn test_load_falls_back_to_path() {
        let err = load("definitely/not/a/template.svg").unwrap_err();
        assert!(matches!(err, Error::File { .. }));
    }
}
