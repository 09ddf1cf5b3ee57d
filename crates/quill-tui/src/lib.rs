//! quill-tui: Terminal rendering
//!
//! Incremental rendering of a streamed reply (prose as markdown, fenced
//! code, colorized directive tags) plus the theme and progress spinner used
//! around it. Output is plain ANSI text written by the caller.

pub mod markdown;
pub mod render;
pub mod spinner;
pub mod tags;
pub mod theme;

use std::sync::LazyLock;

use regex::Regex;

pub use render::StreamRenderer;
pub use spinner::Spinner;
pub use tags::Tag;
pub use theme::Theme;

static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b(?:\[[0-9;?]*[ -/]*[@-~]|\][^\x07\x1b]*(?:\x07|\x1b\\))")
        .expect("ANSI pattern is valid")
});

/// Remove ANSI escape sequences (CSI and OSC) from `text`.
pub fn strip_ansi(text: &str) -> String {
    ANSI_ESCAPE.replace_all(text, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[1;34m> \x1b[0mhi"), "> hi");
        assert_eq!(strip_ansi("\x1b[38;5;236mx\x1b[39m"), "x");
        assert_eq!(strip_ansi("\x1b]0;title\x07rest"), "rest");
        assert_eq!(strip_ansi("plain"), "plain");
    }
}
