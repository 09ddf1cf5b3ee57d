//! Incremental renderer for a streamed reply.
//!
//! [`StreamRenderer`] accepts reply text in arbitrary pieces and returns
//! styled output as soon as it can be decided. It is a three-state machine
//! over an append-only buffer:
//!
//! - **Prose**: text is held until a paragraph boundary and then rendered as
//!   markdown. A line-initial run of three or more backticks opens a fence;
//!   a `<` that begins a directive tag flushes the prose before it.
//! - **Fence**: code is passed through line by line on a background color,
//!   until a line starting with three or more backticks closes it.
//! - **Directive**: text between a directive's opening and closing tag is
//!   passed through unstyled; tag tokens are colorized.
//!
//! Anything that could still turn into a fence or tag (a trailing `<ed`, a
//! line-initial backtick run, a fence line without its newline) is held
//! back until the next piece settles it or [`StreamRenderer::finish`] is
//! called. Every decision depends only on buffered content, so the text
//! shown is the same however the reply was split.

use crossterm::style::{ResetColor, SetBackgroundColor};

use crate::markdown::render_markdown;
use crate::tags::{Tag, TagMatch, match_tag};
use crate::theme::{Theme, paint};

/// Shortest backtick run that opens or closes a fence.
const FENCE_MIN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Prose,
    Fence,
    /// Inside a directive opened by the given tag
    Directive(Tag),
}

pub struct StreamRenderer {
    theme: Theme,
    mode: Mode,
    pending: String,
    /// Prose bytes of `pending` already known to hold no fence or tag
    scan: usize,
    /// Whether `pending` begins at the start of a line
    line_start: bool,
}

impl StreamRenderer {
    pub fn new(theme: Theme) -> Self {
        Self {
            theme,
            mode: Mode::Prose,
            pending: String::new(),
            scan: 0,
            line_start: true,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Text received but not yet emitted.
    pub fn pending(&self) -> &str {
        &self.pending
    }

    /// Append a fragment and return whatever output it settles.
    pub fn push(&mut self, fragment: &str) -> String {
        self.pending.push_str(fragment);
        self.drive(false)
    }

    /// Flush everything still held, close any open fence and reset style.
    ///
    /// The renderer is back in its initial state afterwards.
    pub fn finish(&mut self) -> String {
        let mut out = self.drive(true);
        if self.mode == Mode::Fence {
            out.push_str(&ResetColor.to_string());
        }
        self.mode = Mode::Prose;
        self.pending.clear();
        self.scan = 0;
        self.line_start = true;
        out
    }

    fn drive(&mut self, eof: bool) -> String {
        let mut out = String::new();
        loop {
            let progressed = match self.mode {
                Mode::Prose => self.step_prose(eof, &mut out),
                Mode::Fence => self.step_fence(eof, &mut out),
                Mode::Directive(opener) => self.step_directive(opener, eof, &mut out),
            };
            if !progressed {
                break;
            }
        }
        out
    }

    fn step_prose(&mut self, eof: bool, out: &mut String) -> bool {
        let bytes = self.pending.as_bytes();
        let mut i = self.scan;

        while i < bytes.len() {
            let at_line_start = if i == 0 {
                self.line_start
            } else {
                bytes[i - 1] == b'\n'
            };

            match bytes[i] {
                b'`' if at_line_start => {
                    let run = bytes[i..].iter().take_while(|&&b| b == b'`').count();
                    if i + run == bytes.len() && !eof {
                        self.scan = i;
                        return false;
                    }
                    if run >= FENCE_MIN {
                        let line_end = match self.pending[i..].find('\n') {
                            Some(n) => i + n + 1,
                            None if eof => self.pending.len(),
                            None => {
                                self.scan = i;
                                return false;
                            }
                        };
                        self.flush_prose(i, out);
                        let line = self.take(line_end - i);
                        self.open_fence(&line, out);
                        return true;
                    }
                    i += run;
                }
                b'<' => match match_tag(&self.pending[i..], eof) {
                    TagMatch::Complete { len, tag, closing } => {
                        self.flush_prose(i, out);
                        let token = self.take(len);
                        out.push_str(&paint(self.theme.tag_style(tag), &token));
                        if !closing {
                            self.mode = Mode::Directive(tag);
                        }
                        return true;
                    }
                    TagMatch::Partial => {
                        self.scan = i;
                        return false;
                    }
                    TagMatch::NoMatch => i += 1,
                },
                b'\n' => {
                    if i + 1 == bytes.len() && !eof {
                        self.scan = i;
                        return false;
                    }
                    if bytes.get(i + 1) == Some(&b'\n') && inline_balanced(&self.pending[..i]) {
                        self.flush_prose(i + 2, out);
                        return true;
                    }
                    i += 1;
                }
                _ => i += 1,
            }
        }

        self.scan = i;
        if eof && !self.pending.is_empty() {
            self.flush_prose(self.pending.len(), out);
            return true;
        }
        false
    }

    fn step_fence(&mut self, eof: bool, out: &mut String) -> bool {
        if self.pending.is_empty() {
            return false;
        }

        if self.line_start {
            let run = self.pending.bytes().take_while(|&b| b == b'`').count();
            if run == self.pending.len() && !eof {
                return false;
            }
            if run >= FENCE_MIN {
                let end = match self.pending.find('\n') {
                    Some(n) => n + 1,
                    None if eof => self.pending.len(),
                    None => return false,
                };
                self.take(end);
                out.push_str(&ResetColor.to_string());
                self.mode = Mode::Prose;
                return true;
            }
        }

        let line_start = self.line_start;
        let end = self
            .pending
            .find('\n')
            .map_or(self.pending.len(), |n| n + 1);
        let chunk = self.take(end);

        if line_start {
            out.push_str(&SetBackgroundColor(self.theme.code_bg).to_string());
        }
        match chunk.strip_suffix('\n') {
            Some(line) => {
                out.push_str(line);
                out.push_str(&ResetColor.to_string());
                out.push('\n');
            }
            None => out.push_str(&chunk),
        }
        true
    }

    fn step_directive(&mut self, opener: Tag, eof: bool, out: &mut String) -> bool {
        if self.pending.is_empty() {
            return false;
        }

        match self.pending.find('<') {
            None => {
                let chunk = self.take(self.pending.len());
                out.push_str(&chunk);
                true
            }
            Some(0) => match match_tag(&self.pending, eof) {
                TagMatch::Complete { len, tag, closing } => {
                    let token = self.take(len);
                    out.push_str(&paint(self.theme.tag_style(tag), &token));
                    if closing && tag == opener {
                        self.mode = Mode::Prose;
                    }
                    true
                }
                TagMatch::Partial => false,
                TagMatch::NoMatch => {
                    let chunk = self.take(1);
                    out.push_str(&chunk);
                    true
                }
            },
            Some(n) => {
                let chunk = self.take(n);
                out.push_str(&chunk);
                true
            }
        }
    }

    /// Render the fence's info string as a dim label; the backticks are dropped.
    fn open_fence(&mut self, line: &str, out: &mut String) {
        let label = line.trim_start_matches('`').trim();
        if !label.is_empty() {
            out.push_str(&paint(self.theme.dim_style(), label));
            out.push('\n');
        }
        self.mode = Mode::Fence;
    }

    /// Render `pending[..end]` as markdown.
    fn flush_prose(&mut self, end: usize, out: &mut String) {
        let chunk = self.take(end);
        if !chunk.is_empty() {
            out.push_str(&render_markdown(&chunk, &self.theme));
        }
    }

    /// Remove the first `n` bytes of `pending`, tracking line position.
    fn take(&mut self, n: usize) -> String {
        let chunk: String = self.pending.drain(..n).collect();
        if !chunk.is_empty() {
            self.line_start = chunk.ends_with('\n');
        }
        self.scan = 0;
        chunk
    }
}

/// Whether a paragraph-to-date closes every inline delimiter it opens.
///
/// Counts inline-code backticks, `**` pairs and lone `*` emphasis markers
/// (outside code spans, ignoring list bullets). An odd count of any of them
/// means the next fragment may still close it.
pub fn inline_balanced(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut backticks = 0usize;
    let mut strong = 0usize;
    let mut single = 0usize;
    let mut in_code = false;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'`' => {
                backticks += 1;
                in_code = !in_code;
                i += 1;
            }
            b'*' if !in_code => {
                if bytes.get(i + 1) == Some(&b'*') {
                    strong += 1;
                    i += 2;
                } else {
                    if !is_bullet(bytes, i) {
                        single += 1;
                    }
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }

    backticks % 2 == 0 && strong % 2 == 0 && single % 2 == 0
}

/// A `*` that starts a line (after indentation) and is followed by a space.
fn is_bullet(bytes: &[u8], i: usize) -> bool {
    let line_start = bytes[..i]
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |p| p + 1);
    bytes[line_start..i].iter().all(|&b| b == b' ' || b == b'\t')
        && matches!(bytes.get(i + 1), Some(b' ') | Some(b'\t'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strip_ansi;

    fn renderer() -> StreamRenderer {
        StreamRenderer::new(Theme::dark())
    }

    /// Feed `pieces` one at a time, then finish; return plain output.
    fn feed(pieces: &[&str]) -> String {
        let mut r = renderer();
        let mut out = String::new();
        for piece in pieces {
            out.push_str(&r.push(piece));
        }
        out.push_str(&r.finish());
        strip_ansi(&out)
    }

    fn whole(text: &str) -> String {
        feed(&[text])
    }

    /// Split into single characters.
    fn by_char(text: &str) -> String {
        let chars: Vec<String> = text.chars().map(String::from).collect();
        let pieces: Vec<&str> = chars.iter().map(String::as_str).collect();
        feed(&pieces)
    }

    /// Split at every pair of char boundaries (a, b).
    fn assert_invariant(text: &str) {
        let expected = whole(text);
        assert_eq!(by_char(text), expected, "single-char split of {:?}", text);

        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        for &a in &bounds {
            for &b in bounds.iter().filter(|&&b| b >= a) {
                let got = feed(&[&text[..a], &text[a..b], &text[b..]]);
                assert_eq!(got, expected, "split at {} and {} of {:?}", a, b, text);
            }
        }
    }

    const REPLY: &str = "Sure.\n\n<edit path=\"app.py\"><find>return 1</find><replace>return 2</replace></edit>\n\n<commit_message>fix return value</commit_message>";

    #[test]
    fn test_plain_prose() {
        assert_eq!(whole("Hello there."), "Hello there.");
    }

    #[test]
    fn test_markdown_applied_at_flush() {
        assert_eq!(whole("Some **bold** text.\n\nNext"), "Some bold text.\n\nNext");
    }

    #[test]
    fn test_prose_waits_for_paragraph_boundary() {
        let mut r = renderer();
        assert_eq!(r.push("half a sent"), "");
        assert_eq!(strip_ansi(&r.push("ence.\n\nmore")), "half a sentence.\n\n");
        assert_eq!(strip_ansi(&r.finish()), "more");
    }

    #[test]
    fn test_unbalanced_delimiter_defers_flush() {
        let mut r = renderer();
        assert_eq!(r.push("a `code\n\n"), "");
        // both paragraphs flush together once the count is even again
        let out = strip_ansi(&r.push("span` b\n\nc"));
        assert_eq!(out, "a `code\n\nspan` b\n\n");
        assert_eq!(strip_ansi(&r.finish()), "c");
    }

    #[test]
    fn test_trailing_lt_is_held() {
        let mut r = renderer();
        r.push("x\n\n");
        assert_eq!(r.push("a <"), "");
        assert_eq!(r.pending(), "a <");
        let out = strip_ansi(&r.push("edit path=\"f\">"));
        assert_eq!(out, "a <edit path=\"f\">");
        assert_eq!(r.mode(), Mode::Directive(Tag::Edit));
    }

    #[test]
    fn test_non_tag_lt_is_released() {
        let mut r = renderer();
        r.push("a <");
        r.push("div");
        assert_eq!(r.mode(), Mode::Prose);
        assert_eq!(strip_ansi(&r.finish()), "a <div");
    }

    #[test]
    fn test_directive_mode_round_trip() {
        let mut r = renderer();
        let out = r.push("<shell>ls -la</shell>");
        assert_eq!(strip_ansi(&out), "<shell>ls -la</shell>");
        assert_eq!(r.mode(), Mode::Prose);
        // tag tokens are colorized, the command is not
        assert!(out.starts_with('\x1b'));
        assert!(out.contains("ls -la"));
    }

    #[test]
    fn test_directive_content_is_not_markdown() {
        let out = whole("<create path=\"a.md\">\n# **raw**\n</create>");
        assert_eq!(out, "<create path=\"a.md\">\n# **raw**\n</create>");
    }

    #[test]
    fn test_inner_tags_do_not_close_directive() {
        let mut r = renderer();
        r.push("<edit path=\"a\"><find>x</find>");
        assert_eq!(r.mode(), Mode::Directive(Tag::Edit));
        r.push("<replace>y</replace></edit>");
        assert_eq!(r.mode(), Mode::Prose);
    }

    #[test]
    fn test_fence_hides_backticks_and_shows_label() {
        let out = whole("Look:\n```rust\nfn main() {}\n```\nDone.");
        assert_eq!(out, "Look:\nrust\nfn main() {}\nDone.");
    }

    #[test]
    fn test_fence_content_is_not_markdown() {
        assert_eq!(whole("```\n**x** <edit>\n```\n"), "**x** <edit>\n");
    }

    #[test]
    fn test_fence_background_reapplied_per_line() {
        let mut r = renderer();
        let out = r.push("```\na\nb\n");
        let bg = SetBackgroundColor(Theme::dark().code_bg).to_string();
        assert_eq!(out.matches(&bg).count(), 2);
        assert_eq!(r.mode(), Mode::Fence);
    }

    #[test]
    fn test_backtick_run_at_line_start_is_held() {
        let mut r = renderer();
        r.push("text\n\n");
        assert_eq!(r.push("``"), "");
        r.push("`py\n");
        assert_eq!(r.mode(), Mode::Fence);
    }

    #[test]
    fn test_short_backtick_run_is_not_a_fence() {
        assert_eq!(whole("``not a fence``\n\nok"), "not a fence\n\nok");
    }

    #[test]
    fn test_finish_closes_unterminated_fence() {
        let mut r = renderer();
        let mut out = r.push("```\nlet x = 1;");
        out.push_str(&r.finish());
        assert!(out.ends_with(&ResetColor.to_string()));
        assert_eq!(strip_ansi(&out), "let x = 1;");
        assert_eq!(r.mode(), Mode::Prose);
    }

    #[test]
    fn test_finish_flushes_held_suffix() {
        let mut r = renderer();
        assert_eq!(r.push("x <req"), "");
        assert_eq!(strip_ansi(&r.finish()), "x <req");
    }

    #[test]
    fn test_scenario_reply() {
        let out = whole(REPLY);
        assert_eq!(
            out,
            "Sure.\n\n<edit path=\"app.py\"><find>return 1</find><replace>return 2</replace></edit>\n\n<commit_message>fix return value</commit_message>"
        );
    }

    #[test]
    fn test_fragmentation_invariance_scenario() {
        assert_invariant(REPLY);
    }

    #[test]
    fn test_fragmentation_invariance_mixed() {
        assert_invariant("# Plan\n\nI'll *fix* it:\n```sh\nls\n```\n<shell>ls</shell>\n\n- a\n- b");
        assert_invariant("a `b\n\nc` d <req\n\n``x``\n\n<drop_files>\nx.rs\n</drop_files>");
        assert_invariant("héllo <ünïcode> ✓\n\n**wide** `≠`");
    }

    #[test]
    fn test_inline_balanced() {
        assert!(inline_balanced("plain"));
        assert!(inline_balanced("a `b` **c** *d*"));
        assert!(!inline_balanced("a `b"));
        assert!(!inline_balanced("**open"));
        assert!(!inline_balanced("*open"));
        assert!(inline_balanced("* bullet\n* another"));
        assert!(inline_balanced("`a*b`"));
    }
}
