//! Markdown rendering for terminal output

use crossterm::style::{Attribute, ContentStyle, Stylize};
use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};

use crate::theme::{Theme, merge, paint};

/// Convert a chunk of markdown prose to an ANSI-styled string.
///
/// Markers are consumed (`**bold**` renders as bold text with no
/// asterisks). Whitespace before and after the chunk is kept verbatim so
/// that consecutive chunks line up exactly as they arrived.
pub fn render_markdown(text: &str, theme: &Theme) -> String {
    let body = text.trim();
    if body.is_empty() {
        return text.to_string();
    }

    let start = text.len() - text.trim_start().len();
    let end = start + body.len();

    let mut out = String::with_capacity(text.len() + 32);
    out.push_str(&text[..start]);
    out.push_str(&MarkdownWriter::new(theme).render(body));
    out.push_str(&text[end..]);
    out
}

struct MarkdownWriter<'t> {
    theme: &'t Theme,
    out: String,
    styles: Vec<ContentStyle>,
    /// One entry per open list: next number, or `None` for bullets
    lists: Vec<Option<u64>>,
    links: Vec<String>,
    quote_depth: usize,
    in_code_block: bool,
    pending_sep: Option<&'static str>,
}

impl<'t> MarkdownWriter<'t> {
    fn new(theme: &'t Theme) -> Self {
        Self {
            theme,
            out: String::new(),
            styles: Vec::new(),
            lists: Vec::new(),
            links: Vec::new(),
            quote_depth: 0,
            in_code_block: false,
            pending_sep: None,
        }
    }

    fn render(mut self, text: &str) -> String {
        let parser = Parser::new_ext(text, Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS);

        for event in parser {
            match event {
                Event::Start(tag) => self.start(tag),
                Event::End(tag) => self.end(tag),
                Event::Text(text) => {
                    self.begin_block();
                    if self.in_code_block {
                        self.write_code_block(&text);
                    } else {
                        self.write(&text);
                    }
                }
                Event::Code(code) => {
                    self.begin_block();
                    let style = merge(self.current(), self.theme.code_style());
                    self.out.push_str(&paint(style, &code));
                }
                Event::Html(html) | Event::InlineHtml(html) => {
                    self.begin_block();
                    self.out.push_str(&html);
                }
                Event::SoftBreak | Event::HardBreak => self.newline(),
                Event::Rule => {
                    self.begin_block();
                    self.out.push_str(&paint(self.theme.dim_style(), "────"));
                    self.pending_sep = Some(self.block_sep());
                }
                Event::TaskListMarker(done) => {
                    self.out.push_str(if done { "[x] " } else { "[ ] " });
                }
                _ => {}
            }
        }

        self.out
    }

    fn start(&mut self, tag: Tag) {
        match tag {
            Tag::Paragraph => self.begin_block(),
            Tag::Heading { level, .. } => {
                self.begin_block();
                let level = match level {
                    HeadingLevel::H1 => 1,
                    HeadingLevel::H2 => 2,
                    HeadingLevel::H3 => 3,
                    _ => 4,
                };
                self.styles.push(self.theme.heading_style(level));
            }
            Tag::BlockQuote { .. } => {
                self.begin_block();
                self.quote_depth += 1;
                self.out.push_str(&paint(self.theme.dim_style(), "│ "));
            }
            Tag::CodeBlock(_) => {
                self.begin_block();
                self.in_code_block = true;
            }
            Tag::List(first) => {
                if !self.lists.is_empty() {
                    self.newline();
                }
                self.begin_block();
                self.lists.push(first);
            }
            Tag::Item => {
                self.begin_block();
                let indent = "  ".repeat(self.lists.len().saturating_sub(1));
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{}{}. ", indent, n);
                        *n += 1;
                        marker
                    }
                    _ => format!("{}• ", indent),
                };
                self.out.push_str(&paint(self.theme.dim_style(), &marker));
            }
            Tag::Emphasis => self.push_style(ContentStyle::new().attribute(Attribute::Italic)),
            Tag::Strong => self.push_style(ContentStyle::new().attribute(Attribute::Bold)),
            Tag::Strikethrough => {
                self.push_style(ContentStyle::new().attribute(Attribute::CrossedOut))
            }
            Tag::Link { dest_url, .. } => {
                self.begin_block();
                self.push_style(self.theme.link_style());
                self.links.push(dest_url.to_string());
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => self.pending_sep = Some(self.block_sep()),
            TagEnd::Heading(_) => {
                self.styles.pop();
                self.pending_sep = Some(self.block_sep());
            }
            TagEnd::BlockQuote { .. } => {
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.pending_sep = Some(self.block_sep());
            }
            TagEnd::CodeBlock => {
                self.in_code_block = false;
                self.pending_sep = Some(self.block_sep());
            }
            TagEnd::List(_) => {
                self.lists.pop();
                self.pending_sep = Some(self.block_sep());
            }
            TagEnd::Item => self.pending_sep = Some("\n"),
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => {
                self.styles.pop();
            }
            TagEnd::Link => {
                self.styles.pop();
                if let Some(url) = self.links.pop().filter(|u| !u.is_empty()) {
                    let target = format!(" ({})", url);
                    self.out.push_str(&paint(self.theme.dim_style(), &target));
                }
            }
            _ => {}
        }
    }

    fn current(&self) -> ContentStyle {
        self.styles.last().copied().unwrap_or_default()
    }

    fn push_style(&mut self, style: ContentStyle) {
        let merged = merge(self.current(), style);
        self.styles.push(merged);
    }

    /// Separator owed after a block closes; list items sit one line apart.
    fn block_sep(&self) -> &'static str {
        if self.lists.is_empty() { "\n\n" } else { "\n" }
    }

    fn begin_block(&mut self) {
        if let Some(sep) = self.pending_sep.take() {
            self.out.push_str(sep);
            self.quote_prefix();
        }
    }

    fn newline(&mut self) {
        self.out.push('\n');
        self.quote_prefix();
    }

    fn quote_prefix(&mut self) {
        if self.quote_depth > 0 {
            let prefix = "│ ".repeat(self.quote_depth);
            self.out.push_str(&paint(self.theme.dim_style(), &prefix));
        }
    }

    fn write(&mut self, text: &str) {
        let style = self.current();
        if style == ContentStyle::default() {
            self.out.push_str(text);
        } else {
            self.out.push_str(&paint(style, text));
        }
    }

    fn write_code_block(&mut self, text: &str) {
        let style = self.theme.code_style().on(self.theme.code_bg);
        for (i, line) in text.split('\n').enumerate() {
            if i > 0 {
                self.out.push('\n');
            }
            if !line.is_empty() {
                self.out.push_str(&paint(style, line));
            }
        }
    }
}
