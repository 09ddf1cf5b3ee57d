//! Color theme support

use crossterm::style::{Attribute, Color, ContentStyle, Stylize};

use crate::tags::Tag;

/// Color theme for streamed output
#[derive(Debug, Clone)]
pub struct Theme {
    /// Primary text color
    pub fg: Color,
    /// Dimmed/secondary text
    pub dim: Color,
    /// Accent color (headings, prompts)
    pub accent: Color,
    /// Error color
    pub error: Color,
    /// Success color
    pub success: Color,
    /// Warning color
    pub warning: Color,
    /// Inline code color
    pub code: Color,
    /// Fenced code block background
    pub code_bg: Color,
    /// Link color
    pub link: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}

impl Theme {
    /// Dark theme (default)
    pub fn dark() -> Self {
        Self {
            fg: Color::White,
            dim: Color::DarkGrey,
            accent: Color::Cyan,
            error: Color::Red,
            success: Color::Green,
            warning: Color::Yellow,
            code: Color::Magenta,
            code_bg: Color::AnsiValue(236),
            link: Color::Blue,
        }
    }

    /// Light theme
    pub fn light() -> Self {
        Self {
            fg: Color::Black,
            dim: Color::Grey,
            accent: Color::DarkBlue,
            error: Color::DarkRed,
            success: Color::DarkGreen,
            warning: Color::Rgb {
                r: 180,
                g: 120,
                b: 0,
            },
            code: Color::DarkMagenta,
            code_bg: Color::AnsiValue(254),
            link: Color::DarkBlue,
        }
    }

    /// Get dimmed style
    pub fn dim_style(&self) -> ContentStyle {
        ContentStyle::new().with(self.dim)
    }

    /// Get accent style
    pub fn accent_style(&self) -> ContentStyle {
        ContentStyle::new().with(self.accent)
    }

    /// Get bold accent style
    pub fn accent_bold(&self) -> ContentStyle {
        self.accent_style().attribute(Attribute::Bold)
    }

    /// Get error style
    pub fn error_style(&self) -> ContentStyle {
        ContentStyle::new().with(self.error)
    }

    /// Get success style
    pub fn success_style(&self) -> ContentStyle {
        ContentStyle::new().with(self.success)
    }

    /// Get warning style
    pub fn warning_style(&self) -> ContentStyle {
        ContentStyle::new().with(self.warning)
    }

    /// Get inline code style
    pub fn code_style(&self) -> ContentStyle {
        ContentStyle::new().with(self.code).attribute(Attribute::Bold)
    }

    /// Get link style
    pub fn link_style(&self) -> ContentStyle {
        ContentStyle::new()
            .with(self.link)
            .attribute(Attribute::Underlined)
    }

    /// Heading style by level; levels past 3 share the last style
    pub fn heading_style(&self, level: u8) -> ContentStyle {
        match level {
            1 => self
                .accent_style()
                .attribute(Attribute::Bold)
                .attribute(Attribute::Underlined),
            2 => self.accent_bold(),
            3 => ContentStyle::new().with(self.fg).attribute(Attribute::Bold),
            _ => ContentStyle::new().attribute(Attribute::Bold),
        }
    }

    /// Fixed colors for directive tag tokens
    pub fn tag_style(&self, tag: Tag) -> ContentStyle {
        let (bg, fg) = match tag {
            Tag::Shell | Tag::Bash => (Color::DarkCyan, Color::Black),
            Tag::Find => (Color::DarkRed, Color::White),
            Tag::Replace => (Color::DarkGreen, Color::Black),
            Tag::CommitMessage => (Color::DarkBlue, Color::White),
            Tag::RequestFiles | Tag::DropFiles | Tag::DetailMap => {
                (Color::DarkMagenta, Color::White)
            }
            Tag::Edit | Tag::Create => (Color::DarkYellow, Color::Black),
        };
        ContentStyle::new().with(fg).on(bg)
    }

    /// Style for an added diff line
    pub fn diff_added(&self) -> ContentStyle {
        self.success_style()
    }

    /// Style for a removed diff line
    pub fn diff_removed(&self) -> ContentStyle {
        self.error_style()
    }

    /// Reverse-video label, used for banners and the reply marker
    pub fn badge_style(&self) -> ContentStyle {
        ContentStyle::new().with(Color::Black).on(Color::Grey)
    }
}

/// Render `text` in `style` as an ANSI string.
pub fn paint(style: ContentStyle, text: &str) -> String {
    style.apply(text).to_string()
}

/// Overlay `top` onto `base`: colors in `top` win, attributes accumulate.
pub fn merge(base: ContentStyle, top: ContentStyle) -> ContentStyle {
    const ATTRS: [Attribute; 6] = [
        Attribute::Bold,
        Attribute::Dim,
        Attribute::Italic,
        Attribute::Underlined,
        Attribute::CrossedOut,
        Attribute::Reverse,
    ];

    let mut out = base;
    if top.foreground_color.is_some() {
        out.foreground_color = top.foreground_color;
    }
    if top.background_color.is_some() {
        out.background_color = top.background_color;
    }
    for attr in ATTRS {
        if top.attributes.has(attr) {
            out.attributes.set(attr);
        }
    }
    out
}
