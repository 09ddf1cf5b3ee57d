//! Line-oriented terminal I/O: banner, prompts, window title and stdin.

use std::io::{self, BufRead, IsTerminal, Write};

use crossterm::{execute, terminal::SetTitle};
use quill_tui::Theme;
use quill_tui::theme::paint;

const APP_NAME: &str = "quill";

/// Window title state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Waiting,
    Working,
}

impl Activity {
    fn title(self) -> String {
        match self {
            Activity::Waiting => format!("❓ {}", APP_NAME),
            Activity::Working => format!("⏳ {}", APP_NAME),
        }
    }
}

/// Terminal front end; styling is dropped when stdout is not a terminal.
#[derive(Debug, Clone)]
pub struct Ui {
    theme: Theme,
    plain: bool,
}

impl Ui {
    pub fn new(theme: Theme) -> Self {
        Self {
            theme,
            plain: !io::stdout().is_terminal(),
        }
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn is_plain(&self) -> bool {
        self.plain
    }

    /// Style `text`, or leave it alone in plain mode.
    pub fn paint(&self, style: crossterm::style::ContentStyle, text: &str) -> String {
        if self.plain {
            text.to_string()
        } else {
            paint(style, text)
        }
    }

    pub fn banner(&self, model: &str) -> String {
        let badge = |text: &str| self.paint(self.theme.badge_style(), &format!(" {} ", text));
        format!(
            "{} {} {}",
            badge(&format!("{} v{}", APP_NAME, env!("CARGO_PKG_VERSION"))),
            badge(model),
            badge("ctrl+d to send")
        )
    }

    pub fn set_activity(&self, activity: Activity) {
        if self.plain {
            return;
        }
        let _ = execute!(io::stdout(), SetTitle(activity.title()));
    }

    /// Print the request prompt (with a bell in interactive mode).
    pub fn prompt(&self) {
        let mut out = io::stdout();
        if self.plain {
            let _ = write!(out, "> ");
        } else {
            let _ = write!(out, "\x07{}", paint(self.theme.accent_bold(), "> "));
        }
        let _ = out.flush();
    }

    pub fn println(&self, text: &str) {
        println!("{}", text);
    }
}

/// Read one request: every line until end of input (Ctrl-D).
///
/// Returns `None` when input ended before any line was read.
pub async fn read_request() -> io::Result<Option<String>> {
    tokio::task::spawn_blocking(|| collect_request(io::stdin().lock()))
        .await
        .map_err(io::Error::other)?
}

fn collect_request(mut reader: impl BufRead) -> io::Result<Option<String>> {
    let mut lines = Vec::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        lines.push(line.trim_end_matches(['\n', '\r']).to_string());
    }
    if lines.is_empty() {
        return Ok(None);
    }
    Ok(Some(lines.join("\n")))
}

/// Print `prompt` and read a single answer line, lowercased and trimmed.
///
/// End of input yields an empty answer.
pub async fn ask(prompt: &str) -> String {
    let prompt = prompt.to_string();
    let answer = tokio::task::spawn_blocking(move || {
        let mut out = io::stdout();
        let _ = write!(out, "{}", prompt);
        let _ = out.flush();
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line).map(|_| line)
    })
    .await;

    match answer {
        Ok(Ok(line)) => line.trim().to_lowercase(),
        _ => String::new(),
    }
}
