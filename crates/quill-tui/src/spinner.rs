//! Animated progress indicator shown while waiting for the first fragment

use std::io::Write;
use std::time::Duration;

use crossterm::{
    cursor::MoveToColumn,
    queue,
    terminal::{Clear, ClearType},
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::theme::{Theme, paint};

/// Spinner animation frames
const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

const FRAME_INTERVAL: Duration = Duration::from_millis(80);

/// A spinner drawn on stderr by a background task.
///
/// Dropping the spinner stops the animation; [`Spinner::stop`] additionally
/// waits for the task and clears the line.
pub struct Spinner {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Spinner {
    /// Start animating `label`. Must be called inside a tokio runtime.
    pub fn start(label: &str, theme: &Theme) -> Self {
        let cancel = CancellationToken::new();
        let badge = paint(theme.badge_style(), &format!(" {} ", label));
        let style = theme.accent_style();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(FRAME_INTERVAL);
            let mut index = 0usize;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let frame = SPINNER_FRAMES[index % SPINNER_FRAMES.len()];
                        let mut err = std::io::stderr();
                        let _ = write!(err, "\r{} {} ", badge, paint(style, frame));
                        let _ = err.flush();
                        index += 1;
                    }
                }
            }
        });

        Self {
            cancel,
            handle: Some(handle),
        }
    }

    /// A spinner that draws nothing, for non-interactive output.
    pub fn disabled() -> Self {
        Self {
            cancel: CancellationToken::new(),
            handle: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some() && !self.cancel.is_cancelled()
    }

    /// Stop the animation and erase it.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
            let mut err = std::io::stderr();
            let _ = queue!(err, MoveToColumn(0), Clear(ClearType::CurrentLine));
            let _ = err.flush();
        }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
