use std::io::Write as _;

use studio_harness::{Notification, StreamObserver};

/// How to bring the terminal from `shown` to `current`.
#[derive(Debug, PartialEq, Eq)]
pub enum Render<'a> {
    Nothing,
    /// Print only the new tail.
    Append(&'a str),
    /// The text was replaced (complete frame); print it whole on a new line.
    Replace(&'a str),
}

pub fn render<'a>(shown: &str, current: &'a str) -> Render<'a> {
    if current == shown {
        Render::Nothing
    } else if let Some(tail) = current.strip_prefix(shown) {
        Render::Append(tail)
    } else {
        Render::Replace(current)
    }
}

/// Writes a growing answer to stdout and problems to stderr.
#[derive(Default)]
pub struct TerminalPrinter {
    shown: String,
}

impl TerminalPrinter {
    pub fn show(&mut self, current: &str) {
        let mut out = std::io::stdout().lock();
        let _ = match render(&self.shown, current) {
            Render::Nothing => return,
            Render::Append(tail) => write!(out, "{tail}"),
            Render::Replace(text) => write!(out, "\n--- final answer ---\n{text}"),
        };
        let _ = out.flush();
        self.shown = current.to_string();
    }

    pub fn notify(&self, notification: &Notification) {
        match notification {
            Notification::UpstreamError { message } => eprintln!("\n[upstream error] {message}"),
            Notification::Transport { message } => {
                eprintln!("\n[connection lost, answer is partial] {message}")
            }
            Notification::Gateway { message } => eprintln!("\n[gateway error] {message}"),
            Notification::Cancelled => eprintln!("\n[cancelled]"),
        }
    }

    /// Ends the answer line and resets for the next one.
    pub fn finish(&mut self) {
        if !self.shown.is_empty() {
            println!();
        }
        self.shown.clear();
    }
}

impl StreamObserver for TerminalPrinter {
    fn on_update(&mut self, buffer: &str) {
        self.show(buffer);
    }

    fn on_upstream_error(&mut self, message: &str) {
        self.notify(&Notification::UpstreamError {
            message: message.to_string(),
        });
    }
}
