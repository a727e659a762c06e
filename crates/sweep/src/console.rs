//! Terminal output: colored report lines above a single progress line.

use colored::{ColoredString, Colorize};
use indicatif::style::TemplateError;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// Plain information.
    Info,
    /// Warnings and skipped accounts.
    Notice,
    /// Destructive actions (or what would have been one).
    Action,
    Failure,
    Header,
    Stop,
    Good,
}

impl Tone {
    fn paint(self, text: &str) -> ColoredString {
        match self {
            Tone::Info => text.white(),
            Tone::Notice => text.yellow(),
            Tone::Action => text.bright_green().bold(),
            Tone::Failure => text.red(),
            Tone::Header => text.white().bold(),
            Tone::Stop => text.bright_red().bold(),
            Tone::Good => text.green(),
        }
    }
}

const PROGRESS_TEMPLATE: &str = "{msg:30}: {percent:>3}%|{bar:20}| {pos}/{len} [{elapsed}<{eta}]";

fn progress_style() -> Result<ProgressStyle, TemplateError> {
    Ok(ProgressStyle::with_template(PROGRESS_TEMPLATE)?.progress_chars("█▉▊▋▌▍▎▏ "))
}

/// Where the sweep reports to.
///
/// Report lines go to stdout; the progress bar draws on stderr and hides
/// itself when stderr is not a terminal. Silent consoles swallow everything.
#[derive(Debug)]
pub struct Console {
    enabled: bool,
    bar: Option<ProgressBar>,
}

impl Console {
    pub fn terminal() -> Self {
        Self {
            enabled: true,
            bar: None,
        }
    }

    pub fn silent() -> Self {
        Self {
            enabled: false,
            bar: None,
        }
    }

    pub fn say(&mut self, tone: Tone, message: &str) {
        if !self.enabled {
            return;
        }
        let line = tone.paint(message);
        match &self.bar {
            Some(bar) => bar.suspend(|| println!("{}", line)),
            None => println!("{}", line),
        }
    }

    pub fn start_progress(&mut self, total: usize) {
        let bar = if self.enabled {
            ProgressBar::new(total as u64)
        } else {
            ProgressBar::hidden()
        };
        match progress_style() {
            Ok(style) => bar.set_style(style),
            Err(e) => debug!("Progress template rejected: {}", e),
        }
        self.bar = Some(bar);
    }

    pub fn progress_to(&mut self, position: usize, label: &str) {
        if let Some(bar) = &self.bar {
            bar.set_position(position as u64);
            bar.set_message(label.to_string());
        }
    }

    pub fn finish_progress(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish();
        }
    }
}
