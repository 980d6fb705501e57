//! Human-facing terminal output.
//!
//! Pretty mode prefixes every line with a dimmed wall-clock timestamp and
//! colors warnings and errors. Raw mode prints messages untouched and never
//! draws spinners or progress bars, so output can be piped to other tools.

use std::fmt::Display;
use std::io::{self, IsTerminal, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use time::OffsetDateTime;
use time::macros::format_description;

use crate::cli::OutputFormat;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

#[derive(Clone)]
pub struct Terminal {
    format: OutputFormat,
    spinner: Arc<Mutex<Option<ProgressBar>>>,
}

impl Terminal {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            spinner: Arc::new(Mutex::new(None)),
        }
    }

    pub fn is_raw(&self) -> bool {
        self.format == OutputFormat::Raw
    }

    pub fn info(&self, message: impl Display) {
        self.log(Level::Info, message);
    }

    pub fn warn(&self, message: impl Display) {
        self.log(Level::Warn, message);
    }

    pub fn error(&self, message: impl Display) {
        self.log(Level::Error, message);
    }

    pub fn log(&self, level: Level, message: impl Display) {
        let line = format_line(self.format, level, &message.to_string(), &timestamp());
        self.emit(level, &line);
    }

    /// Prints a line exactly as given, without prefix or coloring.
    pub fn plain(&self, message: impl Display) {
        self.emit(Level::Info, &message.to_string());
    }

    /// Wraps `message` in red when pretty output is active.
    pub fn red(&self, message: &str) -> String {
        match self.format {
            OutputFormat::Pretty => style(message).red().to_string(),
            OutputFormat::Raw => message.to_string(),
        }
    }

    pub fn green(&self, message: &str) -> String {
        match self.format {
            OutputFormat::Pretty => style(message).green().to_string(),
            OutputFormat::Raw => message.to_string(),
        }
    }

    pub fn gray(&self, message: &str) -> String {
        match self.format {
            OutputFormat::Pretty => style(message).dim().to_string(),
            OutputFormat::Raw => message.to_string(),
        }
    }

    pub fn start_spinner(&self, message: &str) {
        if self.is_raw() || !io::stderr().is_terminal() {
            return;
        }
        let mut guard = lock(&self.spinner);
        if guard.is_some() {
            return;
        }
        let spinner = ProgressBar::new_spinner();
        if let Ok(template) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            spinner.set_style(template);
        }
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(80));
        *guard = Some(spinner);
    }

    pub fn stop_spinner(&self) {
        if let Some(spinner) = lock(&self.spinner).take() {
            spinner.finish_and_clear();
        }
    }

    /// Creates the determinate bar used while a bundle builds.
    pub fn progress_bar(&self, total: u64, template: &str) -> ProgressBar {
        if self.is_raw() {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::stderr());
        let style = ProgressStyle::with_template(template)
            .map(|style| style.progress_chars("=> "))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar
    }

    fn emit(&self, level: Level, line: &str) {
        let print = || match level {
            Level::Info => {
                let mut out = io::stdout().lock();
                let _ = writeln!(out, "{line}");
                let _ = out.flush();
            }
            Level::Warn | Level::Error => {
                let mut err = io::stderr().lock();
                let _ = writeln!(err, "{line}");
                let _ = err.flush();
            }
        };
        let guard = lock(&self.spinner);
        match guard.as_ref() {
            Some(spinner) => spinner.suspend(print),
            None => print(),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn timestamp() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_default()
}

pub(crate) fn format_line(format: OutputFormat, level: Level, message: &str, stamp: &str) -> String {
    match format {
        OutputFormat::Raw => message.to_string(),
        OutputFormat::Pretty => {
            let prefix = style(format!("[{stamp}]")).dim();
            match level {
                Level::Info => format!("{prefix} {message}"),
                Level::Warn => format!("{prefix} {}", style(message).yellow()),
                Level::Error => format!("{prefix} {message}"),
            }
        }
    }
}
