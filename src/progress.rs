//! Build progress for the JavaScript bundle.
//!
//! [`BuildProgress`] is the bookkeeping: it moves `absent → active → complete
//! → absent` and reports how many ticks each transition advances. The
//! [`ProjectLogSink`] drives an `indicatif` bar from those numbers and prints
//! every other record through the severity dispatcher.

use std::sync::Mutex;
use std::time::Instant;

use indicatif::ProgressBar;

use crate::error::XdlError;
use crate::logs::{LogEvent, LogObserver, log_with_level};
use crate::term::Terminal;

pub const TOTAL_TICKS: u64 = 100;
const BAR_TEMPLATE: &str = "Building JavaScript bundle [{bar:64}] {percent}%";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressState {
    Absent,
    Active { current: u64 },
    Complete,
}

#[derive(Debug)]
pub struct BuildProgress {
    state: ProgressState,
}

impl Default for BuildProgress {
    fn default() -> Self {
        Self {
            state: ProgressState::Absent,
        }
    }
}

impl BuildProgress {
    pub fn state(&self) -> ProgressState {
        self.state
    }

    /// Returns false when a build is already being tracked; the running one is kept.
    pub fn start(&mut self) -> bool {
        match self.state {
            ProgressState::Absent => {
                self.state = ProgressState::Active { current: 0 };
                true
            }
            ProgressState::Active { .. } | ProgressState::Complete => false,
        }
    }

    /// Moves to `percent` and returns the ticks advanced. Never goes backwards.
    pub fn advance_to(&mut self, percent: u8) -> u64 {
        let ProgressState::Active { current } = self.state else {
            return 0;
        };
        let target = u64::from(percent).min(TOTAL_TICKS);
        if target <= current {
            return 0;
        }
        self.state = if target == TOTAL_TICKS {
            ProgressState::Complete
        } else {
            ProgressState::Active { current: target }
        };
        target - current
    }

    /// Forces completion and tears down. `None` if nothing was being tracked.
    pub fn finish(&mut self) -> Option<u64> {
        let remaining = match self.state {
            ProgressState::Absent => return None,
            ProgressState::Active { current } => TOTAL_TICKS - current,
            ProgressState::Complete => 0,
        };
        self.state = ProgressState::Absent;
        Some(remaining)
    }
}

struct Tracker {
    progress: BuildProgress,
    bar: Option<ProgressBar>,
    started: Option<Instant>,
}

/// Observer attached to a project directory while a command runs.
pub struct ProjectLogSink {
    term: Terminal,
    tracker: Mutex<Tracker>,
}

impl ProjectLogSink {
    pub fn new(term: Terminal) -> Self {
        Self {
            term,
            tracker: Mutex::new(Tracker {
                progress: BuildProgress::default(),
                bar: None,
                started: None,
            }),
        }
    }

    fn on_build_started(&self, tracker: &mut Tracker) {
        if !tracker.progress.start() {
            tracing::debug!("bundle build started while another is in progress; ignoring");
            return;
        }
        tracker.bar = Some(self.term.progress_bar(TOTAL_TICKS, BAR_TEMPLATE));
        tracker.started = Some(Instant::now());
    }

    fn on_build_progress(&self, tracker: &mut Tracker, percent: u8) {
        let ticks = tracker.progress.advance_to(percent);
        if ticks == 0 {
            return;
        }
        if let Some(bar) = &tracker.bar {
            bar.inc(ticks);
        }
    }

    fn on_build_finished(
        &self,
        tracker: &mut Tracker,
        error: Option<&str>,
        duration_ms: Option<u64>,
    ) {
        let Some(remaining) = tracker.progress.finish() else {
            return;
        };
        if let Some(bar) = tracker.bar.take() {
            bar.inc(remaining);
            bar.finish_and_clear();
        }
        let elapsed = duration_ms.unwrap_or_else(|| {
            tracker
                .started
                .map(|started| started.elapsed().as_millis() as u64)
                .unwrap_or_default()
        });
        tracker.started = None;
        match error {
            Some(reason) => self.term.info(self.term.red(&format!(
                "Failed building JavaScript bundle: {reason} ({elapsed}ms)."
            ))),
            None => self.term.info(self.term.green(&format!(
                "Finished building JavaScript bundle in {elapsed}ms."
            ))),
        }
    }

    #[cfg(test)]
    fn state(&self) -> ProgressState {
        lock(&self.tracker).progress.state()
    }

    #[cfg(test)]
    fn bar_position(&self) -> Option<u64> {
        lock(&self.tracker).bar.as_ref().map(ProgressBar::position)
    }
}

impl LogObserver for ProjectLogSink {
    fn next(&self, event: &LogEvent) {
        let mut tracker = lock(&self.tracker);
        match event {
            LogEvent::BuildStarted => self.on_build_started(&mut tracker),
            LogEvent::BuildProgress { percent } => self.on_build_progress(&mut tracker, *percent),
            LogEvent::BuildFinished { error, duration_ms } => {
                self.on_build_finished(&mut tracker, error.as_deref(), *duration_ms)
            }
            LogEvent::Record(record) => {
                let bar = tracker.bar.clone();
                drop(tracker);
                match bar {
                    Some(bar) => bar.suspend(|| log_with_level(&self.term, record)),
                    None => log_with_level(&self.term, record),
                }
            }
        }
    }

    fn error(&self, error: &XdlError) {
        // The action boundary reports the failure itself; only drop the bar here.
        tracing::debug!(code = %error.code, "project log stream failed");
        self.complete();
    }

    fn complete(&self) {
        let mut tracker = lock(&self.tracker);
        if let Some(bar) = tracker.bar.take() {
            bar.finish_and_clear();
        }
        tracker.progress = BuildProgress::default();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::OutputFormat;
    use crate::logs::LogRecord;

    #[test]
    fn ticks_sum_to_last_percentage() {
        let mut progress = BuildProgress::default();
        assert!(progress.start());
        let total: u64 = [5u8, 20, 47, 80].iter().map(|p| progress.advance_to(*p)).sum();
        assert_eq!(total, 80);
        assert_eq!(progress.state(), ProgressState::Active { current: 80 });
    }

    #[test]
    fn progress_never_decreases() {
        let mut progress = BuildProgress::default();
        progress.start();
        assert_eq!(progress.advance_to(40), 40);
        assert_eq!(progress.advance_to(30), 0);
        assert_eq!(progress.advance_to(40), 0);
        assert_eq!(progress.advance_to(41), 1);
    }

    #[test]
    fn percentages_are_clamped_to_complete() {
        let mut progress = BuildProgress::default();
        progress.start();
        assert_eq!(progress.advance_to(250), 100);
        assert_eq!(progress.state(), ProgressState::Complete);
        assert_eq!(progress.advance_to(100), 0);
    }

    #[test]
    fn finish_forces_remaining_ticks() {
        let mut progress = BuildProgress::default();
        progress.start();
        progress.advance_to(35);
        assert_eq!(progress.finish(), Some(65));
        assert_eq!(progress.state(), ProgressState::Absent);

        progress.start();
        progress.advance_to(100);
        assert_eq!(progress.finish(), Some(0));
        assert_eq!(progress.finish(), None);
    }

    #[test]
    fn ticks_without_a_build_are_ignored() {
        let mut progress = BuildProgress::default();
        assert_eq!(progress.advance_to(50), 0);
        assert_eq!(progress.state(), ProgressState::Absent);
    }

    #[test]
    fn second_start_keeps_the_running_build() {
        let mut progress = BuildProgress::default();
        assert!(progress.start());
        progress.advance_to(60);
        assert!(!progress.start());
        assert_eq!(progress.state(), ProgressState::Active { current: 60 });
    }

    #[test]
    fn sink_drives_the_bar_to_exactly_full() {
        let sink = ProjectLogSink::new(Terminal::new(OutputFormat::Raw));
        sink.next(&LogEvent::BuildStarted);
        sink.next(&LogEvent::BuildProgress { percent: 10 });
        sink.next(&LogEvent::BuildProgress { percent: 55 });
        sink.next(&LogEvent::BuildProgress { percent: 30 });
        assert_eq!(sink.bar_position(), Some(55));

        sink.next(&LogEvent::BuildFinished {
            error: None,
            duration_ms: Some(1200),
        });
        assert_eq!(sink.state(), ProgressState::Absent);
        assert_eq!(sink.bar_position(), None);
    }

    #[test]
    fn records_during_a_build_leave_the_bar_in_place() {
        let sink = ProjectLogSink::new(Terminal::new(OutputFormat::Raw));
        sink.next(&LogEvent::BuildStarted);
        sink.next(&LogEvent::BuildProgress { percent: 30 });
        sink.next(&LogEvent::Record(LogRecord::info("Resolving modules")));
        assert_eq!(sink.bar_position(), Some(30));
        assert_eq!(sink.state(), ProgressState::Active { current: 30 });
    }

    #[test]
    fn completion_tears_down_an_unfinished_build() {
        let sink = ProjectLogSink::new(Terminal::new(OutputFormat::Raw));
        sink.next(&LogEvent::BuildStarted);
        sink.next(&LogEvent::BuildProgress { percent: 10 });
        sink.complete();
        assert_eq!(sink.state(), ProgressState::Absent);
    }
}
