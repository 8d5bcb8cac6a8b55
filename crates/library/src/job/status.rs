use crate::reconcile::ScanMode;
use serde::Serialize;

/// Reply to a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanStarted {
    /// `false` if a pass was already running; nothing changed then.
    pub started: bool,
    /// Mode of the pass that is now running, which is the earlier pass's
    /// mode when `started` is `false`.
    pub mode: ScanMode,
}

/// Point-in-time snapshot of the scan job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanStatus {
    pub running: bool,
    /// The most recent pass ran to the end.
    pub completed: bool,
    /// Percentage of titles processed, 0 to 100.
    pub progress: u8,
    pub message: String,
    /// Titles processed so far.
    pub done: u64,
    /// Titles discovered under the content root.
    pub total: u64,
    /// Mode of the current or most recent pass.
    pub mode: Option<ScanMode>,
    /// Errors reported by the current or most recent pass.
    pub errors: u64,
    /// Unix timestamps, in seconds.
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
}
impl ScanStatus {
    pub(crate) fn starting(mode: ScanMode, now: i64) -> Self {
        Self {
            running: true,
            message: "Starting scan".to_string(),
            mode: Some(mode),
            started_at: Some(now),
            ..Self::default()
        }
    }

    pub(crate) fn title_done(&mut self) {
        self.done += 1;
        if self.total > 0 {
            let percent = (self.done.min(self.total) * 100) / self.total;
            self.progress = u8::try_from(percent).unwrap_or(100);
        }
    }

    pub(crate) fn finish(&mut self, outcome: &Outcome, now: i64) {
        self.running = false;
        self.message = outcome.message();
        self.finished_at = Some(now);
        self.completed = matches!(outcome, Outcome::Complete);
        if self.completed {
            self.progress = 100;
        }
    }
}

/// How a pass ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Outcome {
    Complete,
    NotFound,
    Cancelled,
    Failed(String),
}
impl Outcome {
    pub(crate) fn message(&self) -> String {
        match self {
            Outcome::Complete => "Scan complete".to_string(),
            Outcome::NotFound => "Library not found".to_string(),
            Outcome::Cancelled => "Scan cancelled".to_string(),
            Outcome::Failed(reason) => format!("Scan failed: {reason}"),
        }
    }
}
