//! Progress reporting for extraction runs.
//!
//! A run reports one percentage that never decreases. Each stage owns a
//! fixed sub-range, and 100 is reached only when the run succeeds.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crossbeam_channel::{Receiver, Sender};
use serde::Serialize;

use crate::error::Error;

/// Pipeline stage of an extraction run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Open,
    Text,
    Tables,
    Images,
    Finalize,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Open => "open",
            Stage::Text => "text",
            Stage::Tables => "tables",
            Stage::Images => "images",
            Stage::Finalize => "finalize",
        }
    }

    /// Percent range `[start, end]` this stage reports within.
    pub fn range(&self) -> (u8, u8) {
        match self {
            Stage::Open => (0, 5),
            Stage::Text => (5, 45),
            Stage::Tables => (45, 75),
            Stage::Images => (75, 95),
            Stage::Finalize => (95, 100),
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status flag of a progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Processing,
    Completed,
    Failed,
}

/// A single progress update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub stage: Stage,
    pub message: String,
    /// Overall completion, 0 to 100
    pub percent: u8,
    pub status: Status,
    /// Set only on a failed run
    pub error: Option<String>,
}

/// Receives progress events from a run.
///
/// Events may be delivered from worker threads, but never concurrently.
pub trait ProgressSink: Send + Sync {
    fn report(&self, event: &ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn report(&self, event: &ProgressEvent) {
        self(event)
    }
}

/// Discards all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn report(&self, _event: &ProgressEvent) {}
}

/// Forwards events to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn report(&self, event: &ProgressEvent) {
        match &event.error {
            Some(error) => log::error!("[{:>3}%] {}: {} ({})", event.percent, event.stage, event.message, error),
            None => log::info!("[{:>3}%] {}: {}", event.percent, event.stage, event.message),
        }
    }
}

/// Sends events over a channel for consumption on another thread.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<ProgressEvent>,
}

impl ChannelSink {
    pub fn new(tx: Sender<ProgressEvent>) -> Self {
        Self { tx }
    }

    /// A sink with an unbounded channel and its receiving end.
    pub fn unbounded() -> (Self, Receiver<ProgressEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelSink {
    fn report(&self, event: &ProgressEvent) {
        // A dropped receiver only means nobody is listening
        let _ = self.tx.send(event.clone());
    }
}

/// Maps stage-local progress onto the overall percentage.
pub(crate) struct ProgressTracker<'a> {
    sink: Option<&'a dyn ProgressSink>,
    last: Mutex<u8>,
    pages_done: AtomicUsize,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(sink: Option<&'a dyn ProgressSink>) -> Self {
        Self {
            sink,
            last: Mutex::new(0),
            pages_done: AtomicUsize::new(0),
        }
    }

    /// Enter a stage.
    pub fn begin(&self, stage: Stage, message: impl Into<String>) {
        self.pages_done.store(0, Ordering::SeqCst);
        log::info!("Stage '{}' started", stage);
        self.emit(stage, message.into(), stage.range().0, Status::Processing, None);
    }

    /// Record one finished page of a stage that processes `total` pages.
    pub fn page_done(&self, stage: Stage, page: u32, total: u32) {
        let done = self.pages_done.fetch_add(1, Ordering::SeqCst) + 1;
        let percent = Self::scale(stage, done, total as usize);
        self.emit(stage, format!("Page {} of {} done", page, total), percent, Status::Processing, None);
    }

    /// Mark a stage as finished.
    pub fn finish(&self, stage: Stage, message: impl Into<String>) {
        let (_, end) = stage.range();
        // The last stage ends at 100 only through `complete`
        let percent = if end == 100 { 99 } else { end };
        self.emit(stage, message.into(), percent, Status::Processing, None);
    }

    /// Report successful completion of the run.
    pub fn complete(&self, message: impl Into<String>) {
        self.emit(Stage::Finalize, message.into(), 100, Status::Completed, None);
    }

    /// Report a fatal error and hand it back for propagation.
    pub fn fail(&self, stage: Stage, error: Error) -> Error {
        log::error!("Stage '{}' failed: {}", stage, error);
        let percent = self.last.lock().map(|last| *last).unwrap_or(0);
        self.emit(
            stage,
            format!("Extraction failed during {}", stage),
            percent,
            Status::Failed,
            Some(error.to_string()),
        );
        error
    }

    fn scale(stage: Stage, done: usize, total: usize) -> u8 {
        let (start, end) = stage.range();
        if total == 0 {
            return start;
        }
        let span = (end - start) as usize;
        let offset = (span * done.min(total)) / total;
        // Page progress never claims the end of the final stage
        (start as usize + offset).min(99) as u8
    }

    fn emit(&self, stage: Stage, message: String, percent: u8, status: Status, error: Option<String>) {
        let Some(sink) = self.sink else {
            return;
        };
        // Hold the lock while reporting so that events arrive in order
        let mut last = match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let percent = percent.max(*last);
        *last = percent;
        sink.report(&ProgressEvent {
            stage,
            message,
            percent,
            status,
            error,
        });
    }
}
