// THEORY:
// Background task plumbing shared by the attention monitor and the loop feed. Each
// background task is a named OS thread. Its resources are opened inside the thread
// through an `Opener`, so a missing camera or media file only ends that task; the
// error travels back through the join handle and is picked up by the dispatcher on
// its next tick.

use crate::core_modules::channels::StopSignal;
use crate::error::FocusError;
use std::fmt;
use std::thread::{self, JoinHandle};

/// Deferred construction of a resource, run on the task's own thread.
pub type Opener<T> = Box<dyn FnOnce() -> Result<T, FocusError> + Send>;

/// The two long-lived producers of a flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedKind {
    AttentionMonitor,
    LoopVideo,
}

impl FeedKind {
    pub fn name(&self) -> &'static str {
        match self {
            FeedKind::AttentionMonitor => "attention monitor",
            FeedKind::LoopVideo => "loop video",
        }
    }

    fn thread_name(&self) -> &'static str {
        match self {
            FeedKind::AttentionMonitor => "focus-monitor",
            FeedKind::LoopVideo => "focus-loop-video",
        }
    }
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Owner-side handle of a background task.
///
/// Dropping the handle raises the stop flag but does not wait for the thread.
pub struct TaskHandle {
    kind: FeedKind,
    stop: StopSignal,
    join: Option<JoinHandle<Result<(), FocusError>>>,
}

impl TaskHandle {
    pub(crate) fn spawn<F>(kind: FeedKind, stop: StopSignal, body: F) -> Result<Self, FocusError>
    where
        F: FnOnce() -> Result<(), FocusError> + Send + 'static,
    {
        let join = thread::Builder::new()
            .name(kind.thread_name().to_string())
            .spawn(body)
            .map_err(|e| FocusError::Spawn(kind.name(), e))?;
        Ok(Self {
            kind,
            stop,
            join: Some(join),
        })
    }

    pub fn kind(&self) -> FeedKind {
        self.kind
    }

    /// Asks the task to exit after its current iteration. Idempotent.
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Collects the task's result if it has exited.
    ///
    /// Returns `None` while the task is running, and after the result has
    /// already been collected once.
    pub fn reap(&mut self) -> Option<Result<(), FocusError>> {
        if !self.join.as_ref()?.is_finished() {
            return None;
        }
        let join = self.join.take()?;
        Some(Self::collect(self.kind, join))
    }

    /// Stops the task and waits for it to exit.
    pub fn join(mut self) -> Result<(), FocusError> {
        self.stop();
        match self.join.take() {
            Some(join) => Self::collect(self.kind, join),
            None => Ok(()),
        }
    }

    fn collect(kind: FeedKind, join: JoinHandle<Result<(), FocusError>>) -> Result<(), FocusError> {
        join.join()
            .unwrap_or_else(|_| Err(FocusError::TaskPanicked(kind.name())))
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.stop.stop();
    }
}
