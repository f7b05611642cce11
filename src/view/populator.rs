//! IncrementalPopulator: fills the row cache outward from a focus row.
//!
//! A population runs on one background thread and walks two cursors away
//! from the start row, one row per direction per step, pausing between
//! steps. It is cancelled cooperatively through a `CancellationToken`; a
//! new `start` cancels the running population and joins it (bounded by
//! `PopulatorConfig::stop_timeout_ms`) before the next one begins, so two
//! cursors never write the same cache concurrently.

use bytes::Bytes;
use std::sync::atomic::{AtomicIsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::config::PopulatorConfig;
use crate::core::row::Row;
use crate::error::{MemViewError, Result};
use crate::view::cache::RowCache;

/// How a population run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopulationOutcome {
    /// Both cursors left the view.
    Completed,
    /// Stopped before covering the view; not an error.
    Cancelled,
    /// Nothing could be populated (empty or unreadable range).
    Failed(String),
}

/// Notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopulationEvent {
    RowReady { generation: u64, row: usize },
    Finished { generation: u64, outcome: PopulationOutcome },
}

/// Snapshot of a population frontier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopulationCursor {
    pub generation: u64,
    pub start_row: usize,
    /// Next row the backward cursor visits; -1 once exhausted.
    pub back_row: isize,
    /// Next row the forward cursor visits; the row count once exhausted.
    pub forward_row: isize,
    pub active: bool,
}

/// Cooperative cancellation flag that can also interrupt a pause.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap_or_else(|e| e.into_inner()) = true;
        cvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Pause for `duration` or until cancelled. Returns true if cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        let (guard, _) = cvar
            .wait_timeout_while(guard, duration, |cancelled| !*cancelled)
            .unwrap_or_else(|e| e.into_inner());
        *guard
    }
}

/// Work description for one population run.
#[derive(Debug, Clone)]
pub struct PopulationJob {
    pub cache: Arc<RowCache>,
    /// Resolved range bytes.
    pub data: Bytes,
    /// Full range size, resolved or not.
    pub size: usize,
    pub start_row: usize,
}

#[derive(Debug, Default)]
struct CursorState {
    back: AtomicIsize,
    forward: AtomicIsize,
}

struct ActivePopulation {
    generation: u64,
    start_row: usize,
    token: CancellationToken,
    cursor: Arc<CursorState>,
    done: Receiver<PopulationOutcome>,
    handle: JoinHandle<()>,
}

/// Owner of the (at most one) running population of a view.
pub struct IncrementalPopulator {
    config: PopulatorConfig,
    generation: u64,
    active: Option<ActivePopulation>,
    last_outcome: Option<PopulationOutcome>,
    events: Option<Sender<PopulationEvent>>,
}

impl IncrementalPopulator {
    pub fn new(config: PopulatorConfig) -> Self {
        Self {
            config,
            generation: 0,
            active: None,
            last_outcome: None,
            events: None,
        }
    }

    /// Route events of later runs to `events`.
    pub fn set_events(&mut self, events: Option<Sender<PopulationEvent>>) {
        self.events = events;
    }

    /// Generation of the most recently started run (0 before the first).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn last_outcome(&self) -> Option<&PopulationOutcome> {
        self.last_outcome.as_ref()
    }

    /// True while a worker is still running.
    pub fn is_active(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|a| !a.handle.is_finished())
    }

    pub fn cursor(&self) -> Option<PopulationCursor> {
        self.active.as_ref().map(|a| PopulationCursor {
            generation: a.generation,
            start_row: a.start_row,
            back_row: a.cursor.back.load(Ordering::Acquire),
            forward_row: a.cursor.forward.load(Ordering::Acquire),
            active: !a.handle.is_finished(),
        })
    }

    /// Stop any running population, wait for it, then start `job`.
    ///
    /// Returns the new generation. If the previous worker does not stop within
    /// the configured bound, nothing is started and `Timeout` is returned.
    pub fn start(&mut self, job: PopulationJob) -> Result<u64> {
        self.halt()?;

        self.generation += 1;
        let generation = self.generation;
        let token = CancellationToken::new();
        let cursor = Arc::new(CursorState {
            back: AtomicIsize::new(job.start_row as isize),
            forward: AtomicIsize::new(job.start_row as isize),
        });
        let (done_tx, done_rx) = mpsc::channel();
        let step = self.config.step_interval();
        let events = self.events.clone();
        let start_row = job.start_row;

        let worker_token = token.clone();
        let worker_cursor = Arc::clone(&cursor);
        let handle = std::thread::Builder::new()
            .name("memview-populate".to_string())
            .spawn(move || {
                let outcome = run_population(
                    &job,
                    &worker_token,
                    &worker_cursor,
                    step,
                    |row| {
                        if let Some(tx) = &events {
                            let _ = tx.send(PopulationEvent::RowReady { generation, row });
                        }
                    },
                );
                debug!(generation, ?outcome, "Population finished");
                if let Some(tx) = &events {
                    let _ = tx.send(PopulationEvent::Finished {
                        generation,
                        outcome: outcome.clone(),
                    });
                }
                let _ = done_tx.send(outcome);
            })?;

        debug!(generation, start_row, "Population started");
        self.active = Some(ActivePopulation {
            generation,
            start_row,
            token,
            cursor,
            done: done_rx,
            handle,
        });
        Ok(generation)
    }

    /// Request the running population to stop. Does not wait.
    pub fn stop(&mut self) {
        if let Some(active) = &self.active {
            active.token.cancel();
        }
    }

    /// Stop the running population and wait for it, bounded by the
    /// configured stop timeout.
    pub fn halt(&mut self) -> Result<Option<PopulationOutcome>> {
        if self.active.is_none() {
            return Ok(None);
        }
        self.stop();
        self.wait(self.config.stop_timeout()).map(Some)
    }

    /// Wait up to `timeout` for the running population to end.
    ///
    /// With no population running, returns the last outcome (or `Completed`
    /// if none ever ran).
    pub fn wait(&mut self, timeout: Duration) -> Result<PopulationOutcome> {
        let Some(active) = self.active.take() else {
            return Ok(self
                .last_outcome
                .clone()
                .unwrap_or(PopulationOutcome::Completed));
        };
        let outcome = match active.done.recv_timeout(timeout) {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    generation = active.generation,
                    timeout_ms = timeout.as_millis() as u64,
                    "Population did not finish in time"
                );
                self.active = Some(active);
                return Err(MemViewError::Timeout {
                    what: "population",
                    millis: timeout.as_millis() as u64,
                });
            }
            Err(RecvTimeoutError::Disconnected) => {
                PopulationOutcome::Failed("population worker panicked".to_string())
            }
        };
        if active.handle.join().is_err() {
            warn!(generation = active.generation, "Population worker panicked");
        }
        self.last_outcome = Some(outcome.clone());
        Ok(outcome)
    }
}

impl Drop for IncrementalPopulator {
    fn drop(&mut self) {
        if let Err(e) = self.halt() {
            warn!(error = %e, "Population still running on drop");
        }
    }
}

/// The population walk. `on_ready` is called for each newly populated row.
fn run_population<F: Fn(usize)>(
    job: &PopulationJob,
    token: &CancellationToken,
    cursor: &CursorState,
    step: Duration,
    on_ready: F,
) -> PopulationOutcome {
    let total = job.cache.len() as isize;
    if total == 0 || job.data.is_empty() {
        return PopulationOutcome::Failed("range has no resolved bytes".to_string());
    }
    let start = (job.start_row as isize).min(total - 1);
    let base = job.cache.base();
    let mut back = start;
    let mut forward = start;
    // cleared once the forward cursor runs past the resolved bytes
    let mut forward_open = true;

    let populate = |row: isize| -> std::result::Result<bool, MemViewError> {
        let row = row as usize;
        let ready = job
            .cache
            .populate_with(row, || Row::resolve(row, base, job.size, &job.data))?;
        if ready {
            trace!(row, "row populated");
            on_ready(row);
        }
        Ok(ready)
    };

    loop {
        if token.is_cancelled() {
            return PopulationOutcome::Cancelled;
        }

        let mut worked = false;
        if back == forward {
            match populate(start) {
                Ok(ready) => worked |= ready,
                Err(MemViewError::OutOfBounds { .. }) => forward_open = false,
                Err(e) => trace!(row = start, error = %e, "row skipped"),
            }
        } else {
            if back >= 0 {
                match populate(back) {
                    Ok(ready) => worked |= ready,
                    Err(e) => trace!(row = back, error = %e, "row skipped"),
                }
            }
            if forward < total && forward_open {
                match populate(forward) {
                    Ok(ready) => worked |= ready,
                    Err(MemViewError::OutOfBounds { .. }) => {
                        trace!(row = forward, "forward cursor reached end of resolved bytes");
                        forward_open = false;
                    }
                    Err(e) => trace!(row = forward, error = %e, "row skipped"),
                }
            }
        }

        if back >= 0 {
            back -= 1;
        }
        if forward < total {
            forward += 1;
        }
        if !forward_open {
            forward = total;
        }
        cursor.back.store(back, Ordering::Release);
        cursor.forward.store(forward, Ordering::Release);

        if back < 0 && forward >= total {
            return PopulationOutcome::Completed;
        }
        if worked && token.sleep(step) {
            return PopulationOutcome::Cancelled;
        }
    }
}
