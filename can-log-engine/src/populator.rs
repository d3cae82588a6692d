//! Population scheduler
//!
//! A [`Populator`] decodes every signal of one datafile on a dedicated worker
//! thread, one signal per unit of work. Before each unit it picks the next
//! signal:
//!
//! 1. the most recently requested entry of the file's priority list, if any;
//! 2. otherwise the first signal in descriptor order nobody has claimed.
//!
//! When neither yields a signal the file is finished. A priority request
//! never interrupts the unit in progress; it is honoured as soon as that
//! unit completes.

use crate::datafile::{Datafile, PopulationState, Signal};
use crate::signals::SignalDecoder;
use crate::types::{EngineError, Result};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Receives population progress from a scheduler's worker thread
pub trait PopulationObserver: Send + Sync {
    /// A signal's data is complete and readable
    fn signal_populated(&self, signal: &Arc<Signal>);

    /// A signal could not be decoded and stays unpopulated
    fn signal_failed(&self, _signal: &Arc<Signal>, _error: &EngineError) {}

    /// Every signal of the file is populated or failed
    fn file_finished(&self, _file: &Datafile) {}
}

/// Observer that ignores every notification
pub struct NoopObserver;

impl PopulationObserver for NoopObserver {
    fn signal_populated(&self, _signal: &Arc<Signal>) {}
}

/// Lifecycle of a scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Created, worker not started
    Idle,
    /// Selecting and decoding signals
    Running,
    /// No signal left to select; emitting the file-finished notification
    Draining,
    /// Worker has exited
    Done,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<SchedulerState>,
    changed: Condvar,
}

impl Shared {
    fn set(&self, state: SchedulerState) {
        *self.state.lock() = state;
        self.changed.notify_all();
    }
}

/// Drives the population of one datafile
pub struct Populator {
    file: Arc<Datafile>,
    observer: Arc<dyn PopulationObserver>,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Populator {
    pub fn new(file: Arc<Datafile>, observer: Arc<dyn PopulationObserver>) -> Self {
        Self {
            file,
            observer,
            shared: Arc::new(Shared {
                state: Mutex::new(SchedulerState::Idle),
                changed: Condvar::new(),
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn file(&self) -> &Arc<Datafile> {
        &self.file
    }

    pub fn state(&self) -> SchedulerState {
        *self.shared.state.lock()
    }

    /// Spawn the worker thread. Returns false if it was already started.
    pub fn start(&self) -> Result<bool> {
        {
            let mut state = self.shared.state.lock();
            if *state != SchedulerState::Idle {
                return Ok(false);
            }
            *state = SchedulerState::Running;
        }

        let file = Arc::clone(&self.file);
        let observer = Arc::clone(&self.observer);
        let shared = Arc::clone(&self.shared);

        let spawned = std::thread::Builder::new()
            .name(format!("populate-{}", self.file.name()))
            .spawn(move || run(&file, observer.as_ref(), &shared));

        match spawned {
            Ok(handle) => {
                *self.worker.lock() = Some(handle);
                Ok(true)
            }
            Err(e) => {
                self.shared.set(SchedulerState::Idle);
                Err(e.into())
            }
        }
    }

    /// Queue a signal of this file ahead of descriptor order.
    ///
    /// A request for an already-populated signal is a no-op.
    pub fn request_priority(&self, index: usize) -> bool {
        self.file.request_priority(index)
    }

    pub fn populated(&self, index: usize) -> bool {
        self.file
            .signal(index)
            .map(|signal| signal.is_populated())
            .unwrap_or(false)
    }

    /// Block until the worker has finished, or until `timeout` elapses.
    ///
    /// Returns true if the scheduler is done, false on timeout or when it
    /// was never started.
    pub fn wait_done(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.shared.state.lock();
        while *state != SchedulerState::Done {
            if *state == SchedulerState::Idle {
                return false;
            }
            match deadline {
                Some(deadline) => {
                    if self.shared.changed.wait_until(&mut state, deadline).timed_out() {
                        return *state == SchedulerState::Done;
                    }
                }
                None => self.shared.changed.wait(&mut state),
            }
        }
        drop(state);

        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                log::error!("Population worker of {} panicked", self.file.name());
            }
        }
        true
    }
}

/// Worker body: select, claim, decode, publish until nothing is left
fn run(file: &Datafile, observer: &dyn PopulationObserver, shared: &Shared) {
    log::info!("Starting population of {}", file.name());
    let started = Instant::now();

    while let Some(index) = select_next(file) {
        let signal = &file.signals()[index];
        // Claiming under the signal's lock rules out two workers racing for it
        if !signal.try_claim() {
            continue;
        }

        match SignalDecoder::decode(file.store(), signal.descriptor()) {
            Ok(series) => {
                log::debug!(
                    "Populated '{}' of {} ({} samples)",
                    signal.name(),
                    file.name(),
                    series.len()
                );
                signal.publish(series);
                observer.signal_populated(signal);
            }
            Err(error) => {
                log::warn!("Failed to populate '{}' of {}: {}", signal.name(), file.name(), error);
                signal.fail(error.clone());
                observer.signal_failed(signal, &error);
            }
        }
    }

    shared.set(SchedulerState::Draining);
    observer.file_finished(file);
    log::info!(
        "Finished population of {} in {:.3}s",
        file.name(),
        started.elapsed().as_secs_f64()
    );
    shared.set(SchedulerState::Done);
}

/// Next signal to decode: newest priority request first, then descriptor order
fn select_next(file: &Datafile) -> Option<usize> {
    while let Some(index) = file.pop_priority() {
        // Duplicate or stale requests for already handled signals are dropped here
        if file.signals()[index].state() == PopulationState::Unpopulated {
            log::trace!("Serving priority request for '{}'", file.signals()[index].name());
            return Some(index);
        }
    }
    file.next_unclaimed()
}
