//! Datafiles and their signals
//!
//! A [`Datafile`] owns the message store of one log (or of a merge of several
//! logs) together with one [`Signal`] per known descriptor. Signals start out
//! empty and are filled in exactly once by the population scheduler.
//!
//! Each signal's state and data sit behind one lock paired with a condition
//! variable, so a reader that sees `Populated` always sees the complete
//! series, and waiters are woken instead of polling.

use crate::signals::{DecodedSeries, SignalDescriptor};
use crate::store::MessageStore;
use crate::types::{EngineError, FileId, Result, SignalHandle, Timestamp};
use parking_lot::{Condvar, Mutex};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Time origin shift of a datafile, in seconds
///
/// Shared between a datafile and its signals so `Signal::time` can apply the
/// offset without holding a reference to the file.
#[derive(Debug, Default)]
pub struct TimeOffset(AtomicU64);

impl TimeOffset {
    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, seconds: f64) {
        self.0.store(seconds.to_bits(), Ordering::Release);
    }
}

/// Population lifecycle of a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopulationState {
    Unpopulated,
    Populating,
    Populated,
    /// Decoding failed permanently (descriptor mismatch); never retried
    Failed,
}

#[derive(Debug)]
struct SignalSlot {
    state: PopulationState,
    data: Option<Arc<DecodedSeries>>,
    error: Option<EngineError>,
}

/// One decodable time series of a datafile
#[derive(Debug)]
pub struct Signal {
    descriptor: SignalDescriptor,
    handle: SignalHandle,
    time_offset: Arc<TimeOffset>,
    slot: Mutex<SignalSlot>,
    ready: Condvar,
}

impl Signal {
    fn new(descriptor: SignalDescriptor, handle: SignalHandle, time_offset: Arc<TimeOffset>) -> Self {
        Self {
            descriptor,
            handle,
            time_offset,
            slot: Mutex::new(SignalSlot {
                state: PopulationState::Unpopulated,
                data: None,
                error: None,
            }),
            ready: Condvar::new(),
        }
    }

    pub fn descriptor(&self) -> &SignalDescriptor {
        &self.descriptor
    }

    pub fn handle(&self) -> SignalHandle {
        self.handle
    }

    /// Owning datafile
    pub fn file(&self) -> FileId {
        self.handle.file
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn uid(&self) -> u32 {
        self.descriptor.uid
    }

    pub fn state(&self) -> PopulationState {
        self.slot.lock().state
    }

    pub fn is_populated(&self) -> bool {
        self.state() == PopulationState::Populated
    }

    pub fn is_populating(&self) -> bool {
        self.state() == PopulationState::Populating
    }

    /// Error that made population fail, if any
    pub fn error(&self) -> Option<EngineError> {
        self.slot.lock().error.clone()
    }

    /// Move from `Unpopulated` to `Populating`.
    ///
    /// Returns false if another worker already claimed the signal.
    pub(crate) fn try_claim(&self) -> bool {
        let mut slot = self.slot.lock();
        if slot.state != PopulationState::Unpopulated {
            return false;
        }
        slot.state = PopulationState::Populating;
        true
    }

    /// Store decoded data and wake every waiter
    pub(crate) fn publish(&self, series: DecodedSeries) {
        let mut slot = self.slot.lock();
        debug_assert_eq!(slot.state, PopulationState::Populating);
        slot.data = Some(Arc::new(series));
        slot.state = PopulationState::Populated;
        drop(slot);
        self.ready.notify_all();
    }

    /// Record a permanent failure and wake every waiter
    pub(crate) fn fail(&self, error: EngineError) {
        let mut slot = self.slot.lock();
        slot.error = Some(error);
        slot.state = PopulationState::Failed;
        drop(slot);
        self.ready.notify_all();
    }

    /// Decoded data, once populated
    pub fn data(&self) -> Option<Arc<DecodedSeries>> {
        self.slot.lock().data.clone()
    }

    /// Time vector with the owning file's time offset applied
    pub fn time(&self) -> Option<Vec<f64>> {
        let data = self.data()?;
        let offset = self.time_offset.get();
        Some(data.time.iter().map(|t| t + offset).collect())
    }

    /// Physical values, once populated
    pub fn values(&self) -> Option<Vec<f64>> {
        self.data().map(|data| data.value.clone())
    }

    /// Offset currently applied by [`Signal::time`]
    pub fn time_offset(&self) -> f64 {
        self.time_offset.get()
    }

    /// Block until the signal is populated.
    ///
    /// Returns immediately for a populated signal. Fails with the stored error
    /// if population failed. Without a scheduler running for the owning file
    /// this waits forever; prefer [`Signal::await_populated_timeout`].
    pub fn await_populated(&self) -> Result<Arc<DecodedSeries>> {
        let mut slot = self.slot.lock();
        loop {
            match slot.state {
                PopulationState::Populated => return Self::ready_data(&slot, self.handle),
                PopulationState::Failed => return Err(Self::stored_error(&slot, self.handle)),
                _ => self.ready.wait(&mut slot),
            }
        }
    }

    /// Like [`Signal::await_populated`], giving up after `timeout`
    pub fn await_populated_timeout(&self, timeout: Duration) -> Result<Arc<DecodedSeries>> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.slot.lock();
        loop {
            match slot.state {
                PopulationState::Populated => return Self::ready_data(&slot, self.handle),
                PopulationState::Failed => return Err(Self::stored_error(&slot, self.handle)),
                _ => {
                    if self.ready.wait_until(&mut slot, deadline).timed_out()
                        && !matches!(slot.state, PopulationState::Populated | PopulationState::Failed)
                    {
                        return Err(EngineError::Timeout {
                            name: self.descriptor.name.clone(),
                            waited: timeout,
                        });
                    }
                }
            }
        }
    }

    fn ready_data(slot: &SignalSlot, handle: SignalHandle) -> Result<Arc<DecodedSeries>> {
        slot.data.clone().ok_or(EngineError::UnknownSignal(handle))
    }

    fn stored_error(slot: &SignalSlot, handle: SignalHandle) -> EngineError {
        slot.error.clone().unwrap_or(EngineError::UnknownSignal(handle))
    }
}

/// A bundle of signals decoded from one message store
#[derive(Debug)]
pub struct Datafile {
    id: FileId,
    name: String,
    device: String,
    source: Option<PathBuf>,
    store: MessageStore,
    signals: Vec<Arc<Signal>>,
    start_time: Timestamp,
    end_time: Timestamp,
    time_offset: Arc<TimeOffset>,
    /// Signal indices requested ahead of descriptor order; served last-in first-out
    priority: Mutex<Vec<usize>>,
}

/// Everything needed to assemble a datafile
#[derive(Debug)]
pub struct DatafileParts {
    pub name: String,
    pub device: String,
    pub source: Option<PathBuf>,
    pub store: MessageStore,
    pub descriptors: Vec<SignalDescriptor>,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
}

impl Datafile {
    /// Assemble a datafile with one empty signal per descriptor
    pub fn new(id: FileId, parts: DatafileParts) -> Self {
        let time_offset = Arc::new(TimeOffset::default());
        let signals = parts
            .descriptors
            .into_iter()
            .enumerate()
            .map(|(index, descriptor)| {
                Arc::new(Signal::new(
                    descriptor,
                    SignalHandle::new(id, index),
                    Arc::clone(&time_offset),
                ))
            })
            .collect();

        Self {
            id,
            name: parts.name,
            device: parts.device,
            source: parts.source,
            store: parts.store,
            signals,
            start_time: parts.start_time,
            end_time: parts.end_time,
            time_offset,
            priority: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> FileId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Device type the signal set was taken from
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Path the file was parsed from (None for merged files)
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    /// Signals in descriptor order
    pub fn signals(&self) -> &[Arc<Signal>] {
        &self.signals
    }

    pub fn signal(&self, index: usize) -> Option<&Arc<Signal>> {
        self.signals.get(index)
    }

    pub fn find_by_uid(&self, uid: u32) -> Option<&Arc<Signal>> {
        self.signals.iter().find(|signal| signal.uid() == uid)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Arc<Signal>> {
        self.signals.iter().find(|signal| signal.name() == name)
    }

    pub fn start_time(&self) -> Timestamp {
        self.start_time
    }

    pub fn end_time(&self) -> Timestamp {
        self.end_time
    }

    pub fn time_offset(&self) -> f64 {
        self.time_offset.get()
    }

    pub fn set_time_offset(&self, seconds: f64) {
        self.time_offset.set(seconds);
    }

    /// True once every signal is either populated or failed
    pub fn is_settled(&self) -> bool {
        self.signals
            .iter()
            .all(|s| matches!(s.state(), PopulationState::Populated | PopulationState::Failed))
    }

    pub fn populated_count(&self) -> usize {
        self.signals.iter().filter(|s| s.is_populated()).count()
    }

    /// Queue a signal ahead of descriptor order.
    ///
    /// Returns false (and queues nothing) for unknown indices and for signals
    /// that are already populated or failed.
    pub fn request_priority(&self, index: usize) -> bool {
        let Some(signal) = self.signals.get(index) else {
            return false;
        };
        if matches!(signal.state(), PopulationState::Populated | PopulationState::Failed) {
            return false;
        }
        self.priority.lock().push(index);
        log::trace!("Prioritised '{}' in {}", signal.name(), self.name);
        true
    }

    /// Take the most recently requested signal index.
    ///
    /// Last-in first-out: the newest request is served first, so older
    /// requests can be overtaken while new ones keep arriving.
    pub(crate) fn pop_priority(&self) -> Option<usize> {
        self.priority.lock().pop()
    }

    pub fn pending_priority(&self) -> usize {
        self.priority.lock().len()
    }

    /// First signal in descriptor order nobody has claimed yet
    pub(crate) fn next_unclaimed(&self) -> Option<usize> {
        self.signals
            .iter()
            .position(|signal| signal.state() == PopulationState::Unpopulated)
    }
}
