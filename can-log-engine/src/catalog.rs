//! Catalog of loaded datafiles
//!
//! The [`Catalog`] is the engine's front door. It parses log files, applies
//! the alignment/merge decision, keeps one population scheduler per
//! top-level file and relays population progress as [`CatalogEvent`]s.
//!
//! Files live in an arena keyed by [`FileId`]; signals are addressed by
//! [`SignalHandle`]. A merge replaces its constituents in the arena, which
//! turns their handles stale.

use crate::config::{EngineConfig, LoadDecision};
use crate::datafile::{Datafile, Signal};
use crate::merge::MergeEngine;
use crate::parser::LogParser;
use crate::populator::{PopulationObserver, Populator, SchedulerState};
use crate::signals::{DecodedSeries, SignalDefinitions};
use crate::types::{EngineError, FileId, Result, SignalHandle};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Notifications emitted by the catalog
#[derive(Debug, Clone)]
pub enum CatalogEvent {
    /// New top-level files are available
    FilesLoaded(Vec<FileId>),
    /// A signal finished populating and its data can be read
    DatasetChanged(SignalHandle),
    /// A signal could not be decoded and will stay unpopulated
    SignalFailed(SignalHandle, EngineError),
    /// Every signal of a file is settled
    FileFinished(FileId),
}

/// Outcome of a load batch
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Top-level files created by the batch (one file when merged)
    pub loaded: Vec<FileId>,
    /// Paths that could not be loaded
    pub failures: Vec<(PathBuf, EngineError)>,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Turns scheduler callbacks into catalog events
struct EventRelay {
    tx: Mutex<Sender<CatalogEvent>>,
}

impl EventRelay {
    fn emit(&self, event: CatalogEvent) {
        // Nobody listening is not an error
        let _ = self.tx.lock().send(event);
    }
}

impl PopulationObserver for EventRelay {
    fn signal_populated(&self, signal: &Arc<Signal>) {
        self.emit(CatalogEvent::DatasetChanged(signal.handle()));
    }

    fn signal_failed(&self, signal: &Arc<Signal>, error: &EngineError) {
        self.emit(CatalogEvent::SignalFailed(signal.handle(), error.clone()));
    }

    fn file_finished(&self, file: &Datafile) {
        self.emit(CatalogEvent::FileFinished(file.id()));
    }
}

struct Entry {
    file: Arc<Datafile>,
    populator: Arc<Populator>,
}

/// Set of loaded datafiles and their schedulers
pub struct Catalog {
    config: EngineConfig,
    parser: LogParser,
    entries: RwLock<BTreeMap<FileId, Entry>>,
    next_id: AtomicU32,
    merge_counter: AtomicU32,
    relay: Arc<EventRelay>,
}

impl Catalog {
    /// Create an empty catalog and the receiving end of its event stream
    pub fn new(config: EngineConfig, definitions: Arc<SignalDefinitions>) -> (Self, Receiver<CatalogEvent>) {
        let (tx, rx) = mpsc::channel();
        let catalog = Self {
            config,
            parser: LogParser::new(definitions),
            entries: RwLock::new(BTreeMap::new()),
            next_id: AtomicU32::new(0),
            merge_counter: AtomicU32::new(1),
            relay: Arc::new(EventRelay { tx: Mutex::new(tx) }),
        };
        (catalog, rx)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn allocate_id(&self) -> FileId {
        FileId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Load files using the configured load decision
    pub fn load_files<P: AsRef<Path>>(&self, paths: &[P]) -> Result<LoadReport> {
        let decision = self.config.load_decision;
        self.load_files_with(paths, |_| decision)
    }

    /// Load files, asking `decide` what to do when more than one parsed.
    ///
    /// A file that fails to parse is reported in the returned
    /// [`LoadReport`] and does not stop the rest of the batch. Fails only if
    /// paths were given and none of them loaded.
    pub fn load_files_with<P, F>(&self, paths: &[P], decide: F) -> Result<LoadReport>
    where
        P: AsRef<Path>,
        F: FnOnce(&[Arc<Datafile>]) -> LoadDecision,
    {
        let mut report = LoadReport::default();
        let mut parsed = Vec::new();

        for path in paths {
            let path = path.as_ref();
            match self.parser.parse(path, self.allocate_id()) {
                Ok(file) => parsed.push(Arc::new(file)),
                Err(e) => {
                    log::warn!("Failed to load {:?}: {}", path, e);
                    report.failures.push((path.to_path_buf(), e));
                }
            }
        }

        if parsed.is_empty() {
            if paths.is_empty() {
                return Ok(report);
            }
            return Err(EngineError::NoFilesLoaded {
                failures: report.failures.len(),
            });
        }

        let decision = if parsed.len() > 1 {
            decide(&parsed)
        } else {
            LoadDecision::Separate
        };
        log::debug!("Load decision for {} file(s): {:?}", parsed.len(), decision);

        if decision.aligns() {
            MergeEngine::align(&parsed);
        }
        let top_level = if decision.merges() {
            vec![MergeEngine::merge(&parsed, self.allocate_id(), self.merge_name())?]
        } else {
            parsed
        };

        let populators: Vec<Arc<Populator>> = top_level.into_iter().map(|file| self.register(file)).collect();
        report.loaded = populators.iter().map(|p| p.file().id()).collect();

        self.relay.emit(CatalogEvent::FilesLoaded(report.loaded.clone()));
        self.auto_start(&populators)?;
        Ok(report)
    }

    fn merge_name(&self) -> String {
        format!("Merged {}", self.merge_counter.fetch_add(1, Ordering::Relaxed))
    }

    /// Add a file to the arena and hand it to a fresh, idle scheduler
    fn register(&self, file: Arc<Datafile>) -> Arc<Populator> {
        let relay: Arc<dyn PopulationObserver> = self.relay.clone();
        let populator = Arc::new(Populator::new(Arc::clone(&file), relay));
        self.entries.write().insert(
            file.id(),
            Entry {
                file,
                populator: Arc::clone(&populator),
            },
        );
        populator
    }

    // Runs after FilesLoaded so receivers can resolve a file before its
    // first DatasetChanged
    fn auto_start(&self, populators: &[Arc<Populator>]) -> Result<()> {
        if self.config.auto_populate {
            for populator in populators {
                populator.start()?;
            }
        }
        Ok(())
    }

    /// Top-level files in load order
    pub fn files(&self) -> Vec<Arc<Datafile>> {
        self.entries.read().values().map(|e| Arc::clone(&e.file)).collect()
    }

    pub fn datafile(&self, id: FileId) -> Result<Arc<Datafile>> {
        self.entries
            .read()
            .get(&id)
            .map(|e| Arc::clone(&e.file))
            .ok_or(EngineError::UnknownFile(id))
    }

    fn populator(&self, id: FileId) -> Result<Arc<Populator>> {
        self.entries
            .read()
            .get(&id)
            .map(|e| Arc::clone(&e.populator))
            .ok_or(EngineError::UnknownFile(id))
    }

    pub fn signal(&self, handle: SignalHandle) -> Result<Arc<Signal>> {
        self.datafile(handle.file)?
            .signal(handle.index)
            .cloned()
            .ok_or(EngineError::UnknownSignal(handle))
    }

    pub fn find_by_uid(&self, file: FileId, uid: u32) -> Option<Arc<Signal>> {
        self.datafile(file).ok()?.find_by_uid(uid).cloned()
    }

    /// Whether a file carries a signal with `uid`
    pub fn present_uid(&self, file: FileId, uid: u32) -> bool {
        self.find_by_uid(file, uid).is_some()
    }

    /// Start the scheduler of a file that was loaded without auto-population
    pub fn start_population(&self, id: FileId) -> Result<()> {
        self.populator(id)?.start()?;
        Ok(())
    }

    /// Move a signal to the front of its file's population order.
    ///
    /// Fire-and-forget; a request for a populated signal does nothing.
    pub fn request_population(&self, handle: SignalHandle) -> Result<()> {
        let populator = self.populator(handle.file)?;
        if handle.index >= populator.file().signals().len() {
            return Err(EngineError::UnknownSignal(handle));
        }
        populator.request_priority(handle.index);
        populator.start()?;
        Ok(())
    }

    /// Request several signals, optionally waiting until all are populated
    pub fn request_population_many(&self, handles: &[SignalHandle], wait: bool) -> Result<()> {
        for &handle in handles {
            self.request_population(handle)?;
        }
        if wait {
            for &handle in handles {
                self.await_populated(handle)?;
            }
        }
        Ok(())
    }

    /// Request a signal and block until its data is ready.
    ///
    /// Bounded by the configured await timeout.
    pub fn await_populated(&self, handle: SignalHandle) -> Result<Arc<DecodedSeries>> {
        let signal = self.signal(handle)?;
        if !signal.is_populated() {
            self.request_population(handle)?;
        }
        match self.config.await_timeout() {
            Some(timeout) => signal.await_populated_timeout(timeout),
            None => signal.await_populated(),
        }
    }

    /// Merge already-loaded files into one new top-level file.
    ///
    /// The constituents leave the catalog; their schedulers finish on their
    /// own but nothing reachable observes the result. Repeated ids count
    /// once; merging a single file returns its id unchanged.
    pub fn merge_files(&self, ids: &[FileId]) -> Result<FileId> {
        let mut unique: Vec<FileId> = Vec::with_capacity(ids.len());
        for &id in ids {
            if unique.contains(&id) {
                log::debug!("Ignoring repeated {} in merge request", id);
            } else {
                unique.push(id);
            }
        }
        let ids = &unique[..];

        let files = ids
            .iter()
            .map(|&id| self.datafile(id))
            .collect::<Result<Vec<_>>>()?;
        if let [file] = &files[..] {
            return Ok(file.id());
        }

        let merged = MergeEngine::merge(&files, self.allocate_id(), self.merge_name())?;

        {
            let mut entries = self.entries.write();
            for id in ids {
                entries.remove(id);
            }
        }
        let populator = self.register(merged);
        let id = populator.file().id();
        self.relay.emit(CatalogEvent::FilesLoaded(vec![id]));
        self.auto_start(&[populator])?;
        Ok(id)
    }

    /// Wait until every top-level scheduler is done.
    ///
    /// Schedulers that were never started are skipped. Returns false if the
    /// timeout elapsed first.
    pub fn wait_idle(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let populators: Vec<Arc<Populator>> = self
            .entries
            .read()
            .values()
            .map(|e| Arc::clone(&e.populator))
            .collect();

        populators.iter().all(|populator| {
            if populator.state() == SchedulerState::Idle {
                return true;
            }
            let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
            populator.wait_done(remaining)
        })
    }
}
