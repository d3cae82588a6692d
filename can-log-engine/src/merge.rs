//! Time alignment and merging of datafiles
//!
//! Alignment puts several files on the time origin of the earliest one by
//! setting each file's time offset; message data is left untouched. Merging
//! additionally concatenates the message stores into one new datafile whose
//! signal set is restricted to the UIDs present in every input.

use crate::datafile::{Datafile, DatafileParts};
use crate::signals::SignalDescriptor;
use crate::store::StoreBuilder;
use crate::types::{duration_to_secs, EngineError, FileId, Result};
use std::collections::HashSet;
use std::sync::Arc;

/// Aligns and merges datafiles
pub struct MergeEngine;

impl MergeEngine {
    /// Offset of every file relative to the earliest start time, in input order
    pub fn alignment_offsets(files: &[Arc<Datafile>]) -> Vec<f64> {
        let Some(earliest) = files.iter().map(|f| f.start_time()).min() else {
            return Vec::new();
        };
        files
            .iter()
            .map(|file| duration_to_secs(file.start_time() - earliest))
            .collect()
    }

    /// Set each file's time offset so all share the earliest file's origin.
    ///
    /// Returns the id of the earliest file.
    pub fn align(files: &[Arc<Datafile>]) -> Option<FileId> {
        let earliest = files.iter().min_by_key(|f| f.start_time())?.id();
        for (file, offset) in files.iter().zip(Self::alignment_offsets(files)) {
            log::debug!("Aligning {} with offset {:.3}s", file.name(), offset);
            file.set_time_offset(offset);
        }
        Some(earliest)
    }

    /// Merge files into one datafile with id `id`.
    ///
    /// The inputs are aligned first. A single input is returned unchanged.
    /// The merged file starts unpopulated and has its own time origin.
    pub fn merge(files: &[Arc<Datafile>], id: FileId, name: impl Into<String>) -> Result<Arc<Datafile>> {
        match files {
            [] => return Err(EngineError::NothingToMerge),
            [single] => return Ok(Arc::clone(single)),
            _ => {}
        }

        Self::align(files);

        let mut sorted: Vec<&Arc<Datafile>> = files.iter().collect();
        sorted.sort_by_key(|f| f.start_time());

        let start_time = sorted[0].start_time();
        let end_time = sorted
            .iter()
            .map(|f| f.end_time())
            .max()
            .unwrap_or(start_time);

        let descriptors = Self::common_descriptors(&sorted);

        let width = sorted.iter().map(|f| f.store().width()).max().unwrap_or(1);
        let capacity = sorted.iter().map(|f| f.store().len()).sum();
        let mut builder = StoreBuilder::with_capacity(width, capacity);
        for file in &sorted {
            builder.extend_from(file.store(), file.time_offset())?;
        }
        let store = builder.finish();

        let mut devices: Vec<&str> = Vec::new();
        for file in &sorted {
            if !devices.contains(&file.device()) {
                devices.push(file.device());
            }
        }

        let name = name.into();
        log::info!(
            "Merged {} file(s) into {}: {} message(s), {} common signal(s)",
            sorted.len(),
            name,
            store.len(),
            descriptors.len()
        );

        Ok(Arc::new(Datafile::new(
            id,
            DatafileParts {
                name,
                device: devices.join("+"),
                source: None,
                store,
                descriptors,
                start_time,
                end_time,
            },
        )))
    }

    /// Descriptors of the first file whose UID occurs in every file
    fn common_descriptors(files: &[&Arc<Datafile>]) -> Vec<SignalDescriptor> {
        let Some((first, rest)) = files.split_first() else {
            return Vec::new();
        };
        let others: Vec<HashSet<u32>> = rest
            .iter()
            .map(|f| f.signals().iter().map(|s| s.uid()).collect())
            .collect();

        first
            .signals()
            .iter()
            .filter(|signal| others.iter().all(|uids| uids.contains(&signal.uid())))
            .map(|signal| signal.descriptor().clone())
            .collect()
    }
}
