// End-to-end tests: write CLG logs to disk, load them through the catalog and
// read populated signals back.

use can_log_engine::analysis::{resample_common, SeriesRef};
use can_log_engine::event_codes::{decode_events, Severity};
use can_log_engine::types::timestamp_from_fields;
use can_log_engine::{
    Catalog, CatalogEvent, EngineConfig, EngineError, FileId, LoadDecision, LogWriter,
    MessageStore, SignalDefinitions, SignalHandle,
};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Duration;

const DEFINITIONS: &str = r#"
[[device]]
name = "LOGGER"

[[device.signal]]
uid = 1
name = "Speed"
quantity = "Velocity"
unit = "km/h"
id = 0x100
byte_offset = 0
length = 2
datatype = "u16"
scale = 0.5

[[device.signal]]
uid = 2
name = "Voltage"
unit = "V"
id = 0x101
byte_offset = 0
length = 1
datatype = "u8"

[[device.signal]]
uid = 3
name = "Emcy"
id = 0x080
byte_offset = 0
length = 8
datatype = 6

[[device]]
name = "AUX"

[[device.signal]]
uid = 2
name = "Voltage"
id = 0x101
byte_offset = 0
length = 1
datatype = "u8"

[[device.signal]]
uid = 9
name = "Broken"
id = 0x101
byte_offset = 7
length = 2
datatype = "u16"
"#;

const WAIT: Option<Duration> = Some(Duration::from_secs(10));

fn definitions() -> Arc<SignalDefinitions> {
    Arc::new(SignalDefinitions::from_toml_str(DEFINITIONS).unwrap())
}

fn write_log(dir: &Path, name: &str, device: &str, start: [u16; 7], rows: &[(u16, f64, Vec<u8>)]) -> PathBuf {
    let path = dir.join(name);
    let store = MessageStore::from_rows(rows.iter().map(|(id, t, p)| (*id, *t, &p[..])), 8).unwrap();
    let start = timestamp_from_fields(start).unwrap();
    LogWriter::new(device, start).write_file(&path, &store).unwrap();
    path
}

fn first_log(dir: &Path) -> PathBuf {
    write_log(
        dir,
        "first.clg",
        "LOGGER",
        [2021, 5, 2, 10, 0, 0, 0],
        &[
            (0x100, 0.0, vec![10, 0]),
            (0x101, 0.5, vec![7]),
            (0x100, 1.0, vec![20, 0]),
            (0x080, 1.2, vec![0x02, 0x1A, 0x00, 0x05, 1, 2, 3, 4]),
        ],
    )
}

fn second_log(dir: &Path) -> PathBuf {
    write_log(
        dir,
        "second.clg",
        "LOGGER",
        [2021, 5, 2, 10, 0, 5, 500],
        &[(0x100, 0.0, vec![30, 0]), (0x100, 1.0, vec![40, 0]), (0x101, 1.5, vec![9])],
    )
}

fn drain(events: &Receiver<CatalogEvent>) -> Vec<CatalogEvent> {
    events.try_iter().collect()
}

fn changed(events: &[CatalogEvent]) -> Vec<SignalHandle> {
    events
        .iter()
        .filter_map(|e| match e {
            CatalogEvent::DatasetChanged(handle) => Some(*handle),
            _ => None,
        })
        .collect()
}

#[test]
fn load_separate_populates_everything() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir().unwrap();
    let paths = [first_log(dir.path()), second_log(dir.path())];

    let (catalog, events) = Catalog::new(EngineConfig::default(), definitions());
    let report = catalog.load_files(&paths).unwrap();
    assert!(report.is_complete());
    assert_eq!(report.loaded.len(), 2);
    assert!(catalog.wait_idle(WAIT));

    let events = drain(&events);
    assert!(matches!(&events[0], CatalogEvent::FilesLoaded(ids) if ids == &report.loaded));
    assert_eq!(changed(&events).len(), 6);
    let finished = events
        .iter()
        .filter(|e| matches!(e, CatalogEvent::FileFinished(_)))
        .count();
    assert_eq!(finished, 2);

    let first = catalog.datafile(report.loaded[0]).unwrap();
    let speed = first.find_by_name("Speed").unwrap();
    assert_eq!(speed.values().unwrap(), vec![5.0, 10.0]);
    assert_eq!(speed.time().unwrap(), vec![0.0, 1.0]);
    assert_eq!(speed.descriptor().unit, "km/h");

    // Separate files keep their own time origin
    let second = catalog.datafile(report.loaded[1]).unwrap();
    assert_eq!(second.time_offset(), 0.0);
}

#[test]
fn load_aligned_shifts_later_file() {
    let dir = tempfile::tempdir().unwrap();
    let paths = [second_log(dir.path()), first_log(dir.path())];

    let config = EngineConfig::new().with_load_decision(LoadDecision::Align);
    let (catalog, _events) = Catalog::new(config, definitions());
    let report = catalog.load_files(&paths).unwrap();
    assert!(catalog.wait_idle(WAIT));

    let later = catalog.datafile(report.loaded[0]).unwrap();
    let earlier = catalog.datafile(report.loaded[1]).unwrap();
    assert_eq!(later.time_offset(), 5.5);
    assert_eq!(earlier.time_offset(), 0.0);

    let speed = later.find_by_uid(1).unwrap();
    assert_eq!(speed.time().unwrap(), vec![5.5, 6.5]);
    // Raw decoded data stays relative to the file's own start
    assert_eq!(speed.data().unwrap().time, vec![0.0, 1.0]);
}

#[test]
fn load_merged_builds_one_file() {
    let dir = tempfile::tempdir().unwrap();
    let paths = [second_log(dir.path()), first_log(dir.path())];

    let (catalog, events) = Catalog::new(EngineConfig::default(), definitions());
    let report = catalog
        .load_files_with(&paths, |files| {
            assert_eq!(files.len(), 2);
            LoadDecision::AlignAndMerge
        })
        .unwrap();
    assert_eq!(report.loaded.len(), 1);
    assert!(catalog.wait_idle(WAIT));

    let merged = catalog.datafile(report.loaded[0]).unwrap();
    assert_eq!(merged.name(), "Merged 1");
    assert_eq!(merged.device(), "LOGGER");
    assert_eq!(merged.signals().len(), 3);
    assert_eq!(catalog.files().len(), 1);

    let speed = merged.find_by_name("Speed").unwrap();
    assert_eq!(speed.time().unwrap(), vec![0.0, 1.0, 5.5, 6.5]);
    assert_eq!(speed.values().unwrap(), vec![5.0, 10.0, 15.0, 20.0]);

    let voltage = merged.find_by_uid(2).unwrap();
    assert_eq!(voltage.time().unwrap(), vec![0.5, 7.0]);

    let events = drain(&events);
    assert!(changed(&events).iter().all(|h| h.file == merged.id()));
}

#[test]
fn merge_files_after_loading() {
    let dir = tempfile::tempdir().unwrap();
    let first = first_log(dir.path());
    let aux = write_log(
        dir.path(),
        "aux.clg",
        "AUX",
        [2021, 5, 2, 10, 0, 2, 0],
        &[(0x101, 0.0, vec![11]), (0x101, 0.25, vec![12])],
    );

    let (catalog, _events) = Catalog::new(EngineConfig::default(), definitions());
    let ids = catalog.load_files(&[first, aux]).unwrap().loaded;
    let stale = SignalHandle::new(ids[0], 0);
    assert!(catalog.signal(stale).is_ok());

    let merged = catalog.merge_files(&ids).unwrap();
    assert!(catalog.wait_idle(WAIT));

    let file = catalog.datafile(merged).unwrap();
    assert_eq!(file.device(), "LOGGER+AUX");
    let uids: Vec<u32> = file.signals().iter().map(|s| s.uid()).collect();
    assert_eq!(uids, vec![2]);
    assert!(catalog.present_uid(merged, 2));
    assert!(!catalog.present_uid(merged, 1));

    let data = catalog.await_populated(SignalHandle::new(merged, 0)).unwrap();
    assert_eq!(data.value, vec![7.0, 11.0, 12.0]);
    assert_eq!(data.time, vec![0.5, 2.0, 2.25]);

    // Constituent handles no longer resolve
    assert!(matches!(catalog.signal(stale), Err(EngineError::UnknownFile(_))));
    assert!(matches!(catalog.request_population(stale), Err(EngineError::UnknownFile(_))));
    assert_eq!(catalog.files().len(), 1);
}

#[test]
fn requested_signal_is_populated_first() {
    let dir = tempfile::tempdir().unwrap();
    let path = first_log(dir.path());

    let config = EngineConfig::new().with_auto_populate(false);
    let (catalog, events) = Catalog::new(config, definitions());
    let id = catalog.load_files(&[path]).unwrap().loaded[0];

    catalog.request_population(SignalHandle::new(id, 2)).unwrap();
    assert!(catalog.wait_idle(WAIT));

    let order: Vec<usize> = changed(&drain(&events)).iter().map(|h| h.index).collect();
    assert_eq!(order, vec![2, 0, 1]);

    // Requests for populated signals are no-ops
    catalog.request_population(SignalHandle::new(id, 0)).unwrap();
    assert_eq!(catalog.datafile(id).unwrap().pending_priority(), 0);
    assert!(matches!(
        catalog.request_population(SignalHandle::new(id, 3)),
        Err(EngineError::UnknownSignal(_))
    ));
}

#[test]
fn request_many_and_wait() {
    let dir = tempfile::tempdir().unwrap();
    let path = first_log(dir.path());

    let config = EngineConfig::new().with_auto_populate(false);
    let (catalog, _events) = Catalog::new(config, definitions());
    let id = catalog.load_files(&[path]).unwrap().loaded[0];

    let handles = [SignalHandle::new(id, 1), SignalHandle::new(id, 0)];
    catalog.request_population_many(&handles, true).unwrap();
    for handle in handles {
        assert!(catalog.signal(handle).unwrap().is_populated());
    }
    catalog.wait_idle(WAIT);
}

#[test]
fn broken_descriptor_fails_only_its_signal() {
    let dir = tempfile::tempdir().unwrap();
    let aux = write_log(
        dir.path(),
        "aux.clg",
        "AUX",
        [2021, 5, 2, 10, 0, 0, 0],
        &[(0x101, 0.0, vec![11])],
    );

    let (catalog, events) = Catalog::new(EngineConfig::default(), definitions());
    let id = catalog.load_files(&[aux]).unwrap().loaded[0];
    assert!(catalog.wait_idle(WAIT));

    let events = drain(&events);
    assert_eq!(changed(&events), vec![SignalHandle::new(id, 0)]);
    assert!(events.iter().any(|e| matches!(
        e,
        CatalogEvent::SignalFailed(handle, EngineError::DescriptorMismatch { uid: 9, .. })
            if handle.index == 1
    )));

    let result = catalog.await_populated(SignalHandle::new(id, 1));
    assert!(matches!(result, Err(EngineError::DescriptorMismatch { width: 8, .. })));
    assert!(catalog.datafile(id).unwrap().is_settled());
}

#[test]
fn unknown_device_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let good = first_log(dir.path());
    let stranger = write_log(dir.path(), "x.clg", "STRANGER", [2021, 5, 2, 9, 0, 0, 0], &[]);

    let (catalog, _events) = Catalog::new(EngineConfig::default(), definitions());
    let report = catalog.load_files(&[stranger, good]).unwrap();
    assert_eq!(report.loaded.len(), 1);
    assert!(matches!(report.failures[0].1, EngineError::Format(_)));
    catalog.wait_idle(WAIT);
}

#[test]
fn event_words_and_resampling() {
    let dir = tempfile::tempdir().unwrap();
    let (catalog, _events) = Catalog::new(EngineConfig::default(), definitions());
    let id = catalog.load_files(&[first_log(dir.path())]).unwrap().loaded[0];

    let emcy = catalog.await_populated(SignalHandle::new(id, 2)).unwrap();
    let records = decode_events(&emcy);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].code, 0x1A02);
    assert_eq!(records[0].severity, Severity::Critical);
    assert_eq!(records[0].details, [1, 2, 3, 4]);
    assert_eq!(records[0].time, 1.2);

    let speed = catalog.await_populated(SignalHandle::new(id, 0)).unwrap();
    let (grid, columns) = resample_common(&[SeriesRef::new(&speed.time, &speed.value)], 4);
    assert_eq!(grid, vec![0.0, 0.25, 0.5, 0.75]);
    assert_eq!(columns[0], vec![5.0; 4]);
    catalog.wait_idle(WAIT);
}

#[test]
fn stale_file_handle() {
    let (catalog, _events) = Catalog::new(EngineConfig::default(), definitions());
    assert!(matches!(catalog.datafile(FileId(7)), Err(EngineError::UnknownFile(FileId(7)))));
    assert!(catalog.find_by_uid(FileId(7), 1).is_none());
}
