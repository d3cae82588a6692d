//! Signal summaries and their text/JSON rendering

use can_log_engine::analysis::{resample_common, SeriesRef};
use can_log_engine::event_codes::{EventCodeTable, EventRecord};
use can_log_engine::DecodedSeries;
use serde::Serialize;
use std::fmt::Write;

/// Overview of one populated signal
#[derive(Debug, Clone, Serialize)]
pub struct SignalSummary {
    pub file: String,
    pub signal: String,
    pub unit: String,
    pub samples: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub last: Option<f64>,
    /// Rows on the uniform grid, when resampling was requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resampled: Option<usize>,
}

impl SignalSummary {
    pub fn new(file: &str, signal: &str, unit: &str, data: &DecodedSeries, resample_hz: Option<u16>) -> Self {
        let values = &data.value;
        let resampled = resample_hz.map(|hz| {
            let (grid, _) = resample_common(&[SeriesRef::new(&data.time, values)], hz);
            grid.len()
        });

        Self {
            file: file.to_string(),
            signal: signal.to_string(),
            unit: unit.to_string(),
            samples: values.len(),
            min: values.iter().copied().reduce(f64::min),
            max: values.iter().copied().reduce(f64::max),
            last: values.last().copied(),
            resampled,
        }
    }
}

fn value_cell(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) if unit.is_empty() => format!("{:.3}", v),
        Some(v) => format!("{:.3} {}", v, unit),
        None => "-".to_string(),
    }
}

/// Plain-text table, one row per signal
pub fn render_text(summaries: &[SignalSummary]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<16} {:<24} {:>8} {:>16} {:>16} {:>16} {:>10}",
        "FILE", "SIGNAL", "SAMPLES", "MIN", "MAX", "LAST", "RESAMPLED"
    );
    for s in summaries {
        let resampled = s.resampled.map(|n| n.to_string()).unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{:<16} {:<24} {:>8} {:>16} {:>16} {:>16} {:>10}",
            s.file,
            s.signal,
            s.samples,
            value_cell(s.min, &s.unit),
            value_cell(s.max, &s.unit),
            value_cell(s.last, &s.unit),
            resampled
        );
    }
    out
}

/// Event listing; codes marked hidden in `table` are skipped
pub fn render_events(file: &str, signal: &str, events: &[EventRecord], table: Option<&EventCodeTable>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} / {}: {} event(s)", file, signal, events.len());
    for event in events {
        let info = table.and_then(|t| t.describe(event.code));
        if info.map(|i| i.hide).unwrap_or(false) {
            continue;
        }
        let description = info
            .map(|i| format!("{} ({})", i.text, i.level.label()))
            .unwrap_or_else(|| "unknown code".to_string());
        let _ = writeln!(
            out,
            "  {:>10.3}s  {:#06x}  {:<10}  {}",
            event.time, event.code, event.severity, description
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: &[f64]) -> DecodedSeries {
        DecodedSeries {
            time: (0..values.len()).map(|i| i as f64 * 0.5).collect(),
            value: values.to_vec(),
            raw: vec![0; values.len()],
        }
    }

    #[test]
    fn test_summary() {
        let summary = SignalSummary::new("run", "Speed", "km/h", &series(&[3.0, -1.0, 7.5, 2.0]), Some(4));
        assert_eq!(summary.samples, 4);
        assert_eq!(summary.min, Some(-1.0));
        assert_eq!(summary.max, Some(7.5));
        assert_eq!(summary.last, Some(2.0));
        assert_eq!(summary.resampled, Some(6));

        let text = render_text(&[summary]);
        assert!(text.contains("7.500 km/h"));
        assert!(text.lines().nth(1).unwrap().starts_with("run"));
    }

    #[test]
    fn test_empty_summary() {
        let summary = SignalSummary::new("run", "Idle", "", &series(&[]), None);
        assert_eq!(summary.min, None);
        let json = serde_json::to_value(&summary).unwrap();
        assert!(json.get("resampled").is_none());
        assert!(json["last"].is_null());
    }

    #[test]
    fn test_hidden_events_are_skipped() {
        let table = EventCodeTable::parse("0x0001;EMCY_LEVEL_HV;Shown;show\n0x0002;EMCY_LEVEL_HV;Secret;hide\n").unwrap();
        let events = vec![EventRecord::from_raw(0.5, 0x0100_0001), EventRecord::from_raw(1.0, 0x0100_0002)];
        let text = render_events("run", "Emcy", &events, Some(&table));
        assert!(text.contains("Shown (High Voltage)"));
        assert!(!text.contains("Secret"));
    }
}
