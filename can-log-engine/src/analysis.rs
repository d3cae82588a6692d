//! Resampling helpers for populated signals
//!
//! Signals are recorded at their own, often irregular, rates. These helpers
//! put one or more series on a common time grid using a zero-order hold: each
//! grid point takes the last sample strictly before it.

/// A borrowed time series
#[derive(Debug, Clone, Copy)]
pub struct SeriesRef<'a> {
    pub time: &'a [f64],
    pub value: &'a [f64],
}

impl<'a> SeriesRef<'a> {
    pub fn new(time: &'a [f64], value: &'a [f64]) -> Self {
        debug_assert_eq!(time.len(), value.len());
        Self { time, value }
    }

    fn bounds(&self) -> Option<(f64, f64)> {
        let min = self.time.iter().copied().reduce(f64::min)?;
        let max = self.time.iter().copied().reduce(f64::max)?;
        Some((min, max))
    }

    fn is_time_ordered(&self) -> bool {
        self.time.windows(2).all(|pair| pair[0] <= pair[1])
    }
}

/// Samples reordered by time. Merged recordings that overlap interleave
/// out of order; equal timestamps keep their original order.
fn sorted_by_time(series: SeriesRef<'_>) -> (Vec<f64>, Vec<f64>) {
    let mut samples: Vec<(f64, f64)> = series.time.iter().copied().zip(series.value.iter().copied()).collect();
    samples.sort_by(|a, b| a.0.total_cmp(&b.0));
    samples.into_iter().unzip()
}

/// Value of the last sample strictly before `t` in a time-ordered series
fn held_value(series: SeriesRef<'_>, t: f64) -> Option<f64> {
    let index = series.time.partition_point(|&sample| sample < t);
    index.checked_sub(1).map(|i| series.value[i])
}

/// Average sampling frequency in Hz, rounded.
///
/// Zero for series with fewer than two samples or no time span.
pub fn sampling_frequency(time: &[f64]) -> u16 {
    let Some((min, max)) = SeriesRef::new(time, time).bounds() else {
        return 0;
    };
    let duration = max - min;
    if time.len() < 2 || duration <= 0.0 {
        return 0;
    }
    (time.len() as f64 / duration).round().min(u16::MAX as f64) as u16
}

/// Resample a series onto `grid` (ascending).
///
/// Grid points at or before the first sample, and at or after the last
/// sample, keep 0.0.
pub fn resample_at(series: SeriesRef<'_>, grid: &[f64]) -> Vec<f64> {
    let mut result = vec![0.0; grid.len()];
    let Some((start, end)) = series.bounds() else {
        return result;
    };
    let sorted;
    let series = if series.is_time_ordered() {
        series
    } else {
        sorted = sorted_by_time(series);
        SeriesRef::new(&sorted.0, &sorted.1)
    };

    for (slot, &t) in result.iter_mut().zip(grid) {
        if t <= start {
            continue;
        }
        if t >= end {
            break;
        }
        if let Some(value) = held_value(series, t) {
            *slot = value;
        }
    }
    result
}

/// Resample a series onto a uniform grid of `frequency` Hz starting at its
/// first sample
pub fn resample_uniform(series: SeriesRef<'_>, frequency: u16) -> (Vec<f64>, Vec<f64>) {
    if frequency == 0 {
        return (Vec::new(), Vec::new());
    }
    let sorted;
    let series = if series.is_time_ordered() {
        series
    } else {
        sorted = sorted_by_time(series);
        SeriesRef::new(&sorted.0, &sorted.1)
    };
    let (Some(&first), Some(&last)) = (series.time.first(), series.time.last()) else {
        return (Vec::new(), Vec::new());
    };

    let dt = 1.0 / frequency as f64;
    let steps = ((last - first) / dt).floor().max(0.0) as usize;
    let grid: Vec<f64> = (0..steps).map(|step| first + step as f64 * dt).collect();

    let values = grid
        .iter()
        .map(|&t| held_value(series, t).unwrap_or(series.value[0]))
        .collect();
    (grid, values)
}

/// Put several series on one grid covering their common time span.
///
/// With `frequency == 0` the lowest sampling frequency of the inputs is used;
/// a single series is then returned as-is. Returns empty results when no
/// usable frequency can be determined.
pub fn resample_common(series: &[SeriesRef<'_>], frequency: u16) -> (Vec<f64>, Vec<Vec<f64>>) {
    match series {
        [] => return (Vec::new(), Vec::new()),
        [single] if frequency == 0 => return (single.time.to_vec(), vec![single.value.to_vec()]),
        [single] => {
            let (grid, values) = resample_uniform(*single, frequency);
            return (grid, vec![values]);
        }
        _ => {}
    }

    let frequency = if frequency == 0 {
        series
            .iter()
            .map(|s| sampling_frequency(s.time))
            .min()
            .unwrap_or(0)
    } else {
        frequency
    };
    if frequency < 1 {
        log::warn!("No usable sampling frequency, skipping resample");
        return (Vec::new(), Vec::new());
    }

    let mut start = f64::NEG_INFINITY;
    let mut end = f64::INFINITY;
    for s in series {
        let Some((min, max)) = s.bounds() else {
            return (Vec::new(), Vec::new());
        };
        start = start.max(min);
        end = end.min(max);
    }

    let steps = ((end - start) * frequency as f64).floor().max(0.0) as usize;
    let dt = 1.0 / frequency as f64;
    let grid: Vec<f64> = (0..steps).map(|step| start + dt * step as f64).collect();

    let columns = series.iter().map(|s| resample_at(*s, &grid)).collect();
    (grid, columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampling_frequency() {
        let time: Vec<f64> = (0..=100).map(|i| i as f64 * 0.01).collect();
        assert_eq!(sampling_frequency(&time), 101);
        assert_eq!(sampling_frequency(&[1.0]), 0);
        assert_eq!(sampling_frequency(&[]), 0);
        assert_eq!(sampling_frequency(&[2.0, 2.0]), 0);
    }

    #[test]
    fn test_resample_at_holds_previous_sample() {
        let time = [0.0, 1.0, 2.0, 3.0];
        let value = [10.0, 11.0, 12.0, 13.0];
        let grid = [-1.0, 0.0, 0.5, 1.0, 1.5, 2.9, 3.0, 4.0];

        let result = resample_at(SeriesRef::new(&time, &value), &grid);
        assert_eq!(result, vec![0.0, 0.0, 10.0, 10.0, 11.0, 12.0, 0.0, 0.0]);
    }

    #[test]
    fn test_resample_uniform() {
        let time = [0.0, 0.3, 1.0];
        let value = [1.0, 2.0, 3.0];
        let (grid, values) = resample_uniform(SeriesRef::new(&time, &value), 4);

        assert_eq!(grid, vec![0.0, 0.25, 0.5, 0.75]);
        assert_eq!(values, vec![1.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn test_resample_common_uses_overlap() {
        let time_a = [0.0, 1.0, 2.0, 3.0, 4.0];
        let value_a = [0.0, 1.0, 2.0, 3.0, 4.0];
        let time_b = [1.0, 2.0, 3.0];
        let value_b = [5.0, 6.0, 7.0];

        let (grid, columns) = resample_common(
            &[SeriesRef::new(&time_a, &value_a), SeriesRef::new(&time_b, &value_b)],
            2,
        );
        assert_eq!(grid, vec![1.0, 1.5, 2.0, 2.5]);
        assert_eq!(columns[0], vec![0.0, 1.0, 1.0, 2.0]);
        assert_eq!(columns[1], vec![0.0, 5.0, 5.0, 6.0]);
    }

    #[test]
    fn test_resample_overlapping_recordings() {
        // A merged file whose second recording starts before the first ends
        let time_a = [5.0, 6.0, 0.0];
        let value_a = [1.0, 2.0, 3.0];
        let time_b = [0.0, 10.0];
        let value_b = [0.0, 0.0];

        let (grid, columns) = resample_common(
            &[SeriesRef::new(&time_a, &value_a), SeriesRef::new(&time_b, &value_b)],
            1,
        );
        assert_eq!(grid, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(columns[0], vec![0.0, 3.0, 3.0, 3.0, 3.0, 3.0]);
        assert_eq!(columns[1], vec![0.0; 6]);

        let (grid, values) = resample_uniform(SeriesRef::new(&time_a, &value_a), 1);
        assert_eq!(grid, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(values, vec![3.0, 3.0, 3.0, 3.0, 3.0, 3.0]);
    }

    #[test]
    fn test_resample_common_single_series_passthrough() {
        let time = [0.0, 0.7];
        let value = [3.0, 4.0];
        let (grid, columns) = resample_common(&[SeriesRef::new(&time, &value)], 0);
        assert_eq!(grid, time.to_vec());
        assert_eq!(columns, vec![value.to_vec()]);
    }

    #[test]
    fn test_resample_common_without_frequency() {
        let time_a = [0.0];
        let time_b = [0.0, 1.0];
        let (grid, columns) = resample_common(
            &[SeriesRef::new(&time_a, &time_a), SeriesRef::new(&time_b, &time_b)],
            0,
        );
        assert!(grid.is_empty());
        assert!(columns.is_empty());
    }
}
