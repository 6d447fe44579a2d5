//! Helpers shared by reference forecasts built from NWP output

use chrono::{DateTime, Duration, Utc};

use crate::error::{Result, SolarFetchError};

/// Default bin width of `resample`
pub fn default_resample_freq() -> Duration {
    Duration::hours(1)
}

/// Default grid spacing of `interpolate`
pub fn default_interpolate_freq() -> Duration {
    Duration::minutes(15)
}

/// Values on a sorted timestamp index
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    index: Vec<DateTime<Utc>>,
    values: Vec<f64>,
}

impl TimeSeries {
    /// Pair `values` with `index`
    ///
    /// Fails when the lengths differ or the index goes backwards.
    pub fn new(index: Vec<DateTime<Utc>>, values: Vec<f64>) -> Result<Self> {
        if index.len() != values.len() {
            return Err(SolarFetchError::Parse(format!(
                "Time series has {} timestamps but {} values",
                index.len(),
                values.len()
            )));
        }
        if let Some(pair) = index.windows(2).find(|pair| pair[1] < pair[0]) {
            return Err(SolarFetchError::Parse(format!(
                "Time series index is not sorted: {} comes after {}",
                pair[1], pair[0]
            )));
        }
        Ok(Self { index, values })
    }

    fn empty() -> Self {
        Self {
            index: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn index(&self) -> &[DateTime<Utc>] {
        &self.index
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

fn floor_to(ts: DateTime<Utc>, freq_secs: i64) -> i64 {
    ts.timestamp().div_euclid(freq_secs) * freq_secs
}

/// Mean of each `freq` bin, labelled by the left edge
///
/// Bins with no values are NaN. Empty input or a non-positive `freq` gives
/// an empty series.
pub fn resample(series: Option<&TimeSeries>, freq: Duration) -> Option<TimeSeries> {
    let series = series?;
    let freq_secs = freq.num_seconds();
    let (Some(first), Some(last)) = (series.index.first(), series.index.last()) else {
        return Some(TimeSeries::empty());
    };
    if freq_secs <= 0 {
        return Some(TimeSeries::empty());
    }

    let start = floor_to(*first, freq_secs);
    let bins = ((floor_to(*last, freq_secs) - start) / freq_secs + 1) as usize;
    let mut sums = vec![0.0; bins];
    let mut counts = vec![0usize; bins];

    for (ts, value) in series.index.iter().zip(&series.values) {
        if value.is_nan() {
            continue;
        }
        let bin = ((floor_to(*ts, freq_secs) - start) / freq_secs) as usize;
        sums[bin] += value;
        counts[bin] += 1;
    }

    let index = (0..bins)
        .filter_map(|i| DateTime::from_timestamp(start + i as i64 * freq_secs, 0))
        .collect();
    let values = sums
        .iter()
        .zip(&counts)
        .map(|(sum, count)| {
            if *count == 0 {
                f64::NAN
            } else {
                sum / *count as f64
            }
        })
        .collect();
    Some(TimeSeries { index, values })
}

/// `resample` every argument with the default frequency
pub fn resample_args(args: &[Option<&TimeSeries>]) -> Vec<Option<TimeSeries>> {
    args.iter()
        .map(|arg| resample(*arg, default_resample_freq()))
        .collect()
}

/// Linear interpolation onto a `freq` grid from the first to the last timestamp
pub fn interpolate(series: Option<&TimeSeries>, freq: Duration) -> Option<TimeSeries> {
    let series = series?;
    let (Some(first), Some(last)) = (series.index.first(), series.index.last()) else {
        return Some(TimeSeries::empty());
    };
    if freq <= Duration::zero() {
        return Some(TimeSeries::empty());
    }

    let mut index = Vec::new();
    let mut values = Vec::new();
    let mut ts = *first;
    let mut seg = 0;
    while ts <= *last {
        while seg + 1 < series.len() && series.index[seg + 1] < ts {
            seg += 1;
        }
        let value = if series.index[seg] == ts || seg + 1 == series.len() {
            series.values[seg]
        } else {
            let (t0, t1) = (series.index[seg], series.index[seg + 1]);
            let (v0, v1) = (series.values[seg], series.values[seg + 1]);
            let span = (t1 - t0).num_milliseconds() as f64;
            let elapsed = (ts - t0).num_milliseconds() as f64;
            v0 + (v1 - v0) * elapsed / span
        };
        index.push(ts);
        values.push(value);
        ts += freq;
    }
    Some(TimeSeries { index, values })
}

/// Convert cloud cover (%) to GHI with a linear model
///
/// `ghi = (offset + (100 - offset) * (1 - cc / 100)) / 100 * ghi_clear`.
/// The usual offset is 35.
pub fn cloud_cover_to_ghi_linear(cloud_cover: &[f64], ghi_clear: &[f64], offset: f64) -> Vec<f64> {
    cloud_cover
        .iter()
        .zip(ghi_clear)
        .map(|(cc, clear)| (offset + (100.0 - offset) * (1.0 - cc / 100.0)) / 100.0 * clear)
        .collect()
}
