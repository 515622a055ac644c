//! Generators for synthetic backend responses.

use chrono::{TimeZone, Utc};
use geo_backend::{ReductionValues, TimeSeriesRecord};

/// Monthly soil temperature records in Kelvin, starting January 2023.
///
/// Values follow `base_k + month_index * step_k`. Records are returned
/// newest first so tests exercise sorting.
pub fn monthly_temperature_series(band: &str, months: u32, base_k: f64, step_k: f64) -> Vec<TimeSeriesRecord> {
    let mut records: Vec<TimeSeriesRecord> = (0..months)
        .filter_map(|i| {
            let year = 2023 + (i / 12) as i32;
            let month = i % 12 + 1;
            let timestamp = Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single()?;
            let mut values = ReductionValues::new();
            values.insert(band.to_string(), Some(base_k + i as f64 * step_k));
            Some(TimeSeriesRecord { timestamp, values })
        })
        .collect();
    records.reverse();
    records
}

/// Reduction result with a single band value.
pub fn single_value(band: &str, value: f64) -> ReductionValues {
    let mut values = ReductionValues::new();
    values.insert(band.to_string(), Some(value));
    values
}

/// Reduction result where the band ran but produced nothing.
pub fn null_value(band: &str) -> ReductionValues {
    let mut values = ReductionValues::new();
    values.insert(band.to_string(), None);
    values
}
