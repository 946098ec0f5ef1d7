//! Read-only access to collected vehicle samples.

use crate::analyzers::types::RawSample;
use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// Collection counts for one date of a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub total_collections: usize,
    pub successful_collections: usize,
}

/// Provider of raw samples from successful (non-error, non-skipped)
/// collections.
///
/// Implementations are read-only while an analysis runs; the engine may be
/// called concurrently against the same source.
pub trait SampleSource: Send + Sync {
    /// Dates in `start..=end` for which collections exist, ascending.
    fn available_dates(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>>;

    /// Samples of one date. Order is not guaranteed; the engine sorts.
    fn fetch_day(&self, date: NaiveDate) -> Result<Vec<RawSample>>;

    /// Samples of every available date in `start..=end`.
    fn fetch_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, Vec<RawSample>>> {
        let mut days = BTreeMap::new();
        for date in self.available_dates(start, end)? {
            days.insert(date, self.fetch_day(date)?);
        }
        Ok(days)
    }
}

/// In-memory snapshot of samples, grouped by the date of `query_time`.
#[derive(Debug, Clone, Default)]
pub struct MemorySampleSource {
    days: BTreeMap<NaiveDate, Vec<RawSample>>,
}

impl MemorySampleSource {
    pub fn from_samples(samples: impl IntoIterator<Item = RawSample>) -> Self {
        let mut days: BTreeMap<NaiveDate, Vec<RawSample>> = BTreeMap::new();
        for sample in samples {
            days.entry(sample.query_time.date()).or_default().push(sample);
        }
        Self { days }
    }

    pub fn len(&self) -> usize {
        self.days.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SampleSource for MemorySampleSource {
    fn available_dates(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>> {
        if start > end {
            return Ok(Vec::new());
        }
        Ok(self.days.range(start..=end).map(|(date, _)| *date).collect())
    }

    fn fetch_day(&self, date: NaiveDate) -> Result<Vec<RawSample>> {
        Ok(self.days.get(&date).cloned().unwrap_or_default())
    }
}
