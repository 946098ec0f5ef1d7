//! Date-partitioned CSV store of collection records.
//!
//! Layout: `{base_dir}/route_id={route}/date=YYYY-MM-DD.csv`. Gzipped
//! `date=YYYY-MM-DD.csv.gz` archives next to them are read as well.

use crate::analyzers::segment::sort_samples;
use crate::analyzers::types::RawSample;
use crate::collection::{Collection, CollectionRecord};
use crate::output::{append_records, read_records};
use crate::services::sample_source::{DailySummary, SampleSource};
use anyhow::Result;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct CsvSampleStore {
    route_dir: PathBuf,
}

impl CsvSampleStore {
    pub fn new(base_dir: impl AsRef<Path>, route_id: &str) -> Self {
        Self {
            route_dir: base_dir.as_ref().join(format!("route_id={route_id}")),
        }
    }

    pub fn route_dir(&self) -> &Path {
        &self.route_dir
    }

    fn day_file(&self, date: NaiveDate) -> PathBuf {
        self.route_dir
            .join(format!("date={}.csv", date.format(DATE_FORMAT)))
    }

    fn day_files(&self, date: NaiveDate) -> Vec<PathBuf> {
        let plain = self.day_file(date);
        let gz = plain.with_extension("csv.gz");
        [plain, gz].into_iter().filter(|p| p.exists()).collect()
    }

    /// Persists one collection, returning the number of rows written.
    pub fn append(&self, collection: &Collection) -> Result<usize> {
        self.append_records(&collection.to_records())
    }

    /// Appends records to the file of their collection date.
    pub fn append_records(&self, records: &[CollectionRecord]) -> Result<usize> {
        fs::create_dir_all(&self.route_dir)?;

        let mut by_date: BTreeMap<NaiveDate, Vec<&CollectionRecord>> = BTreeMap::new();
        for record in records {
            by_date.entry(record.collection_date).or_default().push(record);
        }

        for (date, rows) in &by_date {
            append_records(self.day_file(*date), rows)?;
        }

        Ok(records.len())
    }

    /// Dates with at least one file in the store, ascending.
    pub fn dates(&self) -> Result<Vec<NaiveDate>> {
        if !self.route_dir.exists() {
            return Ok(Vec::new());
        }

        let mut dates = BTreeSet::new();
        for entry in fs::read_dir(&self.route_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            let stem = name
                .strip_suffix(".csv.gz")
                .or_else(|| name.strip_suffix(".csv"))
                .and_then(|s| s.strip_prefix("date="));
            if let Some(date) = stem.and_then(|s| NaiveDate::parse_from_str(s, DATE_FORMAT).ok()) {
                dates.insert(date);
            }
        }

        Ok(dates.into_iter().collect())
    }

    /// Every record stored for `date`.
    pub fn load_records(&self, date: NaiveDate) -> Result<Vec<CollectionRecord>> {
        let mut rows = Vec::new();
        for path in self.day_files(date) {
            let mut loaded: Vec<CollectionRecord> = read_records(&path)?;
            debug!(path = %path.display(), rows = loaded.len(), "Loaded collection rows");
            rows.append(&mut loaded);
        }
        Ok(rows)
    }

    /// Collection counts per date in `start..=end`, newest first. A
    /// collection is one distinct query time.
    pub fn daily_summaries(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<DailySummary>> {
        let mut summaries = Vec::new();
        for date in self.available_dates(start, end)?.into_iter().rev() {
            let records = self.load_records(date)?;
            let total: BTreeSet<_> = records.iter().map(|r| r.query_time).collect();
            let successful: BTreeSet<_> = records
                .iter()
                .filter(|r| r.is_successful())
                .map(|r| r.query_time)
                .collect();
            summaries.push(DailySummary {
                date,
                total_collections: total.len(),
                successful_collections: successful.len(),
            });
        }
        Ok(summaries)
    }
}

impl SampleSource for CsvSampleStore {
    fn available_dates(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>> {
        Ok(self
            .dates()?
            .into_iter()
            .filter(|d| (start..=end).contains(d))
            .collect())
    }

    fn fetch_day(&self, date: NaiveDate) -> Result<Vec<RawSample>> {
        let records = self.load_records(date)?;
        let mut dropped = 0usize;
        let mut samples: Vec<RawSample> = records
            .iter()
            .filter(|r| r.is_successful())
            .filter_map(|r| match r.to_sample() {
                Ok(sample) => Some(sample),
                Err(e) => {
                    // empty collections carry no bus fields
                    if r.plate_no.is_some() {
                        trace!(error = %e, query_time = %r.query_time, "Dropping invalid row");
                        dropped += 1;
                    }
                    None
                }
            })
            .collect();
        sort_samples(&mut samples);

        debug!(%date, samples = samples.len(), dropped, "Samples fetched");
        Ok(samples)
    }
}
