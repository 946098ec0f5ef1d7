//! Data types shared by the occupancy pipeline.

use crate::route::Stop;
use chrono::{NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// `remaining_seats` value meaning the vehicle did not report its seats.
pub const SEATS_NOT_REPORTED: i32 = -1;

/// One vehicle observation from a successful collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSample {
    pub query_time: NaiveDateTime,
    pub plate_no: String,
    pub station_index: i64,
    pub remaining_seats: i32,
}

/// `(plate, run number within the day)`, rendered as `plate_run`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TripId {
    pub plate_no: String,
    pub sequence: u32,
}

impl TripId {
    pub fn new(plate_no: impl Into<String>, sequence: u32) -> Self {
        Self {
            plate_no: plate_no.into(),
            sequence,
        }
    }
}

impl fmt::Display for TripId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.plate_no, self.sequence)
    }
}

impl Serialize for TripId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A run of one vehicle along the route, with the samples that belong to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trip {
    pub id: TripId,
    pub start_time: NaiveDateTime,
    pub samples: Vec<RawSample>,
}

/// Station index to estimated passengers on board.
pub type OccupancySeries = BTreeMap<usize, i32>;

/// Station index to signed boarding (outbound) or alighting (return) delta.
pub type ChangeSeries = BTreeMap<usize, i32>;

/// Station index to the mean occupancy across days, one decimal.
pub type AveragedSeries = BTreeMap<usize, f64>;

/// What to do when the stop after the current one is a bypass stop with a
/// value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BypassPolicy {
    /// Replace the current value even if it was observed.
    #[default]
    Overwrite,
    /// Only fill the current station when it has no value.
    FillOnly,
}

/// Tunables of the occupancy model. Defaults describe route 8201.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisParams {
    pub capacity: i32,
    /// Stations where the vehicle is known to be empty. The first one also
    /// overrides any reading taken there.
    pub reset_stations: Vec<usize>,
    /// Last station of the outbound half; deltas after it count alighting.
    pub direction_split: usize,
    pub segment_drop_threshold: i64,
    pub weekday_trip_cap: usize,
    pub weekend_trip_cap: usize,
    /// Trips with at least this many zero-valued stations are left out of
    /// averages.
    pub zero_station_limit: usize,
    pub bypass_policy: BypassPolicy,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            capacity: 45,
            reset_stations: vec![26, 51],
            direction_split: 26,
            segment_drop_threshold: 20,
            weekday_trip_cap: 20,
            weekend_trip_cap: 16,
            zero_station_limit: 10,
            bypass_policy: BypassPolicy::Overwrite,
        }
    }
}

impl AnalysisParams {
    /// Station whose readings are always forced to zero.
    pub fn primary_reset(&self) -> Option<usize> {
        self.reset_stations.first().copied()
    }

    pub fn trip_cap(&self, is_weekend: bool) -> usize {
        if is_weekend {
            self.weekend_trip_cap
        } else {
            self.weekday_trip_cap
        }
    }
}

/// A retained trip in start-time order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TripRun {
    pub id: TripId,
    pub start_time: NaiveDateTime,
}

/// Result of analysing one calendar date.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyAnalysis {
    pub date: NaiveDate,
    pub is_weekend: bool,
    pub trip_cap: usize,
    pub trips: Vec<TripRun>,
    pub occupancy: BTreeMap<TripId, OccupancySeries>,
    pub changes: BTreeMap<TripId, ChangeSeries>,
}

/// Which dates of a range take part in an average.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DayFilter {
    #[default]
    All,
    Weekday(Weekday),
    WeekendsOnly,
    WeekdaysOnly,
}

/// Positional bucket reference: the reference date's trip at `rank`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotRef {
    pub label: String,
    pub rank: usize,
    pub reference_trip: TripId,
    pub start_time: NaiveDateTime,
}

/// Result of averaging daily analyses over a date range.
#[derive(Debug, Clone, PartialEq)]
pub struct AverageAnalysis {
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reference_date: NaiveDate,
    pub days_analyzed: usize,
    pub slots: Vec<SlotRef>,
    pub passengers: BTreeMap<usize, AveragedSeries>,
    pub changes: BTreeMap<usize, AveragedSeries>,
}

/// Single-date payload handed to the presentation layer.
#[derive(Debug, Serialize)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub is_weekend: bool,
    pub max_trips: usize,
    pub buses: Vec<TripId>,
    pub stations: Vec<Stop>,
    pub passengers: BTreeMap<TripId, OccupancySeries>,
    pub changes: BTreeMap<TripId, ChangeSeries>,
}

/// Range payload handed to the presentation layer, keyed by slot label.
#[derive(Debug, Serialize)]
pub struct AverageReport {
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reference_date: NaiveDate,
    pub days_analyzed: usize,
    pub buses: Vec<String>,
    pub slots: Vec<SlotRef>,
    pub stations: Vec<Stop>,
    pub passengers: BTreeMap<String, AveragedSeries>,
    pub changes: BTreeMap<String, AveragedSeries>,
}

