use crate::analyzers::aggregate::average_days;
use crate::analyzers::changes::station_changes;
use crate::analyzers::error::AnalysisError;
use crate::analyzers::estimate::estimate_trip;
use crate::analyzers::fill::fill_gaps;
use crate::analyzers::segment::{cap_trips, retain_valid, segment_trips, sort_samples};
use crate::analyzers::types::{
    AnalysisParams, AverageAnalysis, AverageReport, AveragedSeries, DailyAnalysis, DailyReport,
    DayFilter, RawSample, SlotRef, TripRun,
};
use crate::analyzers::utility::is_weekend;
use crate::route::RouteTopology;
use crate::services::sample_source::SampleSource;
use anyhow::{Result, bail};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Runs segmentation, estimation, gap filling and change calculation for
/// one date's samples.
pub fn analyze_samples(
    date: NaiveDate,
    samples: Vec<RawSample>,
    topology: &RouteTopology,
    params: &AnalysisParams,
) -> Result<DailyAnalysis, AnalysisError> {
    let received = samples.len();
    let mut samples = retain_valid(samples, topology);
    if samples.is_empty() {
        return Err(AnalysisError::NoData { date });
    }
    sort_samples(&mut samples);

    let weekend = is_weekend(date);
    let trip_cap = params.trip_cap(weekend);
    let segmented = segment_trips(samples, params.segment_drop_threshold);
    let segmented_count = segmented.len();
    let trips = cap_trips(segmented, trip_cap);

    let mut occupancy = BTreeMap::new();
    let mut changes = BTreeMap::new();
    for trip in &trips {
        let mut series = estimate_trip(trip, params);
        fill_gaps(&mut series, topology, params);
        changes.insert(trip.id.clone(), station_changes(&series, params.direction_split));
        occupancy.insert(trip.id.clone(), series);
    }

    debug!(
        %date,
        received,
        trips = segmented_count,
        retained = trips.len(),
        trip_cap,
        "Daily analysis complete"
    );

    Ok(DailyAnalysis {
        date,
        is_weekend: weekend,
        trip_cap,
        trips: trips
            .into_iter()
            .map(|t| TripRun {
                id: t.id,
                start_time: t.start_time,
            })
            .collect(),
        occupancy,
        changes,
    })
}

fn relabel(
    slots: &[SlotRef],
    series: &BTreeMap<usize, AveragedSeries>,
) -> BTreeMap<String, AveragedSeries> {
    slots
        .iter()
        .filter_map(|slot| {
            series
                .get(&slot.rank)
                .map(|values| (slot.label.clone(), values.clone()))
        })
        .collect()
}

/// Occupancy engine bound to one route and one sample source.
///
/// Holds no mutable state; every call is a pure function of the source's
/// samples, so one engine can serve concurrent requests.
pub struct OccupancyEngine<S> {
    source: S,
    topology: Arc<RouteTopology>,
    params: AnalysisParams,
}

impl<S: SampleSource> OccupancyEngine<S> {
    pub fn new(source: S, topology: Arc<RouteTopology>, params: AnalysisParams) -> Result<Self> {
        if topology.is_empty() {
            bail!("route topology has no stops");
        }
        if let Some(&station) = params.reset_stations.iter().find(|&&s| s >= topology.len()) {
            bail!(
                "reset station {} is outside the route ({} stops)",
                station,
                topology.len()
            );
        }
        Ok(Self {
            source,
            topology,
            params,
        })
    }

    #[tracing::instrument(skip(self), fields(date = %date))]
    pub fn analyze_day(&self, date: NaiveDate) -> Result<DailyAnalysis, AnalysisError> {
        let samples = self.source.fetch_day(date)?;
        analyze_samples(date, samples, &self.topology, &self.params)
    }

    /// Averages every available date in `start..=end` accepted by `filter`.
    #[tracing::instrument(skip(self), fields(start = %start, end = %end, filter = ?filter))]
    pub fn average(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        filter: DayFilter,
    ) -> Result<AverageAnalysis, AnalysisError> {
        let days = self.source.fetch_range(start, end)?;

        let mut analyses = Vec::new();
        let mut dates_considered = 0usize;
        for (date, samples) in days {
            if !filter.matches(date) {
                continue;
            }
            dates_considered += 1;
            match analyze_samples(date, samples, &self.topology, &self.params) {
                Ok(analysis) => analyses.push(analysis),
                Err(AnalysisError::NoData { date }) => {
                    debug!(%date, "No usable samples, skipping date");
                }
                Err(e) => return Err(e),
            }
        }

        if dates_considered == 0 {
            return Err(AnalysisError::NoQualifyingData);
        }

        let average = average_days(&analyses, start, end, filter, &self.params)?;
        info!(
            dates = dates_considered,
            days_analyzed = average.days_analyzed,
            slots = average.slots.len(),
            reference_date = %average.reference_date,
            "Average computed"
        );
        Ok(average)
    }

    pub fn daily_report(&self, analysis: &DailyAnalysis) -> DailyReport {
        DailyReport {
            date: analysis.date,
            is_weekend: analysis.is_weekend,
            max_trips: analysis.trip_cap,
            buses: analysis.trips.iter().map(|t| t.id.clone()).collect(),
            stations: self.topology.stops().to_vec(),
            passengers: analysis.occupancy.clone(),
            changes: analysis.changes.clone(),
        }
    }

    pub fn average_report(&self, analysis: &AverageAnalysis) -> AverageReport {
        AverageReport {
            title: analysis.title.clone(),
            start_date: analysis.start_date,
            end_date: analysis.end_date,
            reference_date: analysis.reference_date,
            days_analyzed: analysis.days_analyzed,
            buses: analysis.slots.iter().map(|s| s.label.clone()).collect(),
            slots: analysis.slots.clone(),
            stations: self.topology.stops().to_vec(),
            passengers: relabel(&analysis.slots, &analysis.passengers),
            changes: relabel(&analysis.slots, &analysis.changes),
        }
    }
}
