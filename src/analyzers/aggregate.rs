use crate::analyzers::changes::station_changes;
use crate::analyzers::error::AnalysisError;
use crate::analyzers::types::{
    AnalysisParams, AverageAnalysis, AveragedSeries, DailyAnalysis, DayFilter, OccupancySeries,
    SlotRef,
};
use crate::analyzers::utility::{is_weekend, mean, round_to_tenth, weekday_name};
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;
use tracing::debug;

impl DayFilter {
    pub fn matches(&self, date: NaiveDate) -> bool {
        match self {
            DayFilter::All => true,
            DayFilter::Weekday(weekday) => date.weekday() == *weekday,
            DayFilter::WeekendsOnly => is_weekend(date),
            DayFilter::WeekdaysOnly => !is_weekend(date),
        }
    }

    pub fn title(&self) -> String {
        match self {
            DayFilter::All => "Overall average".into(),
            DayFilter::Weekday(weekday) => weekday_name(*weekday).into(),
            DayFilter::WeekendsOnly => "Weekend average".into(),
            DayFilter::WeekdaysOnly => "Weekday average".into(),
        }
    }
}

/// Whether a filled trip may take part in averages: fewer than
/// `zero_station_limit` stations valued exactly 0.
pub fn qualifies(series: &OccupancySeries, zero_station_limit: usize) -> bool {
    series.values().filter(|&&v| v == 0).count() < zero_station_limit
}

pub fn slot_label(rank: usize) -> String {
    format!("Trip slot {}", rank + 1)
}

/// Occupancy values collected per `(rank, station)` across days.
///
/// Appends are order independent: the reduced mean does not depend on the
/// order days are added in.
#[derive(Debug, Default)]
pub struct SlotAccumulator {
    slots: BTreeMap<usize, BTreeMap<usize, Vec<f64>>>,
}

impl SlotAccumulator {
    pub fn push(&mut self, rank: usize, series: &OccupancySeries) {
        let slot = self.slots.entry(rank).or_default();
        for (&station, &value) in series {
            slot.entry(station).or_default().push(value as f64);
        }
    }

    pub fn has_values(&self, rank: usize) -> bool {
        self.slots
            .get(&rank)
            .is_some_and(|stations| stations.values().any(|v| !v.is_empty()))
    }

    /// Mean per station of one slot, one decimal.
    pub fn averaged(&self, rank: usize) -> AveragedSeries {
        self.slots
            .get(&rank)
            .map(|stations| {
                stations
                    .iter()
                    .filter(|(_, values)| !values.is_empty())
                    .map(|(&station, values)| (station, round_to_tenth(mean(values))))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Averages already analysed days positionally.
///
/// A trip's slot is its rank in its day's capped, start-ordered list, so a
/// slot mixes different vehicles across days. Slots are labelled from the
/// day with the most qualifying trips (the earliest such day on ties); only
/// that day's ranks are emitted, and only when they collected a value.
pub fn average_days(
    days: &[DailyAnalysis],
    start: NaiveDate,
    end: NaiveDate,
    filter: DayFilter,
    params: &AnalysisParams,
) -> Result<AverageAnalysis, AnalysisError> {
    let mut accumulator = SlotAccumulator::default();
    let mut reference: Option<(&DailyAnalysis, usize)> = None;
    let mut total_qualifying = 0usize;

    for day in days {
        let mut qualifying = 0usize;
        for (rank, run) in day.trips.iter().enumerate() {
            let Some(series) = day.occupancy.get(&run.id) else {
                continue;
            };
            if !qualifies(series, params.zero_station_limit) {
                debug!(date = %day.date, trip = %run.id, rank, "Trip excluded by zero-station filter");
                continue;
            }
            accumulator.push(rank, series);
            qualifying += 1;
        }

        total_qualifying += qualifying;
        if reference.is_none_or(|(_, best)| qualifying > best) {
            reference = Some((day, qualifying));
        }
    }

    let Some((reference, _)) = reference.filter(|_| total_qualifying > 0) else {
        return Err(AnalysisError::NoQualifyingData);
    };

    let mut slots = Vec::new();
    let mut passengers = BTreeMap::new();
    let mut changes = BTreeMap::new();
    for (rank, run) in reference.trips.iter().enumerate() {
        if !accumulator.has_values(rank) {
            continue;
        }
        let averaged = accumulator.averaged(rank);
        let deltas = station_changes(&averaged, params.direction_split)
            .into_iter()
            .map(|(station, delta)| (station, round_to_tenth(delta)))
            .collect();

        slots.push(SlotRef {
            label: slot_label(rank),
            rank,
            reference_trip: run.id.clone(),
            start_time: run.start_time,
        });
        passengers.insert(rank, averaged);
        changes.insert(rank, deltas);
    }

    Ok(AverageAnalysis {
        title: filter.title(),
        start_date: start,
        end_date: end,
        reference_date: reference.date,
        days_analyzed: days.len(),
        slots,
        passengers,
        changes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::types::{TripId, TripRun};
    use chrono::Weekday;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    fn day(on: NaiveDate, trips: Vec<(&str, OccupancySeries)>) -> DailyAnalysis {
        let mut runs = Vec::new();
        let mut occupancy = BTreeMap::new();
        for (i, (plate, series)) in trips.into_iter().enumerate() {
            let id = TripId::new(plate, 1);
            runs.push(TripRun {
                id: id.clone(),
                start_time: on.and_hms_opt(6, i as u32, 0).unwrap(),
            });
            occupancy.insert(id, series);
        }
        DailyAnalysis {
            date: on,
            is_weekend: is_weekend(on),
            trip_cap: 20,
            trips: runs,
            occupancy,
            changes: BTreeMap::new(),
        }
    }

    fn series(values: &[(usize, i32)]) -> OccupancySeries {
        values.iter().copied().collect()
    }

    fn zeros(count: usize) -> OccupancySeries {
        (0..count).map(|station| (station, 0)).collect()
    }

    #[test]
    fn test_slot_values_average_across_days() {
        let days = vec![
            day(date(3), vec![("A", series(&[(3, 10)]))]),
            day(date(4), vec![("B", series(&[(3, 20)]))]),
        ];

        let avg = average_days(&days, date(3), date(4), DayFilter::All, &AnalysisParams::default())
            .unwrap();

        assert_eq!(avg.passengers[&0].get(&3), Some(&15.0));
        assert_eq!(avg.slots[0].label, "Trip slot 1");
        assert_eq!(avg.title, "Overall average");
    }

    #[test]
    fn test_degenerate_first_trip_is_excluded() {
        let days = vec![day(
            date(4),
            vec![("A", zeros(10)), ("B", series(&[(1, 5), (2, 7)]))],
        )];

        let avg = average_days(&days, date(4), date(4), DayFilter::All, &AnalysisParams::default())
            .unwrap();

        assert_eq!(avg.slots.len(), 1);
        assert_eq!(avg.slots[0].rank, 1);
        assert_eq!(avg.slots[0].label, "Trip slot 2");
        assert!(!avg.passengers.contains_key(&0));
    }

    #[test]
    fn test_nine_zero_stations_still_qualify() {
        assert!(qualifies(&zeros(9), 10));
        assert!(!qualifies(&zeros(10), 10));
    }

    #[test]
    fn test_all_degenerate_is_no_qualifying_data() {
        let days = vec![day(date(4), vec![("A", zeros(12))])];

        let result = average_days(&days, date(4), date(4), DayFilter::All, &AnalysisParams::default());

        assert!(matches!(result, Err(AnalysisError::NoQualifyingData)));
    }

    #[test]
    fn test_no_days_is_no_qualifying_data() {
        let result = average_days(&[], date(4), date(4), DayFilter::All, &AnalysisParams::default());

        assert!(matches!(result, Err(AnalysisError::NoQualifyingData)));
    }

    #[test]
    fn test_reference_is_day_with_most_qualifying_trips() {
        let days = vec![
            day(
                date(3),
                vec![
                    ("A", zeros(10)),
                    ("B", zeros(10)),
                    ("C", series(&[(1, 4)])),
                ],
            ),
            day(
                date(4),
                vec![("D", series(&[(1, 6)])), ("E", series(&[(1, 8)]))],
            ),
        ];

        let avg = average_days(&days, date(3), date(4), DayFilter::All, &AnalysisParams::default())
            .unwrap();

        assert_eq!(avg.reference_date, date(4));
        assert_eq!(avg.slots.len(), 2);
        assert_eq!(avg.slots[0].reference_trip, TripId::new("D", 1));
        // rank 2 of the first day has no counterpart in the reference day
        assert!(!avg.passengers.contains_key(&2));
    }

    #[test]
    fn test_changes_recomputed_on_averages() {
        let days = vec![
            day(date(3), vec![("A", series(&[(1, 1), (2, 4)]))]),
            day(date(4), vec![("B", series(&[(1, 2), (2, 4)]))]),
        ];

        let avg = average_days(&days, date(3), date(4), DayFilter::All, &AnalysisParams::default())
            .unwrap();

        assert_eq!(avg.passengers[&0].get(&1), Some(&1.5));
        assert_eq!(avg.changes[&0].get(&2), Some(&2.5));
        assert_eq!(avg.changes[&0].get(&1), None);
    }

    #[test]
    fn test_day_filter_matches() {
        // 2025-03-01 Saturday, 2025-03-03 Monday
        assert!(DayFilter::WeekendsOnly.matches(date(1)));
        assert!(!DayFilter::WeekendsOnly.matches(date(3)));
        assert!(DayFilter::WeekdaysOnly.matches(date(3)));
        assert!(DayFilter::Weekday(Weekday::Mon).matches(date(3)));
        assert!(!DayFilter::Weekday(Weekday::Mon).matches(date(4)));
        assert!(DayFilter::All.matches(date(1)));
    }

    #[test]
    fn test_filter_titles() {
        assert_eq!(DayFilter::Weekday(Weekday::Wed).title(), "Wednesday");
        assert_eq!(DayFilter::WeekendsOnly.title(), "Weekend average");
        assert_eq!(DayFilter::WeekdaysOnly.title(), "Weekday average");
    }
}
