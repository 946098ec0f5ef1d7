//! Turns remaining-seat readings into passenger counts per station.

use crate::analyzers::types::{AnalysisParams, OccupancySeries, SEATS_NOT_REPORTED, Trip};

/// Passengers on board for one reading.
pub fn passengers_at(station: usize, remaining_seats: i32, params: &AnalysisParams) -> i32 {
    if Some(station) == params.primary_reset() {
        return 0;
    }
    (params.capacity - remaining_seats).max(0)
}

/// Replays a trip's readings in `(query_time, station)` order; the last
/// reading at a station wins. Reset stations without a reading are set to 0.
pub fn estimate_trip(trip: &Trip, params: &AnalysisParams) -> OccupancySeries {
    let mut readings: Vec<_> = trip.samples.iter().collect();
    readings.sort_by(|a, b| {
        a.query_time
            .cmp(&b.query_time)
            .then_with(|| a.station_index.cmp(&b.station_index))
    });

    let mut series = OccupancySeries::new();
    for sample in readings {
        if sample.remaining_seats == SEATS_NOT_REPORTED || sample.station_index < 0 {
            continue;
        }
        let station = sample.station_index as usize;
        series.insert(station, passengers_at(station, sample.remaining_seats, params));
    }

    for &station in &params.reset_stations {
        series.entry(station).or_insert(0);
    }

    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::types::{RawSample, TripId};
    use chrono::NaiveDate;

    fn trip(readings: &[(u32, i64, i32)]) -> Trip {
        let day = NaiveDate::from_ymd_opt(2025, 3, 4).unwrap();
        let samples: Vec<RawSample> = readings
            .iter()
            .map(|&(minute, station, seats)| RawSample {
                query_time: day.and_hms_opt(7, minute, 0).unwrap(),
                plate_no: "A".to_string(),
                station_index: station,
                remaining_seats: seats,
            })
            .collect();
        Trip {
            id: TripId::new("A", 1),
            start_time: samples[0].query_time,
            samples,
        }
    }

    #[test]
    fn test_capacity_minus_remaining() {
        let series = estimate_trip(&trip(&[(0, 3, 40)]), &AnalysisParams::default());

        assert_eq!(series.get(&3), Some(&5));
    }

    #[test]
    fn test_negative_count_clamps_to_zero() {
        let series = estimate_trip(&trip(&[(0, 3, 50)]), &AnalysisParams::default());

        assert_eq!(series.get(&3), Some(&0));
    }

    #[test]
    fn test_unreported_seats_are_skipped() {
        let series = estimate_trip(&trip(&[(0, 3, -1)]), &AnalysisParams::default());

        assert!(!series.contains_key(&3));
    }

    #[test]
    fn test_primary_reset_overrides_reading() {
        let series = estimate_trip(&trip(&[(0, 26, 5)]), &AnalysisParams::default());

        assert_eq!(series.get(&26), Some(&0));
    }

    #[test]
    fn test_reset_stations_default_to_zero() {
        let series = estimate_trip(&trip(&[(0, 3, 40)]), &AnalysisParams::default());

        assert_eq!(series.get(&26), Some(&0));
        assert_eq!(series.get(&51), Some(&0));
    }

    #[test]
    fn test_secondary_reset_keeps_observation() {
        let series = estimate_trip(&trip(&[(0, 51, 40)]), &AnalysisParams::default());

        assert_eq!(series.get(&51), Some(&5));
    }

    #[test]
    fn test_latest_reading_wins() {
        let series = estimate_trip(
            &trip(&[(0, 7, 30), (3, 7, 20), (1, 7, 44)]),
            &AnalysisParams::default(),
        );

        assert_eq!(series.get(&7), Some(&25));
    }
}
