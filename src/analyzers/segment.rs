//! Splits a day's samples into per-vehicle trips.
//!
//! Each plate carries a cursor `(last station, run number)`. A sample whose
//! station falls more than `drop_threshold` stops behind the previous one
//! starts a new run, since forward travel on one pass cannot move backwards
//! that far. The cursors live in an accumulator folded over the ordered
//! samples; no state outlives the call.

use crate::analyzers::types::{RawSample, Trip, TripId};
use crate::route::RouteTopology;
use std::collections::HashMap;
use tracing::trace;

#[derive(Debug, Clone, Copy)]
struct PlateCursor {
    last_station: i64,
    run: u32,
}

#[derive(Debug, Default)]
struct Segmentation {
    cursors: HashMap<String, PlateCursor>,
    trips: Vec<Trip>,
    by_id: HashMap<TripId, usize>,
}

impl Segmentation {
    fn push(mut self, sample: RawSample, drop_threshold: i64) -> Self {
        let run = match self.cursors.get_mut(&sample.plate_no) {
            None => {
                self.cursors.insert(
                    sample.plate_no.clone(),
                    PlateCursor {
                        last_station: sample.station_index,
                        run: 1,
                    },
                );
                1
            }
            Some(cursor) => {
                if sample.station_index < cursor.last_station - drop_threshold {
                    cursor.run += 1;
                }
                cursor.last_station = sample.station_index;
                cursor.run
            }
        };

        let id = TripId::new(sample.plate_no.clone(), run);
        match self.by_id.get(&id) {
            Some(&slot) => {
                let trip = &mut self.trips[slot];
                if sample.query_time < trip.start_time {
                    trip.start_time = sample.query_time;
                }
                trip.samples.push(sample);
            }
            None => {
                self.by_id.insert(id.clone(), self.trips.len());
                self.trips.push(Trip {
                    id,
                    start_time: sample.query_time,
                    samples: vec![sample],
                });
            }
        }
        self
    }
}

/// Orders samples by `(query_time, plate_no, station_index)`.
pub fn sort_samples(samples: &mut [RawSample]) {
    samples.sort_by(|a, b| {
        a.query_time
            .cmp(&b.query_time)
            .then_with(|| a.plate_no.cmp(&b.plate_no))
            .then_with(|| a.station_index.cmp(&b.station_index))
    });
}

/// Drops samples with an empty plate or a station outside the route.
pub fn retain_valid(samples: Vec<RawSample>, topology: &RouteTopology) -> Vec<RawSample> {
    samples
        .into_iter()
        .filter(|s| {
            let valid = !s.plate_no.trim().is_empty() && topology.contains(s.station_index);
            if !valid {
                trace!(
                    plate_no = %s.plate_no,
                    station_index = s.station_index,
                    "Dropping sample outside route"
                );
            }
            valid
        })
        .collect()
}

/// Groups time-ordered samples into trips, in order of first sighting.
pub fn segment_trips(samples: Vec<RawSample>, drop_threshold: i64) -> Vec<Trip> {
    samples
        .into_iter()
        .fold(Segmentation::default(), |acc, sample| {
            acc.push(sample, drop_threshold)
        })
        .trips
}

/// Keeps the `cap` earliest-starting trips. Equal start times keep their
/// sighting order.
pub fn cap_trips(mut trips: Vec<Trip>, cap: usize) -> Vec<Trip> {
    trips.sort_by_key(|t| t.start_time);
    trips.truncate(cap);
    trips
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 4)
            .unwrap()
            .and_hms_opt(6 + minute / 60, minute % 60, 0)
            .unwrap()
    }

    fn sample(minute: u32, plate: &str, station: i64) -> RawSample {
        RawSample {
            query_time: at(minute),
            plate_no: plate.to_string(),
            station_index: station,
            remaining_seats: 30,
        }
    }

    #[test]
    fn test_drop_beyond_threshold_starts_new_trip() {
        let stations = [5, 10, 15, 55, 58, 2, 6];
        let samples = stations
            .iter()
            .enumerate()
            .map(|(i, &s)| sample(i as u32 * 2, "70A1234", s))
            .collect();

        let trips = segment_trips(samples, 20);

        assert_eq!(trips.len(), 2);
        let first: Vec<i64> = trips[0].samples.iter().map(|s| s.station_index).collect();
        let second: Vec<i64> = trips[1].samples.iter().map(|s| s.station_index).collect();
        assert_eq!(first, vec![5, 10, 15, 55, 58]);
        assert_eq!(second, vec![2, 6]);
        assert_eq!(trips[1].id, TripId::new("70A1234", 2));
        assert_eq!(trips[1].start_time, at(10));
    }

    #[test]
    fn test_drop_of_exactly_threshold_stays_in_trip() {
        let samples = vec![sample(0, "A", 30), sample(2, "A", 10)];

        let trips = segment_trips(samples, 20);

        assert_eq!(trips.len(), 1);
    }

    #[test]
    fn test_threshold_is_configurable() {
        let samples = vec![sample(0, "A", 30), sample(2, "A", 24)];

        assert_eq!(segment_trips(samples.clone(), 20).len(), 1);
        assert_eq!(segment_trips(samples, 5).len(), 2);
    }

    #[test]
    fn test_plates_are_tracked_independently() {
        let samples = vec![
            sample(0, "A", 40),
            sample(0, "B", 1),
            sample(2, "A", 41),
            sample(2, "B", 2),
        ];

        let trips = segment_trips(samples, 20);

        assert_eq!(trips.len(), 2);
        assert_eq!(trips[0].id, TripId::new("A", 1));
        assert_eq!(trips[1].id, TripId::new("B", 1));
    }

    #[test]
    fn test_cap_keeps_earliest_starts() {
        let trips: Vec<Trip> = (0..25)
            .rev()
            .map(|i| Trip {
                id: TripId::new(format!("P{i}"), 1),
                start_time: at(i * 10),
                samples: Vec::new(),
            })
            .collect();

        let kept = cap_trips(trips, 20);

        assert_eq!(kept.len(), 20);
        assert_eq!(kept[0].id.plate_no, "P0");
        assert_eq!(kept[19].id.plate_no, "P19");
    }

    #[test]
    fn test_retain_valid_filters_range_and_plate() {
        let topology = RouteTopology::from_names(["A", "B", "C"], "(경유)");
        let samples = vec![
            sample(0, "A", 0),
            sample(0, "A", 3),
            sample(0, "A", -1),
            sample(0, " ", 1),
        ];

        let kept = retain_valid(samples, &topology);

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].station_index, 0);
    }

    #[test]
    fn test_sort_samples_orders_by_time_plate_station() {
        let mut samples = vec![sample(2, "A", 1), sample(0, "B", 5), sample(0, "A", 9), sample(0, "A", 3)];

        sort_samples(&mut samples);

        let order: Vec<(String, i64)> = samples
            .iter()
            .map(|s| (s.plate_no.clone(), s.station_index))
            .collect();
        assert_eq!(
            order,
            vec![
                ("A".to_string(), 3),
                ("A".to_string(), 9),
                ("B".to_string(), 5),
                ("A".to_string(), 1)
            ]
        );
    }
}
