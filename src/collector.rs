//! Periodic poller that records bus positions into the sample store.

use crate::collection::Collection;
use crate::infra::csv_store::CsvSampleStore;
use crate::services::location_api::LocationApi;
use anyhow::Result;
use chrono::{FixedOffset, NaiveDateTime, NaiveTime, Offset, SubsecRound, Utc};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

pub const QUIET_HOURS_REASON: &str = "collection paused between quiet_start and quiet_end";

#[derive(Debug, Clone, PartialEq)]
pub struct CollectorSettings {
    pub route_id: String,
    pub interval: Duration,
    pub utc_offset: FixedOffset,
    pub quiet_start: NaiveTime,
    pub quiet_end: NaiveTime,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            route_id: "234001730".to_string(),
            interval: Duration::from_secs(90),
            utc_offset: FixedOffset::east_opt(9 * 3600).unwrap_or(Utc.fix()),
            quiet_start: NaiveTime::MIN,
            quiet_end: NaiveTime::from_hms_opt(5, 30, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

/// Whether `time` falls in `[start, end]`. A window with `start > end` wraps
/// past midnight.
pub fn in_quiet_window(time: NaiveTime, start: NaiveTime, end: NaiveTime) -> bool {
    if start <= end {
        start <= time && time <= end
    } else {
        time >= start || time <= end
    }
}

/// Wall-clock time at `offset`, truncated to whole seconds.
pub fn local_now(offset: FixedOffset) -> NaiveDateTime {
    Utc::now().with_timezone(&offset).naive_local().trunc_subsecs(0)
}

/// Performs one collection at local time `now`.
///
/// Never fails: API errors and transport failures become error collections,
/// and the quiet window yields a skipped collection without a request.
#[tracing::instrument(skip(api, settings), fields(route_id = %settings.route_id, %now))]
pub async fn collect_once<A: LocationApi + ?Sized>(
    api: &A,
    settings: &CollectorSettings,
    now: NaiveDateTime,
) -> Collection {
    let route_id = settings.route_id.as_str();

    if in_quiet_window(now.time(), settings.quiet_start, settings.quiet_end) {
        debug!("Inside quiet window, skipping request");
        return Collection::skipped(route_id, now, QUIET_HOURS_REASON);
    }

    match api.bus_locations(route_id).await {
        Ok(response) if response.is_success() => {
            debug!(buses = response.buses.len(), "Bus locations received");
            Collection::buses(route_id, now, response.buses)
        }
        Ok(response) => {
            warn!(
                result_code = response.result_code,
                message = %response.result_message,
                "API returned an error result"
            );
            Collection::from_error(route_id, now, response.result_code, &response.result_message)
        }
        Err(e) => {
            error!(error = %e, "Bus location request failed");
            Collection::from_error(route_id, now, -1, &e.to_string())
        }
    }
}

/// Collects `num_samples` rounds (0 = forever), `settings.interval` apart,
/// appending each to `store`. A round that overruns the interval is followed
/// immediately by the next one.
#[tracing::instrument(skip_all, fields(route_id = %settings.route_id, num_samples))]
pub async fn run<A: LocationApi + ?Sized>(
    api: &A,
    store: &CsvSampleStore,
    settings: &CollectorSettings,
    num_samples: usize,
) -> Result<()> {
    if num_samples == 0 {
        info!(interval_secs = settings.interval.as_secs(), "Collecting indefinitely. Press Ctrl+C to stop.");
    } else {
        info!(num_samples, interval_secs = settings.interval.as_secs(), "Starting collection");
    }

    let mut sample_count = 0usize;
    loop {
        if num_samples > 0 && sample_count >= num_samples {
            break;
        }
        sample_count += 1;

        let started = Instant::now();
        let collection = collect_once(api, settings, local_now(settings.utc_offset)).await;

        match store.append(&collection) {
            Ok(rows) => info!(
                sample = sample_count,
                buses = collection.bus_count(),
                rows,
                "Collection stored"
            ),
            Err(e) => error!(error = %e, "Failed to store collection"),
        }

        if num_samples == 0 || sample_count < num_samples {
            match settings.interval.checked_sub(started.elapsed()) {
                Some(wait) => tokio::time::sleep(wait).await,
                None => warn!(
                    elapsed_secs = started.elapsed().as_secs(),
                    "Collection overran the interval, starting next round now"
                ),
            }
        }
    }

    info!(samples = sample_count, dir = %store.route_dir().display(), "Finished collecting");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::Outcome;
    use crate::parser::{BusLocation, LocationResponse};
    use crate::services::sample_source::SampleSource;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeApi {
        result_code: i64,
        fail: bool,
        calls: AtomicUsize,
    }

    impl FakeApi {
        fn new(result_code: i64, fail: bool) -> Self {
            Self {
                result_code,
                fail,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl LocationApi for FakeApi {
        async fn bus_locations(&self, _route_id: &str) -> Result<LocationResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("connection refused");
            }
            Ok(LocationResponse {
                result_code: self.result_code,
                result_message: "message".to_string(),
                query_time: None,
                buses: vec![BusLocation {
                    plate_no: "70A1".to_string(),
                    station_seq: "5".to_string(),
                    remain_seat_cnt: 30,
                }],
            })
        }
    }

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 4)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn time(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    #[test]
    fn test_quiet_window_is_inclusive() {
        let (start, end) = (time(0, 0), time(5, 30));

        assert!(in_quiet_window(time(0, 0), start, end));
        assert!(in_quiet_window(time(5, 30), start, end));
        assert!(!in_quiet_window(time(5, 31), start, end));
    }

    #[test]
    fn test_quiet_window_wraps_midnight() {
        let (start, end) = (time(23, 0), time(4, 0));

        assert!(in_quiet_window(time(23, 30), start, end));
        assert!(in_quiet_window(time(3, 0), start, end));
        assert!(!in_quiet_window(time(12, 0), start, end));
    }

    #[tokio::test]
    async fn test_quiet_window_skips_without_request() {
        let api = FakeApi::new(0, false);

        let collection = collect_once(&api, &CollectorSettings::default(), at(3, 0)).await;

        assert!(matches!(collection.outcome, Outcome::Skipped { .. }));
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_success_records_buses() {
        let api = FakeApi::new(0, false);

        let collection = collect_once(&api, &CollectorSettings::default(), at(8, 0)).await;

        assert_eq!(collection.bus_count(), 1);
        assert_eq!(collection.query_time, at(8, 0));
    }

    #[tokio::test]
    async fn test_error_code_and_transport_failure() {
        let settings = CollectorSettings::default();

        let coded = collect_once(&FakeApi::new(4, false), &settings, at(8, 0)).await;
        let failed = collect_once(&FakeApi::new(0, true), &settings, at(8, 0)).await;

        assert!(matches!(coded.outcome, Outcome::Error { result_code: 4, .. }));
        match failed.outcome {
            Outcome::Error { result_code, message } => {
                assert_eq!(result_code, -1);
                assert!(message.contains("connection refused"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_stores_each_round() {
        let dir = std::env::temp_dir().join("route_occupancy_collector_run");
        let _ = std::fs::remove_dir_all(&dir);
        let store = CsvSampleStore::new(&dir, "234001730");
        let settings = CollectorSettings {
            interval: Duration::ZERO,
            quiet_start: time(0, 0),
            quiet_end: time(0, 0),
            utc_offset: FixedOffset::east_opt(0).unwrap(),
            ..CollectorSettings::default()
        };
        let api = FakeApi::new(0, false);

        run(&api, &store, &settings, 2).await.unwrap();

        let today = local_now(settings.utc_offset).date();
        let dates = store
            .available_dates(today.pred_opt().unwrap(), today)
            .unwrap();
        assert!(!dates.is_empty());
        assert!(api.calls.load(Ordering::SeqCst) <= 2);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
