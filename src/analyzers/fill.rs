//! Completes a trip's occupancy series where readings are missing.
//!
//! Stations are visited in increasing order and filled values feed the
//! following stations. For each station except the primary reset:
//!
//! 1. If the next stop is a bypass stop, take the first value found in the
//!    run of consecutive bypass stops ahead ([`bypass_lookahead`]).
//! 2. A missing bypass station copies the nearest earlier value when that
//!    value also sits on a bypass station.
//! 3. A station still missing takes the rounded midpoint of its nearest
//!    neighbours with values. Without both neighbours it stays unresolved.

use crate::analyzers::types::{AnalysisParams, BypassPolicy, OccupancySeries};
use crate::analyzers::utility::midpoint;
use crate::route::RouteTopology;
use std::ops::Bound::{Excluded, Unbounded};

/// First value inside the run of bypass stops directly after `station`.
fn bypass_lookahead(
    series: &OccupancySeries,
    topology: &RouteTopology,
    station: usize,
) -> Option<i32> {
    (station + 1..topology.len())
        .take_while(|&next| topology.is_bypass(next))
        .find_map(|next| series.get(&next).copied())
}

/// Whether a value found by [`bypass_lookahead`] may be written at a station.
pub fn bypass_applies(policy: BypassPolicy, has_value: bool) -> bool {
    match policy {
        BypassPolicy::Overwrite => true,
        BypassPolicy::FillOnly => !has_value,
    }
}

fn previous_value(series: &OccupancySeries, station: usize) -> Option<(usize, i32)> {
    series
        .range(..station)
        .next_back()
        .map(|(&index, &value)| (index, value))
}

fn next_value(series: &OccupancySeries, station: usize) -> Option<i32> {
    series
        .range((Excluded(station), Unbounded))
        .next()
        .map(|(_, &value)| value)
}

/// Fills `series` in place over the stations of `topology`.
pub fn fill_gaps(series: &mut OccupancySeries, topology: &RouteTopology, params: &AnalysisParams) {
    let skip = params.primary_reset();

    for station in 0..topology.len() {
        if Some(station) == skip {
            continue;
        }

        if let Some(value) = bypass_lookahead(series, topology, station) {
            if bypass_applies(params.bypass_policy, series.contains_key(&station)) {
                series.insert(station, value);
                continue;
            }
        }

        if series.contains_key(&station) {
            continue;
        }

        if topology.is_bypass(station) {
            if let Some((prev, value)) = previous_value(series, station) {
                if topology.is_bypass(prev) {
                    series.insert(station, value);
                    continue;
                }
            }
        }

        if let (Some((_, before)), Some(after)) =
            (previous_value(series, station), next_value(series, station))
        {
            series.insert(station, midpoint(before, after));
        }
    }
}
