//! Boarding and alighting deltas between consecutive resolved stations.

use std::collections::BTreeMap;
use std::ops::Sub;

/// For every station after the first resolved one: `current - previous` up
/// to and including `direction_split` (boarding), `previous - current` after
/// it (alighting). The previous station is the nearest earlier index with a
/// value; stations without a value get no delta.
pub fn station_changes<T>(series: &BTreeMap<usize, T>, direction_split: usize) -> BTreeMap<usize, T>
where
    T: Copy + Sub<Output = T>,
{
    series
        .iter()
        .zip(series.iter().skip(1))
        .map(|((_, &previous), (&station, &current))| {
            let delta = if station <= direction_split {
                current - previous
            } else {
                previous - current
            };
            (station, delta)
        })
        .collect()
}
