//! Static route topology: the ordered stop list every series indexes into.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// Marker carried by pass-through stop names on GBIS route listings.
pub const DEFAULT_BYPASS_MARKER: &str = "(경유)";

/// A single stop on the route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stop {
    pub index: usize,
    pub name: String,
    pub is_bypass: bool,
}

#[derive(Debug, Deserialize)]
struct StopRow {
    index: usize,
    name: String,
}

/// Immutable, ordered list of stops `0..N`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTopology {
    stops: Vec<Stop>,
}

impl RouteTopology {
    /// Builds a topology from stop names in route order, tagging every name
    /// that contains `bypass_marker` as pass-through.
    pub fn from_names<I, S>(names: I, bypass_marker: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let stops = names
            .into_iter()
            .enumerate()
            .map(|(index, name)| {
                let name = name.into();
                let is_bypass = !bypass_marker.is_empty() && name.contains(bypass_marker);
                Stop {
                    index,
                    name,
                    is_bypass,
                }
            })
            .collect();
        Self { stops }
    }

    /// Loads `index,name` rows from a CSV file. Indices must run from 0
    /// without gaps.
    pub fn from_csv(path: impl AsRef<Path>, bypass_marker: &str) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("failed to open stop list {}", path.display()))?;
        let mut rdr = csv::Reader::from_reader(file);

        let mut names = Vec::new();
        for (expected, result) in rdr.deserialize().enumerate() {
            let row: StopRow = result?;
            if row.index != expected {
                bail!(
                    "stop list {} is not contiguous: expected index {}, found {}",
                    path.display(),
                    expected,
                    row.index
                );
            }
            names.push(row.name);
        }

        if names.is_empty() {
            bail!("stop list {} contains no stops", path.display());
        }

        let topology = Self::from_names(names, bypass_marker);
        debug!(
            path = %path.display(),
            stops = topology.len(),
            bypass = topology.stops.iter().filter(|s| s.is_bypass).count(),
            "Route topology loaded"
        );
        Ok(topology)
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    pub fn contains(&self, index: i64) -> bool {
        index >= 0 && (index as usize) < self.stops.len()
    }

    /// Out-of-range indices are never bypass stops.
    pub fn is_bypass(&self, index: usize) -> bool {
        self.stops.get(index).is_some_and(|s| s.is_bypass)
    }
}
