use chrono::NaiveDate;
use thiserror::Error;

/// Outcomes of the occupancy engine that are not a finished analysis.
///
/// `NoData` and `NoQualifyingData` are expected results ("no service that
/// day", "nothing matches this filter"), not faults.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("invalid sample: {reason}")]
    InvalidSample { reason: String },
    #[error("no samples collected on {date}")]
    NoData { date: NaiveDate },
    #[error("no qualifying trips for the requested dates")]
    NoQualifyingData,
    #[error("sample source failed: {0}")]
    Source(#[from] anyhow::Error),
}

impl AnalysisError {
    pub fn invalid_sample(reason: impl Into<String>) -> Self {
        Self::InvalidSample {
            reason: reason.into(),
        }
    }

    /// `true` for the variants that mean "nothing to show".
    pub fn is_empty_result(&self) -> bool {
        matches!(self, Self::NoData { .. } | Self::NoQualifyingData)
    }
}
