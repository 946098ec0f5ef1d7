//! One poll of the bus-location API and its flat CSV rows.

use crate::analyzers::error::AnalysisError;
use crate::analyzers::types::{RawSample, SEATS_NOT_REPORTED};
use crate::parser::BusLocation;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// What a collection attempt produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Buses(Vec<BusLocation>),
    Error {
        result_code: i64,
        message: String,
    },
    Skipped {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    pub route_id: String,
    pub query_time: NaiveDateTime,
    pub outcome: Outcome,
}

/// A row of the sample store. Collections with buses write one row per bus;
/// error, skipped and empty collections write a single row without bus fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionRecord {
    pub query_time: NaiveDateTime,
    pub collection_date: NaiveDate,
    pub route_id: String,
    pub result_code: i64,
    pub is_error: bool,
    pub is_skipped: bool,
    pub message: Option<String>,
    pub plate_no: Option<String>,
    pub station_seq: Option<String>,
    pub remain_seat_cnt: Option<i32>,
}

impl Collection {
    pub fn buses(route_id: &str, query_time: NaiveDateTime, buses: Vec<BusLocation>) -> Self {
        Self {
            route_id: route_id.to_string(),
            query_time,
            outcome: Outcome::Buses(buses),
        }
    }

    pub fn from_error(
        route_id: &str,
        query_time: NaiveDateTime,
        result_code: i64,
        message: &str,
    ) -> Self {
        Self {
            route_id: route_id.to_string(),
            query_time,
            outcome: Outcome::Error {
                result_code,
                message: message.to_string(),
            },
        }
    }

    pub fn skipped(route_id: &str, query_time: NaiveDateTime, reason: &str) -> Self {
        Self {
            route_id: route_id.to_string(),
            query_time,
            outcome: Outcome::Skipped {
                reason: reason.to_string(),
            },
        }
    }

    pub fn collection_date(&self) -> NaiveDate {
        self.query_time.date()
    }

    pub fn bus_count(&self) -> usize {
        match &self.outcome {
            Outcome::Buses(buses) => buses.len(),
            _ => 0,
        }
    }

    pub fn to_records(&self) -> Vec<CollectionRecord> {
        let base = CollectionRecord {
            query_time: self.query_time,
            collection_date: self.collection_date(),
            route_id: self.route_id.clone(),
            result_code: 0,
            is_error: false,
            is_skipped: false,
            message: None,
            plate_no: None,
            station_seq: None,
            remain_seat_cnt: None,
        };

        match &self.outcome {
            Outcome::Buses(buses) if !buses.is_empty() => buses
                .iter()
                .map(|bus| CollectionRecord {
                    plate_no: Some(bus.plate_no.clone()),
                    station_seq: Some(bus.station_seq.clone()),
                    remain_seat_cnt: Some(bus.remain_seat_cnt),
                    ..base.clone()
                })
                .collect(),
            Outcome::Buses(_) => vec![base],
            Outcome::Error {
                result_code,
                message,
            } => vec![CollectionRecord {
                result_code: *result_code,
                is_error: true,
                message: Some(message.clone()),
                ..base
            }],
            Outcome::Skipped { reason } => vec![CollectionRecord {
                is_skipped: true,
                message: Some(reason.clone()),
                ..base
            }],
        }
    }
}

impl CollectionRecord {
    pub fn is_successful(&self) -> bool {
        !self.is_error && !self.is_skipped
    }

    /// Converts a successful bus row into a sample. Rows without a plate or
    /// with a non-numeric station are invalid.
    pub fn to_sample(&self) -> Result<RawSample, AnalysisError> {
        let plate_no = self
            .plate_no
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| AnalysisError::invalid_sample("missing plate number"))?;
        let station_seq = self
            .station_seq
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AnalysisError::invalid_sample("missing station sequence"))?;
        let station_index = station_seq.parse::<i64>().map_err(|_| {
            AnalysisError::invalid_sample(format!("non-numeric station sequence {station_seq:?}"))
        })?;

        Ok(RawSample {
            query_time: self.query_time,
            plate_no: plate_no.to_string(),
            station_index,
            remaining_seats: self.remain_seat_cnt.unwrap_or(SEATS_NOT_REPORTED),
        })
    }
}
