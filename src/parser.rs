//! JSON parser for GBIS `getBusLocationListv2` responses.

use anyhow::Result;
use serde::Deserialize;

/// A bus position as reported by the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusLocation {
    pub plate_no: String,
    pub station_seq: String,
    /// `-1` when the bus does not report seats.
    pub remain_seat_cnt: i32,
}

/// Parsed envelope of a location response.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationResponse {
    pub result_code: i64,
    pub result_message: String,
    pub query_time: Option<String>,
    pub buses: Vec<BusLocation>,
}

impl LocationResponse {
    pub fn is_success(&self) -> bool {
        self.result_code == 0
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    response: Body,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Body {
    #[serde(default)]
    msg_header: MsgHeader,
    #[serde(default)]
    msg_body: Option<MsgBody>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MsgHeader {
    #[serde(default = "missing_result_code")]
    result_code: i64,
    #[serde(default)]
    result_message: String,
    #[serde(default)]
    query_time: Option<String>,
}

impl Default for MsgHeader {
    fn default() -> Self {
        Self {
            result_code: missing_result_code(),
            result_message: String::new(),
            query_time: None,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct MsgBody {
    #[serde(default)]
    bus_location_list: Vec<RawBus>,
}

/// Fields arrive as numbers or strings depending on the API version.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Int(i64),
    Text(String),
}

impl Scalar {
    fn into_text(self) -> String {
        match self {
            Scalar::Int(v) => v.to_string(),
            Scalar::Text(s) => s,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBus {
    plate_no: Option<String>,
    remain_seat_cnt: Option<Scalar>,
    station_seq: Option<Scalar>,
}

fn missing_result_code() -> i64 {
    -1
}

fn station_order(bus: &BusLocation) -> i64 {
    bus.station_seq.trim().parse().unwrap_or(i64::MAX)
}

/// Decodes a JSON location response. Buses come back ordered by station
/// sequence, non-numeric sequences last.
///
/// # Errors
///
/// Returns an error if the bytes are not JSON.
pub fn parse_locations(bytes: &[u8]) -> Result<LocationResponse> {
    let envelope: Envelope = serde_json::from_slice(bytes)?;
    let header = envelope.response.msg_header;

    let mut buses: Vec<BusLocation> = envelope
        .response
        .msg_body
        .unwrap_or_default()
        .bus_location_list
        .into_iter()
        .map(|raw| BusLocation {
            plate_no: raw.plate_no.unwrap_or_else(|| "N/A".to_string()),
            station_seq: raw
                .station_seq
                .map(Scalar::into_text)
                .unwrap_or_else(|| "N/A".to_string()),
            remain_seat_cnt: raw
                .remain_seat_cnt
                .map(Scalar::into_text)
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(-1),
        })
        .collect();
    buses.sort_by_key(station_order);

    Ok(LocationResponse {
        result_code: header.result_code,
        result_message: header.result_message,
        query_time: header.query_time,
        buses,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_success_response() {
        let json = br#"{
            "response": {
                "msgHeader": {"resultCode": 0, "resultMessage": "ok", "queryTime": "2025-03-04 08:30:00.123"},
                "msgBody": {"busLocationList": [
                    {"plateNo": "70A1", "remainSeatCnt": 12, "stationSeq": 30},
                    {"plateNo": "70A2", "remainSeatCnt": "40", "stationSeq": "4"},
                    {"plateNo": "70A3", "stationSeq": "x"}
                ]}
            }
        }"#;

        let response = parse_locations(json).unwrap();

        assert!(response.is_success());
        assert_eq!(response.buses.len(), 3);
        assert_eq!(response.buses[0].plate_no, "70A2");
        assert_eq!(response.buses[0].remain_seat_cnt, 40);
        assert_eq!(response.buses[1].station_seq, "30");
        assert_eq!(response.buses[2].remain_seat_cnt, -1);
    }

    #[test]
    fn test_parse_error_response_without_body() {
        let json = br#"{"response": {"msgHeader": {"resultCode": 4, "resultMessage": "no data"}}}"#;

        let response = parse_locations(json).unwrap();

        assert!(!response.is_success());
        assert_eq!(response.result_code, 4);
        assert!(response.buses.is_empty());
    }

    #[test]
    fn test_missing_header_is_not_success() {
        let response = parse_locations(b"{}").unwrap();

        assert!(!response.is_success());
    }

    #[test]
    fn test_parse_invalid_bytes() {
        assert!(parse_locations(&[0xFF, 0xFE, 0x00]).is_err());
    }
}
