//! Core types for the position subsystem.

use serde::{Deserialize, Serialize};
use std::fmt;

// ─── Requests ───────────────────────────────────────────────────

/// One observed GSM/UMTS/LTE cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellTower {
    pub mobile_country_code: u32,
    pub mobile_network_code: u32,
    pub location_area_code: u32,
    pub cell_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_strength: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing_advance: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u64>,
}

/// One observed WiFi access point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessPoint {
    pub mac_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_strength: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssid: Option<String>,
}

/// A classified, validated position request.
///
/// Field order is part of the cache fingerprint, so do not reorder fields
/// without accepting a cold cache.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "camelCase")]
pub enum PositionRequest {
    Gps { latitude: f64, longitude: f64 },
    Ip { ipv4: String },
    GpsTimezone { latitude: f64, longitude: f64 },
    #[serde(rename_all = "camelCase")]
    CellObservation { radio_type: String, towers: Vec<CellTower> },
    #[serde(rename_all = "camelCase")]
    WifiObservation { access_points: Vec<AccessPoint> },
}

/// The five recognized request shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestShape {
    Gps,
    Ip,
    GpsTimezone,
    CellObservation,
    WifiObservation,
}

impl PositionRequest {
    pub fn shape(&self) -> RequestShape {
        match self {
            Self::Gps { .. } => RequestShape::Gps,
            Self::Ip { .. } => RequestShape::Ip,
            Self::GpsTimezone { .. } => RequestShape::GpsTimezone,
            Self::CellObservation { .. } => RequestShape::CellObservation,
            Self::WifiObservation { .. } => RequestShape::WifiObservation,
        }
    }
}

impl fmt::Display for RequestShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gps => write!(f, "gps"),
            Self::Ip => write!(f, "ip"),
            Self::GpsTimezone => write!(f, "gps-timezone"),
            Self::CellObservation => write!(f, "cell"),
            Self::WifiObservation => write!(f, "wifi"),
        }
    }
}

// ─── Responses ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub text: String,
}

/// Timezone at a coordinate. Offsets are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timezone {
    pub time_zone_id: String,
    pub raw_offset: i64,
    pub dst_offset: i64,
}

/// A resolved position. Every key is optional; the empty response means
/// "could not resolve" and serializes to `{}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    /// Accuracy radius in meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<Timezone>,
}

impl PositionResponse {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.latitude.is_none()
            && self.longitude.is_none()
            && self.accuracy.is_none()
            && self.address.is_none()
            && self.timezone.is_none()
    }

    pub fn with_address(mut self, text: impl Into<String>) -> Self {
        self.address = Some(Address { text: text.into() });
        self
    }
}

/// A coordinate fix returned by geolocation providers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fix {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
}

// ─── Errors ─────────────────────────────────────────────────────

/// Failure of an external lookup. Never crosses the `resolve` boundary.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),
    #[error("provider returned HTTP {code}: {body}")]
    Status { code: u16, body: String },
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
    #[error("no result for {0}")]
    NotFound(String),
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

/// Why a resolution produced an empty response.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PositionError {
    #[error("position resolution is disabled")]
    Disabled,
    #[error("maintenance window is not valid")]
    MaintenanceClosed,
    #[error("daily provider quota exceeded")]
    QuotaExceeded,
    #[error("malformed request: {0}")]
    Malformed(String),
    #[error("address not resolvable: {0}")]
    InvalidAddress(String),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_response_serializes_to_empty_object() {
        let json = serde_json::to_string(&PositionResponse::empty()).unwrap();
        assert_eq!(json, "{}");
        assert!(PositionResponse::empty().is_empty());
    }

    #[test]
    fn test_response_wire_names() {
        let resp = PositionResponse {
            timezone: Some(Timezone {
                time_zone_id: "Europe/Rome".into(),
                raw_offset: 3600,
                dst_offset: 0,
            }),
            ..Default::default()
        };
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(v["timezone"]["timeZoneId"], "Europe/Rome");
        assert_eq!(v["timezone"]["rawOffset"], 3600);
        assert!(v.get("latitude").is_none());
        assert!(!resp.is_empty());
    }

    #[test]
    fn test_with_address() {
        let resp = PositionResponse::empty().with_address("Via Moscova, Milan");
        assert_eq!(resp.address.unwrap().text, "Via Moscova, Milan");
    }

    #[test]
    fn test_cell_tower_camel_case() {
        let tower: CellTower = serde_json::from_value(serde_json::json!({
            "mobileCountryCode": 222, "mobileNetworkCode": 1,
            "locationAreaCode": 61208, "cellId": 528, "signalStrength": -92
        }))
        .unwrap();
        assert_eq!(tower.cell_id, 528);
        assert_eq!(tower.signal_strength, Some(-92));
        assert_eq!(tower.age, None);
    }

    #[test]
    fn test_shape_of_request() {
        let req = PositionRequest::Ip { ipv4: "8.8.8.8".into() };
        assert_eq!(req.shape(), RequestShape::Ip);
        assert_eq!(req.shape().to_string(), "ip");
    }
}
