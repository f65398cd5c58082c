//! Request classification and address validation.
//!
//! Pure functions: nothing here touches the cache, the quota, or a provider.

use super::types::{AccessPoint, CellTower, PositionError, PositionRequest};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::net::Ipv4Addr;

const DEFAULT_RADIO_TYPE: &str = "gsm";

#[derive(Deserialize)]
struct Coords {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct IpBody {
    ipv4: String,
}

/// Classify a raw request into one of the five recognized shapes.
///
/// Signature keys are checked in a fixed order; the first present one wins.
pub fn classify(raw: &Value) -> Result<PositionRequest, PositionError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| PositionError::Malformed("request is not an object".into()))?;

    if let Some(body) = obj.get("gpsPosition") {
        let c: Coords = body_of("gpsPosition", body)?;
        check_coords(c.latitude, c.longitude)?;
        return Ok(PositionRequest::Gps { latitude: c.latitude, longitude: c.longitude });
    }

    if let Some(body) = obj.get("gpsTimezone") {
        let c: Coords = body_of("gpsTimezone", body)?;
        check_coords(c.latitude, c.longitude)?;
        return Ok(PositionRequest::GpsTimezone { latitude: c.latitude, longitude: c.longitude });
    }

    if let Some(body) = obj.get("ipAddress") {
        let ip: IpBody = body_of("ipAddress", body)?;
        let addr = validate_ipv4(&ip.ipv4)?;
        return Ok(PositionRequest::Ip { ipv4: addr.to_string() });
    }

    if let Some(body) = obj.get("cellTowers") {
        let towers: Vec<CellTower> = body_of("cellTowers", body)?;
        if towers.is_empty() {
            return Err(PositionError::Malformed("cellTowers is empty".into()));
        }
        let radio_type = radio_type_of(obj)?;
        return Ok(PositionRequest::CellObservation { radio_type, towers });
    }

    if let Some(body) = obj.get("wifiAccessPoints") {
        let access_points: Vec<AccessPoint> = body_of("wifiAccessPoints", body)?;
        if access_points.is_empty() {
            return Err(PositionError::Malformed("wifiAccessPoints is empty".into()));
        }
        return Ok(PositionRequest::WifiObservation { access_points });
    }

    Err(PositionError::Malformed("no recognized request shape".into()))
}

fn body_of<T: DeserializeOwned>(key: &str, body: &Value) -> Result<T, PositionError> {
    T::deserialize(body).map_err(|e| PositionError::Malformed(format!("{}: {}", key, e)))
}

fn radio_type_of(obj: &Map<String, Value>) -> Result<String, PositionError> {
    match obj.get("radioType") {
        None | Some(Value::Null) => Ok(DEFAULT_RADIO_TYPE.to_string()),
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_lowercase()),
        Some(_) => Err(PositionError::Malformed("radioType must be a non-empty string".into())),
    }
}

/// Reject non-finite or out-of-range coordinates.
pub fn check_coords(lat: f64, lon: f64) -> Result<(), PositionError> {
    if !lat.is_finite() || !lon.is_finite() {
        return Err(PositionError::Malformed("coordinates must be finite".into()));
    }
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(PositionError::Malformed(format!(
            "coordinates out of range: {}, {}",
            lat, lon
        )));
    }
    Ok(())
}

/// Parse an IPv4 literal and refuse private, loopback and link-local ranges.
pub fn validate_ipv4(raw: &str) -> Result<Ipv4Addr, PositionError> {
    let addr: Ipv4Addr = raw
        .trim()
        .parse()
        .map_err(|_| PositionError::Malformed(format!("not an IPv4 address: '{}'", raw)))?;

    if is_reserved_ipv4(&addr) {
        return Err(PositionError::InvalidAddress(addr.to_string()));
    }
    Ok(addr)
}

/// True for 10/8, 172.16/12, 192.168/16, 169.254/16 and 127/8.
pub fn is_reserved_ipv4(addr: &Ipv4Addr) -> bool {
    addr.is_private() || addr.is_loopback() || addr.is_link_local()
}
