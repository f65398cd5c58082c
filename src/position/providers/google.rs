//! Google geocoding, timezone and geolocation web services.

use crate::position::types::{AccessPoint, CellTower, Fix, ProviderError, Timezone};
use chrono_tz::Tz;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("position-resolver/", env!("CARGO_PKG_VERSION"));
const ERROR_BODY_LIMIT: usize = 512;

/// Service URLs. Overridable so a deployment can point at a proxy.
#[derive(Debug, Clone)]
pub struct GoogleEndpoints {
    pub geocode: String,
    pub timezone: String,
    pub geolocation: String,
}

impl Default for GoogleEndpoints {
    fn default() -> Self {
        Self {
            geocode: "https://maps.googleapis.com/maps/api/geocode/json".into(),
            timezone: "https://maps.googleapis.com/maps/api/timezone/json".into(),
            geolocation: "https://www.googleapis.com/geolocation/v1/geolocate".into(),
        }
    }
}

pub struct GoogleClient {
    api_key: String,
    agent: ureq::Agent,
    endpoints: GoogleEndpoints,
    retries: u32,
}

impl GoogleClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_options(api_key, GoogleEndpoints::default(), Duration::from_secs(5), 1)
    }

    pub fn with_options(
        api_key: impl Into<String>,
        endpoints: GoogleEndpoints,
        timeout: Duration,
        retries: u32,
    ) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build();
        Self {
            api_key: api_key.into(),
            agent,
            endpoints,
            retries,
        }
    }

    pub fn geocode(&self, lat: f64, lon: f64) -> Result<String, ProviderError> {
        let latlng = format!("{},{}", lat, lon);
        let body = self.call("geocode", || {
            self.agent
                .get(&self.endpoints.geocode)
                .query("latlng", &latlng)
                .query("key", &self.api_key)
                .call()
        })?;
        parse_geocode(&body, &latlng)
    }

    pub fn timezone(&self, lat: f64, lon: f64) -> Result<Timezone, ProviderError> {
        let location = format!("{},{}", lat, lon);
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let body = self.call("timezone", || {
            self.agent
                .get(&self.endpoints.timezone)
                .query("location", &location)
                .query("timestamp", &timestamp)
                .query("key", &self.api_key)
                .call()
        })?;
        parse_timezone(&body, &location)
    }

    pub fn geolocate_cells(&self, radio_type: &str, towers: &[CellTower]) -> Result<Fix, ProviderError> {
        self.geolocate(cells_body(radio_type, towers))
    }

    pub fn geolocate_wifi(&self, access_points: &[AccessPoint]) -> Result<Fix, ProviderError> {
        self.geolocate(wifi_body(access_points))
    }

    fn geolocate(&self, payload: Value) -> Result<Fix, ProviderError> {
        let body = self.call("geolocation", || {
            self.agent
                .post(&self.endpoints.geolocation)
                .query("key", &self.api_key)
                .send_json(payload.clone())
        })?;
        parse_geolocation(&body)
    }

    /// Run `request`, retrying transport failures. HTTP status errors are final.
    fn call<F>(&self, what: &str, mut request: F) -> Result<Value, ProviderError>
    where
        F: FnMut() -> Result<ureq::Response, ureq::Error>,
    {
        let mut attempt = 0;
        loop {
            match request() {
                Ok(resp) => {
                    return resp
                        .into_json::<Value>()
                        .map_err(|e| ProviderError::InvalidResponse(e.to_string()));
                }
                Err(ureq::Error::Status(code, resp)) => {
                    let mut body = resp.into_string().unwrap_or_default();
                    truncate_on_char(&mut body, ERROR_BODY_LIMIT);
                    return Err(ProviderError::Status { code, body });
                }
                Err(ureq::Error::Transport(t)) => {
                    if attempt >= self.retries {
                        return Err(ProviderError::Network(t.to_string()));
                    }
                    attempt += 1;
                    debug!("{} request failed ({}), retry {}/{}", what, t, attempt, self.retries);
                }
            }
        }
    }
}

fn truncate_on_char(s: &mut String, max: usize) {
    if s.len() > max {
        let mut cut = max;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
    }
}

// ─── Request bodies ─────────────────────────────────────────────

fn cells_body(radio_type: &str, towers: &[CellTower]) -> Value {
    json!({
        "considerIp": false,
        "radioType": radio_type,
        "cellTowers": towers,
    })
}

fn wifi_body(access_points: &[AccessPoint]) -> Value {
    json!({
        "considerIp": false,
        "wifiAccessPoints": access_points,
    })
}

// ─── Response parsing ───────────────────────────────────────────

/// Google web services report errors in a `status` field with HTTP 200.
fn check_status(body: &Value, query: &str) -> Result<(), ProviderError> {
    match body.get("status").and_then(Value::as_str) {
        Some("OK") => Ok(()),
        Some("ZERO_RESULTS") => Err(ProviderError::NotFound(query.to_string())),
        Some(status) => {
            let msg = body
                .get("error_message")
                .or_else(|| body.get("errorMessage"))
                .and_then(Value::as_str)
                .unwrap_or("");
            Err(ProviderError::Unavailable(format!("{} {}", status, msg).trim().to_string()))
        }
        None => Err(ProviderError::InvalidResponse("missing status".into())),
    }
}

fn parse_geocode(body: &Value, query: &str) -> Result<String, ProviderError> {
    check_status(body, query)?;
    body.get("results")
        .and_then(Value::as_array)
        .and_then(|r| r.first())
        .and_then(|r| r.get("formatted_address"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ProviderError::NotFound(query.to_string()))
}

fn parse_timezone(body: &Value, query: &str) -> Result<Timezone, ProviderError> {
    check_status(body, query)?;

    let id = body
        .get("timeZoneId")
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::InvalidResponse("no timeZoneId field".into()))?;
    id.parse::<Tz>()
        .map_err(|_| ProviderError::InvalidResponse(format!("unknown time zone '{}'", id)))?;

    let offset = |key: &str| {
        body.get(key)
            .and_then(Value::as_f64)
            .map(|s| s.round() as i64)
            .ok_or_else(|| ProviderError::InvalidResponse(format!("no {} field", key)))
    };

    Ok(Timezone {
        time_zone_id: id.to_string(),
        raw_offset: offset("rawOffset")?,
        dst_offset: offset("dstOffset")?,
    })
}

fn parse_geolocation(body: &Value) -> Result<Fix, ProviderError> {
    let location = body
        .get("location")
        .ok_or_else(|| ProviderError::InvalidResponse("no location field".into()))?;
    let coord = |key: &str| {
        location
            .get(key)
            .and_then(Value::as_f64)
            .ok_or_else(|| ProviderError::InvalidResponse(format!("no location.{} field", key)))
    };
    let accuracy = body
        .get("accuracy")
        .and_then(Value::as_f64)
        .ok_or_else(|| ProviderError::InvalidResponse("no accuracy field".into()))?;

    Ok(Fix {
        latitude: coord("lat")?,
        longitude: coord("lng")?,
        accuracy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_geocode_ok() {
        let body = json!({
            "status": "OK",
            "results": [
                {"formatted_address": "Via Fatebenesorelle, 2-14, 20121 Milan, Italy"},
                {"formatted_address": "Milan, Italy"}
            ]
        });
        assert_eq!(
            parse_geocode(&body, "45.4774536,9.1906932").unwrap(),
            "Via Fatebenesorelle, 2-14, 20121 Milan, Italy"
        );
    }

    #[test]
    fn test_parse_geocode_errors() {
        let zero = json!({"status": "ZERO_RESULTS", "results": []});
        assert!(matches!(parse_geocode(&zero, "0,0"), Err(ProviderError::NotFound(_))));

        let denied = json!({"status": "REQUEST_DENIED", "error_message": "bad key"});
        assert_eq!(
            parse_geocode(&denied, "0,0"),
            Err(ProviderError::Unavailable("REQUEST_DENIED bad key".into()))
        );

        let empty = json!({"status": "OK", "results": []});
        assert!(matches!(parse_geocode(&empty, "0,0"), Err(ProviderError::NotFound(_))));

        assert!(matches!(parse_geocode(&json!({}), "0,0"), Err(ProviderError::InvalidResponse(_))));
    }

    #[test]
    fn test_parse_timezone() {
        let body = json!({
            "status": "OK",
            "timeZoneId": "Europe/Rome",
            "timeZoneName": "Central European Standard Time",
            "rawOffset": 3600,
            "dstOffset": 0
        });
        let tz = parse_timezone(&body, "45.47,9.19").unwrap();
        assert_eq!(tz.time_zone_id, "Europe/Rome");
        assert_eq!(tz.raw_offset, 3600);
        assert!((0..=3600).contains(&tz.dst_offset));
    }

    #[test]
    fn test_parse_timezone_rejects_unknown_zone() {
        let body = json!({"status": "OK", "timeZoneId": "Mars/Olympus", "rawOffset": 0, "dstOffset": 0});
        assert!(matches!(parse_timezone(&body, "0,0"), Err(ProviderError::InvalidResponse(_))));
    }

    #[test]
    fn test_parse_timezone_float_offsets() {
        let body = json!({"status": "OK", "timeZoneId": "Asia/Kolkata", "rawOffset": 19800.0, "dstOffset": 0.0});
        assert_eq!(parse_timezone(&body, "0,0").unwrap().raw_offset, 19800);
    }

    #[test]
    fn test_parse_geolocation() {
        let body = json!({"location": {"lat": 45.477083, "lng": 9.1911716}, "accuracy": 677.0});
        let fix = parse_geolocation(&body).unwrap();
        assert_relative_eq!(fix.latitude, 45.477083, epsilon = 1e-9);
        assert_relative_eq!(fix.longitude, 9.1911716, epsilon = 1e-9);
        assert_relative_eq!(fix.accuracy, 677.0);
    }

    #[test]
    fn test_parse_geolocation_error_body() {
        let body = json!({"error": {"code": 404, "message": "Requested entity was not found."}});
        assert!(matches!(parse_geolocation(&body), Err(ProviderError::InvalidResponse(_))));
    }

    #[test]
    fn test_cells_body_shape() {
        let towers = vec![CellTower {
            mobile_country_code: 222,
            mobile_network_code: 1,
            location_area_code: 61208,
            cell_id: 528,
            signal_strength: Some(-92),
            timing_advance: Some(0),
            age: None,
        }];
        let body = cells_body("gsm", &towers);
        assert_eq!(body["considerIp"], false);
        assert_eq!(body["radioType"], "gsm");
        assert_eq!(body["cellTowers"][0]["cellId"], 528);
        assert_eq!(body["cellTowers"][0]["mobileCountryCode"], 222);
        assert!(body["cellTowers"][0].get("age").is_none());
    }

    #[test]
    fn test_wifi_body_shape() {
        let aps = vec![AccessPoint {
            mac_address: "00:1F:33:FC:B4:18".into(),
            signal_strength: Some(85),
            ssid: Some("NETGEAR".into()),
        }];
        let body = wifi_body(&aps);
        assert_eq!(body["wifiAccessPoints"][0]["macAddress"], "00:1F:33:FC:B4:18");
        assert_eq!(body["considerIp"], false);
    }

    #[test]
    fn test_truncate_on_char_boundary() {
        let mut s = "ééé".to_string();
        truncate_on_char(&mut s, 3);
        assert_eq!(s, "é");
    }
}
