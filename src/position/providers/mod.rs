//! External lookup services behind one gateway.
//!
//! GeoIP is answered from a local MaxMind database; geocoding, timezone and
//! radio-signal geolocation go to the Google web services. Only the Google
//! calls are billable.

pub mod geoip;
pub mod google;

use super::types::{AccessPoint, CellTower, Fix, PositionResponse, ProviderError, Timezone};

pub use geoip::MaxMindGeoIp;
pub use google::{GoogleClient, GoogleEndpoints};

/// The external lookups the resolver needs. Implementations own their
/// transport, timeouts and retries; callers only see the outcome.
pub trait ProviderGateway: Send + Sync {
    /// Coordinates, accuracy and a coarse address for a public IPv4 address.
    fn geoip(&self, ipv4: &str) -> Result<PositionResponse, ProviderError>;

    /// Reverse geocode a coordinate to a formatted address.
    fn geocode(&self, latitude: f64, longitude: f64) -> Result<String, ProviderError>;

    fn timezone(&self, latitude: f64, longitude: f64) -> Result<Timezone, ProviderError>;

    fn geolocate_cells(&self, radio_type: &str, towers: &[CellTower]) -> Result<Fix, ProviderError>;

    fn geolocate_wifi(&self, access_points: &[AccessPoint]) -> Result<Fix, ProviderError>;
}

/// Production gateway: MaxMind for IPs, Google for everything else.
pub struct LiveGateway {
    geoip: Option<MaxMindGeoIp>,
    google: GoogleClient,
}

impl LiveGateway {
    pub fn new(geoip: Option<MaxMindGeoIp>, google: GoogleClient) -> Self {
        Self { geoip, google }
    }
}

impl ProviderGateway for LiveGateway {
    fn geoip(&self, ipv4: &str) -> Result<PositionResponse, ProviderError> {
        match &self.geoip {
            Some(db) => db.lookup(ipv4),
            None => Err(ProviderError::Unavailable("no GeoIP database configured".into())),
        }
    }

    fn geocode(&self, latitude: f64, longitude: f64) -> Result<String, ProviderError> {
        self.google.geocode(latitude, longitude)
    }

    fn timezone(&self, latitude: f64, longitude: f64) -> Result<Timezone, ProviderError> {
        self.google.timezone(latitude, longitude)
    }

    fn geolocate_cells(&self, radio_type: &str, towers: &[CellTower]) -> Result<Fix, ProviderError> {
        self.google.geolocate_cells(radio_type, towers)
    }

    fn geolocate_wifi(&self, access_points: &[AccessPoint]) -> Result<Fix, ProviderError> {
        self.google.geolocate_wifi(access_points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geoip_without_database_is_unavailable() {
        let gateway = LiveGateway::new(None, GoogleClient::new("test-key"));
        assert!(matches!(gateway.geoip("8.8.8.8"), Err(ProviderError::Unavailable(_))));
    }
}
