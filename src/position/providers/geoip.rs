//! MaxMind GeoLite2-City lookups.

use crate::position::types::{Address, PositionResponse, ProviderError};
use maxminddb::{geoip2, MaxMindDBError, Reader};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::Path;
use tracing::trace;

pub struct MaxMindGeoIp {
    reader: Reader<Vec<u8>>,
}

impl MaxMindGeoIp {
    pub fn open(path: &Path) -> Result<Self, MaxMindDBError> {
        Ok(Self {
            reader: Reader::open_readfile(path)?,
        })
    }

    pub fn lookup(&self, ip: &str) -> Result<PositionResponse, ProviderError> {
        let addr: IpAddr = ip
            .parse()
            .map_err(|_| ProviderError::InvalidResponse(format!("not an IP address: '{}'", ip)))?;

        let city: geoip2::City = self.reader.lookup(addr).map_err(|e| match e {
            MaxMindDBError::AddressNotFoundError(_) => ProviderError::NotFound(ip.to_string()),
            other => ProviderError::Unavailable(other.to_string()),
        })?;

        let location = city
            .location
            .as_ref()
            .ok_or_else(|| ProviderError::NotFound(ip.to_string()))?;
        let (latitude, longitude) = match (location.latitude, location.longitude) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => return Err(ProviderError::NotFound(ip.to_string())),
        };

        let place = join_place(&[
            city.city.as_ref().and_then(|c| english(c.names.as_ref())),
            city.subdivisions
                .as_ref()
                .and_then(|s| s.first())
                .and_then(|s| english(s.names.as_ref())),
            city.country.as_ref().and_then(|c| english(c.names.as_ref())),
        ]);

        trace!("MaxMind lookup for {}: {},{} {:?}", ip, latitude, longitude, place);

        Ok(PositionResponse {
            latitude: Some(latitude),
            longitude: Some(longitude),
            accuracy: location.accuracy_radius.map(km_to_meters),
            address: place.map(|text| Address { text }),
            timezone: None,
        })
    }
}

fn english<'a>(names: Option<&BTreeMap<&'a str, &'a str>>) -> Option<&'a str> {
    names?.get("en").copied()
}

/// MaxMind reports accuracy radius in kilometers.
fn km_to_meters(km: u16) -> f64 {
    f64::from(km) * 1000.0
}

/// "City, Region, Country" from whichever parts are known.
fn join_place(parts: &[Option<&str>]) -> Option<String> {
    let parts: Vec<&str> = parts
        .iter()
        .flatten()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}
