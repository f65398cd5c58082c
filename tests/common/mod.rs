#![allow(dead_code)]

use position_resolver::position::{
    AccessPoint, Address, CellTower, Fix, PositionCache, PositionRequest, PositionResolver,
    PositionResponse, ProviderError, ProviderGateway, QuotaCounter, ResolutionCache, StaticPolicy,
    Timezone,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Canned provider answers modeled on real Milan / Kansas lookups.
#[derive(Default)]
pub struct FakeGateway {
    pub fail: bool,
    pub fail_geocode: bool,
    pub geoip_calls: AtomicUsize,
    pub geocode_calls: AtomicUsize,
    pub timezone_calls: AtomicUsize,
    pub cell_calls: AtomicUsize,
    pub wifi_calls: AtomicUsize,
}

impl FakeGateway {
    pub fn failing() -> Self {
        Self { fail: true, ..Default::default() }
    }

    /// Every provider answers except reverse geocoding.
    pub fn failing_geocode() -> Self {
        Self { fail_geocode: true, ..Default::default() }
    }

    pub fn total_calls(&self) -> usize {
        self.geoip_calls.load(Ordering::SeqCst)
            + self.geocode_calls.load(Ordering::SeqCst)
            + self.timezone_calls.load(Ordering::SeqCst)
            + self.cell_calls.load(Ordering::SeqCst)
            + self.wifi_calls.load(Ordering::SeqCst)
    }

    fn outcome<T>(&self, value: T) -> Result<T, ProviderError> {
        if self.fail {
            Err(ProviderError::Network("connection timed out".into()))
        } else {
            Ok(value)
        }
    }
}

impl ProviderGateway for FakeGateway {
    fn geoip(&self, _ipv4: &str) -> Result<PositionResponse, ProviderError> {
        self.geoip_calls.fetch_add(1, Ordering::SeqCst);
        self.outcome(PositionResponse {
            latitude: Some(38.0),
            longitude: Some(-97.0),
            accuracy: Some(20000.0),
            address: Some(Address { text: "Potwin, Kansas, United States".into() }),
            timezone: None,
        })
    }

    fn geocode(&self, latitude: f64, _longitude: f64) -> Result<String, ProviderError> {
        self.geocode_calls.fetch_add(1, Ordering::SeqCst);
        let text = if latitude > 45.477 {
            "Corso di Porta Nuova, 19, 20121 Milan, Italy"
        } else {
            "Via della Moscova, 20121 Milan, Italy"
        };
        if self.fail_geocode {
            return Err(ProviderError::Status { code: 503, body: "backend unavailable".into() });
        }
        self.outcome(text.to_string())
    }

    fn timezone(&self, _latitude: f64, _longitude: f64) -> Result<Timezone, ProviderError> {
        self.timezone_calls.fetch_add(1, Ordering::SeqCst);
        self.outcome(Timezone {
            time_zone_id: "Europe/Rome".into(),
            raw_offset: 3600,
            dst_offset: 3600,
        })
    }

    fn geolocate_cells(&self, _radio_type: &str, _towers: &[CellTower]) -> Result<Fix, ProviderError> {
        self.cell_calls.fetch_add(1, Ordering::SeqCst);
        self.outcome(Fix { latitude: 45.477083, longitude: 9.1911716, accuracy: 677.0 })
    }

    fn geolocate_wifi(&self, _access_points: &[AccessPoint]) -> Result<Fix, ProviderError> {
        self.wifi_calls.fetch_add(1, Ordering::SeqCst);
        self.outcome(Fix { latitude: 45.4765395, longitude: 9.1907281, accuracy: 52.0 })
    }
}

/// In-memory cache that counts how often it is consulted.
#[derive(Default)]
pub struct SpyCache {
    inner: Option<PositionCache>,
    pub lookups: AtomicUsize,
    pub inserts: AtomicUsize,
}

impl SpyCache {
    pub fn new() -> Self {
        Self { inner: Some(PositionCache::in_memory()), ..Default::default() }
    }

    pub fn touched(&self) -> bool {
        self.lookups.load(Ordering::SeqCst) + self.inserts.load(Ordering::SeqCst) > 0
    }
}

impl ResolutionCache for SpyCache {
    fn lookup(&self, request: &PositionRequest) -> Option<PositionResponse> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.as_ref()?.lookup(request)
    }

    fn insert(&self, request: &PositionRequest, response: &PositionResponse) {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        if let Some(inner) = &self.inner {
            inner.insert(request, response);
        }
    }
}

pub struct Harness {
    pub resolver: PositionResolver,
    pub quota: Arc<QuotaCounter>,
    pub cache: Arc<SpyCache>,
    pub gateway: Arc<FakeGateway>,
}

pub fn harness_with(policy: StaticPolicy, gateway: FakeGateway) -> Harness {
    let quota = Arc::new(QuotaCounter::in_memory(chrono_tz::UTC));
    let cache = Arc::new(SpyCache::new());
    let gateway = Arc::new(gateway);
    let resolver = PositionResolver::new(
        Arc::new(policy),
        Arc::clone(&quota),
        Arc::clone(&cache) as Arc<dyn ResolutionCache>,
        Arc::clone(&gateway) as Arc<dyn ProviderGateway>,
    );
    Harness { resolver, quota, cache, gateway }
}

pub fn harness() -> Harness {
    harness_with(StaticPolicy::default(), FakeGateway::default())
}
