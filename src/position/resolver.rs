//! Position resolver, the single entry point in front of the providers.
//!
//! Flow: enabled → maintenance → quota → classify → cache → provider → cache write.
//! Any failure along the way yields the empty response.

use super::cache::ResolutionCache;
use super::policy::PositionPolicy;
use super::providers::ProviderGateway;
use super::quota::QuotaCounter;
use super::types::{
    AccessPoint, CellTower, Fix, PositionError, PositionRequest, PositionResponse, ProviderError,
};
use super::validate;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The position resolver with its gates, cache and providers.
#[derive(Clone)]
pub struct PositionResolver {
    policy: Arc<dyn PositionPolicy>,
    quota: Arc<QuotaCounter>,
    cache: Arc<dyn ResolutionCache>,
    gateway: Arc<dyn ProviderGateway>,
}

impl PositionResolver {
    pub fn new(
        policy: Arc<dyn PositionPolicy>,
        quota: Arc<QuotaCounter>,
        cache: Arc<dyn ResolutionCache>,
        gateway: Arc<dyn ProviderGateway>,
    ) -> Self {
        Self { policy, quota, cache, gateway }
    }

    pub fn quota(&self) -> &QuotaCounter {
        &self.quota
    }

    pub fn quota_handle(&self) -> Arc<QuotaCounter> {
        Arc::clone(&self.quota)
    }

    pub fn policy(&self) -> &dyn PositionPolicy {
        self.policy.as_ref()
    }

    /// Resolve a raw request. Never fails: anything that cannot be resolved
    /// comes back as `{}`.
    pub fn resolve(&self, raw: &Value) -> PositionResponse {
        match self.try_resolve(raw) {
            Ok(resp) => resp,
            Err(e) => {
                match &e {
                    PositionError::Provider(_) => warn!("position not resolved: {}", e),
                    _ => debug!("position not resolved: {}", e),
                }
                PositionResponse::empty()
            }
        }
    }

    /// Like `resolve`, but reports why a resolution came back empty.
    pub fn try_resolve(&self, raw: &Value) -> Result<PositionResponse, PositionError> {
        self.check_gates()?;
        let request = validate::classify(raw)?;

        if let Some(cached) = self.cache.lookup(&request) {
            debug!("{} request answered from cache", request.shape());
            return Ok(cached);
        }

        let response = self.dispatch(&request)?;
        if response.is_empty() {
            return Err(ProviderError::NotFound(request.shape().to_string()).into());
        }

        info!("{} request resolved by provider", request.shape());
        self.cache.insert(&request, &response);
        Ok(response)
    }

    fn check_gates(&self) -> Result<(), PositionError> {
        if !self.policy.position_enabled() {
            return Err(PositionError::Disabled);
        }
        if !self.policy.maintenance_valid() {
            return Err(PositionError::MaintenanceClosed);
        }
        if self.quota.reached(self.policy.daily_limit()) {
            return Err(PositionError::QuotaExceeded);
        }
        Ok(())
    }

    fn dispatch(&self, request: &PositionRequest) -> Result<PositionResponse, PositionError> {
        match request {
            PositionRequest::Gps { latitude, longitude } => self.resolve_gps(*latitude, *longitude),
            PositionRequest::Ip { ipv4 } => self.resolve_ip(ipv4),
            PositionRequest::GpsTimezone { latitude, longitude } => {
                self.resolve_timezone(*latitude, *longitude)
            }
            PositionRequest::CellObservation { radio_type, towers } => {
                self.resolve_cells(radio_type, towers)
            }
            PositionRequest::WifiObservation { access_points } => self.resolve_wifi(access_points),
        }
    }

    fn resolve_gps(&self, lat: f64, lon: f64) -> Result<PositionResponse, PositionError> {
        self.charge()?;
        let address = self.gateway.geocode(lat, lon)?;
        Ok(PositionResponse {
            latitude: Some(lat),
            longitude: Some(lon),
            ..Default::default()
        }
        .with_address(address))
    }

    fn resolve_ip(&self, ipv4: &str) -> Result<PositionResponse, PositionError> {
        // re-checked so the GeoIP provider never sees a reserved address
        validate::validate_ipv4(ipv4)?;
        Ok(self.gateway.geoip(ipv4)?)
    }

    fn resolve_timezone(&self, lat: f64, lon: f64) -> Result<PositionResponse, PositionError> {
        self.charge()?;
        let timezone = self.gateway.timezone(lat, lon)?;
        Ok(PositionResponse {
            timezone: Some(timezone),
            ..Default::default()
        })
    }

    fn resolve_cells(&self, radio_type: &str, towers: &[CellTower]) -> Result<PositionResponse, PositionError> {
        self.charge()?;
        let fix = self.gateway.geolocate_cells(radio_type, towers)?;
        self.attach_address(fix)
    }

    fn resolve_wifi(&self, access_points: &[AccessPoint]) -> Result<PositionResponse, PositionError> {
        self.charge()?;
        let fix = self.gateway.geolocate_wifi(access_points)?;
        self.attach_address(fix)
    }

    /// Charge the primary billable call of a request. The gate in
    /// `check_gates` is only a fast path; this is the check that holds
    /// under concurrency.
    fn charge(&self) -> Result<(), PositionError> {
        if self.quota.try_consume(self.policy.daily_limit()) {
            Ok(())
        } else {
            Err(PositionError::QuotaExceeded)
        }
    }

    /// Chained reverse geocode after a radio-signal fix; billed separately.
    ///
    /// Always charged once the fix is paid for, so the daily count can end
    /// above the limit by at most one per cell/WiFi request in flight.
    fn attach_address(&self, fix: Fix) -> Result<PositionResponse, PositionError> {
        self.quota.consume();
        let address = self.gateway.geocode(fix.latitude, fix.longitude)?;
        Ok(PositionResponse {
            latitude: Some(fix.latitude),
            longitude: Some(fix.longitude),
            accuracy: Some(fix.accuracy),
            ..Default::default()
        }
        .with_address(address))
    }
}
