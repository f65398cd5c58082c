//! Gate flags consulted before every resolution.

/// Externally owned switches. Read-only from the resolver's side.
pub trait PositionPolicy: Send + Sync {
    fn position_enabled(&self) -> bool;
    fn maintenance_valid(&self) -> bool;
    fn daily_limit(&self) -> u64;
}

/// Fixed flags, usually taken from startup configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticPolicy {
    pub enabled: bool,
    pub maintenance_valid: bool,
    pub daily_limit: u64,
}

impl Default for StaticPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            maintenance_valid: true,
            daily_limit: 500,
        }
    }
}

impl PositionPolicy for StaticPolicy {
    fn position_enabled(&self) -> bool {
        self.enabled
    }

    fn maintenance_valid(&self) -> bool {
        self.maintenance_valid
    }

    fn daily_limit(&self) -> u64 {
        self.daily_limit
    }
}
