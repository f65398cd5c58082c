//! Position resolution subsystem.
//!
//! Resolves coordinates, addresses and timezones from GPS fixes, public IP
//! addresses, GSM cells or WiFi access points, with a write-through cache
//! and a daily quota on billable provider calls.

pub mod cache;
pub mod policy;
pub mod providers;
pub mod quota;
pub mod resolver;
pub mod types;
pub mod validate;

pub use cache::{fingerprint, PositionCache, ResolutionCache};
pub use policy::{PositionPolicy, StaticPolicy};
pub use providers::{LiveGateway, ProviderGateway};
pub use quota::{QuotaCounter, QuotaState};
pub use resolver::PositionResolver;
pub use types::{
    AccessPoint, Address, CellTower, Fix, PositionError, PositionRequest, PositionResponse,
    ProviderError, RequestShape, Timezone,
};
