//! Application bootstrap and lifecycle.
//!
//! [`GeocodeApp`] owns the single [`CacheStore`](crate::cache::CacheStore),
//! its flush daemon and the [`LookupCoordinator`](crate::lookup::LookupCoordinator)
//! built on top of it.
//!
//! ```text
//! AppConfig ──► GeocodeApp::start
//!                 1. DurableStore (memory / file / github)
//!                 2. CacheStore::load
//!                 3. FlushDaemon
//!                 4. ProviderClient + RateLimiter ──► LookupCoordinator
//!
//! GeocodeApp::shutdown ──► FlushDaemon::shutdown ──► final flush
//! ```

mod bootstrap;
mod config;
mod error;

pub use bootstrap::{build_backend, GeocodeApp};
pub use config::{AppConfig, BackendConfig};
pub use error::AppError;
