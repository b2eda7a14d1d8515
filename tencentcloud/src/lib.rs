//! Tencent Cloud bindings for the `opwait` completion poller
//!
//! [`api`] holds the signed API v3 client, [`crs`] and [`rum`] the waiters
//! built on it.

pub mod api;
pub mod cli;
pub mod config;
pub mod crs;
pub mod rum;

pub use api::{ApiError, Client};
pub use config::{ConfigError, ProviderConfig};
pub use crs::RedisService;
pub use rum::RumService;
