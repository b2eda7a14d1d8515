//! Tencent Cloud API v3 client and the endpoints the waiters poll

pub mod client;
pub mod common;
pub mod crs;
pub mod error;
pub mod pool;
pub mod rum;
pub mod sign;

#[cfg(test)]
mod test_helpers;

pub use client::Client;
pub use common::Service;
pub use error::{retry_error, ApiError, RETRYABLE_CODES};
pub use pool::{ConnectionPoolConfig, ConnectionStats};
