//! A concurrent, deduplicating, cache-backed loader for remote resources.
//!
//! The [`Loader`](loader::Loader) turns a resource identifier (an URL) into a decoded value.
//! Concurrent requests for the same identifier are serialized by the
//! [`RequestCoalescer`](coalesce::RequestCoalescer), cached bytes are served from a
//! [`CachePort`](caching::CachePort), and outbound fetches are bounded by the
//! [`FetchGate`](gate::FetchGate).

#[macro_use]
pub mod metrics;

pub mod caching;
pub mod coalesce;
pub mod config;
pub mod decode;
pub mod download;
pub mod error;
pub mod gate;
pub mod loader;
pub mod logging;
pub mod services;
pub mod utils;

pub use error::LoadError;
pub use loader::Loader;
