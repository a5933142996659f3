//! Network side of mcap-cache.
//!
//! This crate provides the `reqwest`-backed [`Fetcher`](mcap_core::Fetcher)
//! the cache worker uses to reach the site origin.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, UrlError, parse_origin, resolve_asset, resolve_target};
