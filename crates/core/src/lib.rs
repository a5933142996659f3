//! Core types for mcap-cache.
//!
//! This crate provides:
//! - The offline asset cache manager (install / activate / fetch lifecycle)
//! - SQLite store for cache generations and entries
//! - Request/response snapshot types and the asset manifest
//! - Unified error types and configuration

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod manifest;
pub mod worker;

pub use cache::CacheDb;
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use http::{CachedRequest, CachedResponse};
pub use manifest::AssetManifest;
pub use worker::{ActivateReport, CacheWorker, FetchOutcome, Fetcher, InstallReport, ResponseSource, WorkerState};
