//! Core library for the `locweather` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Weather sources (live Visual Crossing client, recorded fixtures)
//! - The refresh pipeline: fetch, persist, cache per location version
//! - A presenter turning raw payloads into display fields
//!
//! It is used by `weather-cli`, but can also be reused by other binaries or services.

pub mod cache;
pub mod config;
pub mod error;
pub mod model;
pub mod presenter;
pub mod provider;
pub mod refresh;
pub mod service;
pub mod store;

pub use cache::{CacheLookup, FreshnessCache, Seed};
pub use config::Config;
pub use error::{ClientError, ServiceError, StoreError, ValidationError};
pub use model::{BAD_REQUEST, LocationInput, LocationRecord, RecordId, WeatherPayload};
pub use presenter::{NOT_AVAILABLE, Presenter, ViewModel, present};
pub use provider::{SourceKind, WeatherSource};
pub use refresh::{Refreshed, Refresher};
pub use service::{Created, IndexRow, Shown, WeatherService};
pub use store::{JsonFileStore, LocationStore, MemoryStore};
