//! HTTP client for the engine's v2 events API.
//!
//! Implements [`relay_core::EventBus`] and [`relay_core::HealthProbe`] so the
//! receiver and monitor can run against a live engine.

mod http_event_bus;

pub use http_event_bus::{HttpEventBusClient, HttpEventBusConfig, ENGINE_API_VERSION};
