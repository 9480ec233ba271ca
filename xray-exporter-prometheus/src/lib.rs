//! Prometheus metrics exporter for XRay.
//!
//! On every scrape, this crate fetches XRay's `/debug/vars` JSON page and
//! translates memory, observatory and traffic statistics into Prometheus
//! gauges.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  XRay upstream  │<────│    Collector    │<────│   HTTP Server   │
//! │  (/debug/vars)  │     │ (fetch+extract) │     │   (/metrics)    │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! Nothing is kept between scrapes: each request to `/metrics` performs one
//! upstream GET and renders whatever that document contained.
//!
//! # Usage
//!
//! ```bash
//! xray-exporter-prometheus --config config.yml
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod collector;
pub mod config;
pub mod extract;
pub mod fetcher;
pub mod http;
pub mod metrics;

pub use collector::{Scrape, SharedCollector, XrayCollector};
pub use config::ExporterConfig;
pub use fetcher::{FetchError, Fetcher};
pub use http::HttpServer;
pub use metrics::{MetricDesc, MetricFamily, MetricSample};
