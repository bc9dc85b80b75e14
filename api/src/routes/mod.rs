//! API route definitions.
//!
//! This module organizes all HTTP routes for the Spanform API server.

mod health;
mod ingest;
mod metrics;

pub use health::health_routes;
pub use ingest::{ingest_routes, IngestResponse, PartialSuccess};
pub use metrics::metrics_routes;
