//! Trait for providers of live bus positions on a route.

use crate::parser::LocationResponse;
use anyhow::Result;

/// Abstraction over a bus-location provider (e.g., GBIS).
#[async_trait::async_trait]
pub trait LocationApi: Send + Sync {
    /// Returns the current positions of every bus on `route_id`.
    async fn bus_locations(&self, route_id: &str) -> Result<LocationResponse>;
}
