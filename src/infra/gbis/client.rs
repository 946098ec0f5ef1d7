use anyhow::Result;
use async_trait::async_trait;
use reqwest::Url;
use tracing::debug;

use crate::fetch::auth::UrlParam;
use crate::fetch::{HttpClient, fetch_bytes};
use crate::parser::{LocationResponse, parse_locations};
use crate::services::location_api::LocationApi;

pub const GBIS_LOCATION_ENDPOINT: &str =
    "https://apis.data.go.kr/6410000/buslocationservice/v2/getBusLocationListv2";

/// Gyeonggi bus information client. The service key rides on every request
/// as the `serviceKey` query parameter.
pub struct GbisClient<C> {
    http: UrlParam<C>,
    endpoint: String,
}

impl<C: HttpClient> GbisClient<C> {
    pub fn new(inner: C, endpoint: &str, service_key: &str) -> Self {
        Self {
            http: UrlParam::new(inner, "serviceKey", service_key),
            endpoint: endpoint.to_string(),
        }
    }

    /// Request URL for `route_id`, without the service key.
    pub fn location_url(&self, route_id: &str) -> Result<Url> {
        Ok(Url::parse_with_params(
            &self.endpoint,
            &[("routeId", route_id), ("format", "json")],
        )?)
    }
}

#[async_trait]
impl<C: HttpClient> LocationApi for GbisClient<C> {
    async fn bus_locations(&self, route_id: &str) -> Result<LocationResponse> {
        let url = self.location_url(route_id)?;
        let bytes = fetch_bytes(&self.http, url.as_str()).await?;
        debug!(route_id, bytes = bytes.len(), "Location response received");
        parse_locations(&bytes)
    }
}
