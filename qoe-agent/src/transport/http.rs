//! HTTPS transport to the collector.

use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, warn};
use url::Url;

use super::{BeaconRequest, BeaconResponse, Transport, beacon_host};
use crate::config::TransportConfig;
use crate::{Error, Result};

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Posts beacon batches as JSON to `{scheme}://{workspace}{domain}`.
pub struct HttpTransport {
    client: Client,
    scheme: String,
    /// Fixed endpoint that bypasses host resolution, e.g. a local receiver.
    endpoint: Option<Url>,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig) -> Result<Self> {
        install_rustls_provider();

        let mut builder = Client::builder().timeout(Duration::from_secs(config.timeout_secs));
        if let Some(agent) = &config.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        Ok(Self {
            client: builder.build()?,
            scheme: config.scheme.clone(),
            endpoint: None,
        })
    }

    /// Sends every batch to `endpoint` regardless of domain and workspace.
    pub fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Resolves the URL a request is posted to.
    pub fn url_for(&self, request: &BeaconRequest) -> Result<Url> {
        if let Some(endpoint) = &self.endpoint {
            return Ok(endpoint.clone());
        }
        let host = beacon_host(&request.domain, request.workspace_id.as_deref());
        Url::parse(&format!("{}://{}", self.scheme, host))
            .map_err(|e| Error::transmission(format!("invalid beacon url for host {host}: {e}")))
    }

    fn build_headers(request: &BeaconRequest) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            if let (Ok(name), Ok(value)) = (
                name.parse::<HeaderName>(),
                value.parse::<HeaderValue>(),
            ) {
                headers.insert(name, value);
            }
        }
        headers
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, request: BeaconRequest) -> Result<BeaconResponse> {
        let url = self.url_for(&request)?;
        let events = request.events().len();

        let response = self
            .client
            .post(url.clone())
            .headers(Self::build_headers(&request))
            .json(&request.body)
            .send()
            .await?;

        let status = response.status();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_ascii_lowercase(), value.to_string()))
            })
            .collect();

        if status.is_success() {
            debug!(url = %url, events, status = %status, "Beacon delivered");
        } else {
            warn!(url = %url, events, status = %status, "Collector rejected beacon");
        }
        Ok(BeaconResponse {
            success: status.is_success(),
            headers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(domain: &str, workspace: Option<&str>) -> BeaconRequest {
        BeaconRequest {
            domain: domain.into(),
            workspace_id: workspace.map(str::to_string),
            body: json!({"events": []}),
            headers: vec![("x-trace".into(), "1".into())],
        }
    }

    #[test]
    fn test_url_resolution() {
        let transport = HttpTransport::new(&TransportConfig::default()).unwrap();
        let url = transport.url_for(&request(".metrix.ws", Some("ws9"))).unwrap();
        assert_eq!(url.as_str(), "https://ws9.metrix.ws/");

        let url = transport.url_for(&request(".metrix.ws", None)).unwrap();
        assert_eq!(url.host_str(), Some("metrix.ws"));
    }

    #[test]
    fn test_fixed_endpoint_wins() {
        let endpoint = Url::parse("http://127.0.0.1:9000/beacon").unwrap();
        let transport = HttpTransport::new(&TransportConfig::default())
            .unwrap()
            .with_endpoint(endpoint.clone());
        assert_eq!(transport.url_for(&request(".metrix.ws", Some("ws9"))).unwrap(), endpoint);
    }

    #[test]
    fn test_invalid_headers_are_skipped() {
        let mut req = request(".metrix.ws", None);
        req.headers.push(("bad header".into(), "x".into()));
        let headers = HttpTransport::build_headers(&req);
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("x-trace").unwrap(), "1");
    }
}
