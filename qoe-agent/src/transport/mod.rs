//! Beacon transport abstraction.

mod http;
mod memory;

pub use http::{HttpTransport, install_rustls_provider};
pub use memory::{MemoryTransport, ScriptedOutcome};

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::Result;

/// One batch on its way to the collector.
#[derive(Debug, Clone, PartialEq)]
pub struct BeaconRequest {
    /// Beacon domain, either dotted (`.metrix.ws`) or a full collection host.
    pub domain: String,
    pub workspace_id: Option<String>,
    pub body: Value,
    pub headers: Vec<(String, String)>,
}

impl BeaconRequest {
    /// Events carried by the body.
    pub fn events(&self) -> &[Value] {
        self.body
            .get("events")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BeaconResponse {
    pub success: bool,
    /// Header names are lower-cased.
    pub headers: HashMap<String, String>,
}

impl BeaconResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            headers: HashMap::new(),
        }
    }

    pub fn rejected() -> Self {
        Self::default()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Sends beacon batches. Errors and unsuccessful responses are both treated
/// as failed transmissions by the delivery engine.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, request: BeaconRequest) -> Result<BeaconResponse>;
}

/// Collector host for a beacon domain and optional workspace.
///
/// Dotted domains are prefixed with the workspace id; without a workspace
/// the leading dot is dropped. Collection domains are used as they are.
pub fn beacon_host(domain: &str, workspace_id: Option<&str>) -> String {
    match (domain.strip_prefix('.'), workspace_id.filter(|ws| !ws.is_empty())) {
        (Some(_), Some(workspace)) => format!("{workspace}{domain}"),
        (Some(bare), None) => bare.to_string(),
        (None, _) => domain.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hosts_for_each_domain_shape() {
        assert_eq!(beacon_host(".metrix.ws", Some("ws123")), "ws123.metrix.ws");
        assert_eq!(beacon_host(".metrix.ws", None), "metrix.ws");
        assert_eq!(beacon_host(".metrix.ws", Some("")), "metrix.ws");
        assert_eq!(beacon_host("collector.test:8080", Some("ws123")), "collector.test:8080");
    }

    #[test]
    fn response_headers_are_case_insensitive() {
        let mut response = BeaconResponse::ok();
        response
            .headers
            .insert("x-litix-io-beacon-flush-ms".into(), "20000".into());
        assert_eq!(response.header("X-Litix-IO-Beacon-Flush-Ms"), Some("20000"));
    }
}
