//! In-process transport for tests and dry runs.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Notify;

use super::{BeaconRequest, BeaconResponse, Transport};
use crate::{Error, Result};

/// How the transport answers one request.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedOutcome {
    /// Success, with optional response headers.
    Accept(Vec<(String, String)>),
    /// The collector answered with a failure status.
    Reject,
    /// The request never got an answer.
    Fail(String),
}

/// Records every request and answers from a script, falling back to a
/// default outcome when the script runs dry.
#[derive(Debug)]
pub struct MemoryTransport {
    requests: Mutex<Vec<BeaconRequest>>,
    script: Mutex<VecDeque<ScriptedOutcome>>,
    fallback: ScriptedOutcome,
    notify: Notify,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    /// Accepts everything.
    pub fn new() -> Self {
        Self::with_fallback(ScriptedOutcome::Accept(Vec::new()))
    }

    /// Rejects everything.
    pub fn rejecting() -> Self {
        Self::with_fallback(ScriptedOutcome::Reject)
    }

    pub fn with_fallback(fallback: ScriptedOutcome) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
            fallback,
            notify: Notify::new(),
        }
    }

    /// Queues the answer for the next unanswered request.
    pub fn push_outcome(&self, outcome: ScriptedOutcome) {
        self.script.lock().push_back(outcome);
    }

    pub fn requests(&self) -> Vec<BeaconRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Every event from every recorded request, in send order.
    pub fn events(&self) -> Vec<Value> {
        self.requests
            .lock()
            .iter()
            .flat_map(|request| request.events().to_vec())
            .collect()
    }

    /// Resolves once at least `count` requests were recorded.
    pub async fn wait_for_requests(&self, count: usize) {
        loop {
            let notified = self.notify.notified();
            if self.request_count() >= count {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn post(&self, request: BeaconRequest) -> Result<BeaconResponse> {
        self.requests.lock().push(request);
        let outcome = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        self.notify.notify_waiters();

        match outcome {
            ScriptedOutcome::Accept(headers) => Ok(BeaconResponse {
                success: true,
                headers: headers
                    .into_iter()
                    .map(|(name, value)| (name.to_ascii_lowercase(), value))
                    .collect(),
            }),
            ScriptedOutcome::Reject => Ok(BeaconResponse::rejected()),
            ScriptedOutcome::Fail(reason) => Err(Error::transmission(reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(n: usize) -> BeaconRequest {
        BeaconRequest {
            domain: ".metrix.ws".into(),
            workspace_id: None,
            body: json!({"events": vec![json!({"evna": "pulse"}); n]}),
            headers: Vec::new(),
        }
    }

    #[tokio::test]
    async fn script_then_fallback() {
        let transport = MemoryTransport::new();
        transport.push_outcome(ScriptedOutcome::Reject);
        transport.push_outcome(ScriptedOutcome::Fail("offline".into()));

        assert!(!transport.post(request(1)).await.unwrap().success);
        assert!(matches!(
            transport.post(request(1)).await,
            Err(Error::Transmission(_))
        ));
        assert!(transport.post(request(2)).await.unwrap().success);

        assert_eq!(transport.request_count(), 3);
        assert_eq!(transport.events().len(), 4);
    }

    #[tokio::test]
    async fn waiting_for_requests() {
        let transport = std::sync::Arc::new(MemoryTransport::new());
        let sender = transport.clone();
        tokio::spawn(async move {
            sender.post(request(1)).await.unwrap();
        });
        transport.wait_for_requests(1).await;
        assert_eq!(transport.request_count(), 1);
    }
}
