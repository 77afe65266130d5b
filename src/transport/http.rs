use std::time::Duration;

use reqwest::StatusCode;
use tracing::{debug, info};

use super::{DeliveryOutcome, PooledClient, Transport, TransportError};
use crate::telemetry::{NodeRequest, Reading};

/// POSTs each reading as JSON to the node's own endpoint.
///
/// The endpoint acknowledges with `204 No Content`; every other status is a
/// rejection.
#[derive(Debug)]
pub struct HttpEndpointTransport {
    client: PooledClient,
}

impl HttpEndpointTransport {
    /// Creates the transport with a pooled client using `timeout` per request.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Client`] if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        Ok(Self {
            client: PooledClient::new(timeout)?,
        })
    }
}

impl Transport for HttpEndpointTransport {
    fn name(&self) -> &'static str {
        "http-endpoint"
    }

    async fn deliver(&self, reading: &Reading) -> DeliveryOutcome {
        let Some(client) = self.client.get() else {
            return DeliveryOutcome::Network("transport closed".to_string());
        };

        let body = NodeRequest::from(reading);
        let response = match client.post(&reading.endpoint).json(&body).send().await {
            Ok(response) => response,
            Err(e) => return DeliveryOutcome::from_reqwest(&e),
        };

        let status = response.status();
        debug!(node_id = %reading.node_id, %status, "Device endpoint answered");
        if status == StatusCode::NO_CONTENT {
            DeliveryOutcome::Delivered
        } else {
            DeliveryOutcome::Rejected(status.as_u16())
        }
    }

    fn close(&self) {
        if self.client.close() {
            info!(transport = self.name(), "HTTP client closed");
        }
    }
}
