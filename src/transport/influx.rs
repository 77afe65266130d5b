use std::time::Duration;

use reqwest::Url;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use tracing::{debug, info};

use super::{DeliveryOutcome, PooledClient, Transport, TransportError};
use crate::config::SinkConfig;
use crate::telemetry::{Reading, SinkRecord};

/// Writes readings to an InfluxDB v2 bucket through its HTTP write API.
///
/// Each reading becomes one point: measurement = utility type, tag
/// `smartFurnitureHookupID`, field `value`, second-precision timestamp.
#[derive(Debug)]
pub struct InfluxSink {
    client: PooledClient,
    write_url: Url,
    auth_header: String,
}

impl InfluxSink {
    /// Creates a sink for the configured server, organisation and bucket.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidUrl`] if `sink.url` is not an
    /// absolute URL, or [`TransportError::Client`] if the client cannot be
    /// built.
    pub fn new(sink: &SinkConfig, timeout: Duration) -> Result<Self, TransportError> {
        let invalid = |message: String| TransportError::InvalidUrl {
            url: sink.url.clone(),
            message,
        };
        let base = Url::parse(&sink.url).map_err(|e| invalid(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(invalid("not a base URL".to_string()));
        }
        let mut write_url = base
            .join("api/v2/write")
            .map_err(|e| invalid(e.to_string()))?;
        write_url
            .query_pairs_mut()
            .append_pair("org", &sink.org)
            .append_pair("bucket", &sink.bucket)
            .append_pair("precision", "s");

        Ok(Self {
            client: PooledClient::new(timeout)?,
            write_url,
            auth_header: format!("Token {}", sink.token),
        })
    }

    /// Full write endpoint including query parameters.
    pub fn write_url(&self) -> &Url {
        &self.write_url
    }
}

impl Transport for InfluxSink {
    fn name(&self) -> &'static str {
        "influxdb"
    }

    async fn deliver(&self, reading: &Reading) -> DeliveryOutcome {
        let Some(client) = self.client.get() else {
            return DeliveryOutcome::Network("transport closed".to_string());
        };

        let line = SinkRecord::from(reading).line_protocol();
        let response = match client
            .post(self.write_url.clone())
            .header(AUTHORIZATION, &self.auth_header)
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(line)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return DeliveryOutcome::from_reqwest(&e),
        };

        let status = response.status();
        debug!(node_id = %reading.node_id, %status, "Sink write answered");
        if status.is_success() {
            DeliveryOutcome::Delivered
        } else {
            DeliveryOutcome::Rejected(status.as_u16())
        }
    }

    fn close(&self) {
        if self.client.close() {
            info!(transport = self.name(), "Sink client closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::DEFAULT_TIMEOUT;

    fn sink(url: &str) -> SinkConfig {
        SinkConfig {
            url: url.to_string(),
            token: "secret".to_string(),
            org: "waves lab".to_string(),
            bucket: "household".to_string(),
        }
    }

    #[test]
    fn write_url_carries_org_bucket_and_precision() {
        let sink = InfluxSink::new(&sink("http://localhost:8086/"), DEFAULT_TIMEOUT).expect("sink");
        assert_eq!(
            sink.write_url().as_str(),
            "http://localhost:8086/api/v2/write?org=waves+lab&bucket=household&precision=s"
        );
    }

    #[test]
    fn relative_url_is_rejected() {
        let err = InfluxSink::new(&sink("localhost:8086"), DEFAULT_TIMEOUT);
        assert!(matches!(err, Err(TransportError::InvalidUrl { .. })));
    }
}
