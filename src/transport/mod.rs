//! Delivery of single readings to external collectors.
//!
//! A [`Transport`] knows how to push one [`Reading`] somewhere and reports
//! the result as a [`DeliveryOutcome`] value instead of an error, so one
//! device's failure can never abort a fan-out.

mod http;
mod influx;

use std::fmt;
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;

use crate::telemetry::Reading;

pub use http::HttpEndpointTransport;
pub use influx::InfluxSink;

/// Default per-request timeout for outbound deliveries.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of delivering one reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The remote acknowledged the reading.
    Delivered,
    /// The remote answered with a non-success status code.
    Rejected(u16),
    /// No answer within the transport timeout.
    TimedOut,
    /// Connection-level failure (refused, reset, DNS, closed transport).
    Network(String),
    /// The reading could not be built from the node's endpoint.
    Malformed(String),
    /// The delivery panicked; caught at the per-device boundary.
    Fault(String),
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }

    /// Classifies a `reqwest` failure.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::TimedOut
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delivered => f.write_str("delivered"),
            Self::Rejected(status) => write!(f, "rejected (HTTP {status})"),
            Self::TimedOut => f.write_str("timed out"),
            Self::Network(e) => write!(f, "network error: {e}"),
            Self::Malformed(e) => write!(f, "malformed endpoint: {e}"),
            Self::Fault(e) => write!(f, "unexpected fault: {e}"),
        }
    }
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to create HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("invalid sink URL \"{url}\": {message}")]
    InvalidUrl { url: String, message: String },
}

/// Capability to deliver one reading.
pub trait Transport: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Delivers `reading` and reports how it went.
    fn deliver(&self, reading: &Reading) -> impl Future<Output = DeliveryOutcome> + Send;

    /// Releases pooled resources. Deliveries after `close` report a
    /// network error. Calling it twice is harmless.
    fn close(&self) {}
}

/// A `reqwest::Client` that can be dropped on demand.
///
/// Cloning a `reqwest::Client` shares its connection pool, so in-flight
/// requests keep working after [`PooledClient::close`]; only new requests
/// are refused.
#[derive(Debug)]
pub(crate) struct PooledClient {
    slot: Mutex<Option<reqwest::Client>>,
}

impl PooledClient {
    pub(crate) fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            slot: Mutex::new(Some(client)),
        })
    }

    pub(crate) fn get(&self) -> Option<reqwest::Client> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drops the client; returns `true` if it was still open.
    pub(crate) fn close(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
    }
}
