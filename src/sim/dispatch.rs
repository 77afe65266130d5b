//! Concurrent telemetry fan-out with per-device failure isolation.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;

use chrono::NaiveDateTime;
use futures::FutureExt;
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::devices::WaveNode;
use crate::telemetry::Reading;
use crate::transport::{DeliveryOutcome, Transport};

/// Aggregate result of one [`Dispatcher::send_all`] call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchSummary {
    pub delivered: usize,
    pub failed: usize,
    /// Devices without an endpoint; not attempted.
    pub skipped: usize,
    /// Per-device outcome for every attempted device, in input order.
    pub outcomes: Vec<(String, DeliveryOutcome)>,
}

impl DispatchSummary {
    /// Devices a delivery was attempted for.
    pub fn attempted(&self) -> usize {
        self.delivered + self.failed
    }

    pub fn outcome_of(&self, node_id: &str) -> Option<&DeliveryOutcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| id == node_id)
            .map(|(_, outcome)| outcome)
    }
}

impl fmt::Display for DispatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} delivered, {} failed, {} skipped",
            self.delivered, self.failed, self.skipped
        )
    }
}

/// Sends one reading per device through a [`Transport`].
#[derive(Debug)]
pub struct Dispatcher<T> {
    transport: T,
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Delivers a reading stamped `at` for every device with an endpoint.
    ///
    /// All deliveries are started before any is awaited. A failing or
    /// panicking delivery only affects its own outcome, so
    /// `delivered + failed` always equals the number of devices with an
    /// endpoint.
    pub async fn send_all(&self, nodes: &[WaveNode], at: NaiveDateTime) -> DispatchSummary {
        let mut summary = DispatchSummary::default();
        let mut deliveries = Vec::with_capacity(nodes.len());
        for node in nodes {
            if node.has_endpoint() {
                deliveries.push(self.deliver_one(node, at));
            } else {
                debug!(node_id = %node.id, "No endpoint configured, skipping");
                summary.skipped += 1;
            }
        }

        for (node_id, outcome) in join_all(deliveries).await {
            if outcome.is_delivered() {
                summary.delivered += 1;
            } else {
                summary.failed += 1;
            }
            summary.outcomes.push((node_id, outcome));
        }

        info!(
            transport = self.transport.name(),
            %at,
            delivered = summary.delivered,
            failed = summary.failed,
            skipped = summary.skipped,
            "Dispatch complete"
        );
        summary
    }

    async fn deliver_one(&self, node: &WaveNode, at: NaiveDateTime) -> (String, DeliveryOutcome) {
        let reading = match Reading::for_node(node, at) {
            Ok(reading) => reading,
            Err(reason) => {
                warn!(node_id = %node.id, endpoint = %node.endpoint, %reason, "Malformed endpoint");
                return (node.id.clone(), DeliveryOutcome::Malformed(reason));
            }
        };

        let outcome = AssertUnwindSafe(self.transport.deliver(&reading))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| DeliveryOutcome::Fault(panic_message(panic.as_ref())));

        match &outcome {
            DeliveryOutcome::Delivered => debug!(
                node_id = %node.id,
                consumption = reading.consumption,
                "Reading delivered"
            ),
            other => warn!(node_id = %node.id, name = %node.name, outcome = %other, "Reading not delivered"),
        }
        (node.id.clone(), outcome)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic in delivery".to_string()
    }
}
