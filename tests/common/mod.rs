//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};

use waveslab_sim::devices::{NodeStatus, NodeType, VirtualUser, WaveNode};
use waveslab_sim::storage::MemoryRepository;
use waveslab_sim::telemetry::Reading;
use waveslab_sim::transport::{DeliveryOutcome, Transport};

/// 2025-10-01 at the given time of day.
pub fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 10, 1)
        .and_then(|d| d.and_hms_opt(h, m, s))
        .expect("valid timestamp")
}

/// Endpoint carrying `hookup` as its hookup id.
pub fn endpoint(hookup: &str) -> String {
    format!("http://localhost:3002/api/internal/measurements?smart_furniture_hookup_id={hookup}")
}

/// `n` nodes named "Device 0".."Device n-1", all off, each with an endpoint.
pub fn fleet(n: usize) -> Vec<WaveNode> {
    (0..n)
        .map(|i| {
            let node_type = NodeType::ALL[i % NodeType::ALL.len()];
            WaveNode::new(format!("Device {i}"), node_type)
                .with_endpoint(endpoint(&format!("hookup-{i}")))
                .with_consumption(1.0 + i as f64)
        })
        .collect()
}

/// The kitchen faucet: on, drawing 2.5, reporting to `hookup-faucet`.
pub fn kitchen_faucet() -> WaveNode {
    WaveNode::new("Kitchen Faucet", NodeType::Water)
        .with_status(NodeStatus::On)
        .with_endpoint(endpoint("hookup-faucet"))
        .with_consumption(2.5)
        .with_user("alice")
}

pub fn memory_repo(nodes: Vec<WaveNode>) -> Arc<MemoryRepository> {
    Arc::new(MemoryRepository::new(nodes, vec![VirtualUser::new("alice")]).expect("unique fleet"))
}

/// What a [`ScriptedTransport`] does for one node.
#[derive(Debug, Clone)]
pub enum Behaviour {
    Deliver,
    DeliverAfter(Duration),
    Reject(u16),
    /// Waits, then reports a timeout.
    Stall(Duration),
    Panic,
}

#[derive(Debug, Default)]
struct Inner {
    behaviours: HashMap<String, Behaviour>,
    readings: Mutex<Vec<Reading>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    closes: AtomicUsize,
}

/// In-memory transport whose per-node outcome is scripted.
///
/// Clones share state, so a test can keep one and hand another to a driver.
/// Unscripted nodes are delivered immediately.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    inner: Arc<Inner>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(behaviours: impl IntoIterator<Item = (&'static str, Behaviour)>) -> Self {
        let behaviours = behaviours
            .into_iter()
            .map(|(id, b)| (id.to_string(), b))
            .collect();
        Self {
            inner: Arc::new(Inner {
                behaviours,
                ..Inner::default()
            }),
        }
    }

    /// Readings that reached this transport, in arrival order.
    pub fn readings(&self) -> Vec<Reading> {
        self.inner
            .readings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Highest number of deliveries in progress at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.inner.closes.load(Ordering::SeqCst)
    }
}

impl Transport for ScriptedTransport {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn deliver(&self, reading: &Reading) -> DeliveryOutcome {
        let inner = &self.inner;
        inner
            .readings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(reading.clone());
        let now = inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        inner.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let behaviour = inner
            .behaviours
            .get(&reading.node_id)
            .cloned()
            .unwrap_or(Behaviour::Deliver);
        let outcome = match behaviour {
            Behaviour::Deliver => DeliveryOutcome::Delivered,
            Behaviour::DeliverAfter(delay) => {
                tokio::time::sleep(delay).await;
                DeliveryOutcome::Delivered
            }
            Behaviour::Reject(status) => DeliveryOutcome::Rejected(status),
            Behaviour::Stall(delay) => {
                tokio::time::sleep(delay).await;
                DeliveryOutcome::TimedOut
            }
            Behaviour::Panic => panic!("scripted panic for {}", reading.node_id),
        };

        inner.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }

    fn close(&self) {
        self.inner.closes.fetch_add(1, Ordering::SeqCst);
    }
}
