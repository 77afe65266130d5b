//! The simulated smart-utility connection point.

use serde::{Deserialize, Serialize};

use super::slug::slugify;
use super::types::{NodeStatus, NodeType};

/// A smart-furniture connection point with an on/off status and a
/// real-time consumption rate.
///
/// Deserialization goes through [`NodeRecord`], so every node read from a
/// store or request body has a non-empty id (derived from `name` when the
/// record omits it) and a finite, non-negative consumption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "NodeRecord")]
pub struct WaveNode {
    /// Slug identifier, unique across the fleet.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Utility consumed by the node.
    pub node_type: NodeType,
    /// Destination URL for telemetry; empty means "not configured".
    pub endpoint: String,
    /// Current on/off status.
    pub status: NodeStatus,
    /// Consumption reported while the node is on (>= 0).
    pub real_time_consumption: f64,
    /// Username of the associated virtual user, if any.
    pub assigned_user: Option<String>,
}

impl WaveNode {
    /// Creates an `OFF` node with zero consumption and no endpoint.
    ///
    /// The id is derived from `name` with [`slugify`].
    pub fn new(name: impl Into<String>, node_type: NodeType) -> Self {
        let name = name.into();
        Self {
            id: slugify(&name),
            name,
            node_type,
            endpoint: String::new(),
            status: NodeStatus::Off,
            real_time_consumption: 0.0,
            assigned_user: None,
        }
    }

    /// Overrides the derived id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_status(mut self, status: NodeStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_user(mut self, username: impl Into<String>) -> Self {
        self.assigned_user = Some(username.into());
        self
    }

    /// Sets the consumption rate.
    ///
    /// # Panics
    ///
    /// Panics if `rate` is negative or not finite.
    pub fn with_consumption(mut self, rate: f64) -> Self {
        assert!(rate.is_finite() && rate >= 0.0, "consumption must be >= 0");
        self.real_time_consumption = rate;
        self
    }

    /// Returns `true` when telemetry can be sent for this node.
    pub fn has_endpoint(&self) -> bool {
        !self.endpoint.trim().is_empty()
    }

    /// Copy of this node as it looks right after being switched off, with its
    /// consumption reset to zero for the final reading.
    pub fn shutdown_snapshot(&self) -> Self {
        Self {
            status: NodeStatus::Off,
            real_time_consumption: 0.0,
            ..self.clone()
        }
    }
}

/// On-disk and on-wire shape of a node before validation.
#[derive(Debug, Deserialize)]
pub struct NodeRecord {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub node_type: NodeType,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub status: NodeStatus,
    pub real_time_consumption: f64,
    #[serde(default)]
    pub assigned_user: Option<String>,
}

impl TryFrom<NodeRecord> for WaveNode {
    type Error = String;

    fn try_from(record: NodeRecord) -> Result<Self, Self::Error> {
        let id = match record.id {
            Some(id) if !id.trim().is_empty() => id,
            _ => slugify(&record.name),
        };
        if id.is_empty() {
            return Err(format!("node \"{}\" has no usable id", record.name));
        }
        let rate = record.real_time_consumption;
        if !rate.is_finite() || rate < 0.0 {
            return Err(format!(
                "node \"{id}\" has invalid real_time_consumption {rate}, must be >= 0"
            ));
        }

        Ok(Self {
            id,
            name: record.name,
            node_type: record.node_type,
            endpoint: record.endpoint.unwrap_or_default(),
            status: record.status,
            real_time_consumption: rate,
            assigned_user: record.assigned_user,
        })
    }
}
